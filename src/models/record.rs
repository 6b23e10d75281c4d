//! Listing row types.
//!
//! The portal returns rows as loosely-typed JSON objects whose field set
//! drifts between deployments, so rows are kept as raw maps and read
//! through configurable field names.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row from the listing endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainRecord(pub Map<String, Value>);

impl TrainRecord {
    /// Read a field as a trimmed string, if present and scalar.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str).map(str::trim)
    }
}

/// One parsed page of the listing endpoint.
#[derive(Debug, Clone, Default)]
pub struct ListingPage {
    /// Declared total row count across all pages
    pub total: u64,
    /// Rows on this page
    pub rows: Vec<TrainRecord>,
}

impl ListingPage {
    /// Parse a response body using the configured field names.
    ///
    /// Tolerant of shape drift: a missing or non-numeric total reads as 0,
    /// a missing or non-array row field reads as empty, and non-object
    /// entries in the array are skipped.
    pub fn parse(body: &Value, total_field: &str, rows_field: &str) -> Self {
        let total = body.get(total_field).and_then(Value::as_u64).unwrap_or(0);
        let rows = body
            .get(rows_field)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.as_object())
                    .map(|obj| TrainRecord(obj.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Self { total, rows }
    }
}
