//! Row filtering: pick train codes for a day or a departure window.

use chrono::{NaiveDate, NaiveDateTime};

use crate::models::TrainRecord;

/// Inclusive departure window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DateRange {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateRange {
    /// Build a range from raw bound strings; `None` unless both parse.
    pub fn parse(start: &str, end: &str) -> Option<Self> {
        let start = parse_departure_datetime(start)?;
        let end = parse_departure_datetime(end)?;
        Some(Self { start, end })
    }

    fn contains(&self, value: NaiveDateTime) -> bool {
        self.start <= value && value <= self.end
    }
}

/// Parse a departure timestamp. Accepts `YYYY-MM-DD HH:MM:SS` and bare
/// `YYYY-MM-DD` (read as midnight).
pub fn parse_departure_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Select train codes from listing rows.
///
/// When a range is given, rows whose departure parses are kept if it falls
/// inside the window (bounds inclusive). Rows whose departure does not parse,
/// and all rows when no range is given, are kept if the first ten characters
/// of the departure equal `day`. Codes are trimmed, empties dropped, and
/// duplicates removed keeping first-seen order.
pub fn filter_train_codes(
    rows: &[TrainRecord],
    day: &str,
    departure_field: &str,
    code_field: &str,
    range: Option<&DateRange>,
) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for row in rows {
        let departure = row.field_str(departure_field).unwrap_or("");
        let keep = match (range, parse_departure_datetime(departure)) {
            (Some(range), Some(parsed)) => range.contains(parsed),
            _ => day_prefix_matches(departure, day),
        };
        if !keep {
            continue;
        }
        let code = row.field_str(code_field).unwrap_or("");
        if !code.is_empty() && !codes.iter().any(|seen| seen == code) {
            codes.push(code.to_string());
        }
    }
    codes
}

fn day_prefix_matches(departure: &str, day: &str) -> bool {
    !day.is_empty() && departure.get(..10) == Some(day)
}
