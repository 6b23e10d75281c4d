//! Loaded-box export download.
//!
//! The export endpoint takes the selected train codes as one comma-joined
//! string and answers with the spreadsheet bytes directly. The artifact is
//! written atomically so a failed download never leaves a truncated file at
//! the output path.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::auth::credentials::SharedCredentials;
use crate::error::{AppError, Result};
use crate::models::ExportApiConfig;
use crate::services::transport::{RetryPolicy, Transport, TransportRequest, send_with_retry};

/// Downloads the export spreadsheet for a set of train codes.
pub struct ExportDownloader {
    config: ExportApiConfig,
    transport: Arc<dyn Transport>,
    credentials: SharedCredentials,
}

impl ExportDownloader {
    pub fn new(
        config: ExportApiConfig,
        transport: Arc<dyn Transport>,
        credentials: SharedCredentials,
    ) -> Self {
        Self {
            config,
            transport,
            credentials,
        }
    }

    /// Request the export and save it to `out_path`.
    ///
    /// An empty code set is refused before any network traffic; the portal
    /// would answer such a request with a full, unfiltered workbook.
    pub async fn download(&self, codes: &[String], out_path: &Path) -> Result<()> {
        if codes.is_empty() {
            return Err(AppError::data(
                "no train codes selected; refusing to request an unfiltered export",
            ));
        }

        let creds = self.credentials.lock().await;
        let headers = creds.fill_headers(&self.config.headers);
        creds.ensure_authenticated(&headers)?;
        drop(creds);

        let mut payload = serde_json::Map::new();
        payload.insert(
            self.config.code_field.clone(),
            Value::String(codes.join(",")),
        );
        payload.insert(
            self.config.flag_field.clone(),
            Value::String(self.config.flag.clone()),
        );

        let request = TransportRequest::post_json(
            &self.config.url,
            headers,
            Value::Object(payload),
            Duration::from_secs(self.config.timeout_secs),
        );
        let policy = RetryPolicy::new(self.config.retries, self.config.retry_backoff_base);
        let response = send_with_retry(self.transport.as_ref(), &request, &policy).await?;

        write_atomic(out_path, &response.body).await?;
        log::info!(
            "Saved export for {} codes ({} bytes) to {}",
            codes.len(),
            response.body.len(),
            out_path.display()
        );
        Ok(())
    }
}

/// Write bytes atomically (write to temp, then rename).
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let tmp = path.with_extension("tmp");
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
