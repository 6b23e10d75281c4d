//! Top-level run pipelines.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;

use crate::auth::{CaptchaSolver, LoginFlow, SharedCredentials};
use crate::error::Result;
use crate::models::{Config, RunConfig, TrainRecord};
use crate::pipeline::filter::{self, DateRange};
use crate::pipeline::split;
use crate::services::{ExportDownloader, ListingFetcher, Transport};

/// Fetch the listing, pick the day's train codes and download the export.
///
/// Logs in first when automatic login is enabled and no credentials came in
/// from the environment. Returns the path of the downloaded spreadsheet.
pub async fn run_fetch(
    config: &Config,
    transport: Arc<dyn Transport>,
    credentials: &SharedCredentials,
    solver: Arc<dyn CaptchaSolver>,
) -> Result<PathBuf> {
    if config.login_api.enabled && credentials.lock().await.is_empty() {
        log::info!("No credentials in the environment; logging in first");
        let mut flow = LoginFlow::new(
            config.login_api.clone(),
            Arc::clone(&transport),
            Arc::clone(&solver),
        );
        flow.login(credentials).await?;
    }

    let day = config.run.resolved_day();
    let range = departure_range(&config.run);

    let mut login_flow = config.login_api.enabled.then(|| {
        LoginFlow::new(
            config.login_api.clone(),
            Arc::clone(&transport),
            Arc::clone(&solver),
        )
    });

    let fetcher = ListingFetcher::new(
        config.list_api.clone(),
        Arc::clone(&transport),
        Arc::clone(credentials),
    );
    let bounds = range
        .as_ref()
        .map(|(start, end, _)| (start.as_str(), end.as_str()));
    let rows = fetcher.fetch_all(bounds, login_flow.as_mut()).await?;
    log::info!("Accumulated {} listing rows", rows.len());

    save_sample_rows(&config.run, &rows).await?;

    let codes = filter::filter_train_codes(
        &rows,
        &day,
        &config.run.departure_field,
        &config.run.code_field,
        range.as_ref().map(|(_, _, parsed)| parsed),
    );
    log::info!("Selected {} train codes for {day}", codes.len());
    log::info!("codes={}", codes.join(","));

    let out_path = config.run.export_path(&day);
    let downloader = ExportDownloader::new(
        config.export_api.clone(),
        Arc::clone(&transport),
        Arc::clone(credentials),
    );
    downloader.download(&codes, &out_path).await?;
    Ok(out_path)
}

/// Split a downloaded export into per-partner files.
pub fn run_split(config: &Config, input_path: &Path) -> Result<Vec<(String, PathBuf)>> {
    if !config.processing.enabled {
        log::info!("Splitting disabled; leaving {} as is", input_path.display());
        return Ok(Vec::new());
    }
    let consignor = consignor_filter(&config.processing.consignor_env_key);
    if consignor.is_none() {
        log::debug!(
            "No consignor filter ({} unset); splitting all rows",
            config.processing.consignor_env_key
        );
    }
    split::split_sheet(input_path, &config.processing, consignor.as_deref())
}

/// Full run: fetch the export, then split it.
pub async fn run_all(
    config: &Config,
    transport: Arc<dyn Transport>,
    credentials: &SharedCredentials,
    solver: Arc<dyn CaptchaSolver>,
) -> Result<()> {
    let export = run_fetch(config, transport, credentials, solver).await?;
    let outputs = run_split(config, &export)?;
    log::info!(
        "Run complete: {} split into {} files",
        export.display(),
        outputs.len()
    );
    Ok(())
}

/// Log in once and install fresh credentials, replacing any current ones.
pub async fn run_login(
    config: &Config,
    transport: Arc<dyn Transport>,
    credentials: &SharedCredentials,
    solver: Arc<dyn CaptchaSolver>,
) -> Result<()> {
    let mut flow = LoginFlow::new(config.login_api.clone(), transport, solver);
    flow.login(credentials).await
}

fn departure_range(run: &RunConfig) -> Option<(String, String, DateRange)> {
    let start = run.departure_date_start.trim();
    let end = run.departure_date_end.trim();
    if start.is_empty() && end.is_empty() {
        return None;
    }
    if start.is_empty() || end.is_empty() {
        log::warn!("Ignoring departure range: both bounds must be set");
        return None;
    }
    match DateRange::parse(start, end) {
        Some(parsed) => Some((start.to_string(), end.to_string(), parsed)),
        None => {
            log::warn!("Ignoring unparseable departure range {start}..{end}");
            None
        }
    }
}

fn consignor_filter(env_key: &str) -> Option<String> {
    if env_key.is_empty() {
        return None;
    }
    std::env::var(env_key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

async fn save_sample_rows(run: &RunConfig, rows: &[TrainRecord]) -> Result<()> {
    if !run.save_sample_rows {
        return Ok(());
    }
    let path = Path::new(&run.sample_rows_path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, serde_json::to_vec_pretty(rows)?).await?;
    log::info!("Saved {} raw rows to {}", rows.len(), path.display());
    Ok(())
}
