//! Application configuration structures.
//!
//! The defaults below describe the Beibu Gulf logistics portal as observed;
//! every endpoint URL, header set, payload template and field name can be
//! overridden from a TOML file. Secrets are never stored here — header and
//! payload values reference them as `${NAME}` placeholders resolved at
//! request time.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Listing endpoint settings (pagination, retry, payload template)
    #[serde(default)]
    pub list_api: ListApiConfig,

    /// Export endpoint settings
    #[serde(default)]
    pub export_api: ExportApiConfig,

    /// Run-level parameters (target day, output paths, sample dump)
    #[serde(default)]
    pub run: RunConfig,

    /// Spreadsheet split settings
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Automatic login settings (captcha + login endpoint)
    #[serde(default)]
    pub login_api: LoginApiConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    ///
    /// Every rejection names the offending key so the operator can fix the
    /// file without reading source code.
    pub fn validate(&self) -> Result<()> {
        check_url(&self.list_api.url, "list_api.url")?;
        check_url(&self.export_api.url, "export_api.url")?;
        if self.list_api.timeout_secs == 0 {
            return Err(AppError::config("list_api.timeout_secs must be > 0"));
        }
        if self.list_api.retries == 0 {
            return Err(AppError::config("list_api.retries must be > 0"));
        }
        if self.list_api.retry_backoff_base < 1.0 {
            return Err(AppError::config(
                "list_api.retry_backoff_base must be >= 1.0",
            ));
        }
        if self.list_api.pagination.max_pages == 0 {
            return Err(AppError::config("list_api.pagination.max_pages must be > 0"));
        }
        if !self.list_api.payload_template.is_object() {
            return Err(AppError::config(
                "list_api.payload_template must be a table",
            ));
        }
        if self.export_api.timeout_secs == 0 {
            return Err(AppError::config("export_api.timeout_secs must be > 0"));
        }
        if self.export_api.retries == 0 {
            return Err(AppError::config("export_api.retries must be > 0"));
        }
        if self.export_api.code_field.trim().is_empty() {
            return Err(AppError::config("export_api.code_field is empty"));
        }
        if !self.run.output_filename_template.contains("{day}") {
            return Err(AppError::config(
                "run.output_filename_template must contain {day}",
            ));
        }
        if self.run.departure_field.trim().is_empty() {
            return Err(AppError::config("run.departure_field is empty"));
        }
        if self.run.code_field.trim().is_empty() {
            return Err(AppError::config("run.code_field is empty"));
        }
        if self.processing.enabled {
            if self.processing.partition_field.trim().is_empty() {
                return Err(AppError::config("processing.partition_field is empty"));
            }
            if !self.processing.output_template.contains("{partition}") {
                return Err(AppError::config(
                    "processing.output_template must contain {partition}",
                ));
            }
        }
        if self.login_api.enabled {
            check_url(&self.login_api.login.url, "login_api.login.url")?;
            if self.login_api.token_json_path.is_empty() {
                return Err(AppError::config("login_api.token_json_path is empty"));
            }
            if self.login_api.captcha.enabled {
                check_url(&self.login_api.captcha.url, "login_api.captcha.url")?;
                if self.login_api.captcha.retries == 0 {
                    return Err(AppError::config("login_api.captcha.retries must be > 0"));
                }
            }
        }
        Ok(())
    }
}

fn check_url(value: &str, key: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(AppError::config(format!("{key} is empty")));
    }
    url::Url::parse(value).map_err(|e| AppError::config(format!("{key} is invalid: {e}")))?;
    Ok(())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            list_api: ListApiConfig::default(),
            export_api: ExportApiConfig::default(),
            run: RunConfig::default(),
            processing: ProcessingConfig::default(),
            login_api: LoginApiConfig::default(),
        }
    }
}

/// Listing endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListApiConfig {
    /// Listing endpoint URL
    #[serde(default = "defaults::list_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::list_timeout")]
    pub timeout_secs: u64,

    /// Retry attempts per page request
    #[serde(default = "defaults::list_retries")]
    pub retries: u32,

    /// Exponential backoff base (sleep = base^attempt seconds)
    #[serde(default = "defaults::list_backoff_base")]
    pub retry_backoff_base: f64,

    /// Delay between page requests in milliseconds
    #[serde(default = "defaults::sleep_between_pages")]
    pub sleep_between_pages_ms: u64,

    /// Request headers; `${AUTH_TOKEN}` and `${COOKIE}` mark credential slots
    #[serde(default = "defaults::api_headers")]
    pub headers: BTreeMap<String, String>,

    /// Request body template (page fields are overwritten per page)
    #[serde(default = "defaults::list_payload")]
    pub payload_template: Value,

    /// Payload params field receiving the run's range start, if any
    #[serde(default = "defaults::date_start_param")]
    pub date_start_param: String,

    /// Payload params field receiving the run's range end, if any
    #[serde(default = "defaults::date_end_param")]
    pub date_end_param: String,

    /// Pagination field names and limits
    #[serde(default)]
    pub pagination: PaginationConfig,
}

impl Default for ListApiConfig {
    fn default() -> Self {
        Self {
            url: defaults::list_url(),
            timeout_secs: defaults::list_timeout(),
            retries: defaults::list_retries(),
            retry_backoff_base: defaults::list_backoff_base(),
            sleep_between_pages_ms: defaults::sleep_between_pages(),
            headers: defaults::api_headers(),
            payload_template: defaults::list_payload(),
            date_start_param: defaults::date_start_param(),
            date_end_param: defaults::date_end_param(),
            pagination: PaginationConfig::default(),
        }
    }
}

/// Pagination field names and limits for the listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    /// Payload field carrying the page number
    #[serde(default = "defaults::page_field")]
    pub page_field: String,

    /// Payload field carrying the page size
    #[serde(default = "defaults::page_size_field")]
    pub page_size_field: String,

    /// Response field carrying the row array
    #[serde(default = "defaults::rows_field")]
    pub rows_field: String,

    /// Response field carrying the declared total
    #[serde(default = "defaults::total_field")]
    pub total_field: String,

    /// First page number (the portal counts from 0)
    #[serde(default)]
    pub start_page: u64,

    /// Hard cap on pages fetched per run, guarding against a nonsense total
    #[serde(default = "defaults::max_pages")]
    pub max_pages: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page_field: defaults::page_field(),
            page_size_field: defaults::page_size_field(),
            rows_field: defaults::rows_field(),
            total_field: defaults::total_field(),
            start_page: 0,
            max_pages: defaults::max_pages(),
        }
    }
}

/// Export endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportApiConfig {
    /// Export endpoint URL
    #[serde(default = "defaults::export_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::export_timeout")]
    pub timeout_secs: u64,

    /// Retry attempts
    #[serde(default = "defaults::export_retries")]
    pub retries: u32,

    /// Exponential backoff base
    #[serde(default = "defaults::export_backoff_base")]
    pub retry_backoff_base: f64,

    /// Request body field receiving the comma-joined code list
    #[serde(default = "defaults::code_field")]
    pub code_field: String,

    /// Request body field receiving the business flag
    #[serde(default = "defaults::flag_field")]
    pub flag_field: String,

    /// Business flag value sent with every export
    #[serde(default = "defaults::export_flag")]
    pub flag: String,

    /// Request headers; same credential slots as the listing endpoint
    #[serde(default = "defaults::api_headers")]
    pub headers: BTreeMap<String, String>,
}

impl Default for ExportApiConfig {
    fn default() -> Self {
        Self {
            url: defaults::export_url(),
            timeout_secs: defaults::export_timeout(),
            retries: defaults::export_retries(),
            retry_backoff_base: defaults::export_backoff_base(),
            code_field: defaults::code_field(),
            flag_field: defaults::flag_field(),
            flag: defaults::export_flag(),
            headers: defaults::api_headers(),
        }
    }
}

/// Run-level parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Target day `YYYY-MM-DD`; empty means today
    #[serde(default)]
    pub target_day: String,

    /// Optional range start (`YYYY-MM-DD` or `YYYY-MM-DD HH:MM:SS`);
    /// with `departure_date_end` it overrides the single-day filter
    #[serde(default)]
    pub departure_date_start: String,

    /// Optional range end
    #[serde(default)]
    pub departure_date_end: String,

    /// Row field carrying the departure timestamp
    #[serde(default = "defaults::departure_field")]
    pub departure_field: String,

    /// Row field carrying the train code (the dedup key)
    #[serde(default = "defaults::train_code_field")]
    pub code_field: String,

    /// Directory receiving the downloaded export
    #[serde(default = "defaults::output_dir")]
    pub output_dir: String,

    /// Export filename template; `{day}` is the target day
    #[serde(default = "defaults::output_filename_template")]
    pub output_filename_template: String,

    /// Dump the raw accumulated listing rows to JSON before filtering
    #[serde(default)]
    pub save_sample_rows: bool,

    /// Path of the sample row dump
    #[serde(default = "defaults::sample_rows_path")]
    pub sample_rows_path: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            target_day: String::new(),
            departure_date_start: String::new(),
            departure_date_end: String::new(),
            departure_field: defaults::departure_field(),
            code_field: defaults::train_code_field(),
            output_dir: defaults::output_dir(),
            output_filename_template: defaults::output_filename_template(),
            save_sample_rows: false,
            sample_rows_path: defaults::sample_rows_path(),
        }
    }
}

impl RunConfig {
    /// The effective target day: configured, or today when unset.
    pub fn resolved_day(&self) -> String {
        let configured = self.target_day.trim();
        if configured.is_empty() {
            chrono::Local::now().format("%Y-%m-%d").to_string()
        } else {
            configured.to_string()
        }
    }

    /// Path of the export artifact for a given day.
    pub fn export_path(&self, day: &str) -> std::path::PathBuf {
        std::path::Path::new(&self.output_dir)
            .join(self.output_filename_template.replace("{day}", day))
    }
}

/// Spreadsheet split settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Whether the split step runs at all
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Column filtered against the consignor value, when one is set
    #[serde(default = "defaults::consignor_field")]
    pub consignor_field: String,

    /// Environment variable supplying the consignor filter value
    #[serde(default = "defaults::consignor_env_key")]
    pub consignor_env_key: String,

    /// Column whose values partition the rows into output files
    #[serde(default = "defaults::partition_field")]
    pub partition_field: String,

    /// Partition value dropped before splitting; empty disables exclusion
    #[serde(default = "defaults::exclude_value")]
    pub exclude_value: String,

    /// Directory receiving the split files
    #[serde(default = "defaults::split_output_dir")]
    pub output_dir: String,

    /// Worksheet name written into each split file
    #[serde(default = "defaults::sheet_name")]
    pub sheet_name: String,

    /// Split filename template; `{partition}` is the sanitized value
    #[serde(default = "defaults::output_template")]
    pub output_template: String,

    /// Merge with an existing file of the same name instead of overwriting
    #[serde(default = "defaults::enabled")]
    pub merge_existing: bool,

    /// Columns forming the dedup key during a merge; empty means whole row
    #[serde(default)]
    pub dedup_keys: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            consignor_field: defaults::consignor_field(),
            consignor_env_key: defaults::consignor_env_key(),
            partition_field: defaults::partition_field(),
            exclude_value: defaults::exclude_value(),
            output_dir: defaults::split_output_dir(),
            sheet_name: defaults::sheet_name(),
            output_template: defaults::output_template(),
            merge_existing: defaults::enabled(),
            dedup_keys: Vec::new(),
        }
    }
}

/// Automatic login settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginApiConfig {
    /// Whether automatic login is available
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Captcha challenge settings
    #[serde(default)]
    pub captcha: CaptchaConfig,

    /// Login endpoint settings
    #[serde(default)]
    pub login: LoginConfig,

    /// Key path to the token inside the login response body
    #[serde(default = "defaults::token_json_path")]
    pub token_json_path: Vec<String>,

    /// Environment variable pre-seeding the bearer token
    #[serde(default = "defaults::token_env")]
    pub token_env: String,

    /// Environment variable pre-seeding the cookie header
    #[serde(default = "defaults::cookie_env")]
    pub cookie_env: String,

    /// Cookie names emitted first when serializing the jar
    #[serde(default = "defaults::preferred_cookies")]
    pub preferred_cookies: Vec<String>,
}

impl Default for LoginApiConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            captcha: CaptchaConfig::default(),
            login: LoginConfig::default(),
            token_json_path: defaults::token_json_path(),
            token_env: defaults::token_env(),
            cookie_env: defaults::cookie_env(),
            preferred_cookies: defaults::preferred_cookies(),
        }
    }
}

/// Captcha challenge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptchaConfig {
    /// Whether a captcha is required before login
    #[serde(default = "defaults::enabled")]
    pub enabled: bool,

    /// Challenge endpoint URL
    #[serde(default = "defaults::captcha_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::captcha_timeout")]
    pub timeout_secs: u64,

    /// Retry attempts on challenge-in-flight conflicts (HTTP 409)
    #[serde(default = "defaults::captcha_retries")]
    pub retries: u32,

    /// Fixed sleep between conflict retries in seconds
    #[serde(default = "defaults::captcha_retry_sleep")]
    pub retry_sleep_secs: u64,

    /// Cached challenge lifetime in seconds
    #[serde(default = "defaults::captcha_ttl")]
    pub cache_ttl_secs: u64,

    /// Environment variable overriding the cache TTL
    #[serde(default = "defaults::ttl_env_key")]
    pub ttl_env_key: String,

    /// Environment variable supplying a manually read captcha value
    #[serde(default = "defaults::value_env_key")]
    pub value_env_key: String,

    /// Environment variable supplying the challenge key alongside an override
    #[serde(default = "defaults::key_env_key")]
    pub key_env_key: String,

    /// Environment variable supplying the correlation id alongside an override
    #[serde(default = "defaults::rs_id_env_key")]
    pub rs_id_env_key: String,

    /// Request headers
    #[serde(default = "defaults::captcha_headers")]
    pub headers: BTreeMap<String, String>,

    /// Query parameters
    #[serde(default = "defaults::captcha_params")]
    pub params: BTreeMap<String, String>,

    /// Path where the raw challenge image is persisted for audit
    #[serde(default = "defaults::captcha_save_path")]
    pub save_path: String,

    /// Response field carrying the base64 image
    #[serde(default = "defaults::image_field")]
    pub image_field: String,

    /// Response field carrying the challenge key
    #[serde(default = "defaults::key_field")]
    pub key_field: String,

    /// Response field carrying the correlation id
    #[serde(default = "defaults::rs_id_field")]
    pub rs_id_field: String,

    /// External recognizer: image on stdin, recognized text on stdout;
    /// empty means recognition is unavailable without an env override
    #[serde(default)]
    pub solver_command: Vec<String>,
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enabled(),
            url: defaults::captcha_url(),
            timeout_secs: defaults::captcha_timeout(),
            retries: defaults::captcha_retries(),
            retry_sleep_secs: defaults::captcha_retry_sleep(),
            cache_ttl_secs: defaults::captcha_ttl(),
            ttl_env_key: defaults::ttl_env_key(),
            value_env_key: defaults::value_env_key(),
            key_env_key: defaults::key_env_key(),
            rs_id_env_key: defaults::rs_id_env_key(),
            headers: defaults::captcha_headers(),
            params: defaults::captcha_params(),
            save_path: defaults::captcha_save_path(),
            image_field: defaults::image_field(),
            key_field: defaults::key_field(),
            rs_id_field: defaults::rs_id_field(),
            solver_command: Vec::new(),
        }
    }
}

/// Login endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginConfig {
    /// Login endpoint URL
    #[serde(default = "defaults::login_url")]
    pub url: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::login_timeout")]
    pub timeout_secs: u64,

    /// Retry attempts
    #[serde(default = "defaults::login_retries")]
    pub retries: u32,

    /// Exponential backoff base
    #[serde(default = "defaults::export_backoff_base")]
    pub retry_backoff_base: f64,

    /// Password hashing scheme applied before submission
    #[serde(default)]
    pub password_scheme: PasswordScheme,

    /// Request headers
    #[serde(default = "defaults::login_headers")]
    pub headers: BTreeMap<String, String>,

    /// Query parameter template
    #[serde(default)]
    pub params_template: BTreeMap<String, String>,

    /// Request body template; username/password reference env placeholders
    #[serde(default = "defaults::login_payload")]
    pub payload_template: Value,

    /// Body field receiving the recognized captcha text
    #[serde(default = "defaults::captcha_field")]
    pub captcha_field: String,

    /// Body field receiving the challenge key
    #[serde(default = "defaults::key_field")]
    pub captcha_key_field: String,

    /// Query parameter receiving the correlation id
    #[serde(default = "defaults::rs_id_field")]
    pub rs_id_param: String,

    /// Query parameter receiving the recognized captcha text
    #[serde(default = "defaults::random_code_param")]
    pub random_code_param: String,
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            url: defaults::login_url(),
            timeout_secs: defaults::login_timeout(),
            retries: defaults::login_retries(),
            retry_backoff_base: defaults::export_backoff_base(),
            password_scheme: PasswordScheme::default(),
            headers: defaults::login_headers(),
            params_template: BTreeMap::new(),
            payload_template: defaults::login_payload(),
            captcha_field: defaults::captcha_field(),
            captcha_key_field: defaults::key_field(),
            rs_id_param: defaults::rs_id_field(),
            random_code_param: defaults::random_code_param(),
        }
    }
}

/// Password hashing scheme accepted by the portal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordScheme {
    /// MD5 hex digest (the scheme the portal uses)
    #[default]
    Md5,
    /// SHA-256 hex digest
    Sha256,
    /// Submit the password unchanged
    Plain,
}

mod defaults {
    use std::collections::BTreeMap;

    use serde_json::{Value, json};

    // List endpoint
    pub fn list_url() -> String {
        "https://bgwlgl.bbwport.com/api/train-sea-union/real/train/listRealTrainInfo.do".into()
    }
    pub fn list_timeout() -> u64 {
        30
    }
    pub fn list_retries() -> u32 {
        5
    }
    pub fn list_backoff_base() -> f64 {
        1.5
    }
    pub fn sleep_between_pages() -> u64 {
        200
    }
    pub fn list_payload() -> Value {
        json!({
            "pageNumber": 0,
            "pageSize": 200,
            "params": {
                "realTrainCode": "",
                "startStation": "",
                "endStation": "",
                "endProvince": "",
                "lineCode": "",
                "lineName": "",
                "upOrDown": "上行",
                "departureDateStart": "",
                "loadingTimeStart": "",
                "loadingTimeEnd": "",
            },
            "sorts": [],
        })
    }
    pub fn date_start_param() -> String {
        "departureDateStart".into()
    }
    pub fn date_end_param() -> String {
        "departureDateEnd".into()
    }

    // Pagination
    pub fn page_field() -> String {
        "pageNumber".into()
    }
    pub fn page_size_field() -> String {
        "pageSize".into()
    }
    pub fn rows_field() -> String {
        "rows".into()
    }
    pub fn total_field() -> String {
        "total".into()
    }
    pub fn max_pages() -> u64 {
        10_000
    }

    // Export endpoint
    pub fn export_url() -> String {
        "https://bgwlgl.bbwport.com/api/train-sea-union/bookingInfo/exportLoadedBox.do".into()
    }
    pub fn export_timeout() -> u64 {
        60
    }
    pub fn export_retries() -> u32 {
        3
    }
    pub fn export_backoff_base() -> f64 {
        2.0
    }
    pub fn code_field() -> String {
        "realTrainCode".into()
    }
    pub fn flag_field() -> String {
        "flag".into()
    }
    pub fn export_flag() -> String {
        "单表".into()
    }

    // Shared headers for the authenticated endpoints
    pub fn api_headers() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("accept".into(), "application/json, text/plain, */*".into()),
            (
                "content-type".into(),
                "application/json;charset=UTF-8".into(),
            ),
            ("origin".into(), "https://bgwlgl.bbwport.com".into()),
            ("referer".into(), "https://bgwlgl.bbwport.com/".into()),
            ("user-agent".into(), "Mozilla/5.0".into()),
            ("auth_token".into(), "${AUTH_TOKEN}".into()),
            ("cookie".into(), "${COOKIE}".into()),
        ])
    }

    // Run
    pub fn departure_field() -> String {
        "departure_date".into()
    }
    pub fn train_code_field() -> String {
        "real_train_code".into()
    }
    pub fn output_dir() -> String {
        "data".into()
    }
    pub fn output_filename_template() -> String {
        "export_loaded_box_{day}.xlsx".into()
    }
    pub fn sample_rows_path() -> String {
        "data/sample_rows.json".into()
    }

    // Processing
    pub fn enabled() -> bool {
        true
    }
    pub fn consignor_field() -> String {
        "委托客户".into()
    }
    pub fn consignor_env_key() -> String {
        "CONSIGNOR_NAME".into()
    }
    pub fn partition_field() -> String {
        "实际订舱客户".into()
    }
    pub fn exclude_value() -> String {
        "陆海新通道".into()
    }
    pub fn split_output_dir() -> String {
        "data/actual_booker".into()
    }
    pub fn sheet_name() -> String {
        "data".into()
    }
    pub fn output_template() -> String {
        "{partition}.xlsx".into()
    }

    // Captcha
    pub fn captcha_url() -> String {
        "https://bgwlgl.bbwport.com/api/bgwl-cloud-center/random".into()
    }
    pub fn captcha_timeout() -> u64 {
        10
    }
    pub fn captcha_retries() -> u32 {
        3
    }
    pub fn captcha_retry_sleep() -> u64 {
        1
    }
    pub fn captcha_ttl() -> u64 {
        60
    }
    pub fn ttl_env_key() -> String {
        "CAPTCHA_TTL_SECS".into()
    }
    pub fn value_env_key() -> String {
        "CAPTCHA_VALUE".into()
    }
    pub fn key_env_key() -> String {
        "CAPTCHA_KEY".into()
    }
    pub fn rs_id_env_key() -> String {
        "LOGIN_RS_ID".into()
    }
    pub fn captcha_headers() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("accept".into(), "application/json, text/plain, */*".into()),
            ("origin".into(), "https://bgwlgl.bbwport.com".into()),
            ("referer".into(), "https://bgwlgl.bbwport.com/".into()),
            ("user-agent".into(), "Mozilla/5.0".into()),
        ])
    }
    pub fn captcha_params() -> BTreeMap<String, String> {
        BTreeMap::from([("show".into(), "${CAPTCHA_SHOW}".into())])
    }
    pub fn captcha_save_path() -> String {
        "data/captcha/latest.png".into()
    }
    pub fn image_field() -> String {
        "randomCodeImage".into()
    }
    pub fn key_field() -> String {
        "captchaKey".into()
    }
    pub fn rs_id_field() -> String {
        "_rs_id".into()
    }

    // Login
    pub fn login_url() -> String {
        "https://bgwlgl.bbwport.com/api/bgwl-cloud-center/login.do".into()
    }
    pub fn login_timeout() -> u64 {
        15
    }
    pub fn login_retries() -> u32 {
        3
    }
    pub fn login_headers() -> BTreeMap<String, String> {
        BTreeMap::from([
            ("accept".into(), "application/json, text/plain, */*".into()),
            (
                "content-type".into(),
                "application/json;charset=UTF-8".into(),
            ),
            ("user-agent".into(), "Mozilla/5.0".into()),
        ])
    }
    pub fn login_payload() -> Value {
        json!({
            "username": "${LOGIN_USERNAME}",
            "password": "${LOGIN_PASSWORD}",
        })
    }
    pub fn captcha_field() -> String {
        "captcha".into()
    }
    pub fn random_code_param() -> String {
        "_randomCode_".into()
    }

    // Auth
    pub fn token_json_path() -> Vec<String> {
        vec!["data".into(), "token".into()]
    }
    pub fn token_env() -> String {
        "AUTH_TOKEN".into()
    }
    pub fn cookie_env() -> String {
        "COOKIE".into()
    }
    pub fn preferred_cookies() -> Vec<String> {
        vec!["SESSION".into(), "HWWAFSESID".into(), "HWWAFSESTIME".into()]
    }
}
