//! Paginated listing fetch.
//!
//! Pulls every row the listing endpoint will serve: the first page reveals
//! the declared total, the remaining pages follow in ascending order, one
//! request in flight at a time. A 401 anywhere in the run triggers at most
//! one login detour, after which the same page is retried with the
//! refreshed credentials; a second 401 ends the run.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::auth::credentials::SharedCredentials;
use crate::auth::login::LoginFlow;
use crate::error::{AppError, Result};
use crate::models::{ListApiConfig, ListingPage, TrainRecord};
use crate::services::transport::{RetryPolicy, Transport, TransportRequest, send_with_retry};
use crate::utils::env::resolve_value;

/// One-shot gate for the mid-run login detour.
///
/// Armed -> Refreshing on the first 401, Refreshing -> Spent when the
/// detour completes. Spent never re-arms, so one run performs at most one
/// re-login no matter how many pages remain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReauthGate {
    Armed,
    Refreshing,
    Spent,
}

impl ReauthGate {
    /// Claim the detour. True exactly once.
    fn try_arm_detour(&mut self) -> bool {
        match self {
            ReauthGate::Armed => {
                *self = ReauthGate::Refreshing;
                true
            }
            _ => false,
        }
    }

    fn finish_detour(&mut self) {
        *self = ReauthGate::Spent;
    }
}

/// Fetches all listing rows across pages.
pub struct ListingFetcher {
    config: ListApiConfig,
    transport: Arc<dyn Transport>,
    credentials: SharedCredentials,
}

impl ListingFetcher {
    pub fn new(
        config: ListApiConfig,
        transport: Arc<dyn Transport>,
        credentials: SharedCredentials,
    ) -> Self {
        Self {
            config,
            transport,
            credentials,
        }
    }

    /// Fetch every page, returning rows in page order without dedup.
    ///
    /// `date_range` optionally narrows the portal-side query; local
    /// filtering still applies afterwards because the endpoint is known to
    /// mix in rows outside the requested window. `login` enables the 401
    /// detour; without it a 401 is immediately fatal.
    pub async fn fetch_all(
        &self,
        date_range: Option<(&str, &str)>,
        mut login: Option<&mut LoginFlow>,
    ) -> Result<Vec<TrainRecord>> {
        let mut base_payload = resolve_value(&self.config.payload_template);
        if let Some((start, end)) = date_range {
            self.inject_date_range(&mut base_payload, start, end);
        }

        let pagination = &self.config.pagination;
        let page_size = base_payload
            .get(&pagination.page_size_field)
            .and_then(Value::as_u64)
            .unwrap_or(200)
            .max(1);

        let mut gate = ReauthGate::Armed;
        let first = self
            .fetch_page(&base_payload, pagination.start_page, &mut gate, &mut login)
            .await?;
        let total = first.total;
        let mut rows = first.rows;
        log::info!(
            "Listing total={}, page_size={}, first_page_rows={}",
            total,
            page_size,
            rows.len()
        );

        if (rows.len() as u64) < total {
            let total_pages = total.div_ceil(page_size);
            let pages = total_pages.min(pagination.max_pages);
            if total_pages > pages {
                log::warn!(
                    "Declared total implies {} pages; stopping at max_pages={}",
                    total_pages,
                    pages
                );
            }
            for index in 1..pages {
                if self.config.sleep_between_pages_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(self.config.sleep_between_pages_ms))
                        .await;
                }
                let page = self
                    .fetch_page(
                        &base_payload,
                        pagination.start_page + index,
                        &mut gate,
                        &mut login,
                    )
                    .await?;
                log::info!(
                    "Listing page {}/{} -> fetched={}, accumulated={}",
                    index + 1,
                    pages,
                    page.rows.len(),
                    rows.len() + page.rows.len()
                );
                rows.extend(page.rows);
            }
        }

        if rows.len() as u64 != total {
            log::warn!(
                "Accumulated {} rows but the portal declared {}",
                rows.len(),
                total
            );
        }
        Ok(rows)
    }

    /// Fetch one page, taking the login detour on the first 401.
    async fn fetch_page(
        &self,
        base_payload: &Value,
        page: u64,
        gate: &mut ReauthGate,
        login: &mut Option<&mut LoginFlow>,
    ) -> Result<ListingPage> {
        let pagination = &self.config.pagination;
        let mut payload = base_payload.clone();
        if let Some(body) = payload.as_object_mut() {
            body.insert(pagination.page_field.clone(), Value::from(page));
        }
        let policy = RetryPolicy::new(self.config.retries, self.config.retry_backoff_base);

        loop {
            let headers = self.request_headers().await?;
            let request = TransportRequest::post_json(
                &self.config.url,
                headers,
                payload.clone(),
                Duration::from_secs(self.config.timeout_secs),
            );
            match send_with_retry(self.transport.as_ref(), &request, &policy).await {
                Ok(response) => {
                    let body = response.json()?;
                    return Ok(ListingPage::parse(
                        &body,
                        &pagination.total_field,
                        &pagination.rows_field,
                    ));
                }
                Err(error) if error.http_status() == Some(401) => {
                    if !gate.try_arm_detour() {
                        return Err(AppError::auth(
                            "listing request rejected (401) after credential refresh",
                        ));
                    }
                    let Some(flow) = login.as_deref_mut().filter(|f| f.enabled()) else {
                        return Err(AppError::auth(
                            "listing request rejected (401); refresh credentials or enable automatic login",
                        ));
                    };
                    log::warn!("Listing request returned 401; attempting re-login");
                    let refreshed = flow.login(&self.credentials).await;
                    gate.finish_detour();
                    refreshed?;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Headers for the next request, rebuilt from live credentials so a
    /// mid-run refresh takes effect on the following page.
    async fn request_headers(&self) -> Result<BTreeMap<String, String>> {
        let creds = self.credentials.lock().await;
        let headers = creds.fill_headers(&self.config.headers);
        creds.ensure_authenticated(&headers)?;
        Ok(headers)
    }

    /// Write the range bounds into the payload's query params.
    fn inject_date_range(&self, payload: &mut Value, start: &str, end: &str) {
        let params_is_object = payload
            .get("params")
            .map(Value::is_object)
            .unwrap_or(false);
        let target = if params_is_object {
            payload.get_mut("params").and_then(Value::as_object_mut)
        } else {
            payload.as_object_mut()
        };
        if let Some(body) = target {
            if !self.config.date_start_param.is_empty() {
                body.insert(
                    self.config.date_start_param.clone(),
                    Value::String(start.to_string()),
                );
            }
            if !self.config.date_end_param.is_empty() {
                body.insert(
                    self.config.date_end_param.clone(),
                    Value::String(end.to_string()),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::captcha::testing::StaticSolver;
    use crate::auth::credentials::CredentialSet;
    use crate::models::{CaptchaConfig, LoginApiConfig};
    use crate::services::transport::testing::ScriptedTransport;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::json;
    use tempfile::TempDir;

    fn test_config() -> ListApiConfig {
        ListApiConfig {
            url: "https://portal.test/list.do".to_string(),
            retries: 1,
            sleep_between_pages_ms: 0,
            headers: BTreeMap::from([
                ("auth_token".to_string(), "${AUTH_TOKEN}".to_string()),
                ("cookie".to_string(), "${COOKIE}".to_string()),
            ]),
            payload_template: json!({"pageNumber": 0, "pageSize": 200, "params": {}}),
            ..ListApiConfig::default()
        }
    }

    fn live_credentials() -> SharedCredentials {
        CredentialSet::from_parts(
            "AUTH_TOKEN",
            "COOKIE",
            Some("tok-stale".to_string()),
            "SESSION=s1".to_string(),
        )
        .into_shared()
    }

    fn page_body(total: u64, codes: &[&str]) -> Value {
        json!({
            "total": total,
            "rows": codes
                .iter()
                .map(|code| json!({"real_train_code": code}))
                .collect::<Vec<_>>(),
        })
    }

    fn login_config(dir: &TempDir, user_env: &str, pass_env: &str) -> LoginApiConfig {
        let mut config = LoginApiConfig {
            captcha: CaptchaConfig {
                url: "https://portal.test/random".to_string(),
                retry_sleep_secs: 0,
                save_path: dir
                    .path()
                    .join("latest.png")
                    .to_string_lossy()
                    .into_owned(),
                value_env_key: "RAILBOX_LIST_NEVER_VALUE".to_string(),
                key_env_key: "RAILBOX_LIST_NEVER_KEY".to_string(),
                rs_id_env_key: "RAILBOX_LIST_NEVER_RS".to_string(),
                ttl_env_key: "RAILBOX_LIST_NEVER_TTL".to_string(),
                params: BTreeMap::new(),
                ..CaptchaConfig::default()
            },
            ..LoginApiConfig::default()
        };
        config.login.url = "https://portal.test/login.do".to_string();
        config.login.payload_template = json!({
            "username": format!("${{{user_env}}}"),
            "password": format!("${{{pass_env}}}"),
        });
        config
    }

    fn challenge_body() -> Value {
        let mut img = image::GrayImage::new(4, 4);
        for (x, _, pixel) in img.enumerate_pixels_mut() {
            *pixel = image::Luma([if x < 2 { 10 } else { 240 }]);
        }
        let mut out = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        json!({
            "randomCodeImage": STANDARD.encode(out),
            "captchaKey": "key-1",
            "_rs_id": "rs-1",
        })
    }

    #[tokio::test]
    async fn fetches_all_pages_for_declared_total() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, page_body(450, &["A1", "A2"]));
        transport.push_json(200, page_body(450, &["B1"]));
        transport.push_json(200, page_body(450, &["C1"]));

        let fetcher = ListingFetcher::new(
            test_config(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            live_credentials(),
        );
        let rows = fetcher.fetch_all(None, None).await.unwrap();

        assert_eq!(transport.request_count(), 3);
        let codes: Vec<_> = rows
            .iter()
            .filter_map(|r| r.field_str("real_train_code"))
            .collect();
        assert_eq!(codes, vec!["A1", "A2", "B1", "C1"]);
        for (index, request) in transport.requests().iter().enumerate() {
            assert_eq!(
                request.json_body.as_ref().unwrap()["pageNumber"],
                index as u64
            );
        }
    }

    #[tokio::test]
    async fn single_request_when_first_page_covers_total() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, page_body(2, &["A1", "A2"]));

        let fetcher = ListingFetcher::new(
            test_config(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            live_credentials(),
        );
        let rows = fetcher.fetch_all(None, None).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn max_pages_caps_the_run() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, page_body(1000, &["A1"]));
        transport.push_json(200, page_body(1000, &["A2"]));

        let mut config = test_config();
        config.payload_template = json!({"pageNumber": 0, "pageSize": 1, "params": {}});
        config.pagination.max_pages = 2;

        let fetcher = ListingFetcher::new(
            config,
            Arc::clone(&transport) as Arc<dyn Transport>,
            live_credentials(),
        );
        let rows = fetcher.fetch_all(None, None).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn first_401_takes_login_detour_and_retries_page() {
        unsafe {
            std::env::set_var("RAILBOX_LIST_USER_A", "user1");
            std::env::set_var("RAILBOX_LIST_PASS_A", "secret");
        }
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(401, json!({}));
        transport.push_json(200, challenge_body());
        transport.push_json(200, json!({"data": {"token": "tok-fresh"}}));
        transport.push_json(200, page_body(1, &["A1"]));

        let credentials = live_credentials();
        let mut flow = LoginFlow::new(
            login_config(&dir, "RAILBOX_LIST_USER_A", "RAILBOX_LIST_PASS_A"),
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::new(StaticSolver("ab12")),
        );
        let fetcher = ListingFetcher::new(
            test_config(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::clone(&credentials),
        );
        let rows = fetcher.fetch_all(None, Some(&mut flow)).await.unwrap();
        assert_eq!(rows.len(), 1);

        let requests = transport.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[0].headers["auth_token"], "tok-stale");
        assert!(requests[1].url.ends_with("/random"));
        assert!(requests[2].url.ends_with("/login.do"));
        assert_eq!(requests[3].headers["auth_token"], "tok-fresh");
        assert_eq!(credentials.lock().await.version(), 1);
    }

    #[tokio::test]
    async fn second_401_after_detour_is_fatal() {
        unsafe {
            std::env::set_var("RAILBOX_LIST_USER_B", "user1");
            std::env::set_var("RAILBOX_LIST_PASS_B", "secret");
        }
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(401, json!({}));
        transport.push_json(200, challenge_body());
        transport.push_json(200, json!({"data": {"token": "tok-fresh"}}));
        transport.push_json(401, json!({}));

        let mut flow = LoginFlow::new(
            login_config(&dir, "RAILBOX_LIST_USER_B", "RAILBOX_LIST_PASS_B"),
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::new(StaticSolver("ab12")),
        );
        let fetcher = ListingFetcher::new(
            test_config(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            live_credentials(),
        );
        let error = fetcher
            .fetch_all(None, Some(&mut flow))
            .await
            .unwrap_err();
        assert!(matches!(error, AppError::Auth(_)));
        assert!(error.to_string().contains("after credential refresh"));
        assert_eq!(transport.request_count(), 4);
    }

    #[tokio::test]
    async fn missing_credentials_fail_before_any_request() {
        let transport = Arc::new(ScriptedTransport::new());
        let credentials = CredentialSet::new("AUTH_TOKEN", "COOKIE").into_shared();
        let fetcher = ListingFetcher::new(
            test_config(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            credentials,
        );

        let error = fetcher.fetch_all(None, None).await.unwrap_err();
        assert!(matches!(error, AppError::Config(_)));
        assert!(error.to_string().contains("AUTH_TOKEN"));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn unauthorized_without_login_is_fatal() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(401, json!({}));

        let fetcher = ListingFetcher::new(
            test_config(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            live_credentials(),
        );
        let error = fetcher.fetch_all(None, None).await.unwrap_err();
        assert!(matches!(error, AppError::Auth(_)));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn date_range_lands_in_payload_params() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, page_body(0, &[]));

        let fetcher = ListingFetcher::new(
            test_config(),
            Arc::clone(&transport) as Arc<dyn Transport>,
            live_credentials(),
        );
        fetcher
            .fetch_all(
                Some(("2024-06-01 00:00:00", "2024-06-02 23:59:59")),
                None,
            )
            .await
            .unwrap();

        let body = transport.requests()[0].json_body.clone().unwrap();
        assert_eq!(body["params"]["departureDateStart"], "2024-06-01 00:00:00");
        assert_eq!(body["params"]["departureDateEnd"], "2024-06-02 23:59:59");
    }

    #[test]
    fn reauth_gate_fires_exactly_once() {
        let mut gate = ReauthGate::Armed;
        assert!(gate.try_arm_detour());
        assert_eq!(gate, ReauthGate::Refreshing);
        assert!(!gate.try_arm_detour());
        gate.finish_detour();
        assert_eq!(gate, ReauthGate::Spent);
        assert!(!gate.try_arm_detour());
    }
}
