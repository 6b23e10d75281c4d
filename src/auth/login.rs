//! Portal login handshake.
//!
//! The flow mirrors what the portal's web client does: fetch and recognize
//! a captcha, then POST the credentials with the recognized text woven into
//! both the JSON body and the query string, and finally collect the token
//! from the response body plus every cookie observed along the way.
//!
//! Credentials enter exclusively through `${NAME}` placeholders in the
//! payload template; a placeholder that survives resolution aborts the
//! handshake before any request is sent.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use md5::{Digest as _, Md5};
use serde_json::Value;
use sha2::Sha256;

use crate::auth::captcha::{CaptchaProvider, CaptchaSolver};
use crate::auth::credentials::SharedCredentials;
use crate::error::{AppError, Result};
use crate::models::{LoginApiConfig, PasswordScheme};
use crate::services::transport::{RetryPolicy, Transport, TransportRequest, send_with_retry};
use crate::utils::cookie::build_cookie_header;
use crate::utils::env::{is_placeholder, placeholder_key, resolve_map, resolve_value};

/// Runs the captcha + login exchange and refreshes shared credentials.
pub struct LoginFlow {
    config: LoginApiConfig,
    transport: Arc<dyn Transport>,
    captcha: CaptchaProvider,
}

impl LoginFlow {
    pub fn new(
        config: LoginApiConfig,
        transport: Arc<dyn Transport>,
        solver: Arc<dyn CaptchaSolver>,
    ) -> Self {
        let captcha = CaptchaProvider::new(config.captcha.clone(), Arc::clone(&transport), solver);
        Self {
            config,
            transport,
            captcha,
        }
    }

    /// Whether automatic login is available for re-auth detours.
    pub fn enabled(&self) -> bool {
        self.config.enabled
    }

    /// Perform the handshake and install the fresh token and cookie.
    pub async fn login(&mut self, credentials: &SharedCredentials) -> Result<()> {
        if !self.config.enabled {
            return Err(AppError::config(
                "login_api.enabled is false; cannot refresh credentials",
            ));
        }
        let login_cfg = &self.config.login;

        let mut payload = resolve_value(&login_cfg.payload_template);
        let unresolved = unresolved_placeholders(&payload);
        if !unresolved.is_empty() {
            return Err(AppError::config(format!(
                "login credentials missing: set {}",
                unresolved.join(", ")
            )));
        }

        let headers = resolve_map(&login_cfg.headers);
        let mut params: BTreeMap<String, String> = resolve_map(&login_cfg.params_template)
            .into_iter()
            .filter(|(_, value)| !is_placeholder(value))
            .collect();
        let mut jar: BTreeMap<String, String> = BTreeMap::new();

        if let Some(challenge) = self.captcha.acquire(false).await? {
            if let Some(body) = payload.as_object_mut() {
                body.insert(
                    login_cfg.captcha_field.clone(),
                    Value::String(challenge.text.clone()),
                );
                if let Some(key) = &challenge.key {
                    if !login_cfg.captcha_key_field.is_empty() {
                        body.insert(
                            login_cfg.captcha_key_field.clone(),
                            Value::String(key.clone()),
                        );
                    }
                }
            }
            if let Some(rs_id) = &challenge.rs_id {
                params.insert(login_cfg.rs_id_param.clone(), rs_id.clone());
            }
            params.insert(login_cfg.random_code_param.clone(), challenge.text.clone());
            jar.extend(challenge.cookies.iter().cloned());
        }

        hash_password(&mut payload, login_cfg.password_scheme);

        let request = TransportRequest::post_json(
            &login_cfg.url,
            headers,
            payload,
            Duration::from_secs(login_cfg.timeout_secs),
        )
        .with_query(params);
        let policy = RetryPolicy::new(login_cfg.retries, login_cfg.retry_backoff_base);

        let result = send_with_retry(self.transport.as_ref(), &request, &policy).await;
        // The portal consumes the challenge on any login attempt.
        self.captcha.invalidate();
        let response = result?;

        let body = response.json()?;
        let token = match json_path(&body, &self.config.token_json_path) {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => return Err(AppError::auth("login response did not contain a token")),
        };

        jar.extend(response.set_cookies.iter().cloned());
        let cookie_header = build_cookie_header(&jar, &self.config.preferred_cookies);

        let mut creds = credentials.lock().await;
        creds.refresh(token, cookie_header);
        log::info!(
            "Login succeeded; credentials refreshed (version {})",
            creds.version()
        );
        Ok(())
    }
}

/// Walk a key path into a JSON body; `None` when any step is missing.
fn json_path<'a>(body: &'a Value, path: &[String]) -> Option<&'a Value> {
    let mut current = body;
    for key in path {
        current = current.get(key)?;
    }
    Some(current)
}

/// Collect env keys of `${NAME}` strings that survived resolution.
fn unresolved_placeholders(value: &Value) -> Vec<String> {
    fn walk(value: &Value, keys: &mut Vec<String>) {
        match value {
            Value::String(s) => {
                if let Some(key) = placeholder_key(s) {
                    keys.push(key.to_string());
                }
            }
            Value::Array(items) => items.iter().for_each(|item| walk(item, keys)),
            Value::Object(map) => map.values().for_each(|item| walk(item, keys)),
            _ => {}
        }
    }
    let mut keys = Vec::new();
    walk(value, &mut keys);
    keys.sort();
    keys.dedup();
    keys
}

/// Apply the configured hash to the payload's `password` field in place.
fn hash_password(payload: &mut Value, scheme: PasswordScheme) {
    let Some(body) = payload.as_object_mut() else {
        return;
    };
    let Some(Value::String(password)) = body.get("password") else {
        return;
    };
    let hashed = match scheme {
        PasswordScheme::Md5 => md5_hex(password),
        PasswordScheme::Sha256 => sha256_hex(password),
        PasswordScheme::Plain => return,
    };
    body.insert("password".to_string(), Value::String(hashed));
}

fn md5_hex(value: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

fn sha256_hex(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::captcha::testing::StaticSolver;
    use crate::auth::credentials::CredentialSet;
    use crate::models::CaptchaConfig;
    use crate::services::transport::testing::ScriptedTransport;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde_json::json;
    use tempfile::TempDir;

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

    fn test_config(dir: &TempDir, user_env: &str, pass_env: &str) -> LoginApiConfig {
        let mut config = LoginApiConfig {
            captcha: CaptchaConfig {
                url: "https://portal.test/random".to_string(),
                retry_sleep_secs: 0,
                save_path: dir
                    .path()
                    .join("latest.png")
                    .to_string_lossy()
                    .into_owned(),
                value_env_key: "RAILBOX_LOGIN_NEVER_VALUE".to_string(),
                key_env_key: "RAILBOX_LOGIN_NEVER_KEY".to_string(),
                rs_id_env_key: "RAILBOX_LOGIN_NEVER_RS".to_string(),
                ttl_env_key: "RAILBOX_LOGIN_NEVER_TTL".to_string(),
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

    fn flow(config: LoginApiConfig, transport: Arc<ScriptedTransport>) -> LoginFlow {
        LoginFlow::new(config, transport, Arc::new(StaticSolver("ab12")))
    }

    #[tokio::test]
    async fn handshake_refreshes_credentials() {
        unsafe {
            std::env::set_var("RAILBOX_LOGIN_USER_A", "user1");
            std::env::set_var("RAILBOX_LOGIN_PASS_A", "secret");
        }
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json_with_cookies(200, challenge_body(), &[("HWWAFSESID", "w1")]);
        transport.push_json_with_cookies(
            200,
            json!({"code": 200, "data": {"token": "tok-9"}}),
            &[("SESSION", "s9"), ("custom", "c1")],
        );

        let credentials = CredentialSet::new("AUTH_TOKEN", "COOKIE").into_shared();
        let mut flow = flow(
            test_config(&dir, "RAILBOX_LOGIN_USER_A", "RAILBOX_LOGIN_PASS_A"),
            Arc::clone(&transport),
        );
        flow.login(&credentials).await.unwrap();

        let creds = credentials.lock().await;
        assert_eq!(creds.token(), Some("tok-9"));
        assert_eq!(creds.cookie_header(), "SESSION=s9; HWWAFSESID=w1; custom=c1");
        assert_eq!(creds.version(), 1);

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        let login_request = &requests[1];
        let body = login_request.json_body.as_ref().unwrap();
        assert_eq!(body["username"], "user1");
        // md5("secret")
        assert_eq!(body["password"], "5ebe2294ecd0e0f08eab7690d2a6ee69");
        assert_eq!(body["captcha"], "ab12");
        assert_eq!(body["captchaKey"], "key-1");
        assert_eq!(login_request.query["_rs_id"], "rs-1");
        assert_eq!(login_request.query["_randomCode_"], "ab12");
    }

    #[tokio::test]
    async fn missing_token_is_auth_error() {
        unsafe {
            std::env::set_var("RAILBOX_LOGIN_USER_B", "user1");
            std::env::set_var("RAILBOX_LOGIN_PASS_B", "secret");
        }
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, challenge_body());
        transport.push_json(200, json!({"code": 200, "data": {}}));

        let credentials = CredentialSet::new("AUTH_TOKEN", "COOKIE").into_shared();
        let mut flow = flow(
            test_config(&dir, "RAILBOX_LOGIN_USER_B", "RAILBOX_LOGIN_PASS_B"),
            Arc::clone(&transport),
        );
        let error = flow.login(&credentials).await.unwrap_err();
        assert!(matches!(error, AppError::Auth(_)));
        assert_eq!(credentials.lock().await.version(), 0);
    }

    #[tokio::test]
    async fn unresolved_credentials_fail_before_any_request() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new());
        let credentials = CredentialSet::new("AUTH_TOKEN", "COOKIE").into_shared();
        let mut flow = flow(
            test_config(&dir, "RAILBOX_LOGIN_UNSET_U", "RAILBOX_LOGIN_UNSET_P"),
            Arc::clone(&transport),
        );
        let error = flow.login(&credentials).await.unwrap_err();
        let message = error.to_string();
        assert!(message.contains("RAILBOX_LOGIN_UNSET_U"));
        assert!(message.contains("RAILBOX_LOGIN_UNSET_P"));
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn disabled_captcha_posts_plain_login() {
        unsafe {
            std::env::set_var("RAILBOX_LOGIN_USER_C", "user1");
            std::env::set_var("RAILBOX_LOGIN_PASS_C", "secret");
        }
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir, "RAILBOX_LOGIN_USER_C", "RAILBOX_LOGIN_PASS_C");
        config.captcha.enabled = false;

        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"data": {"token": "tok-1"}}));

        let credentials = CredentialSet::new("AUTH_TOKEN", "COOKIE").into_shared();
        let mut flow = flow(config, Arc::clone(&transport));
        flow.login(&credentials).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let body = requests[0].json_body.as_ref().unwrap();
        assert!(body.get("captcha").is_none());
        assert!(requests[0].query.get("_randomCode_").is_none());
    }

    #[tokio::test]
    async fn plain_scheme_sends_password_unchanged() {
        unsafe {
            std::env::set_var("RAILBOX_LOGIN_USER_D", "user1");
            std::env::set_var("RAILBOX_LOGIN_PASS_D", "secret");
        }
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir, "RAILBOX_LOGIN_USER_D", "RAILBOX_LOGIN_PASS_D");
        config.captcha.enabled = false;
        config.login.password_scheme = PasswordScheme::Plain;

        let transport = Arc::new(ScriptedTransport::new());
        transport.push_json(200, json!({"data": {"token": "tok-1"}}));

        let credentials = CredentialSet::new("AUTH_TOKEN", "COOKIE").into_shared();
        let mut flow = flow(config, Arc::clone(&transport));
        flow.login(&credentials).await.unwrap();

        let body = transport.requests()[0].json_body.clone().unwrap();
        assert_eq!(body["password"], "secret");
    }

    #[test]
    fn hash_helpers_match_known_vectors() {
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(
            sha256_hex("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn json_path_walks_nested_keys() {
        let body = json!({"data": {"token": "t1"}});
        let path = vec!["data".to_string(), "token".to_string()];
        assert_eq!(json_path(&body, &path), Some(&json!("t1")));
        let missing = vec!["data".to_string(), "absent".to_string()];
        assert_eq!(json_path(&body, &missing), None);
    }
}
