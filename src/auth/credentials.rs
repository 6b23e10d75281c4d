//! Shared credential state.
//!
//! The portal authenticates every call with two headers: a bearer token in
//! `auth_token` and the session in `cookie`. Both live here as one mutable
//! set shared by the fetch, export and login services, so a mid-run re-login
//! updates every later request without touching the process environment.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::utils::cookie::parse_cookie_header;
use crate::utils::env::{placeholder_key, resolve_str};

/// Header slot carrying the bearer token.
pub const TOKEN_HEADER: &str = "auth_token";
/// Header slot carrying the session cookie.
pub const COOKIE_HEADER: &str = "cookie";

/// Credential state shared across services.
pub type SharedCredentials = Arc<Mutex<CredentialSet>>;

/// Bearer token and serialized cookie header, plus the `${NAME}` keys that
/// mark their slots in header templates.
#[derive(Debug, Clone)]
pub struct CredentialSet {
    token_key: String,
    cookie_key: String,
    token: Option<String>,
    cookie_header: String,
    version: u64,
}

impl CredentialSet {
    /// An empty set binding the given placeholder keys.
    pub fn new(token_key: impl Into<String>, cookie_key: impl Into<String>) -> Self {
        Self::from_parts(token_key, cookie_key, None, String::new())
    }

    /// A set seeded with explicit values.
    pub fn from_parts(
        token_key: impl Into<String>,
        cookie_key: impl Into<String>,
        token: Option<String>,
        cookie_header: String,
    ) -> Self {
        Self {
            token_key: token_key.into(),
            cookie_key: cookie_key.into(),
            token: token.filter(|t| !t.trim().is_empty()),
            cookie_header: cookie_header.trim().to_string(),
            version: 0,
        }
    }

    /// Seed from the process environment.
    ///
    /// The cookie may itself embed a pair named after the token variable;
    /// when the variable is unset that embedded value becomes the token, so
    /// an operator can paste one browser cookie header and nothing else.
    pub fn from_env(token_env: &str, cookie_env: &str) -> Self {
        let cookie_header = std::env::var(cookie_env).unwrap_or_default();
        let mut token = std::env::var(token_env)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if token.is_none() {
            token = parse_cookie_header(&cookie_header)
                .get(token_env)
                .filter(|v| !v.is_empty())
                .cloned();
        }
        Self::from_parts(token_env, cookie_env, token, cookie_header)
    }

    pub fn into_shared(self) -> SharedCredentials {
        Arc::new(Mutex::new(self))
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn cookie_header(&self) -> &str {
        &self.cookie_header
    }

    /// Bumped on every refresh; lets callers observe that a re-login ran.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// True when neither a token nor a cookie is held.
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.cookie_header.is_empty()
    }

    /// Install a fresh token and cookie after a successful login.
    ///
    /// An empty cookie keeps the previous one; a login response without
    /// Set-Cookie must not wipe a session that still works.
    pub fn refresh(&mut self, token: String, cookie_header: String) {
        self.token = Some(token);
        if !cookie_header.is_empty() {
            self.cookie_header = cookie_header;
        }
        self.version += 1;
    }

    /// Fill a header template: credential slots get the live token/cookie,
    /// everything else is resolved against the environment. A slot whose
    /// credential is absent keeps its placeholder for the validation below.
    pub fn fill_headers(&self, template: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        template
            .iter()
            .map(|(name, value)| {
                let filled = match placeholder_key(value) {
                    Some(key) if key == self.token_key => {
                        self.token.clone().unwrap_or_else(|| value.clone())
                    }
                    Some(key) if key == self.cookie_key && !self.cookie_header.is_empty() => {
                        self.cookie_header.clone()
                    }
                    _ => resolve_str(value),
                };
                (name.clone(), filled)
            })
            .collect()
    }

    /// Fail before the first network call when filled headers still carry
    /// unresolved placeholders or empty credential slots.
    pub fn ensure_authenticated(&self, headers: &BTreeMap<String, String>) -> Result<()> {
        let mut missing: Vec<String> = Vec::new();
        for (name, value) in headers {
            if let Some(key) = placeholder_key(value) {
                missing.push(key.to_string());
            } else if value.trim().is_empty() {
                if name == TOKEN_HEADER {
                    missing.push(self.token_key.clone());
                } else if name == COOKIE_HEADER {
                    missing.push(self.cookie_key.clone());
                }
            }
        }
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        missing.dedup();
        Err(AppError::config(format!(
            "credentials missing: set {} or enable automatic login",
            missing.join(", ")
        )))
    }
}
