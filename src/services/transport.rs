//! HTTP transport abstraction.
//!
//! Portal calls go through the [`Transport`] trait so the fetch, export and
//! login services can be exercised against a scripted double. The real
//! implementation wraps a shared `reqwest` client; retry handling lives in
//! [`send_with_retry`] so every endpoint shares the same backoff behavior.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::utils::cookie::parse_set_cookie;

/// HTTP method of a portal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One outbound request, fully assembled by the caller.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub json_body: Option<Value>,
    pub timeout: Duration,
}

impl TransportRequest {
    /// A GET request without a body.
    pub fn get(url: impl Into<String>, headers: BTreeMap<String, String>, timeout: Duration) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers,
            query: BTreeMap::new(),
            json_body: None,
            timeout,
        }
    }

    /// A POST request carrying a JSON body.
    pub fn post_json(
        url: impl Into<String>,
        headers: BTreeMap<String, String>,
        body: Value,
        timeout: Duration,
    ) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers,
            query: BTreeMap::new(),
            json_body: Some(body),
            timeout,
        }
    }

    /// Attach query parameters.
    pub fn with_query(mut self, query: BTreeMap<String, String>) -> Self {
        self.query = query;
        self
    }
}

/// One received response.
///
/// Any HTTP status is a valid response here; turning a non-success status
/// into an error is the retry layer's job, so callers that care about a
/// specific status (401, 409) can see it before it becomes opaque.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Vec<u8>,
    /// Name/value pairs from `Set-Cookie` headers, attributes stripped
    pub set_cookies: Vec<(String, String)>,
}

impl TransportResponse {
    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Parse the body as JSON.
    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Executes requests against the portal.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute a request, returning the response for any HTTP status.
    ///
    /// Errors only on transport-level failures (connect, timeout, TLS).
    async fn execute(&self, request: &TransportRequest) -> Result<TransportResponse>;
}

/// Production transport backed by a shared `reqwest` client.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport. Timeouts are per-request, so the client itself
    /// carries none.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: &TransportRequest) -> Result<TransportResponse> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        builder = builder.timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.json_body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all(reqwest::header::SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(TransportResponse {
            status,
            body,
            set_cookies,
        })
    }
}

/// Retry attempts and backoff shape for one endpoint.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub retries: u32,
    /// Sleep before attempt n+1 is `backoff_base ^ n` seconds
    pub backoff_base: f64,
}

impl RetryPolicy {
    pub fn new(retries: u32, backoff_base: f64) -> Self {
        Self {
            retries,
            backoff_base,
        }
    }

    fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_secs_f64(self.backoff_base.powi(attempt as i32).max(0.0))
    }
}

/// Send a request, retrying transient failures with exponential backoff.
///
/// Transient means a transport-level error or a 5xx status. Client errors
/// (4xx) surface immediately so callers can react to 401 and 409 without
/// burning retries on them.
pub async fn send_with_retry(
    transport: &dyn Transport,
    request: &TransportRequest,
    policy: &RetryPolicy,
) -> Result<TransportResponse> {
    let attempts = policy.retries.max(1);
    for attempt in 1..=attempts {
        let error = match transport.execute(request).await {
            Ok(response) if response.is_success() => return Ok(response),
            Ok(response) => AppError::status(response.status, &request.url),
            Err(error) => error,
        };
        if !error.is_transient() || attempt == attempts {
            return Err(error);
        }
        let delay = policy.delay_after(attempt);
        log::warn!(
            "Request to {} failed (attempt {}/{}): {}. Retrying in {:.1}s",
            request.url,
            attempt,
            attempts,
            error,
            delay.as_secs_f64()
        );
        tokio::time::sleep(delay).await;
    }
    Err(AppError::data("no request attempts configured"))
}
