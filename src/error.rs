// src/error.rs

//! Unified error handling for the railbox application.

use thiserror::Error;

/// Result type alias for railbox operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
///
/// Variants fall into four classes that drive the retry decision:
/// configuration errors (fatal, surfaced immediately), transport errors
/// (retried with backoff), authentication errors (fatal after the single
/// re-auth detour), and data errors (fatal, structural).
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport failed (timeout, connect, body read)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP request completed with a non-success status
    #[error("HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// Base64 payload decoding failed
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Captcha image decoding failed
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Spreadsheet read failed
    #[error("Spreadsheet read error: {0}")]
    SheetRead(#[from] calamine::XlsxError),

    /// Spreadsheet write failed
    #[error("Spreadsheet write error: {0}")]
    SheetWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Configuration error (missing URL/field/env var)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication error (captcha unrecognized, login rejected)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Data error (empty code list, missing spreadsheet column)
    #[error("Data error: {0}")]
    Data(String),
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// Create a data error.
    pub fn data(message: impl Into<String>) -> Self {
        Self::Data(message.into())
    }

    /// Create a status error for a non-success response.
    pub fn status(status: u16, url: impl Into<String>) -> Self {
        Self::Status {
            status,
            url: url.into(),
        }
    }

    /// HTTP status code carried by this error, if any.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether retrying the failed request can plausibly succeed.
    ///
    /// Transport failures (timeouts, connection resets) and server-side 5xx
    /// responses are transient. Configuration, auth, data and client-side 4xx
    /// errors cannot be fixed by retrying. The 401 re-auth detour is handled
    /// by the fetch loop, not here.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
