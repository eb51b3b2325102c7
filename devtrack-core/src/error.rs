//! Typed errors for everything that crosses the client boundary.
//!
//! Every failure produced by the transport, the refresh protocol or the
//! auth service is normalized into an [`ApiError`] carrying one
//! [`ErrorKind`] from a closed taxonomy. Raw `reqwest` errors never escape.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Result type returned by every public operation of the client.
pub type ApiResult<T> = Result<T, ApiError>;

/// Closed error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// No response was received.
    NetworkError,
    /// The request deadline was exceeded.
    Timeout,
    /// HTTP 401.
    Unauthorized,
    /// HTTP 403.
    Forbidden,
    /// HTTP 404.
    NotFound,
    /// HTTP 422 or local input validation.
    ValidationError,
    /// Any HTTP 5xx.
    ServerError,
    /// Anything else, including malformed success payloads.
    Unknown,
}

impl ErrorKind {
    /// Map an HTTP status to its error kind.
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            422 => Self::ValidationError,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    /// Wire name of the kind, e.g. `"NETWORK_ERROR"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NetworkError => "NETWORK_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::ValidationError => "VALIDATION_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized failure.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ApiError {
    /// Which class of failure this is.
    pub kind: ErrorKind,

    /// HTTP status, when a response was received.
    pub status: Option<u16>,

    /// Human readable message, preferably the server's own.
    pub message: String,

    /// Parsed response body, when there was one.
    pub details: Option<Value>,
}

impl ApiError {
    /// Create an error with no HTTP context.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            details: None,
        }
    }

    /// Local input validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ValidationError, message)
    }

    /// Missing or rejected credentials.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// Catch-all failure.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Build an error from a non-success response status and its body.
    ///
    /// The message comes from the body's `message`, `error` or `title`
    /// field, falling back to the status reason phrase.
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let details: Option<Value> = serde_json::from_slice(body).ok();
        let server_message = details.as_ref().and_then(|value| {
            ["message", "error", "title"]
                .iter()
                .find_map(|field| value.get(field).and_then(Value::as_str))
                .map(str::to_string)
        });
        let message = server_message.unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unexpected error")
                .to_string()
        });

        Self {
            kind: ErrorKind::from_status(status),
            status: Some(status.as_u16()),
            message,
            details,
        }
    }

    /// Normalize a transport-level failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::new(ErrorKind::Timeout, "Request timed out. Please try again.");
        }

        if err.is_decode() {
            return Self::new(
                ErrorKind::Unknown,
                format!("Malformed response payload: {}", err),
            );
        }

        if let Some(status) = err.status() {
            return Self::from_status(status, &[]);
        }

        tracing::warn!("Network error - no response received: {}", err);
        Self::new(ErrorKind::NetworkError, "Network error. Check your connection.")
    }

    /// Whether this error has the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::from_transport(&err)
    }
}
