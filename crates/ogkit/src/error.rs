//! Error types for ogkit

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes surfaced through [`OpenGraphResult::error`](crate::OpenGraphResult)
///
/// These strings are part of the output contract and never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    /// Input rejected before any I/O
    InvalidUrl,
    /// Redirect (or request) to something other than http/https
    UnsupportedScheme,
    /// Deadline exceeded before any usable bytes arrived
    Timeout,
    /// Redirect chain longer than the configured cap
    TooManyRedirects,
    /// DNS, TCP or TLS failure
    ConnectionFailed,
    /// Final response status outside 200-299
    BadStatus,
}

impl ErrorCode {
    /// The wire representation of this code
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidUrl => "invalid-url",
            ErrorCode::UnsupportedScheme => "unsupported-scheme",
            ErrorCode::Timeout => "timeout",
            ErrorCode::TooManyRedirects => "too-many-redirects",
            ErrorCode::ConnectionFailed => "connection-failed",
            ErrorCode::BadStatus => "bad-status",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while fetching a document
///
/// Only raised when zero usable bytes were obtained. Anything that produced
/// a response with at least some body is reported as a (possibly truncated)
/// [`FetchOutcome`](crate::FetchOutcome) instead.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL (or redirect target) has a scheme other than http/https
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Deadline expired before any body bytes were received
    #[error("Request timed out before any content was received")]
    Timeout,

    /// Redirect chain exceeded the cap
    #[error("Too many redirects: limit is {0}")]
    TooManyRedirects(usize),

    /// Failed to build HTTP client
    #[error("Failed to create HTTP client")]
    ClientBuildError(#[source] reqwest::Error),

    /// Failed to connect to server
    #[error("Failed to connect to server")]
    ConnectError(#[source] reqwest::Error),

    /// Other request error
    #[error("Request failed: {0}")]
    RequestError(String),
}

impl FetchError {
    /// Create an error from a reqwest error
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::ConnectError(err)
        } else {
            FetchError::RequestError(err.to_string())
        }
    }

    /// The stable code reported to callers for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            FetchError::UnsupportedScheme(_) => ErrorCode::UnsupportedScheme,
            FetchError::Timeout => ErrorCode::Timeout,
            FetchError::TooManyRedirects(_) => ErrorCode::TooManyRedirects,
            FetchError::ClientBuildError(_)
            | FetchError::ConnectError(_)
            | FetchError::RequestError(_) => ErrorCode::ConnectionFailed,
        }
    }
}

/// Invalid configuration values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Timeout must be positive
    #[error("Invalid configuration: timeout must be greater than zero")]
    ZeroTimeout,

    /// Byte ceiling must be positive
    #[error("Invalid configuration: max_bytes must be greater than zero")]
    ZeroMaxBytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            FetchError::UnsupportedScheme("ftp".to_string()).to_string(),
            "Unsupported URL scheme: ftp"
        );
        assert_eq!(
            FetchError::TooManyRedirects(5).to_string(),
            "Too many redirects: limit is 5"
        );
        assert_eq!(
            ConfigError::ZeroTimeout.to_string(),
            "Invalid configuration: timeout must be greater than zero"
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(FetchError::Timeout.code(), ErrorCode::Timeout);
        assert_eq!(
            FetchError::TooManyRedirects(5).code(),
            ErrorCode::TooManyRedirects
        );
        assert_eq!(
            FetchError::UnsupportedScheme("javascript".into()).code(),
            ErrorCode::UnsupportedScheme
        );
        assert_eq!(
            FetchError::RequestError("tls".into()).code(),
            ErrorCode::ConnectionFailed
        );
    }

    #[test]
    fn test_error_code_wire_format() {
        let codes = [
            ErrorCode::InvalidUrl,
            ErrorCode::UnsupportedScheme,
            ErrorCode::Timeout,
            ErrorCode::TooManyRedirects,
            ErrorCode::ConnectionFailed,
            ErrorCode::BadStatus,
        ];
        for code in codes {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }
}
