//! Transport-level errors for the event stream and the REST fetcher.

use thiserror::Error;

use super::category::ErrorCategory;

/// Errors raised while opening or reading the server event stream.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    /// TCP/TLS connection could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The server answered with a non-success status.
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// The session token was rejected (401/403).
    #[error("Unauthorized ({status})")]
    Unauthorized { status: u16 },

    /// The stream produced an I/O error mid-flight.
    #[error("Stream error: {0}")]
    Stream(String),

    /// No bytes arrived within the idle window.
    #[error("No data received for {secs}s")]
    IdleTimeout { secs: u64 },

    /// The endpoint URL is malformed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl TransportError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            TransportError::ConnectionFailed(_)
            | TransportError::Stream(_)
            | TransportError::IdleTimeout { .. } => ErrorCategory::Network,
            TransportError::ServerError { .. } => ErrorCategory::Server,
            TransportError::Unauthorized { .. } => ErrorCategory::Auth,
            TransportError::InvalidUrl(_) => ErrorCategory::Configuration,
        }
    }

    /// Whether the connection manager should keep retrying after this error.
    pub fn should_reconnect(&self) -> bool {
        self.category().is_retryable()
    }

    /// Map an HTTP status to the matching error variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => TransportError::Unauthorized { status },
            _ => TransportError::ServerError {
                status,
                message: message.into(),
            },
        }
    }
}

/// Classify a reqwest error into a transport error.
pub fn classify_reqwest_error(err: &reqwest::Error) -> TransportError {
    if let Some(status) = err.status() {
        return TransportError::from_status(status.as_u16(), err.to_string());
    }
    if err.is_builder() {
        return TransportError::InvalidUrl(err.to_string());
    }
    if err.is_connect() || err.is_timeout() {
        return TransportError::ConnectionFailed(err.to_string());
    }
    TransportError::Stream(err.to_string())
}
