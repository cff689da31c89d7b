//! Error types for the realtime core.
//!
//! Every failure mode is handled locally (reconnect, drop frame, isolate
//! listener), so these types mostly travel into log lines and state
//! transitions. They surface as `Err` only from setup calls such as
//! [`RealtimeConfig::validate`](crate::config::RealtimeConfig::validate) and
//! [`QueryCache::fetch`](crate::query::QueryCache::fetch).
//!
//! | Category | Source | Handling |
//! |----------|--------|----------|
//! | Network | dropped stream, refused connection, idle timeout | reconnect with backoff |
//! | Server | 5xx from the endpoint | reconnect with backoff |
//! | Auth | 401/403, expired token | end session |
//! | Decode | malformed frame | log and drop |
//! | Configuration | invalid config value | returned to caller |

mod category;
mod decode;
mod transport;

pub use category::ErrorCategory;
pub use decode::DecodeError;
pub use transport::{classify_reqwest_error, TransportError};

use thiserror::Error;

/// Errors raised by a [`QueryFetcher`](crate::traits::QueryFetcher).
///
/// Cloneable so one failed fetch can be shared by every caller that joined it.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    /// The key has no REST mapping.
    #[error("Query key {0} cannot be mapped to a request")]
    UnroutableKey(String),

    /// The fetch task panicked or was cancelled before producing a result.
    #[error("Fetch aborted: {0}")]
    Aborted(String),
}

/// Invalid configuration values.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("Backoff factor must be finite and >= 1.0, got {0}")]
    InvalidFactor(f64),

    #[error("Max backoff must be >= initial backoff")]
    BackoffRange,

    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Unified error type for the crate.
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RealtimeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RealtimeError::Transport(err) => err.category(),
            RealtimeError::Decode(_) => ErrorCategory::Decode,
            RealtimeError::Fetch(FetchError::Transport(err)) => err.category(),
            RealtimeError::Fetch(FetchError::InvalidBody(_)) => ErrorCategory::Decode,
            RealtimeError::Fetch(FetchError::UnroutableKey(_)) => ErrorCategory::Configuration,
            RealtimeError::Fetch(FetchError::Aborted(_)) => ErrorCategory::Server,
            RealtimeError::Config(_) => ErrorCategory::Configuration,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }
}

/// Result alias used across the crate.
pub type RealtimeResult<T> = Result<T, RealtimeError>;
