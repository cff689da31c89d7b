//! Error category classification.
//!
//! Categories drive the recovery decision made by the connection manager:
//! retry with backoff, stop the session, or drop the offending frame.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection drops, DNS failures, timeouts.
    /// Transient and retried with backoff.
    Network,

    /// The session token was rejected or has expired.
    /// Ends the session; a new login is required.
    Auth,

    /// Backend errors (HTTP 5xx, error frames).
    /// Retried after a delay.
    Server,

    /// Undecodable frames or payloads.
    /// Dropped and logged, never retried.
    Decode,

    /// Invalid configuration values.
    Configuration,
}

impl ErrorCategory {
    /// Returns true if errors in this category are transient.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCategory::Network | ErrorCategory::Server)
    }

    /// Short label for structured log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Auth => "auth",
            ErrorCategory::Server => "server",
            ErrorCategory::Decode => "decode",
            ErrorCategory::Configuration => "configuration",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
