//! Frame and payload decoding errors.

use thiserror::Error;

/// A frame from the event stream could not be turned into an envelope.
///
/// Decode errors are always local to one frame: the manager logs them and
/// keeps reading.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DecodeError {
    /// A line was not valid UTF-8.
    #[error("Invalid UTF-8 in stream line")]
    InvalidUtf8,

    /// A line grew past the decoder's limit without a newline.
    #[error("Stream line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    /// The data field was not valid JSON.
    #[error("Invalid JSON for event '{event}': {message}")]
    InvalidJson { event: String, message: String },

    /// An envelope frame carried no event name.
    #[error("Envelope frame is missing an event name")]
    MissingName,

    /// A typed payload did not match its registered shape.
    #[error("Payload for '{event}' does not match its registered shape: {message}")]
    PayloadMismatch { event: String, message: String },
}

impl DecodeError {
    pub(crate) fn invalid_json(event: &str, err: &serde_json::Error) -> Self {
        DecodeError::InvalidJson {
            event: event.to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn payload_mismatch(event: &str, err: &serde_json::Error) -> Self {
        DecodeError::PayloadMismatch {
            event: event.to_string(),
            message: err.to_string(),
        }
    }
}
