//! Line and frame types for the SSE wire format.

/// Represents a parsed SSE line
#[derive(Debug, Clone, PartialEq)]
pub enum SseLine {
    /// Event type declaration (e.g., "event: sa_finance_update")
    Event(String),
    /// Data payload (e.g., "data: {\"invoice_id\": \"inv-1\"}")
    Data(String),
    /// Event id used for `Last-Event-ID` on reconnect
    Id(String),
    /// Empty line - signals end of frame
    Empty,
    /// Comment line (starts with ':'), used by servers as keep-alive
    Comment(String),
}

/// One complete frame: everything between two blank lines.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SseFrame {
    /// Value of the `event:` field, if the frame had one
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
    /// Last event id seen on the stream when this frame completed
    pub id: Option<String>,
}

impl SseFrame {
    pub fn new(event: Option<&str>, data: &str) -> Self {
        Self {
            event: event.map(str::to_string),
            data: data.to_string(),
            id: None,
        }
    }
}
