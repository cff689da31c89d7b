//! Stateful SSE line parser.

use super::events::{SseFrame, SseLine};

/// Parse a single SSE line into its component type
pub fn parse_sse_line(line: &str) -> SseLine {
    if line.is_empty() {
        return SseLine::Empty;
    }

    if let Some(stripped) = line.strip_prefix(':') {
        return SseLine::Comment(stripped.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("event:") {
        return SseLine::Event(rest.trim().to_string());
    }

    if let Some(rest) = line.strip_prefix("data:") {
        // Only the single separator space is stripped; payload whitespace is kept.
        return SseLine::Data(rest.strip_prefix(' ').unwrap_or(rest).to_string());
    }

    if let Some(rest) = line.strip_prefix("id:") {
        return SseLine::Id(rest.trim().to_string());
    }

    // retry: and unknown fields are ignored
    SseLine::Comment(line.to_string())
}

/// Stateful SSE parser that accumulates lines and emits complete frames
#[derive(Debug, Default)]
pub struct SseParser {
    /// Current event type being accumulated
    current_event_type: Option<String>,
    /// Accumulated data lines (SSE allows multiple data: lines)
    data_buffer: Vec<String>,
    /// Last event id, kept across frames
    last_event_id: Option<String>,
}

impl SseParser {
    /// Create a new SSE parser
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a line to the parser, returning a frame when a blank line
    /// completes one.
    pub fn feed_line(&mut self, line: &str) -> Option<SseFrame> {
        match parse_sse_line(line) {
            SseLine::Event(event_type) => {
                self.current_event_type = Some(event_type);
                None
            }
            SseLine::Data(data) => {
                self.data_buffer.push(data);
                None
            }
            SseLine::Id(id) => {
                // Ids containing NUL are ignored per the SSE format
                if !id.contains('\0') {
                    self.last_event_id = if id.is_empty() { None } else { Some(id) };
                }
                None
            }
            SseLine::Empty => self.try_emit_frame(),
            SseLine::Comment(_) => None,
        }
    }

    fn try_emit_frame(&mut self) -> Option<SseFrame> {
        if self.current_event_type.is_none() && self.data_buffer.is_empty() {
            return None;
        }

        let event = self.current_event_type.take();
        let data = self.data_buffer.join("\n");
        self.data_buffer.clear();

        Some(SseFrame {
            event,
            data,
            id: self.last_event_id.clone(),
        })
    }

    /// Last event id seen on this stream.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Discard the partially accumulated frame. The last event id survives.
    pub fn reset(&mut self) {
        self.current_event_type = None;
        self.data_buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_line() {
        assert_eq!(parse_sse_line(""), SseLine::Empty);
    }

    #[test]
    fn test_parse_comment_line() {
        assert_eq!(
            parse_sse_line(": keep-alive"),
            SseLine::Comment("keep-alive".to_string())
        );
    }

    #[test]
    fn test_parse_event_and_data_lines() {
        assert_eq!(
            parse_sse_line("event: sa_finance_update"),
            SseLine::Event("sa_finance_update".to_string())
        );
        assert_eq!(
            parse_sse_line("data: {\"a\": 1}"),
            SseLine::Data("{\"a\": 1}".to_string())
        );
        assert_eq!(parse_sse_line("data:x"), SseLine::Data("x".to_string()));
        assert_eq!(parse_sse_line("id: 42"), SseLine::Id("42".to_string()));
    }

    #[test]
    fn test_unknown_field_is_ignored() {
        assert!(matches!(parse_sse_line("retry: 1000"), SseLine::Comment(_)));
    }

    #[test]
    fn test_frame_emitted_on_blank_line() {
        let mut parser = SseParser::new();
        assert!(parser.feed_line("event: sa_company_list_refresh").is_none());
        assert!(parser.feed_line("data: {}").is_none());
        let frame = parser.feed_line("").unwrap();
        assert_eq!(frame.event.as_deref(), Some("sa_company_list_refresh"));
        assert_eq!(frame.data, "{}");
        assert_eq!(frame.id, None);
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut parser = SseParser::new();
        parser.feed_line("data: {\"a\":");
        parser.feed_line("data: 1}");
        let frame = parser.feed_line("").unwrap();
        assert_eq!(frame.data, "{\"a\":\n1}");
    }

    #[test]
    fn test_blank_line_without_fields_emits_nothing() {
        let mut parser = SseParser::new();
        assert!(parser.feed_line(": ping").is_none());
        assert!(parser.feed_line("").is_none());
    }

    #[test]
    fn test_event_id_persists_across_frames() {
        let mut parser = SseParser::new();
        parser.feed_line("id: 7");
        parser.feed_line("event: a");
        let first = parser.feed_line("").unwrap();
        parser.feed_line("event: b");
        let second = parser.feed_line("").unwrap();

        assert_eq!(first.id.as_deref(), Some("7"));
        assert_eq!(second.id.as_deref(), Some("7"));
        assert_eq!(parser.last_event_id(), Some("7"));
    }

    #[test]
    fn test_reset_keeps_last_event_id() {
        let mut parser = SseParser::new();
        parser.feed_line("id: 9");
        parser.feed_line("event: a");
        parser.reset();
        assert!(parser.feed_line("").is_none());
        assert_eq!(parser.last_event_id(), Some("9"));
    }
}
