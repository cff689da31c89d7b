//! SSE (Server-Sent Events) stream parsing
//!
//! Parses the framing used by the HP-BIZ event endpoint:
//! - `event: <name>` - event name line
//! - `data: <json>` - payload line (may repeat)
//! - `id: <id>` - event id, replayed as `Last-Event-ID` on reconnect
//! - Empty line - signals end of frame
//! - Lines starting with `:` - comments, used as keep-alives
//!
//! # Module structure
//! - `events` - Line and frame types
//! - `parser` - Line-level state machine (SseParser, parse_sse_line)
//! - `decoder` - Byte-chunk buffering on top of the parser

mod decoder;
mod events;
mod parser;

pub use decoder::{FrameDecoder, DEFAULT_MAX_LINE_BYTES};
pub use events::{SseFrame, SseLine};
pub use parser::{parse_sse_line, SseParser};
