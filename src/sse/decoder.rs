//! Chunk-to-frame decoding.
//!
//! Network chunks split anywhere, including inside a multi-byte character,
//! so bytes are buffered until a full line is available.

use tracing::{debug, warn};

use super::events::SseFrame;
use super::parser::SseParser;
use crate::error::DecodeError;

/// Longest line accepted before the frame is dropped.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

/// Turns raw stream chunks into complete SSE frames.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a newline.
    scanned: usize,
    max_line: usize,
    parser: SseParser,
    /// Set after an undecodable line; the rest of that frame is dropped.
    poisoned: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line: DEFAULT_MAX_LINE_BYTES,
            parser: SseParser::default(),
            poisoned: false,
        }
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a decoder that remembers the id from a previous connection.
    pub fn resume_from(last_event_id: Option<&str>) -> Self {
        let mut decoder = Self::new();
        if let Some(id) = last_event_id {
            decoder.parser.feed_line(&format!("id: {}", id));
        }
        decoder
    }

    pub fn with_max_line(mut self, max_line: usize) -> Self {
        self.max_line = max_line;
        self
    }

    /// Feed a chunk, returning every frame (or frame error) it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<SseFrame, DecodeError>> {
        self.buffer.extend_from_slice(chunk);
        let mut out = Vec::new();

        loop {
            let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') else {
                self.scanned = self.buffer.len();
                if self.buffer.len() > self.max_line {
                    warn!("Discarding {} bytes without a newline", self.buffer.len());
                    self.buffer.clear();
                    self.scanned = 0;
                    self.poison(DecodeError::LineTooLong { limit: self.max_line }, &mut out);
                }
                break;
            };
            let newline_pos = self.scanned + offset;
            self.scanned = 0;

            let mut line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            if line.len() > self.max_line {
                self.poison(DecodeError::LineTooLong { limit: self.max_line }, &mut out);
                continue;
            }

            let text = match std::str::from_utf8(&line) {
                Ok(text) => text,
                Err(_) => {
                    self.poison(DecodeError::InvalidUtf8, &mut out);
                    continue;
                }
            };

            if self.poisoned {
                if text.is_empty() {
                    debug!("Skipped remainder of undecodable frame");
                    self.poisoned = false;
                }
                continue;
            }

            if let Some(frame) = self.parser.feed_line(text) {
                out.push(Ok(frame));
            }
        }

        out
    }

    /// Report `err` once and drop the rest of the current frame.
    fn poison(&mut self, err: DecodeError, out: &mut Vec<Result<SseFrame, DecodeError>>) {
        if !self.poisoned {
            out.push(Err(err));
        }
        self.poisoned = true;
        self.parser.reset();
    }

    pub fn last_event_id(&self) -> Option<&str> {
        self.parser.last_event_id()
    }

    /// Bytes held back waiting for a newline.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}
