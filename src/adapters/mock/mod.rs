//! Mock implementations for testing.
//!
//! # Available Mocks
//!
//! - [`ScriptedTransport`] - Event stream whose connection attempts follow a script
//! - [`StaticFetcher`] - Query fetcher with a settable response and call counts

pub mod fetcher;
pub mod transport;

pub use fetcher::StaticFetcher;
pub use transport::{ScriptedOpen, ScriptedTransport, StreamFeed};
