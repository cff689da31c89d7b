//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`EventStreamTransport`] - Opens the authenticated server event stream
//! - [`QueryFetcher`] - Loads server data for a query key

pub mod fetcher;
pub mod transport;

pub use fetcher::QueryFetcher;
pub use transport::{ByteStream, EventStreamTransport, StreamRequest};
