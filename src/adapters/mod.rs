//! Concrete implementations of trait abstractions.
//!
//! # Adapters
//!
//! - [`ReqwestSseTransport`] - Event stream over HTTP using reqwest
//! - [`ReqwestQueryFetcher`] - REST query fetcher using reqwest
//!
//! # Mock Implementations
//!
//! The [`mock`] submodule provides test doubles for both seams:
//! - [`mock::ScriptedTransport`] - Scripted connection attempts and fed streams
//! - [`mock::StaticFetcher`] - Fixed responses with per-key call counts

pub mod mock;
pub mod reqwest_fetcher;
pub mod reqwest_sse;

pub use mock::{ScriptedTransport, StaticFetcher};
pub use reqwest_fetcher::ReqwestQueryFetcher;
pub use reqwest_sse::ReqwestSseTransport;
