//! HP-BIZ realtime core - event-driven query invalidation for the
//! super-admin dashboard.
//!
//! A long-lived server event stream feeds an in-process [`bus::EventBus`].
//! [`hook::EventHook`]s turn named events into invalidation of cached
//! [`query::QueryCache`] entries, which refetch exactly once per key.

pub mod adapters;
pub mod bus;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod events;
pub mod hook;
pub mod prelude;
pub mod query;
pub mod session;
pub mod sse;
pub mod traits;

#[doc(hidden)]
pub use serde_json as __serde_json;
