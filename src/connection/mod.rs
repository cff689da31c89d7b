//! Server event stream connection.
//!
//! [`ConnectionManager`] keeps one authenticated stream open per session and
//! republishes every decoded frame on the [`EventBus`](crate::bus::EventBus).
//! Reconnects follow [`Backoff`]; progress is observable as a sequence of
//! [`ConnectionState`] transitions.

mod backoff;
mod manager;
mod state;

pub use backoff::Backoff;
pub use manager::ConnectionManager;
pub use state::ConnectionState;
