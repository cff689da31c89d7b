//! Prelude module for convenient imports.
//!
//! ```ignore
//! use hpbiz_realtime::prelude::*;
//! ```

pub use crate::bus::{EventBus, Subscription};
pub use crate::config::{BackoffPolicy, RealtimeConfig};
pub use crate::connection::{ConnectionManager, ConnectionState};
pub use crate::context::RealtimeContext;
pub use crate::error::{RealtimeError, RealtimeResult};
pub use crate::events::{EventEnvelope, EventName, ServerEvent, ServerEventKind};
pub use crate::hook::{EventHook, HookAction, HookOptions, InvalidateScope};
pub use crate::query::{QueryCache, QueryKey};
pub use crate::query_key;
pub use crate::session::SessionToken;
