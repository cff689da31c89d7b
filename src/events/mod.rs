//! Server event names, envelopes, and the typed event registry.

mod envelope;
mod name;
pub mod registry;

pub use envelope::EventEnvelope;
pub use name::EventName;
pub(crate) use registry::decode_or_default;
pub use registry::{
    default_invalidations, ActivityLogCreated, CompanyListRefresh, DashboardRefresh,
    FinanceUpdate, NewNotification, PackageUpdate, ServerEvent, ServerEventKind,
    SystemLogCreated, KNOWN_EVENTS,
};
