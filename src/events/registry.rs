//! Known HP-BIZ server events and their payload shapes.
//!
//! Each event is a zero-sized marker implementing [`ServerEventKind`], which
//! lets consumers subscribe with a decoded payload instead of raw JSON.
//! [`ServerEvent`] is the same registry as a closed enum, used where the
//! event name is only known at runtime.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::envelope::{decode_payload, EventEnvelope};
use crate::error::DecodeError;
use crate::query::QueryKey;

pub const COMPANY_LIST_REFRESH: &str = "sa_company_list_refresh";
pub const NEW_NOTIFICATION: &str = "new_sa_notification";
pub const FINANCE_UPDATE: &str = "sa_finance_update";
pub const PACKAGE_UPDATE: &str = "sa_package_update";
pub const ACTIVITY_LOG_CREATED: &str = "sa_activity_log_created";
pub const SYSTEM_LOG_CREATED: &str = "sa_system_log_created";
pub const DASHBOARD_REFRESH: &str = "sa_dashboard_refresh";

/// A named server event with a fixed payload shape.
pub trait ServerEventKind: Send + Sync + 'static {
    const NAME: &'static str;
    /// `Default` stands in for frames that carry no data.
    type Payload: DeserializeOwned + Default + Send + 'static;
}

/// The company list changed (created, suspended, plan changed).
pub struct CompanyListRefresh;
/// A new notification for the super-administrator.
pub struct NewNotification;
/// An invoice or payment changed state.
pub struct FinanceUpdate;
/// A subscription package was created, edited or retired.
pub struct PackageUpdate;
pub struct ActivityLogCreated;
pub struct SystemLogCreated;
/// Aggregate usage figures should be reloaded.
pub struct DashboardRefresh;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyRefreshPayload {
    pub company_id: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    #[default]
    Info,
    Success,
    Warning,
    Error,
    /// Any level this client does not know yet
    Other,
}

impl<'de> Deserialize<'de> for NotificationLevel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let level = String::deserialize(deserializer)?;
        Ok(match level.to_ascii_lowercase().as_str() {
            "info" => NotificationLevel::Info,
            "success" => NotificationLevel::Success,
            "warning" | "warn" => NotificationLevel::Warning,
            "error" => NotificationLevel::Error,
            _ => NotificationLevel::Other,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationPayload {
    pub id: Option<String>,
    pub title: String,
    pub message: String,
    pub level: NotificationLevel,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceUpdatePayload {
    pub invoice_id: Option<String>,
    pub payment_id: Option<String>,
    pub company_id: Option<String>,
    pub status: Option<String>,
    pub amount: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageUpdatePayload {
    pub package_id: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEntryPayload {
    pub log_id: Option<String>,
    pub company_id: Option<String>,
    pub message: Option<String>,
}

impl ServerEventKind for CompanyListRefresh {
    const NAME: &'static str = COMPANY_LIST_REFRESH;
    type Payload = CompanyRefreshPayload;
}

impl ServerEventKind for NewNotification {
    const NAME: &'static str = NEW_NOTIFICATION;
    type Payload = NotificationPayload;
}

impl ServerEventKind for FinanceUpdate {
    const NAME: &'static str = FINANCE_UPDATE;
    type Payload = FinanceUpdatePayload;
}

impl ServerEventKind for PackageUpdate {
    const NAME: &'static str = PACKAGE_UPDATE;
    type Payload = PackageUpdatePayload;
}

impl ServerEventKind for ActivityLogCreated {
    const NAME: &'static str = ACTIVITY_LOG_CREATED;
    type Payload = LogEntryPayload;
}

impl ServerEventKind for SystemLogCreated {
    const NAME: &'static str = SYSTEM_LOG_CREATED;
    type Payload = LogEntryPayload;
}

impl ServerEventKind for DashboardRefresh {
    const NAME: &'static str = DASHBOARD_REFRESH;
    type Payload = Value;
}

/// Every event name in the registry.
pub const KNOWN_EVENTS: &[&str] = &[
    COMPANY_LIST_REFRESH,
    NEW_NOTIFICATION,
    FINANCE_UPDATE,
    PACKAGE_UPDATE,
    ACTIVITY_LOG_CREATED,
    SYSTEM_LOG_CREATED,
    DASHBOARD_REFRESH,
];

/// A decoded server event.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    CompanyListRefresh(CompanyRefreshPayload),
    Notification(NotificationPayload),
    FinanceUpdate(FinanceUpdatePayload),
    PackageUpdate(PackageUpdatePayload),
    ActivityLogCreated(LogEntryPayload),
    SystemLogCreated(LogEntryPayload),
    DashboardRefresh(Value),
    /// A name outside the registry; payload kept as-is.
    Unknown(EventEnvelope),
}

impl ServerEvent {
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self, DecodeError> {
        let name = envelope.name.as_str();
        let payload = &envelope.payload;
        Ok(match name {
            COMPANY_LIST_REFRESH => {
                ServerEvent::CompanyListRefresh(decode_or_default(name, payload)?)
            }
            NEW_NOTIFICATION => ServerEvent::Notification(decode_or_default(name, payload)?),
            FINANCE_UPDATE => ServerEvent::FinanceUpdate(decode_or_default(name, payload)?),
            PACKAGE_UPDATE => ServerEvent::PackageUpdate(decode_or_default(name, payload)?),
            ACTIVITY_LOG_CREATED => {
                ServerEvent::ActivityLogCreated(decode_or_default(name, payload)?)
            }
            SYSTEM_LOG_CREATED => {
                ServerEvent::SystemLogCreated(decode_or_default(name, payload)?)
            }
            DASHBOARD_REFRESH => ServerEvent::DashboardRefresh(payload.clone()),
            _ => ServerEvent::Unknown(envelope.clone()),
        })
    }

    pub fn event_name(&self) -> &str {
        match self {
            ServerEvent::CompanyListRefresh(_) => CompanyListRefresh::NAME,
            ServerEvent::Notification(_) => NewNotification::NAME,
            ServerEvent::FinanceUpdate(_) => FinanceUpdate::NAME,
            ServerEvent::PackageUpdate(_) => PackageUpdate::NAME,
            ServerEvent::ActivityLogCreated(_) => ActivityLogCreated::NAME,
            ServerEvent::SystemLogCreated(_) => SystemLogCreated::NAME,
            ServerEvent::DashboardRefresh(_) => DashboardRefresh::NAME,
            ServerEvent::Unknown(envelope) => envelope.name.as_str(),
        }
    }
}

/// A `null` payload (frame without data) decodes to the default shape.
pub(crate) fn decode_or_default<T: DeserializeOwned + Default>(
    name: &str,
    payload: &Value,
) -> Result<T, DecodeError> {
    if payload.is_null() {
        Ok(T::default())
    } else {
        decode_payload(name, payload)
    }
}

/// Query key prefixes a dashboard refreshes when `name` fires.
pub fn default_invalidations(name: &str) -> Vec<QueryKey> {
    let resources: &[&str] = match name {
        COMPANY_LIST_REFRESH => &["companies", "dashboard"],
        NEW_NOTIFICATION => &["notifications"],
        FINANCE_UPDATE => &["invoices", "payments", "dashboard"],
        PACKAGE_UPDATE => &["packages", "companies"],
        ACTIVITY_LOG_CREATED => &["activity_logs"],
        SYSTEM_LOG_CREATED => &["system_logs"],
        DASHBOARD_REFRESH => &["dashboard"],
        _ => &[],
    };
    resources.iter().map(|r| QueryKey::from(*r)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_known_event() {
        let envelope = EventEnvelope::new(
            "sa_finance_update",
            json!({"invoice_id": "inv-9", "status": "paid", "amount": 120.5}),
        );
        let event = ServerEvent::from_envelope(&envelope).unwrap();
        assert_eq!(
            event,
            ServerEvent::FinanceUpdate(FinanceUpdatePayload {
                invoice_id: Some("inv-9".to_string()),
                status: Some("paid".to_string()),
                amount: Some(120.5),
                ..Default::default()
            })
        );
        assert_eq!(event.event_name(), "sa_finance_update");
    }

    #[test]
    fn test_null_payload_decodes_to_default() {
        let envelope = EventEnvelope::new("sa_company_list_refresh", Value::Null);
        assert_eq!(
            ServerEvent::from_envelope(&envelope).unwrap(),
            ServerEvent::CompanyListRefresh(CompanyRefreshPayload::default())
        );
    }

    #[test]
    fn test_notification_level_fallback() {
        let envelope = EventEnvelope::new(
            "new_sa_notification",
            json!({"title": "Invoice overdue", "level": "critical"}),
        );
        match ServerEvent::from_envelope(&envelope).unwrap() {
            ServerEvent::Notification(n) => {
                assert_eq!(n.title, "Invoice overdue");
                assert_eq!(n.level, NotificationLevel::Other);
            }
            other => panic!("Expected Notification, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_event_is_preserved() {
        let envelope = EventEnvelope::new("sa_something_new", json!({"x": 1}));
        let event = ServerEvent::from_envelope(&envelope).unwrap();
        assert_eq!(event, ServerEvent::Unknown(envelope));
        assert_eq!(event.event_name(), "sa_something_new");
    }

    #[test]
    fn test_mismatched_payload_is_error() {
        let envelope = EventEnvelope::new("sa_package_update", json!("not an object"));
        assert!(matches!(
            ServerEvent::from_envelope(&envelope),
            Err(DecodeError::PayloadMismatch { .. })
        ));
    }

    #[test]
    fn test_default_invalidations() {
        let keys = default_invalidations(FinanceUpdate::NAME);
        assert_eq!(
            keys,
            vec![
                QueryKey::from("invoices"),
                QueryKey::from("payments"),
                QueryKey::from("dashboard"),
            ]
        );
        assert!(default_invalidations("unknown").is_empty());
    }

    #[test]
    fn test_known_events_are_unique() {
        let mut names = KNOWN_EVENTS.to_vec();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), KNOWN_EVENTS.len());
    }
}
