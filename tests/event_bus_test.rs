//! Integration tests for the event bus: delivery order, subscription
//! isolation, and listener failure containment.

mod common;

use common::{CallLog, Recorder};
use hpbiz_realtime::bus::EventBus;
use hpbiz_realtime::events::registry::{CompanyRefreshPayload, NotificationLevel};
use hpbiz_realtime::events::{CompanyListRefresh, EventEnvelope, FinanceUpdate, NewNotification};
use hpbiz_realtime::sse::SseFrame;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[test]
fn test_every_listener_receives_payload_in_registration_order() {
    let bus = EventBus::new();
    let log = CallLog::default();

    let subs: Vec<_> = ["first", "second", "third"]
        .into_iter()
        .map(|label| {
            let log = log.clone();
            bus.subscribe("sa_company_list_refresh", move |payload: &Value| {
                log.push(format!("{}:{}", label, payload["company_id"]));
            })
        })
        .collect();

    bus.publish("sa_company_list_refresh", &json!({"company_id": 7}));

    assert_eq!(log.entries(), vec!["first:7", "second:7", "third:7"]);
    drop(subs);
}

#[test]
fn test_unsubscribed_listener_no_longer_called() {
    let bus = EventBus::new();
    let kept = Recorder::attach(&bus, "sa_dashboard_refresh");
    let hits = Arc::new(Mutex::new(0));
    let hits_clone = hits.clone();
    let removed = bus.subscribe("sa_dashboard_refresh", move |_| {
        *hits_clone.lock().unwrap() += 1;
    });

    bus.publish("sa_dashboard_refresh", &json!({}));
    removed.unsubscribe();
    removed.unsubscribe();
    bus.publish("sa_dashboard_refresh", &json!({}));

    assert_eq!(*hits.lock().unwrap(), 1);
    assert_eq!(kept.len(), 2);
}

#[test]
fn test_identical_callbacks_are_independent_subscriptions() {
    let bus = EventBus::new();
    let log = CallLog::default();
    let listener: Arc<dyn Fn(&Value) + Send + Sync> = {
        let log = log.clone();
        Arc::new(move |_| log.push("hit"))
    };

    let a = bus.subscribe_listener("x".into(), listener.clone());
    let _b = bus.subscribe_listener("x".into(), listener);
    assert_eq!(bus.listener_count("x"), 2);

    a.unsubscribe();
    assert_eq!(bus.listener_count("x"), 1);
    bus.publish("x", &Value::Null);
    assert_eq!(log.entries(), vec!["hit"]);
}

#[test]
fn test_panicking_listener_does_not_stop_others() {
    let bus = EventBus::new();
    let log = CallLog::default();

    let log_a = log.clone();
    let _a = bus.subscribe("new_sa_notification", move |_| log_a.push("a"));
    let _boom = bus.subscribe("new_sa_notification", |_| panic!("listener failure"));
    let log_c = log.clone();
    let _c = bus.subscribe("new_sa_notification", move |_| log_c.push("c"));

    bus.publish("new_sa_notification", &json!({"title": "hello"}));
    bus.publish("new_sa_notification", &json!({"title": "again"}));

    assert_eq!(log.entries(), vec!["a", "c", "a", "c"]);
}

#[test]
fn test_publish_without_listeners_is_noop() {
    let bus = EventBus::new();
    bus.publish("sa_unknown_event", &json!({"anything": true}));
    assert_eq!(bus.listener_count("sa_unknown_event"), 0);
}

#[test]
fn test_names_are_case_sensitive() {
    let bus = EventBus::new();
    let recorder = Recorder::attach(&bus, "sa_finance_update");
    bus.publish("SA_FINANCE_UPDATE", &json!({}));
    assert_eq!(recorder.len(), 0);
}

#[test]
fn test_typed_subscription_decodes_payload() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _sub = bus.subscribe_typed::<NewNotification, _>(move |n| {
        sink.lock().unwrap().push((n.title, n.level));
    });

    bus.publish(
        "new_sa_notification",
        &json!({"title": "Invoice overdue", "message": "ACME", "level": "warning"}),
    );
    // Wrong shape for the title field: skipped, not delivered
    bus.publish("new_sa_notification", &json!({"title": 42}));

    assert_eq!(
        *seen.lock().unwrap(),
        vec![("Invoice overdue".to_string(), NotificationLevel::Warning)]
    );
}

#[test]
fn test_typed_listener_receives_frame_without_data() {
    let bus = EventBus::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let _sub = bus.subscribe_typed::<CompanyListRefresh, _>(move |p| {
        sink.lock().unwrap().push(p);
    });

    let envelope =
        EventEnvelope::from_frame(&SseFrame::new(Some("sa_company_list_refresh"), "")).unwrap();
    assert!(envelope.payload.is_null());
    bus.publish_envelope(&envelope);

    assert_eq!(*seen.lock().unwrap(), vec![CompanyRefreshPayload::default()]);
}

#[test]
fn test_typed_and_raw_listeners_share_a_name() {
    let bus = EventBus::new();
    let raw = Recorder::attach(&bus, "sa_finance_update");
    let amounts = Arc::new(Mutex::new(Vec::new()));
    let sink = amounts.clone();
    let _typed = bus.subscribe_typed::<FinanceUpdate, _>(move |p| {
        sink.lock().unwrap().push(p.amount);
    });

    bus.publish("sa_finance_update", &json!({"invoice_id": "inv-1", "amount": 99.0}));

    assert_eq!(raw.len(), 1);
    assert_eq!(*amounts.lock().unwrap(), vec![Some(99.0)]);
}
