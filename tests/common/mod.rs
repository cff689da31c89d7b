//! Common test utilities for integration tests.
//!
//! # Example
//!
//! ```ignore
//! mod common;
//! use common::{fast_config, eventually, Recorder};
//!
//! let recorder = Recorder::attach(&bus, "sa_finance_update");
//! eventually(|| recorder.len() == 1).await;
//! ```

#![allow(dead_code)]

use hpbiz_realtime::bus::{EventBus, Subscription};
use hpbiz_realtime::config::{BackoffPolicy, RealtimeConfig};
use hpbiz_realtime::session::SessionToken;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long `eventually` waits before failing a test.
pub const EVENTUALLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Config with millisecond backoff so reconnect tests run quickly.
pub fn fast_config() -> RealtimeConfig {
    RealtimeConfig::default()
        .with_events_url("http://127.0.0.1:0/api/sa/events")
        .with_backoff(BackoffPolicy {
            initial: Duration::from_millis(10),
            factor: 2.0,
            max: Duration::from_millis(40),
        })
        .with_idle_timeout(Duration::from_secs(5))
        .with_connect_timeout(Duration::from_secs(1))
        .with_degraded_after(3)
}

pub fn test_token() -> SessionToken {
    SessionToken::new("test-session-token")
}

/// Poll `condition` until it holds, panicking after [`EVENTUALLY_TIMEOUT`].
pub async fn eventually<F>(condition: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + EVENTUALLY_TIMEOUT;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within {:?}",
            EVENTUALLY_TIMEOUT
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Await `future`, failing the test if it takes longer than [`EVENTUALLY_TIMEOUT`].
pub async fn within<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(EVENTUALLY_TIMEOUT, future)
        .await
        .expect("operation timed out")
}

/// Records every payload published under one event name.
pub struct Recorder {
    payloads: Arc<Mutex<Vec<Value>>>,
    _subscription: Subscription,
}

impl Recorder {
    pub fn attach(bus: &EventBus, name: &str) -> Self {
        let payloads = Arc::new(Mutex::new(Vec::new()));
        let sink = payloads.clone();
        let subscription = bus.subscribe(name, move |payload| {
            sink.lock().unwrap().push(payload.clone());
        });
        Self {
            payloads,
            _subscription: subscription,
        }
    }

    pub fn payloads(&self) -> Vec<Value> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }
}

/// Shared, ordered log of labels written by test listeners.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}
