//! Realtime context: the explicit owner of the bus, the query cache and the
//! session-scoped connection manager.
//!
//! ```ignore
//! let ctx = RealtimeContext::create(config, transport, fetcher)?;
//! ctx.login(token).await;
//! let _hook = ctx.hook(COMPANY_LIST_REFRESH).invalidate(query_key!["companies"]).mount();
//! // ...
//! ctx.dispose().await;
//! ```

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::bus::EventBus;
use crate::config::RealtimeConfig;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::RealtimeResult;
use crate::events::EventName;
use crate::hook::{use_event, EventHook, EventHookBuilder, HookAction, HookOptions};
use crate::query::QueryCache;
use crate::session::{AuthReceiver, SessionToken};
use crate::traits::{EventStreamTransport, QueryFetcher};

pub struct RealtimeContext {
    config: RealtimeConfig,
    bus: EventBus,
    cache: QueryCache,
    transport: Arc<dyn EventStreamTransport>,
    manager: Mutex<Option<ConnectionManager>>,
}

impl RealtimeContext {
    /// Validate `config` and build a logged-out context.
    pub fn create(
        config: RealtimeConfig,
        transport: Arc<dyn EventStreamTransport>,
        fetcher: Arc<dyn QueryFetcher>,
    ) -> RealtimeResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            bus: EventBus::new(),
            cache: QueryCache::new(fetcher),
            transport,
            manager: Mutex::new(None),
        })
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Start the event stream for `token`. A running stream is torn down
    /// first, so there is never more than one per context.
    pub async fn login(&self, token: SessionToken) {
        let mut manager = self.manager.lock().await;
        if let Some(previous) = manager.take() {
            debug!("Replacing event stream {}", previous.connection_id());
            previous.shutdown().await;
        }
        let next = ConnectionManager::start(
            &self.config,
            Arc::clone(&self.transport),
            self.bus.clone(),
            token,
        );
        info!("Session started, event stream {}", next.connection_id());
        *manager = Some(next);
    }

    /// Tear down the event stream. No-op when logged out.
    pub async fn logout(&self) {
        let previous = self.manager.lock().await.take();
        if let Some(previous) = previous {
            previous.shutdown().await;
            info!("Session ended");
        }
    }

    pub async fn is_logged_in(&self) -> bool {
        self.manager.lock().await.is_some()
    }

    /// Current stream state; `Disconnected` when logged out.
    pub async fn connection_state(&self) -> ConnectionState {
        self.manager
            .lock()
            .await
            .as_ref()
            .map(ConnectionManager::state)
            .unwrap_or(ConnectionState::Disconnected)
    }

    /// State receiver of the current session's stream.
    pub async fn watch_state(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.manager
            .lock()
            .await
            .as_ref()
            .map(ConnectionManager::watch_state)
    }

    pub async fn is_degraded(&self) -> bool {
        self.manager
            .lock()
            .await
            .as_ref()
            .is_some_and(ConnectionManager::is_degraded)
    }

    /// Hook builder already bound to this context's bus and cache.
    pub fn hook(&self, name: impl Into<EventName>) -> EventHookBuilder {
        EventHook::builder(&self.bus, name).with_cache(&self.cache)
    }

    pub fn use_event(
        &self,
        name: impl Into<EventName>,
        action: impl Into<HookAction>,
        options: HookOptions,
    ) -> EventHook {
        use_event(&self.bus, &self.cache, name, action, options)
    }

    pub fn publish(&self, name: &str, payload: &Value) {
        self.bus.publish(name, payload);
    }

    /// Log in and out as the auth signal changes. The task ends, logging
    /// out, when the sender is dropped.
    pub fn follow_auth(self: Arc<Self>, mut auth: AuthReceiver) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let token = auth.borrow_and_update().clone();
                match token {
                    Some(token) => self.login(token).await,
                    None => self.logout().await,
                }
                if auth.changed().await.is_err() {
                    debug!("Auth signal closed");
                    self.logout().await;
                    break;
                }
            }
        })
    }

    /// Stop the stream and drop every subscription and cached entry.
    pub async fn dispose(&self) {
        self.logout().await;
        self.bus.clear();
        self.cache.clear();
        debug!("Realtime context disposed");
    }
}
