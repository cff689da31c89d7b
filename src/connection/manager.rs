//! Session-scoped event stream driver.
//!
//! A background task opens the stream, decodes frames, publishes them on the
//! bus, and reconnects with capped exponential backoff. The manager handle
//! owns the task: [`ConnectionManager::shutdown`] signals it and waits until
//! the stream has been dropped.

use futures_util::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

use super::backoff::Backoff;
use super::state::ConnectionState;
use crate::bus::EventBus;
use crate::config::RealtimeConfig;
use crate::error::TransportError;
use crate::events::EventEnvelope;
use crate::session::SessionToken;
use crate::sse::FrameDecoder;
use crate::traits::{ByteStream, EventStreamTransport, StreamRequest};

/// Number of state transitions kept for inspection.
const STATE_HISTORY_CAPACITY: usize = 256;

type StateHistory = Arc<Mutex<VecDeque<ConnectionState>>>;

/// Handle to the running event stream of one session.
pub struct ConnectionManager {
    connection_id: Uuid,
    state_rx: watch::Receiver<ConnectionState>,
    history: StateHistory,
    failures: Arc<AtomicU32>,
    degraded_after: u32,
    shutdown_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionManager {
    /// Spawn the driver task. Must be called inside a tokio runtime.
    pub fn start(
        config: &RealtimeConfig,
        transport: Arc<dyn EventStreamTransport>,
        bus: EventBus,
        token: SessionToken,
    ) -> Self {
        let request = StreamRequest::new(token);
        let connection_id = request.connection_id;
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let history: StateHistory = Arc::new(Mutex::new(VecDeque::new()));
        let failures = Arc::new(AtomicU32::new(0));

        let driver = Driver {
            transport,
            bus,
            request,
            backoff: Backoff::new(config.backoff),
            idle_timeout: config.idle_timeout,
            connect_timeout: config.connect_timeout,
            degraded_after: config.degraded_after,
            state_tx,
            history: Arc::clone(&history),
            failures: Arc::clone(&failures),
            shutdown_rx,
        };

        let span = info_span!("event_stream", connection_id = %connection_id);
        let task = tokio::spawn(driver.run().instrument(span));

        Self {
            connection_id,
            state_rx,
            history,
            failures,
            degraded_after: config.degraded_after,
            shutdown_tx,
            task: Some(task),
        }
    }

    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Receiver that observes the current state.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    /// Every transition since start, oldest first.
    pub fn history(&self) -> Vec<ConnectionState> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Failures since the last successful connection.
    pub fn consecutive_failures(&self) -> u32 {
        self.failures.load(Ordering::SeqCst)
    }

    /// True once failures reach the configured ceiling.
    pub fn is_degraded(&self) -> bool {
        self.consecutive_failures() >= self.degraded_after
    }

    /// True once the driver task has exited (teardown or session ended).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map(JoinHandle::is_finished).unwrap_or(true)
    }

    /// Wait until the state satisfies `predicate` or the driver exits.
    pub async fn wait_for<F>(&self, predicate: F) -> ConnectionState
    where
        F: Fn(&ConnectionState) -> bool,
    {
        let mut rx = self.state_rx.clone();
        loop {
            let current = rx.borrow_and_update().clone();
            if predicate(&current) {
                return current;
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    }

    /// Stop the stream and wait for the driver to release it.
    pub async fn shutdown(mut self) {
        info!("Shutting down event stream {}", self.connection_id);
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Event stream task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // The driver also stops when the sender is dropped; this just makes
        // it prompt.
        let _ = self.shutdown_tx.send(true);
    }
}

/// How a connected stream ended.
enum StreamEnd {
    Shutdown,
    Expired,
    Closed,
    Failed(TransportError),
}

struct Driver {
    transport: Arc<dyn EventStreamTransport>,
    bus: EventBus,
    request: StreamRequest,
    backoff: Backoff,
    idle_timeout: Duration,
    connect_timeout: Duration,
    degraded_after: u32,
    state_tx: watch::Sender<ConnectionState>,
    history: StateHistory,
    failures: Arc<AtomicU32>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            if self.request.token.is_expired() {
                warn!("Session token expired, ending event stream");
                break;
            }

            self.set_state(ConnectionState::Connecting);
            let open = tokio::time::timeout(self.connect_timeout, self.transport.open(&self.request));
            let opened = tokio::select! {
                _ = wait_for_shutdown(&mut self.shutdown_rx) => break,
                result = open => {
                    result.unwrap_or_else(|_| {
                        Err(TransportError::ConnectionFailed(format!(
                            "no response within {:?}",
                            self.connect_timeout
                        )))
                    })
                }
            };

            match opened {
                Ok(stream) => {
                    info!("Event stream connected");
                    self.backoff.reset();
                    self.failures.store(0, Ordering::SeqCst);
                    self.set_state(ConnectionState::Connected);

                    match self.pump(stream).await {
                        StreamEnd::Shutdown => break,
                        StreamEnd::Expired => {
                            warn!("Session token expired while connected, ending event stream");
                            break;
                        }
                        StreamEnd::Closed => info!("Event stream closed by server"),
                        StreamEnd::Failed(e) => warn!("Event stream dropped: {}", e),
                    }
                }
                Err(e) if !e.should_reconnect() => {
                    error!("Event stream rejected ({}): {}, ending session", e.category(), e);
                    break;
                }
                Err(e) => warn!("Event stream connect failed: {}", e),
            }

            let failures = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
            if failures == self.degraded_after {
                error!(
                    "Event stream degraded after {} consecutive failures, still retrying",
                    failures
                );
            }

            let delay = self.backoff.next_delay();
            let attempt = self.backoff.attempt();
            info!("Reconnection attempt {}, waiting {:?}", attempt, delay);
            self.set_state(ConnectionState::Reconnecting { attempt, delay });

            tokio::select! {
                _ = wait_for_shutdown(&mut self.shutdown_rx) => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.set_state(ConnectionState::Disconnected);
        debug!("Event stream driver stopped");
    }

    /// Read the stream until it ends. The stream is dropped on return.
    async fn pump(&mut self, mut stream: ByteStream) -> StreamEnd {
        let mut decoder = FrameDecoder::resume_from(self.request.last_event_id.as_deref());
        let expires_at = self
            .request
            .token
            .time_until_expiry()
            .map(|left| Instant::now() + left);

        loop {
            let next = tokio::select! {
                _ = wait_for_shutdown(&mut self.shutdown_rx) => return StreamEnd::Shutdown,
                _ = wait_until(expires_at) => return StreamEnd::Expired,
                next = tokio::time::timeout(self.idle_timeout, stream.next()) => next,
            };

            let chunk = match next {
                Err(_) => {
                    return StreamEnd::Failed(TransportError::IdleTimeout {
                        secs: self.idle_timeout.as_secs(),
                    })
                }
                Ok(None) => return StreamEnd::Closed,
                Ok(Some(Err(e))) => return StreamEnd::Failed(e),
                Ok(Some(Ok(chunk))) => chunk,
            };

            for item in decoder.push(&chunk) {
                match item.and_then(|frame| EventEnvelope::from_frame(&frame)) {
                    Ok(envelope) if envelope.is_keepalive() => {
                        trace!("Keep-alive '{}'", envelope.name);
                    }
                    Ok(envelope) => {
                        debug!("Received '{}'", envelope.name);
                        self.bus.publish_envelope(&envelope);
                    }
                    Err(e) => warn!("Dropping malformed frame: {}", e),
                }
            }
            self.request.last_event_id = decoder.last_event_id().map(str::to_string);
        }
    }

    fn set_state(&self, state: ConnectionState) {
        trace!("Connection state -> {}", state);
        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            if history.len() == STATE_HISTORY_CAPACITY {
                history.pop_front();
            }
            history.push_back(state.clone());
        }
        self.state_tx.send_replace(state);
    }
}

/// Sleeps until `deadline`, or forever without one.
async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Resolves once teardown is requested or the manager handle is gone.
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
