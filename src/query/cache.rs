//! Query cache with coalesced refetching.
//!
//! At most one fetch per key is in flight at any time. Invalidations and
//! `fetch` calls that arrive while it runs join it instead of starting a
//! second network round-trip.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::key::QueryKey;
use crate::error::FetchError;
use crate::traits::QueryFetcher;

type SharedFetch = Shared<BoxFuture<'static, Result<Value, FetchError>>>;

/// Capacity of the refresh notification channel.
const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// Cached value of one query.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub data: Option<Value>,
    pub stale: bool,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_error: Option<FetchError>,
}

impl CacheEntry {
    fn empty() -> Self {
        Self {
            data: None,
            stale: true,
            updated_at: None,
            last_error: None,
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, CacheEntry>,
    inflight: HashMap<QueryKey, SharedFetch>,
}

struct CacheInner {
    state: Mutex<CacheState>,
    fetcher: Arc<dyn QueryFetcher>,
    updates: broadcast::Sender<QueryKey>,
}

impl CacheInner {
    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn complete(&self, key: &QueryKey, result: &Result<Value, FetchError>) {
        let mut state = self.lock();
        state.inflight.remove(key);
        let Some(entry) = state.entries.get_mut(key) else {
            debug!("{} was removed while fetching, result not cached", key);
            return;
        };
        match result {
            Ok(data) => {
                entry.data = Some(data.clone());
                entry.stale = false;
                entry.updated_at = Some(Utc::now());
                entry.last_error = None;
            }
            Err(e) => {
                warn!("Refetch of {} failed: {}", key, e);
                entry.stale = true;
                entry.last_error = Some(e.clone());
            }
        }
        drop(state);

        if result.is_ok() {
            // No receivers is fine
            let _ = self.updates.send(key.clone());
        }
    }
}

/// Clears the in-flight marker of a fetch that ends without completing,
/// e.g. when the fetcher panics or the runtime drops the task.
struct InflightGuard {
    inner: Arc<CacheInner>,
    key: QueryKey,
    armed: bool,
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        if self.armed {
            warn!("Fetch of {} ended without a result", self.key);
            self.inner.lock().inflight.remove(&self.key);
        }
    }
}

/// Client-side cache of query results keyed by [`QueryKey`].
///
/// Cheap to clone; clones share the same entries.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<CacheInner>,
}

impl QueryCache {
    pub fn new(fetcher: Arc<dyn QueryFetcher>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState::default()),
                fetcher,
                updates,
            }),
        }
    }

    /// Return fresh cached data, or join/start the single fetch for `key`.
    ///
    /// The fetch runs as its own task, so cancelling this call does not stop
    /// it and later invalidations of `key` are not blocked by it.
    pub async fn fetch(&self, key: &QueryKey) -> Result<Value, FetchError> {
        let pending = {
            let mut state = self.inner.lock();
            if let Some(CacheEntry {
                data: Some(data),
                stale: false,
                ..
            }) = state.entries.get(key)
            {
                return Ok(data.clone());
            }
            state.entries.entry(key.clone()).or_insert_with(CacheEntry::empty);
            self.start_fetch(key, &mut state).map(|(pending, _)| pending)
        };

        match pending {
            Some(pending) => pending.await,
            None => {
                // No tokio runtime to spawn on; the caller drives the fetch
                let result = self.inner.fetcher.fetch(key).await;
                self.inner.complete(key, &result);
                result
            }
        }
    }

    /// Mark `key` stale and refetch it if it is cached.
    ///
    /// Keys that were never fetched have no consumer and are left alone; the
    /// first `fetch` loads them. If a refetch is already running the request
    /// joins it.
    pub fn invalidate(&self, key: &QueryKey) {
        let mut state = self.inner.lock();
        let Some(entry) = state.entries.get_mut(key) else {
            debug!("Invalidate {}: not cached, nothing to refetch", key);
            return;
        };
        entry.stale = true;
        self.refetch_locked(key, &mut state);
    }

    /// Invalidate every cached key that starts with `prefix`.
    /// Returns how many keys were marked stale.
    pub fn invalidate_prefix(&self, prefix: &QueryKey) -> usize {
        let mut state = self.inner.lock();
        let matching: Vec<QueryKey> = state
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &matching {
            if let Some(entry) = state.entries.get_mut(key) {
                entry.stale = true;
            }
            self.refetch_locked(key, &mut state);
        }
        matching.len()
    }

    fn refetch_locked(&self, key: &QueryKey, state: &mut CacheState) {
        match self.start_fetch(key, state) {
            Some((_, true)) => debug!("Refetching {}", key),
            Some((_, false)) => debug!("Refetch of {} already in flight, coalesced", key),
            None => warn!("No async runtime; {} stays stale until the next fetch", key),
        }
    }

    /// Join the in-flight fetch for `key` or spawn a new one.
    ///
    /// Returns the shared fetch and whether it was just spawned, or `None`
    /// outside a tokio runtime.
    fn start_fetch(
        &self,
        key: &QueryKey,
        state: &mut CacheState,
    ) -> Option<(SharedFetch, bool)> {
        if let Some(pending) = state.inflight.get(key) {
            return Some((pending.clone(), false));
        }
        let handle = tokio::runtime::Handle::try_current().ok()?;

        let inner = Arc::clone(&self.inner);
        let owned_key = key.clone();
        let task = handle.spawn(async move {
            let mut guard = InflightGuard {
                inner: Arc::clone(&inner),
                key: owned_key,
                armed: true,
            };
            let result = inner.fetcher.fetch(&guard.key).await;
            guard.armed = false;
            inner.complete(&guard.key, &result);
            result
        });

        let pending = async move {
            task.await
                .unwrap_or_else(|e| Err(FetchError::Aborted(e.to_string())))
        }
        .boxed()
        .shared();

        state.inflight.insert(key.clone(), pending.clone());
        Some((pending, true))
    }

    /// Wait for the in-flight fetch of `key`, if any.
    pub async fn settled(&self, key: &QueryKey) {
        let pending = self.inner.lock().inflight.get(key).cloned();
        if let Some(pending) = pending {
            let _ = pending.await;
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        self.inner.lock().entries.get(key).and_then(|e| e.data.clone())
    }

    pub fn entry(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Seed or overwrite data for `key`, e.g. after a mutation response.
    pub fn set_data(&self, key: QueryKey, data: Value) {
        let mut state = self.inner.lock();
        let entry = state.entries.entry(key).or_insert_with(CacheEntry::empty);
        entry.data = Some(data);
        entry.stale = false;
        entry.updated_at = Some(Utc::now());
        entry.last_error = None;
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.inner
            .lock()
            .entries
            .get(key)
            .map(|e| e.stale)
            .unwrap_or(true)
    }

    pub fn is_fetching(&self, key: &QueryKey) -> bool {
        self.inner.lock().inflight.contains_key(key)
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// Drop the entry for `key`. A fetch already running for it finishes but
    /// does not re-create the entry.
    pub fn remove(&self, key: &QueryKey) -> Option<CacheEntry> {
        self.inner.lock().entries.remove(key)
    }

    /// Drop every entry. Fetches already running finish but their results
    /// are not cached.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys whose data was refreshed, in completion order.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<QueryKey> {
        self.inner.updates.subscribe()
    }
}
