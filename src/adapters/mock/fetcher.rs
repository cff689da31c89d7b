//! Query fetcher returning configurable responses.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::FetchError;
use crate::query::QueryKey;
use crate::traits::QueryFetcher;

struct FetcherState {
    default: Result<Value, FetchError>,
    by_key: HashMap<QueryKey, Result<Value, FetchError>>,
    calls: HashMap<QueryKey, usize>,
}

/// Fetcher that answers every key with a fixed value and counts calls.
///
/// Counts are recorded when a fetch starts, so a slow fetch (see
/// [`StaticFetcher::with_delay`]) is visible as a call while still running.
#[derive(Clone)]
pub struct StaticFetcher {
    state: Arc<Mutex<FetcherState>>,
    delay: Option<Duration>,
}

impl StaticFetcher {
    pub fn new(response: Value) -> Self {
        Self {
            state: Arc::new(Mutex::new(FetcherState {
                default: Ok(response),
                by_key: HashMap::new(),
                calls: HashMap::new(),
            })),
            delay: None,
        }
    }

    /// Hold every fetch for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn lock(&self) -> MutexGuard<'_, FetcherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the answer for keys without a specific response.
    pub fn set_response(&self, response: Value) {
        self.lock().default = Ok(response);
    }

    /// Answer `key` with `response` from now on.
    pub fn set_response_for(&self, key: QueryKey, response: Value) {
        self.lock().by_key.insert(key, Ok(response));
    }

    /// Fail keys without a specific response.
    pub fn fail_with(&self, error: FetchError) {
        self.lock().default = Err(error);
    }

    pub fn calls_for(&self, key: &QueryKey) -> usize {
        self.lock().calls.get(key).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.lock().calls.values().sum()
    }
}

#[async_trait]
impl QueryFetcher for StaticFetcher {
    async fn fetch(&self, key: &QueryKey) -> Result<Value, FetchError> {
        *self.lock().calls.entry(key.clone()).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let state = self.lock();
        state.by_key.get(key).unwrap_or(&state.default).clone()
    }
}
