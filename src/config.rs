//! Realtime configuration.
//!
//! Defaults are the values the dashboard ships with. Each field can be
//! overridden with a `with_*` builder or through `HPBIZ_*` environment
//! variables.
//!
//! # Example
//!
//! ```ignore
//! use hpbiz_realtime::config::RealtimeConfig;
//!
//! let config = RealtimeConfig::from_env()?
//!     .with_idle_timeout(Duration::from_secs(90));
//! config.validate()?;
//! ```

use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_EVENTS_URL: &str = "http://127.0.0.1:8000/api/sa/events";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api/sa";
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_DEGRADED_AFTER: u32 = 5;

/// Reconnect delay policy: `initial * factor^(attempt-1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub factor: f64,
    pub max: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: DEFAULT_INITIAL_BACKOFF,
            factor: DEFAULT_BACKOFF_FACTOR,
            max: DEFAULT_MAX_BACKOFF,
        }
    }
}

impl BackoffPolicy {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial.is_zero() {
            return Err(ConfigError::Zero { field: "initial backoff" });
        }
        if self.max < self.initial {
            return Err(ConfigError::BackoffRange);
        }
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(ConfigError::InvalidFactor(self.factor));
        }
        Ok(())
    }
}

/// Configuration for the realtime context and its connection manager.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// SSE endpoint
    pub events_url: String,
    /// REST base URL used by the reqwest query fetcher
    pub api_url: Option<String>,
    pub backoff: BackoffPolicy,
    /// Reconnect when no bytes arrive for this long
    pub idle_timeout: Duration,
    /// Timeout for establishing the stream
    pub connect_timeout: Duration,
    /// Consecutive failures before the connection is reported degraded
    pub degraded_after: u32,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            events_url: DEFAULT_EVENTS_URL.to_string(),
            api_url: None,
            backoff: BackoffPolicy::default(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            degraded_after: DEFAULT_DEGRADED_AFTER,
        }
    }
}

impl RealtimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read overrides through `lookup`; missing variables keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("HPBIZ_EVENTS_URL") {
            config.events_url = url;
        }
        if let Some(url) = lookup("HPBIZ_API_URL") {
            config.api_url = Some(url);
        }
        if let Some(secs) = parse_u64(&lookup, "HPBIZ_IDLE_TIMEOUT_SECS")? {
            config.idle_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = parse_u64(&lookup, "HPBIZ_INITIAL_BACKOFF_MS")? {
            config.backoff.initial = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_u64(&lookup, "HPBIZ_MAX_BACKOFF_SECS")? {
            config.backoff.max = Duration::from_secs(secs);
        }
        if let Some(n) = parse_u64(&lookup, "HPBIZ_DEGRADED_AFTER")? {
            config.degraded_after = u32::try_from(n).map_err(|e| ConfigError::Invalid {
                name: "HPBIZ_DEGRADED_AFTER",
                message: e.to_string(),
            })?;
        }

        Ok(config)
    }

    pub fn with_events_url(mut self, url: impl Into<String>) -> Self {
        self.events_url = url.into();
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_degraded_after(mut self, failures: u32) -> Self {
        self.degraded_after = failures;
        self
    }

    /// REST base URL, falling back to [`DEFAULT_API_URL`].
    pub fn api_url_or_default(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.events_url.is_empty() {
            return Err(ConfigError::Missing("events_url"));
        }
        self.backoff.validate()?;
        if self.idle_timeout.is_zero() {
            return Err(ConfigError::Zero { field: "idle_timeout" });
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::Zero { field: "connect_timeout" });
        }
        if self.degraded_after == 0 {
            return Err(ConfigError::Zero { field: "degraded_after" });
        }
        Ok(())
    }
}

fn parse_u64<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                name,
                message: e.to_string(),
            }),
    }
}
