//! `hpbiz-realtime` - watch the HP-BIZ super-admin event stream.
//!
//! Connects with `HPBIZ_TOKEN`, logs every known server event, and keeps the
//! queries listed in `HPBIZ_WATCH_KEYS` fresh by refetching them whenever a
//! related event arrives.

use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use hpbiz_realtime::adapters::{ReqwestQueryFetcher, ReqwestSseTransport};
use hpbiz_realtime::bus::Subscription;
use hpbiz_realtime::config::RealtimeConfig;
use hpbiz_realtime::context::RealtimeContext;
use hpbiz_realtime::events::{default_invalidations, EventEnvelope, ServerEvent, KNOWN_EVENTS};
use hpbiz_realtime::hook::{EventHook, InvalidateScope};
use hpbiz_realtime::query::{QueryCache, QueryKey};
use hpbiz_realtime::session::SessionToken;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "hpbiz_realtime=info";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_target(false)
        .init();

    let config = RealtimeConfig::from_env().wrap_err("invalid HPBIZ_* configuration")?;
    let token = std::env::var("HPBIZ_TOKEN")
        .map(SessionToken::new)
        .map_err(|_| eyre!("HPBIZ_TOKEN is not set"))?;
    let watch_keys = parse_watch_keys(std::env::var("HPBIZ_WATCH_KEYS").ok().as_deref())?;

    let transport = Arc::new(ReqwestSseTransport::from_config(&config)?);
    let fetcher = Arc::new(ReqwestQueryFetcher::new(config.api_url_or_default()));
    fetcher.set_token(Some(token.clone()));

    let ctx = RealtimeContext::create(config, transport, fetcher)?;
    info!("Watching {}", ctx.config().events_url);

    let _loggers = log_known_events(&ctx);
    let _hooks: Vec<EventHook> = KNOWN_EVENTS
        .iter()
        .map(|name| {
            ctx.hook(*name)
                .invalidate_all(default_invalidations(name))
                .scope(InvalidateScope::Prefix)
                .mount()
        })
        .collect();
    let updates = tokio::spawn(log_cache_updates(ctx.cache().clone()));

    ctx.login(token).await;
    if let Some(mut state) = ctx.watch_state().await {
        tokio::spawn(async move {
            while state.changed().await.is_ok() {
                info!("Connection {}", *state.borrow());
            }
        });
    }

    for key in &watch_keys {
        match ctx.cache().fetch(key).await {
            Ok(_) => info!("Loaded {}", key),
            Err(e) => warn!("Initial load of {} failed: {}", key, e),
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, shutting down");
    ctx.dispose().await;
    updates.abort();
    Ok(())
}

/// `HPBIZ_WATCH_KEYS` is a JSON array of keys, e.g. `[["companies", 1], ["dashboard"]]`.
fn parse_watch_keys(raw: Option<&str>) -> Result<Vec<QueryKey>> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw)
            .wrap_err("HPBIZ_WATCH_KEYS must be a JSON array of keys"),
    }
}

fn log_known_events(ctx: &RealtimeContext) -> Vec<Subscription> {
    KNOWN_EVENTS
        .iter()
        .map(|name| {
            ctx.bus().subscribe(*name, move |payload| {
                let envelope = EventEnvelope::new(*name, payload.clone());
                match ServerEvent::from_envelope(&envelope) {
                    Ok(event) => info!("{}", describe(&event)),
                    Err(e) => warn!("{}", e),
                }
            })
        })
        .collect()
}

fn describe(event: &ServerEvent) -> String {
    match event {
        ServerEvent::CompanyListRefresh(p) => format!(
            "Company list changed ({} {})",
            p.action.as_deref().unwrap_or("update"),
            p.company_id.as_deref().unwrap_or("-")
        ),
        ServerEvent::Notification(p) => {
            format!("Notification [{:?}] {}: {}", p.level, p.title, p.message)
        }
        ServerEvent::FinanceUpdate(p) => format!(
            "Finance update: invoice {} {}",
            p.invoice_id.as_deref().unwrap_or("-"),
            p.status.as_deref().unwrap_or("")
        ),
        ServerEvent::PackageUpdate(p) => format!(
            "Package {} {}",
            p.package_id.as_deref().unwrap_or("-"),
            p.action.as_deref().unwrap_or("updated")
        ),
        ServerEvent::ActivityLogCreated(p) | ServerEvent::SystemLogCreated(p) => format!(
            "{}: {}",
            event.event_name(),
            p.message.as_deref().unwrap_or("")
        ),
        ServerEvent::DashboardRefresh(_) => "Dashboard refresh".to_string(),
        ServerEvent::Unknown(envelope) => format!("Unhandled event '{}'", envelope.name),
    }
}

async fn log_cache_updates(cache: QueryCache) {
    let mut updates = cache.subscribe_updates();
    loop {
        match updates.recv().await {
            Ok(key) => info!("Refreshed {}", key),
            Err(RecvError::Lagged(n)) => debug!("Missed {} cache notifications", n),
            Err(RecvError::Closed) => break,
        }
    }
}
