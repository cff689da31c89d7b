//! Reqwest-based event stream transport.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CACHE_CONTROL};
use std::time::Duration;
use tracing::debug;

use crate::config::RealtimeConfig;
use crate::error::{classify_reqwest_error, TransportError};
use crate::traits::{ByteStream, EventStreamTransport, StreamRequest};

const LAST_EVENT_ID: &str = "Last-Event-ID";

/// Opens the server event stream with a `GET` carrying the bearer token.
///
/// # Example
///
/// ```ignore
/// use hpbiz_realtime::adapters::ReqwestSseTransport;
///
/// let transport = ReqwestSseTransport::from_config(&config)?;
/// let stream = transport.open(&StreamRequest::new(token)).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestSseTransport {
    client: reqwest::Client,
    url: String,
}

impl ReqwestSseTransport {
    /// Build a transport with its own client. Only the connect phase is
    /// bounded; the stream itself is long-lived.
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| classify_reqwest_error(&e))?;
        Ok(Self::with_client(client, url))
    }

    pub fn from_config(config: &RealtimeConfig) -> Result<Self, TransportError> {
        Self::new(config.events_url.clone(), config.connect_timeout)
    }

    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl EventStreamTransport for ReqwestSseTransport {
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream, TransportError> {
        let mut builder = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .header(AUTHORIZATION, request.token.bearer());
        if let Some(id) = &request.last_event_id {
            builder = builder.header(LAST_EVENT_ID, id.as_str());
        }

        debug!("Opening event stream {}", self.url);
        let response = builder.send().await.map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::from_status(status.as_u16(), message));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| classify_reqwest_error(&e)));
        Ok(Box::pin(stream))
    }
}
