//! Reqwest-based query fetcher.
//!
//! A key maps onto the REST API by position: string and number parts become
//! path segments, object parts become query parameters.
//! `["invoices", 3, {"status": "open"}]` is fetched as
//! `GET {base}/invoices/3?status=open`.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, RwLock, PoisonError};
use tracing::debug;

use crate::error::{classify_reqwest_error, FetchError, TransportError};
use crate::query::QueryKey;
use crate::session::SessionToken;
use crate::traits::QueryFetcher;

#[derive(Debug, Clone)]
pub struct ReqwestQueryFetcher {
    client: reqwest::Client,
    base_url: String,
    token: Arc<RwLock<Option<SessionToken>>>,
}

impl ReqwestQueryFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: Arc::new(RwLock::new(None)),
        }
    }

    /// Token sent with every request from now on; `None` stops sending one.
    pub fn set_token(&self, token: Option<SessionToken>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Full request URL for `key`.
    pub fn url_for(&self, key: &QueryKey) -> Result<String, FetchError> {
        if key.is_empty() {
            return Err(FetchError::UnroutableKey(key.to_string()));
        }

        let mut url = self.base_url.clone();
        let mut params: Vec<String> = Vec::new();
        for part in key.parts() {
            match part {
                Value::String(s) => {
                    url.push('/');
                    url.push_str(&urlencoding::encode(s));
                }
                Value::Number(n) => {
                    url.push('/');
                    url.push_str(&n.to_string());
                }
                Value::Object(fields) => {
                    for (name, value) in fields {
                        let value = match value {
                            Value::Null => continue,
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        params.push(format!(
                            "{}={}",
                            urlencoding::encode(name),
                            urlencoding::encode(&value)
                        ));
                    }
                }
                _ => return Err(FetchError::UnroutableKey(key.to_string())),
            }
        }

        if !params.is_empty() {
            url.push('?');
            url.push_str(&params.join("&"));
        }
        Ok(url)
    }
}

#[async_trait]
impl QueryFetcher for ReqwestQueryFetcher {
    async fn fetch(&self, key: &QueryKey) -> Result<Value, FetchError> {
        let url = self.url_for(key)?;
        let token = self
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut builder = self.client.get(&url);
        if let Some(token) = token {
            builder = builder.bearer_auth(token.secret());
        }

        debug!("GET {}", url);
        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::Transport(classify_reqwest_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TransportError::from_status(status.as_u16(), message).into());
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::InvalidBody(e.to_string()))
    }
}
