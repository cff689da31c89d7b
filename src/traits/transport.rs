//! Event stream transport trait abstraction.
//!
//! The connection manager only needs "open a byte stream for this session";
//! the HTTP details live in [`ReqwestSseTransport`](crate::adapters::ReqwestSseTransport)
//! and tests swap in [`ScriptedTransport`](crate::adapters::mock::ScriptedTransport).

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use uuid::Uuid;

use crate::error::TransportError;
use crate::session::SessionToken;

/// Raw byte stream of an open event connection.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Parameters for one connection attempt.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Session credentials, sent as a bearer token
    pub token: SessionToken,
    /// Id of the last frame received on a previous connection
    pub last_event_id: Option<String>,
    /// Identifier of this manager instance, for log correlation
    pub connection_id: Uuid,
}

impl StreamRequest {
    pub fn new(token: SessionToken) -> Self {
        Self {
            token,
            last_event_id: None,
            connection_id: Uuid::new_v4(),
        }
    }
}

/// Opens the server event stream.
///
/// Dropping the returned stream must release the underlying connection.
#[async_trait]
pub trait EventStreamTransport: Send + Sync {
    /// Open a stream, resolving once the server has accepted it.
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream, TransportError>;
}
