//! Scripted event stream transport for testing.
//!
//! Each call to `open` consumes the next scripted outcome. Once the script
//! is exhausted every further attempt fails with a connection error, which
//! keeps a manager cycling through its backoff.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::traits::{ByteStream, EventStreamTransport, StreamRequest};

/// Outcome of one scripted connection attempt.
pub enum ScriptedOpen {
    /// `open` fails with this error.
    Fail(TransportError),
    /// The stream yields these chunks and then ends.
    Chunks(Vec<Bytes>),
    /// The stream yields these chunks and then stays open without data.
    ChunksThenIdle(Vec<Bytes>),
    /// The stream yields whatever is pushed through the paired [`StreamFeed`].
    Feed(mpsc::UnboundedReceiver<Result<Bytes, TransportError>>),
}

impl ScriptedOpen {
    /// Stream that delivers `frames` verbatim and ends.
    pub fn frames(frames: &[&str]) -> Self {
        ScriptedOpen::Chunks(frames.iter().map(|f| Bytes::from(f.to_string())).collect())
    }
}

/// Sender half of a [`ScriptedOpen::Feed`] stream.
///
/// Dropping the feed ends the stream, which the manager sees as a server
/// close.
#[derive(Clone)]
pub struct StreamFeed {
    tx: mpsc::UnboundedSender<Result<Bytes, TransportError>>,
}

impl StreamFeed {
    /// Push raw bytes. Returns false once the stream has been dropped.
    pub fn send(&self, chunk: impl Into<Bytes>) -> bool {
        self.tx.send(Ok(chunk.into())).is_ok()
    }

    /// Push a complete named frame.
    pub fn send_event(&self, name: &str, data: &str) -> bool {
        self.send(format!("event: {}\ndata: {}\n\n", name, data))
    }

    /// Fail the stream mid-flight.
    pub fn fail(&self, error: TransportError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }

    /// True once the receiving stream has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Default)]
struct ScriptState {
    script: VecDeque<ScriptedOpen>,
    requests: Vec<StreamRequest>,
}

/// Event stream transport driven by a queue of [`ScriptedOpen`] outcomes.
///
/// # Example
///
/// ```ignore
/// let transport = ScriptedTransport::new();
/// transport.push(ScriptedOpen::Fail(TransportError::ConnectionFailed("down".into())));
/// let feed = transport.push_feed();
///
/// let manager = ConnectionManager::start(&config, Arc::new(transport.clone()), bus, token);
/// feed.send_event("sa_dashboard_refresh", "{}");
/// ```
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
    live_streams: Arc<AtomicUsize>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the outcome of the next unscripted attempt.
    pub fn push(&self, outcome: ScriptedOpen) {
        self.lock().script.push_back(outcome);
    }

    /// Queue a stream fed through the returned handle.
    pub fn push_feed(&self) -> StreamFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(ScriptedOpen::Feed(rx));
        StreamFeed { tx }
    }

    /// Every request passed to `open`, in order.
    pub fn requests(&self) -> Vec<StreamRequest> {
        self.lock().requests.clone()
    }

    pub fn open_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Streams handed out and not yet dropped.
    pub fn live_streams(&self) -> usize {
        self.live_streams.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventStreamTransport for ScriptedTransport {
    async fn open(&self, request: &StreamRequest) -> Result<ByteStream, TransportError> {
        let outcome = {
            let mut state = self.lock();
            state.requests.push(request.clone());
            state.script.pop_front()
        };

        let inner: ByteStream = match outcome {
            None => {
                return Err(TransportError::ConnectionFailed(
                    "no scripted stream left".to_string(),
                ))
            }
            Some(ScriptedOpen::Fail(error)) => return Err(error),
            Some(ScriptedOpen::Chunks(chunks)) => {
                Box::pin(stream::iter(chunks.into_iter().map(Ok)))
            }
            Some(ScriptedOpen::ChunksThenIdle(chunks)) => Box::pin(
                stream::iter(chunks.into_iter().map(Ok)).chain(stream::pending()),
            ),
            Some(ScriptedOpen::Feed(rx)) => Box::pin(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })),
        };

        self.live_streams.fetch_add(1, Ordering::SeqCst);
        Ok(Box::pin(TrackedStream {
            inner,
            live: Arc::clone(&self.live_streams),
        }))
    }
}

/// Decrements the live-stream count when dropped.
struct TrackedStream {
    inner: ByteStream,
    live: Arc<AtomicUsize>,
}

impl Stream for TrackedStream {
    type Item = Result<Bytes, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.as_mut().poll_next(cx)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionToken;

    #[tokio::test]
    async fn test_script_order_and_exhaustion() {
        let transport = ScriptedTransport::new();
        transport.push(ScriptedOpen::Fail(TransportError::Unauthorized { status: 401 }));
        transport.push(ScriptedOpen::frames(&["data: {}\n\n"]));
        let request = StreamRequest::new(SessionToken::new("t"));

        assert!(matches!(
            transport.open(&request).await,
            Err(TransportError::Unauthorized { status: 401 })
        ));

        let mut stream = transport.open(&request).await.unwrap();
        assert_eq!(transport.live_streams(), 1);
        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from("data: {}\n\n"));
        assert!(stream.next().await.is_none());
        drop(stream);
        assert_eq!(transport.live_streams(), 0);

        assert!(matches!(
            transport.open(&request).await,
            Err(TransportError::ConnectionFailed(_))
        ));
        assert_eq!(transport.open_count(), 3);
    }

    #[tokio::test]
    async fn test_feed_closes_with_stream() {
        let transport = ScriptedTransport::new();
        let feed = transport.push_feed();
        let stream = transport
            .open(&StreamRequest::new(SessionToken::new("t")))
            .await
            .unwrap();
        assert!(!feed.is_closed());
        drop(stream);
        assert!(feed.is_closed());
        assert!(!feed.send("data: late\n\n"));
    }
}
