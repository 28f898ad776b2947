// src/connectors/subscription.rs
use crate::connectors::backoff::BackoffPolicy;
use crate::connectors::messages::{decode_frame, SubscribeRequest};
use crate::types::{ConnectionState, StreamEvent};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, protocol::Message},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid stream url: {0}")]
    Url(#[from] url::ParseError),
    #[error("unsupported url scheme: {0}")]
    Scheme(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("failed to send frame: {0}")]
    Send(String),
    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("connection closed by server")]
    ConnectionClosed,
}

/// Why a session ended on purpose rather than by failure.
enum SessionEnd {
    Cancelled,
    ConsumerGone,
}

struct ActiveConnection {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owns the single logical stream connection.
///
/// At most one connection task runs at a time: connect() while one is
/// live is a no-op, disconnect() while idle is a no-op. Decoded events
/// come out of one bounded channel in arrival order; connectivity is
/// published on a watch channel.
pub struct SubscriptionManager {
    url: String,
    topics: Vec<String>,
    backoff: BackoffPolicy,
    scope: CancellationToken,
    event_tx: mpsc::Sender<StreamEvent>,
    events: Option<mpsc::Receiver<StreamEvent>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    active: Option<ActiveConnection>,
}

impl SubscriptionManager {
    pub fn new(
        url: String,
        topics: Vec<String>,
        backoff: BackoffPolicy,
        scope: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (state_tx, _) = watch::channel(ConnectionState::default());
        Self {
            url,
            topics,
            backoff,
            scope,
            event_tx,
            events: Some(event_rx),
            state_tx: Arc::new(state_tx),
            active: None,
        }
    }

    /// The single consumer end of the event channel. Second call yields
    /// None.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<StreamEvent>> {
        self.events.take()
    }

    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Starts the connection task unless one is already running.
    /// Returns whether a new task was started.
    pub fn connect(&mut self) -> bool {
        if let Some(active) = &self.active {
            if !active.task.is_finished() && !active.cancel.is_cancelled() {
                debug!("connect() ignored, stream already running");
                return false;
            }
        }

        let cancel = self.scope.child_token();
        let task = ConnectionTask {
            url: self.url.clone(),
            topics: self.topics.clone(),
            backoff: self.backoff.clone(),
            event_tx: self.event_tx.clone(),
            state_tx: Arc::clone(&self.state_tx),
            cancel: cancel.clone(),
        };
        let handle = tokio::spawn(task.run());
        self.active = Some(ActiveConnection {
            cancel,
            task: handle,
        });
        true
    }

    /// Stops the connection task and waits for it to finish. Safe to
    /// call when nothing is running.
    pub async fn disconnect(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            if let Err(e) = active.task.await {
                warn!("Stream task ended abnormally: {}", e);
            }
            self.state_tx.send_replace(ConnectionState::Disconnected);
        }
    }
}

/// One spawned connection loop: connect, subscribe, pump frames, and on
/// failure wait out the backoff and try again.
struct ConnectionTask {
    url: String,
    topics: Vec<String>,
    backoff: BackoffPolicy,
    event_tx: mpsc::Sender<StreamEvent>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
}

impl ConnectionTask {
    async fn run(mut self) {
        loop {
            if self.cancel.is_cancelled() {
                self.state_tx.send_replace(ConnectionState::Disconnected);
                return;
            }

            self.state_tx.send_replace(ConnectionState::Connecting);

            match self.connect_and_run().await {
                Ok(SessionEnd::Cancelled) => {
                    self.state_tx.send_replace(ConnectionState::Disconnected);
                    return;
                }
                Ok(SessionEnd::ConsumerGone) => {
                    debug!("Event consumer dropped, stopping stream");
                    self.state_tx.send_replace(ConnectionState::Disconnected);
                    return;
                }
                Err(e) => {
                    warn!("Stream connection lost: {}", e);
                    self.state_tx.send_replace(ConnectionState::Disconnected);
                }
            }

            match self.backoff.next_delay() {
                Some(delay) => {
                    info!(
                        attempt = self.backoff.attempt_count(),
                        delay_ms = delay.as_millis() as u64,
                        "Reconnecting to stream"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => {
                    error!("Reconnect attempts exhausted, stream stays down");
                    return;
                }
            }
        }
    }

    async fn connect_and_run(&mut self) -> Result<SessionEnd, StreamError> {
        let url = Url::parse(&self.url)?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => return Err(StreamError::Scheme(other.to_string())),
        }

        let (ws_stream, _) = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(SessionEnd::Cancelled),
            connected = connect_async(url.as_str()) => connected?,
        };
        info!("Connected to stream at {}", self.url);

        let (mut write, read) = ws_stream.split();
        self.send_subscribe(&mut write).await?;
        self.state_tx.send_replace(ConnectionState::Connected);
        self.backoff.reset();

        self.run_session(read, write).await
    }

    async fn send_subscribe<W>(&self, write: &mut W) -> Result<(), StreamError>
    where
        W: Sink<Message> + Unpin,
        W::Error: std::fmt::Display,
    {
        let request = SubscribeRequest::new(&self.topics);
        let raw = serde_json::to_string(&request)?;
        write
            .send(Message::Text(raw))
            .await
            .map_err(|e| StreamError::Send(e.to_string()))?;
        Ok(())
    }

    /// Pumps frames until the session ends. Binary frames carry the same
    /// JSON envelopes as text; malformed payloads are dropped with a log
    /// line and the connection stays up.
    async fn run_session<R, W>(&self, mut read: R, mut write: W) -> Result<SessionEnd, StreamError>
    where
        R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
        W: Sink<Message> + Unpin,
        W::Error: std::fmt::Display,
    {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(SessionEnd::Cancelled),
                frame = read.next() => match frame {
                    Some(Ok(message @ (Message::Text(_) | Message::Binary(_)))) => {
                        match message.to_text() {
                            Ok(raw) => match decode_frame(raw) {
                                Ok(event) => {
                                    if self.event_tx.send(event).await.is_err() {
                                        return Ok(SessionEnd::ConsumerGone);
                                    }
                                }
                                Err(e) => warn!("Dropping malformed frame: {}", e),
                            },
                            Err(e) => warn!("Dropping non-UTF-8 frame: {}", e),
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        write
                            .send(Message::Pong(payload))
                            .await
                            .map_err(|e| StreamError::Send(e.to_string()))?;
                    }
                    Some(Ok(Message::Close(_))) => return Err(StreamError::ConnectionClosed),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(StreamError::ConnectionClosed),
                },
            }
        }
    }
}
