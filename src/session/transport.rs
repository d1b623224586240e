//! Duplex connection lifecycle and session state machine
//!
//! A single transport task owns the connection, serializing outbound sends
//! (so a greeting queued before capture starts is always on the wire before
//! the first audio frame) and forwarding inbound messages in arrival order
//! over a bounded channel.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite};

use crate::session::wire::{ClientMessage, ServerMessage, SessionSetup};
use crate::{Error, Result};

/// Outbound queue depth. Sends are fire-and-forget; frames beyond this are
/// dropped rather than applying back-pressure to the capture callback.
pub const OUTBOUND_QUEUE: usize = 32;

/// Inbound event queue depth
const EVENT_QUEUE: usize = 64;

/// Session lifecycle state, owned by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Streaming,
    Interrupted,
    Closing,
    Closed,
    Failed(String),
}

/// Coarse status projection exposed to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Online,
    Offline,
    Processing,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "ONLINE"),
            Self::Offline => write!(f, "OFFLINE"),
            Self::Processing => write!(f, "PROCESSING"),
        }
    }
}

impl SessionState {
    /// Derive the externally observable projection
    #[must_use]
    pub const fn projection(&self) -> Status {
        match self {
            Self::Connecting => Status::Processing,
            Self::Open | Self::Streaming | Self::Interrupted => Status::Online,
            Self::Idle | Self::Closing | Self::Closed | Self::Failed(_) => Status::Offline,
        }
    }
}

/// Session state machine.
///
/// ```text
/// Idle --start--> Connecting --open--> Open --audio wired--> Streaming
/// Streaming --interrupted--> Interrupted --next frame--> Streaming
/// Connecting|Open|Streaming|Interrupted --stop/remote close--> Closing --> Closed
/// any --error--> Failed(reason)
/// ```
#[derive(Debug)]
pub struct StateMachine {
    state: SessionState,
}

impl StateMachine {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    #[must_use]
    pub const fn projection(&self) -> Status {
        self.state.projection()
    }

    pub fn on_start(&mut self) {
        self.transition(SessionState::Connecting);
    }

    pub fn on_open(&mut self) {
        self.transition(SessionState::Open);
    }

    pub fn on_streaming(&mut self) {
        self.transition(SessionState::Streaming);
    }

    pub fn on_interrupted(&mut self) {
        if matches!(self.state, SessionState::Streaming | SessionState::Open) {
            self.transition(SessionState::Interrupted);
        }
    }

    /// An inbound audio frame resumes streaming after an interruption
    pub fn on_frame(&mut self) {
        if self.state == SessionState::Interrupted {
            self.transition(SessionState::Streaming);
        }
    }

    pub fn on_stop(&mut self) {
        if !matches!(
            self.state,
            SessionState::Idle | SessionState::Closed | SessionState::Failed(_)
        ) {
            self.transition(SessionState::Closing);
        }
    }

    pub fn on_closed(&mut self) {
        if !matches!(self.state, SessionState::Failed(_)) {
            self.transition(SessionState::Closed);
        }
    }

    pub fn on_error(&mut self, reason: impl Into<String>) {
        self.transition(SessionState::Failed(reason.into()));
    }

    fn transition(&mut self, next: SessionState) {
        if self.state != next {
            tracing::debug!(from = ?self.state, to = ?next, "session state");
            self.state = next;
        }
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// One open duplex stream to the model service
#[async_trait]
pub trait LiveStream: Send {
    /// Send one outbound message
    ///
    /// # Errors
    ///
    /// Returns error if the connection is broken or the message cannot be
    /// serialized
    async fn send(&mut self, msg: &ClientMessage) -> Result<()>;

    /// Receive the next inbound message. `None` means the remote closed;
    /// `Err(ProtocolError)` marks a malformed message the caller may skip.
    async fn recv(&mut self) -> Option<Result<ServerMessage>>;

    /// Close the stream; errors are the caller's to swallow
    ///
    /// # Errors
    ///
    /// Returns error if the close handshake fails
    async fn close(&mut self) -> Result<()>;
}

/// Opens duplex streams to the model service
#[async_trait]
pub trait LiveConnector: Send + Sync {
    /// Open one duplex stream
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` if the endpoint cannot be reached and
    /// `CredentialMissing` without a model service credential
    async fn connect(&self) -> Result<Box<dyn LiveStream>>;
}

/// WebSocket connector for the Gemini Live endpoint
pub struct GeminiConnector {
    config: crate::Config,
}

impl GeminiConnector {
    #[must_use]
    pub const fn new(config: crate::Config) -> Self {
        Self { config }
    }
}

#[async_trait]
impl LiveConnector for GeminiConnector {
    async fn connect(&self) -> Result<Box<dyn LiveStream>> {
        let endpoint = self.config.live_endpoint()?;
        let (stream, response) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        tracing::debug!(status = %response.status(), "websocket connected");
        Ok(Box::new(GeminiStream { inner: stream }))
    }
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

struct GeminiStream {
    inner: WsStream,
}

#[async_trait]
impl LiveStream for GeminiStream {
    async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        self.inner.send(tungstenite::Message::Text(json)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<ServerMessage>> {
        loop {
            let msg = match self.inner.next().await? {
                Ok(m) => m,
                Err(e) => return Some(Err(e.into())),
            };

            // The service emits JSON as both text and binary frames
            let parsed = match msg {
                tungstenite::Message::Text(text) => serde_json::from_str(&text),
                tungstenite::Message::Binary(bytes) => serde_json::from_slice(&bytes),
                tungstenite::Message::Close(frame) => {
                    tracing::debug!(?frame, "remote closed");
                    return None;
                }
                _ => continue,
            };

            return Some(
                parsed.map_err(|e| Error::ProtocolError(format!("malformed message: {e}"))),
            );
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close(None).await?;
        Ok(())
    }
}

/// Inbound event delivered to the session dispatcher
#[derive(Debug)]
pub enum TransportEvent {
    /// A parsed inbound message
    Message(ServerMessage),
    /// The remote closed the connection
    Closed,
    /// The connection failed; no automatic retry
    Failed(String),
}

/// Handle to a running transport task
pub struct SessionTransport {
    outbound_tx: mpsc::Sender<ClientMessage>,
    events_rx: mpsc::Receiver<TransportEvent>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl SessionTransport {
    /// Connect and send the session setup, then spawn the transport task
    ///
    /// # Errors
    ///
    /// Returns `ConnectionFailed` if the connection cannot be opened or the
    /// setup cannot be sent
    pub async fn open(connector: &dyn LiveConnector, setup: SessionSetup) -> Result<Self> {
        let mut stream = connector.connect().await?;
        stream
            .send(&ClientMessage::Setup(setup))
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);
        let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run_transport(stream, outbound_rx, events_tx, shutdown_rx));

        Ok(Self {
            outbound_tx,
            events_rx,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }

    /// Sender for the serialized outbound queue
    #[must_use]
    pub fn sender(&self) -> mpsc::Sender<ClientMessage> {
        self.outbound_tx.clone()
    }

    /// Next inbound event, in arrival order
    pub async fn next_event(&mut self) -> Option<TransportEvent> {
        self.events_rx.recv().await
    }

    /// Close the connection and wait for the task to finish.
    ///
    /// Close errors are swallowed inside the task; teardown always runs to
    /// completion.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        // Unblocks the task if it is parked on a full event queue
        self.events_rx.close();
        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "transport task join failed");
        }
    }
}

/// The transport task: serializes outbound sends, forwards inbound events
async fn run_transport(
    mut stream: Box<dyn LiveStream>,
    mut outbound_rx: mpsc::Receiver<ClientMessage>,
    events_tx: mpsc::Sender<TransportEvent>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => {
                if let Err(e) = stream.close().await {
                    tracing::debug!(error = %e, "close error ignored during teardown");
                }
                break;
            }

            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(msg) => {
                        if let Err(e) = stream.send(&msg).await {
                            tracing::warn!(error = %e, "outbound send failed");
                            let _ = events_tx.send(TransportEvent::Failed(e.to_string())).await;
                            break;
                        }
                    }
                    // Controller dropped its sender: treat as stop
                    None => {
                        if let Err(e) = stream.close().await {
                            tracing::debug!(error = %e, "close error ignored during teardown");
                        }
                        break;
                    }
                }
            }

            inbound = stream.recv() => {
                match inbound {
                    Some(Ok(msg)) => {
                        if events_tx.send(TransportEvent::Message(msg)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(Error::ProtocolError(e))) => {
                        // Malformed inbound messages never end the session
                        tracing::warn!(error = %e, "skipping malformed inbound message");
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "connection error");
                        let _ = events_tx.send(TransportEvent::Failed(e.to_string())).await;
                        break;
                    }
                    None => {
                        let _ = events_tx.send(TransportEvent::Closed).await;
                        break;
                    }
                }
            }
        }
    }

    tracing::debug!("transport task finished");
}
