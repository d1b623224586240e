//! Session orchestration: capture, transport and playback under one lifecycle
//!
//! The controller owns the audio devices and therefore stays on the thread
//! that created it; only the transport task crosses threads. Inbound events
//! are dispatched one at a time through [`pump`], so playback scheduling and
//! state transitions never race.
//!
//! [`pump`]: SessionController::pump

use std::sync::Arc;

use tokio::sync::watch;

use crate::audio::{CaptureSource, MicCapture, PlaybackScheduler};
use crate::config::Config;
use crate::memory::MemoryClient;
use crate::prompt;
use crate::session::transport::{
    GeminiConnector, LiveConnector, SessionTransport, StateMachine, Status, TransportEvent,
};
use crate::session::wire::{ClientMessage, ServerMessage, SessionSetup};
use crate::{Error, Result};

/// Orchestrates one voice session at a time
pub struct SessionController {
    config: Config,
    connector: Arc<dyn LiveConnector>,
    capture: Box<dyn CaptureSource>,
    scheduler: PlaybackScheduler,
    memory: MemoryClient,
    transport: Option<SessionTransport>,
    machine: StateMachine,
    status_tx: watch::Sender<Status>,
}

impl SessionController {
    /// Assemble a controller from explicit parts
    #[must_use]
    pub fn new(
        config: Config,
        connector: Arc<dyn LiveConnector>,
        capture: Box<dyn CaptureSource>,
        scheduler: PlaybackScheduler,
    ) -> Self {
        let memory = MemoryClient::new(&config);
        let (status_tx, _) = watch::channel(Status::Offline);

        Self {
            config,
            connector,
            capture,
            scheduler,
            memory,
            transport: None,
            machine: StateMachine::new(),
            status_tx,
        }
    }

    /// Controller wired to the default microphone, speaker and live endpoint
    ///
    /// # Errors
    ///
    /// Returns error if the output device cannot be initialized
    pub fn with_default_devices(config: Config) -> Result<Self> {
        let connector = Arc::new(GeminiConnector::new(config.clone()));
        let scheduler = PlaybackScheduler::new()?;
        Ok(Self::new(
            config,
            connector,
            Box::new(MicCapture::new()),
            scheduler,
        ))
    }

    /// Subscribe to coarse status changes
    #[must_use]
    pub fn status_watch(&self) -> watch::Receiver<Status> {
        self.status_tx.subscribe()
    }

    /// Current coarse status
    #[must_use]
    pub fn status(&self) -> Status {
        self.machine.projection()
    }

    /// Whether a session is currently open
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.transport.is_some()
    }

    /// Number of playback segments scheduled but not yet finished
    #[must_use]
    pub fn active_playback(&self) -> usize {
        self.scheduler.active_handles()
    }

    /// Start a session. A session already open is torn down first, so the
    /// call always ends in a fresh session or a clean failure.
    ///
    /// # Errors
    ///
    /// `CredentialMissing` without a model service credential,
    /// `DeviceUnavailable` on an insecure context or absent microphone,
    /// `ConnectionFailed` if the live endpoint cannot be reached. On any
    /// error all partially acquired resources are released.
    #[allow(clippy::future_not_send)]
    pub async fn start(&mut self) -> Result<()> {
        if let Err(e) = self.try_start().await {
            tracing::error!(error = %e, "session start failed");
            self.teardown().await;
            self.machine.on_error(e.to_string());
            self.publish_status();
            return Err(e);
        }
        Ok(())
    }

    #[allow(clippy::future_not_send)]
    async fn try_start(&mut self) -> Result<()> {
        if self.transport.is_some() {
            self.stop().await;
        }

        self.machine.on_start();
        self.publish_status();

        if self.config.gemini_api_key.is_none() {
            return Err(Error::CredentialMissing);
        }

        // Device acquisition is gated on transport security, before any
        // capture API is touched
        if !self.config.is_secure_context() {
            return Err(Error::DeviceUnavailable(format!(
                "insecure context: {} (wss, https or loopback required)",
                self.config.live_url
            )));
        }

        self.capture.acquire()?;
        self.scheduler.activate()?;

        let memories = self.memory.fetch().await;
        let instruction = prompt::build_instruction(&memories);
        let setup = SessionSetup::audio_session(&instruction);

        let transport = SessionTransport::open(self.connector.as_ref(), setup).await?;
        self.machine.on_open();
        self.publish_status();

        // The greeting hint must be on the queue before capture starts so it
        // precedes every audio frame on the wire
        let sender = transport.sender();
        sender
            .send(ClientMessage::text(prompt::GREETING_HINT))
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        self.capture.start(sender)?;
        self.machine.on_streaming();
        self.publish_status();

        self.transport = Some(transport);
        tracing::info!("session streaming");
        Ok(())
    }

    /// Stop the session and release every resource. Idempotent; never errors.
    #[allow(clippy::future_not_send)]
    pub async fn stop(&mut self) {
        let was_active = self.transport.is_some();
        if was_active {
            self.machine.on_stop();
            self.publish_status();
        }

        self.teardown().await;

        if was_active {
            self.machine.on_closed();
            tracing::info!("session stopped");
        }
        self.publish_status();
    }

    /// Stop when active, start otherwise
    ///
    /// # Errors
    ///
    /// Propagates [`start`] errors; stopping never errors
    ///
    /// [`start`]: Self::start
    #[allow(clippy::future_not_send)]
    pub async fn toggle(&mut self) -> Result<()> {
        if self.is_active() {
            self.stop().await;
            Ok(())
        } else {
            self.start().await
        }
    }

    async fn teardown(&mut self) {
        if let Some(transport) = self.transport.take() {
            transport.shutdown().await;
        }
        self.capture.stop();
        self.scheduler.on_interrupted();
        self.scheduler.release();
    }

    /// Process the next inbound event. Returns `false` once the session is
    /// over and there is nothing left to pump.
    #[allow(clippy::future_not_send)]
    pub async fn pump(&mut self) -> bool {
        let Some(transport) = self.transport.as_mut() else {
            return false;
        };

        match transport.next_event().await {
            Some(TransportEvent::Message(msg)) => {
                self.route_message(&msg);
                true
            }
            Some(TransportEvent::Closed) => {
                tracing::info!("remote closed the session");
                self.teardown().await;
                self.machine.on_closed();
                self.publish_status();
                false
            }
            Some(TransportEvent::Failed(reason)) => {
                tracing::error!(reason, "session failed");
                self.teardown().await;
                self.machine.on_error(reason);
                self.publish_status();
                false
            }
            None => {
                self.teardown().await;
                self.machine.on_closed();
                self.publish_status();
                false
            }
        }
    }

    /// Pump events until the session ends
    #[allow(clippy::future_not_send)]
    pub async fn drive(&mut self) {
        while self.pump().await {}
    }

    fn route_message(&mut self, msg: &ServerMessage) {
        // Audio is scheduled before the interruption check so a message
        // carrying both discards its own segment along with the backlog
        if let Some(envelope) = msg.audio() {
            match self.scheduler.on_frame_received(envelope) {
                Ok(()) => {
                    self.machine.on_frame();
                    self.publish_status();
                }
                Err(e) => {
                    // Malformed frames are skipped, the session keeps going
                    tracing::warn!(error = %e, "dropping malformed audio frame");
                }
            }
        }

        if msg.interrupted() {
            self.scheduler.on_interrupted();
            self.machine.on_interrupted();
            self.publish_status();
        }

        if msg.turn_complete() {
            tracing::debug!("model turn complete");
        }
    }

    fn publish_status(&self) {
        let status = self.machine.projection();
        self.status_tx.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                tracing::info!(%status, "status");
                *current = status;
                true
            }
        });
    }
}
