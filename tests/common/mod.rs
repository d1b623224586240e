//! Shared fakes for session tests: scripted connector, recording stream
//! and a probe capture source.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use luna_voice::Result;
use luna_voice::audio::{CaptureSource, PlaybackScheduler, codec};
use luna_voice::session::wire::{ClientMessage, ServerMessage};
use luna_voice::session::{LiveConnector, LiveStream, SessionController};
use luna_voice::{Config, Error};

/// Stream that records outbound messages and replays scripted inbound ones
pub struct FakeStream {
    sent: Arc<Mutex<Vec<ClientMessage>>>,
    inbound_rx: mpsc::Receiver<ServerMessage>,
    closed: Arc<AtomicBool>,
}

#[async_trait]
impl LiveStream for FakeStream {
    async fn send(&mut self, msg: &ClientMessage) -> Result<()> {
        self.sent.lock().unwrap().push(msg.clone());
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<ServerMessage>> {
        self.inbound_rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector holding one prepared stream
pub struct FakeConnector {
    stream: Mutex<Option<FakeStream>>,
}

#[async_trait]
impl LiveConnector for FakeConnector {
    async fn connect(&self) -> Result<Box<dyn LiveStream>> {
        let stream = self
            .stream
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| Error::ConnectionFailed("no scripted stream left".to_string()))?;
        Ok(Box::new(stream))
    }
}

/// Observable state of the fake capture source
#[derive(Clone, Default)]
pub struct CaptureProbe {
    pub acquired: Arc<AtomicBool>,
    pub started: Arc<AtomicBool>,
    pub stop_calls: Arc<AtomicUsize>,
    pub sink: Arc<Mutex<Option<mpsc::Sender<ClientMessage>>>>,
}

impl CaptureProbe {
    pub fn was_acquired(&self) -> bool {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    /// Push one encoded frame through the capture sink, as the device would
    pub fn emit_frame(&self, samples: &[f32]) {
        let sink = self.sink.lock().unwrap();
        let sink = sink.as_ref().expect("capture not started");
        sink.try_send(ClientMessage::media(codec::encode(samples)))
            .expect("outbound queue full");
    }
}

struct FakeCapture {
    probe: CaptureProbe,
}

impl CaptureSource for FakeCapture {
    fn acquire(&mut self) -> Result<()> {
        self.probe.acquired.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn start(&mut self, sink: mpsc::Sender<ClientMessage>) -> Result<()> {
        self.probe.started.store(true, Ordering::SeqCst);
        *self.probe.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        self.probe.started.store(false, Ordering::SeqCst);
        self.probe.stop_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// A controller wired to fakes, plus handles to observe and script it
pub struct Harness {
    pub controller: SessionController,
    pub capture: CaptureProbe,
    pub sent: Arc<Mutex<Vec<ClientMessage>>>,
    pub inbound: mpsc::Sender<ServerMessage>,
    pub stream_closed: Arc<AtomicBool>,
}

impl Harness {
    pub fn new(config: Config) -> Self {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        let (inbound_tx, inbound_rx) = mpsc::channel(64);

        let connector = Arc::new(FakeConnector {
            stream: Mutex::new(Some(FakeStream {
                sent: Arc::clone(&sent),
                inbound_rx,
                closed: Arc::clone(&closed),
            })),
        });

        let capture = CaptureProbe::default();
        let controller = SessionController::new(
            config,
            connector,
            Box::new(FakeCapture {
                probe: capture.clone(),
            }),
            PlaybackScheduler::detached(),
        );

        Self {
            controller,
            capture,
            sent,
            inbound: inbound_tx,
            stream_closed: closed,
        }
    }

    pub fn sent_messages(&self) -> Vec<ClientMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// Wait until the transport task has flushed `count` outbound messages
    pub async fn wait_for_sent(&self, count: usize) {
        for _ in 0..200 {
            if self.sent.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!(
            "expected {count} sent messages, got {}",
            self.sent.lock().unwrap().len()
        );
    }
}

/// Config pointing at a secure endpoint with both credentials set locally
pub fn test_config() -> Config {
    Config {
        gemini_api_key: Some("test-key".to_string()),
        mem0_api_key: None,
        live_url: "wss://live.example.test/session".to_string(),
        memory_url: "https://memory.example.test/v1".to_string(),
    }
}

/// Inbound message carrying one encoded audio segment
pub fn audio_message(samples: &[f32]) -> ServerMessage {
    let envelope = codec::encode(samples);
    serde_json::from_value(serde_json::json!({
        "serverContent": {
            "modelTurn": {
                "parts": [{"inlineData": {"data": envelope.data, "mimeType": "audio/pcm;rate=24000"}}]
            }
        }
    }))
    .unwrap()
}

/// Inbound message signaling the model's turn was interrupted
pub fn interrupted_message() -> ServerMessage {
    serde_json::from_value(serde_json::json!({
        "serverContent": {"interrupted": true}
    }))
    .unwrap()
}

/// Inbound message carrying an audio segment and the interruption signal at
/// the same time
pub fn audio_with_interrupt_message(samples: &[f32]) -> ServerMessage {
    let envelope = codec::encode(samples);
    serde_json::from_value(serde_json::json!({
        "serverContent": {
            "modelTurn": {
                "parts": [{"inlineData": {"data": envelope.data, "mimeType": "audio/pcm;rate=24000"}}]
            },
            "interrupted": true
        }
    }))
    .unwrap()
}
