//! Microphone capture: fixed-size framing into encoded wire frames

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use tokio::sync::mpsc;

use crate::audio::codec::{self, CAPTURE_SAMPLE_RATE};
use crate::session::wire::ClientMessage;
use crate::{Error, Result};

/// Capture frame size in samples (256 ms at 16 kHz)
pub const FRAME_SAMPLES: usize = 4096;

/// Source of encoded capture frames.
///
/// Seam for substituting a synthetic source in tests and on hosts without
/// audio hardware.
pub trait CaptureSource {
    /// Acquire the input device without starting the stream
    ///
    /// # Errors
    ///
    /// `DeviceUnavailable` if the input API surface or device is absent
    fn acquire(&mut self) -> Result<()>;

    /// Start streaming frames into `sink`. Frames are fire-and-forget:
    /// if the sink is full they are dropped, never awaited.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` if the platform refuses the stream,
    /// `DeviceUnavailable` if the device disappeared since `acquire`
    fn start(&mut self, sink: mpsc::Sender<ClientMessage>) -> Result<()>;

    /// Detach from the device and release it; idempotent
    fn stop(&mut self);
}

/// Captures from the default input device at 16 kHz mono
pub struct MicCapture {
    device: Option<(Device, StreamConfig)>,
    stream: Option<Stream>,
}

impl MicCapture {
    /// Create an idle capture pipeline; the device is acquired on demand
    #[must_use]
    pub const fn new() -> Self {
        Self {
            device: None,
            stream: None,
        }
    }
}

impl Default for MicCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureSource for MicCapture {
    fn acquire(&mut self) -> Result<()> {
        if self.device.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();

        let device = host.default_input_device().ok_or_else(|| {
            Error::DeviceUnavailable("no input device available".to_string())
        })?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::DeviceUnavailable(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(CAPTURE_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(CAPTURE_SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable input config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(CAPTURE_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = CAPTURE_SAMPLE_RATE,
            "capture device acquired"
        );

        self.device = Some((device, config));
        Ok(())
    }

    fn start(&mut self, sink: mpsc::Sender<ClientMessage>) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let (device, config) = self
            .device
            .as_ref()
            .ok_or_else(|| Error::Audio("capture device not acquired".to_string()))?;

        // Accumulates callback buffers and drains full frames; the tail
        // shorter than a frame waits for the next callback.
        let mut pending: Vec<f32> = Vec::with_capacity(FRAME_SAMPLES * 2);

        let stream = device
            .build_input_stream(
                config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    pending.extend_from_slice(data);
                    while pending.len() >= FRAME_SAMPLES {
                        let frame: Vec<f32> = pending.drain(..FRAME_SAMPLES).collect();
                        let envelope = codec::encode(&frame);
                        if sink.try_send(ClientMessage::media(envelope)).is_err() {
                            tracing::trace!("outbound queue full, frame dropped");
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "capture stream error");
                },
                None,
            )
            .map_err(|e| match e {
                cpal::BuildStreamError::DeviceNotAvailable => {
                    Error::DeviceUnavailable("input device disappeared".to_string())
                }
                cpal::BuildStreamError::BackendSpecific { err } => {
                    // Platform permission refusals surface here
                    Error::PermissionDenied(err.to_string())
                }
                other => Error::Audio(other.to_string()),
            })?;

        stream.play().map_err(map_play_error)?;
        self.stream = Some(stream);

        tracing::debug!(frame_samples = FRAME_SAMPLES, "capture started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("capture stopped");
        }
        self.device = None;
    }
}

fn map_play_error(e: cpal::PlayStreamError) -> Error {
    match e {
        cpal::PlayStreamError::DeviceNotAvailable => {
            Error::DeviceUnavailable("input device disappeared".to_string())
        }
        // Platform permission refusals surface here
        cpal::PlayStreamError::BackendSpecific { err } => Error::PermissionDenied(err.to_string()),
    }
}
