//! Gapless, interruptible playback of decoded model audio
//!
//! Incoming frames are scheduled against a monotonic cursor measured in
//! output samples: each new segment starts at the previous segment's
//! intended end rather than its own arrival time, so playback stays gapless
//! under network jitter. Interruption stops everything instantly and
//! re-bases the cursor at the device clock.

use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};

use crate::audio::codec::{self, EncodedEnvelope, PLAYBACK_SAMPLE_RATE};
use crate::{Error, Result};

/// One scheduled-but-not-yet-finished decoded segment
struct PlaybackHandle {
    /// Device-clock sample at which this segment begins
    start: u64,
    samples: Vec<f32>,
    /// Samples already rendered
    pos: usize,
}

impl PlaybackHandle {
    const fn finished(&self) -> bool {
        self.pos >= self.samples.len()
    }
}

/// Cursor, device clock and in-flight handle registry.
///
/// Mutated only from `on_frame_received`, `on_interrupted` and the output
/// callback; no other component touches it.
struct SchedulerState {
    /// Samples the output callback has rendered since activation
    clock: u64,
    /// Earliest sample at which the next segment may begin
    cursor: u64,
    handles: Vec<PlaybackHandle>,
}

impl SchedulerState {
    const fn new() -> Self {
        Self {
            clock: 0,
            cursor: 0,
            handles: Vec::new(),
        }
    }

    /// Schedule a decoded segment; returns its start sample
    fn schedule(&mut self, samples: Vec<f32>) -> u64 {
        let start = self.cursor.max(self.clock);
        self.cursor = start + samples.len() as u64;
        self.handles.push(PlaybackHandle {
            start,
            samples,
            pos: 0,
        });
        start
    }

    /// Stop every handle and re-base the cursor at the device clock
    fn interrupt(&mut self) {
        self.handles.clear();
        self.cursor = self.clock;
    }

    /// Render `frames` output frames, mixing due segments and advancing the
    /// device clock. Handles that complete are removed.
    fn render(&mut self, out: &mut [f32], channels: usize) {
        for frame in out.chunks_mut(channels.max(1)) {
            let mut mixed = 0.0f32;
            for handle in &mut self.handles {
                if handle.start <= self.clock && !handle.finished() {
                    mixed += handle.samples[handle.pos];
                    handle.pos += 1;
                }
            }
            for slot in frame.iter_mut() {
                *slot = mixed;
            }
            self.clock += 1;
        }
        self.handles.retain(|h| !h.finished());
    }

    /// Advance the clock without an output buffer (detached mode)
    fn tick(&mut self, frames: u64) {
        for _ in 0..frames {
            for handle in &mut self.handles {
                if handle.start <= self.clock && !handle.finished() {
                    handle.pos += 1;
                }
            }
            self.clock += 1;
        }
        self.handles.retain(|h| !h.finished());
    }
}

/// Schedules decoded model audio on the default output device at 24 kHz
pub struct PlaybackScheduler {
    state: Arc<Mutex<SchedulerState>>,
    device: Option<(Device, StreamConfig)>,
    stream: Option<Stream>,
}

impl PlaybackScheduler {
    /// Create a scheduler bound to the default output device
    ///
    /// # Errors
    ///
    /// Returns error if no suitable output device or config exists
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| {
                c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "playback scheduler initialized"
        );

        Ok(Self {
            state: Arc::new(Mutex::new(SchedulerState::new())),
            device: Some((device, config)),
            stream: None,
        })
    }

    /// Create a scheduler with no output device.
    ///
    /// The device clock only moves through [`advance_clock`]; used on
    /// headless hosts and in tests.
    ///
    /// [`advance_clock`]: Self::advance_clock
    #[must_use]
    pub fn detached() -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState::new())),
            device: None,
            stream: None,
        }
    }

    /// Open the output stream and start the device clock
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be built
    pub fn activate(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let Some((device, config)) = self.device.as_ref() else {
            return Ok(());
        };

        let channels = config.channels as usize;
        let state = Arc::clone(&self.state);

        let stream = device
            .build_output_stream(
                config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if let Ok(mut state) = state.lock() {
                        state.render(data, channels);
                    }
                },
                |err| {
                    tracing::error!(error = %err, "playback stream error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("playback stream started");
        Ok(())
    }

    /// Decode an inbound frame and schedule it after the previous segment's
    /// intended end (or "now", whichever is later)
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the envelope payload is malformed
    pub fn on_frame_received(&self, envelope: &EncodedEnvelope) -> Result<()> {
        let samples = codec::decode_envelope(envelope, 1)?
            .pop()
            .unwrap_or_default();
        if samples.is_empty() {
            return Ok(());
        }

        let duration = samples.len();
        if let Ok(mut state) = self.state.lock() {
            let start = state.schedule(samples);
            tracing::trace!(
                start,
                duration,
                live = state.handles.len(),
                "segment scheduled"
            );
        }
        Ok(())
    }

    /// Stop every live handle instantly, clear the registry and reset the
    /// cursor to the device clock. Safe to call with zero live handles.
    pub fn on_interrupted(&self) {
        if let Ok(mut state) = self.state.lock() {
            let stopped = state.handles.len();
            state.interrupt();
            tracing::debug!(stopped, "playback interrupted");
        }
    }

    /// Release the output device and reset all scheduling state
    pub fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("playback stream released");
        }
        if let Ok(mut state) = self.state.lock() {
            *state = SchedulerState::new();
        }
    }

    /// Number of segments scheduled but not yet finished
    #[must_use]
    pub fn active_handles(&self) -> usize {
        self.state.lock().map(|s| s.handles.len()).unwrap_or(0)
    }

    /// Earliest sample at which the next segment may begin
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.state.lock().map(|s| s.cursor).unwrap_or(0)
    }

    /// Samples rendered by the output callback so far
    #[must_use]
    pub fn device_clock(&self) -> u64 {
        self.state.lock().map(|s| s.clock).unwrap_or(0)
    }

    /// Advance the device clock manually (detached mode only)
    pub fn advance_clock(&self, frames: u64) {
        if let Ok(mut state) = self.state.lock() {
            state.tick(frames);
        }
    }
}
