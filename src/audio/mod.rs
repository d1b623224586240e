//! Audio handling: wire codec, microphone capture and playback scheduling

pub mod capture;
pub mod codec;
pub mod playback;

pub use capture::{CaptureSource, FRAME_SAMPLES, MicCapture};
pub use codec::{CAPTURE_SAMPLE_RATE, EncodedEnvelope, PLAYBACK_SAMPLE_RATE};
pub use playback::PlaybackScheduler;
