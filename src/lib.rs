//! LUNA - Real-time voice session manager
//!
//! This library provides the core functionality for the LUNA voice assistant:
//! - Microphone capture (16 kHz mono, fixed-size frames)
//! - Duplex streaming to the Gemini Live model service
//! - Gapless, interruptible playback scheduling (24 kHz)
//! - Session memory recall via Mem0
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Microphone                         │
//! └────────────────────┬────────────────────────────────┘
//!                      │ 16 kHz PCM frames
//! ┌────────────────────▼────────────────────────────────┐
//! │               Session Controller                     │
//! │   Capture  │  State Machine  │  Playback Scheduler  │
//! └────────────────────┬────────────────────────────────┘
//!                      │ duplex WebSocket
//! ┌────────────────────▼────────────────────────────────┐
//! │             Gemini Live (model service)              │
//! │   audio in  │  audio out (24 kHz)  │  interruptions │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod memory;
pub mod prompt;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
pub use memory::{MemoryClient, MemoryContext};
pub use session::{SessionController, SessionState, Status};
