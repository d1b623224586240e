//! Error types for the LUNA voice session manager

use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running a voice session
#[derive(Debug, Error)]
pub enum Error {
    /// Media input API surface is absent or blocked (e.g. insecure context,
    /// no input device). Distinct from an explicit permission refusal.
    #[error("media input unavailable: {0}")]
    DeviceUnavailable(String),

    /// The platform refused access to the capture device
    #[error("capture permission denied: {0}")]
    PermissionDenied(String),

    /// Model service credential absent from the environment
    #[error("model service credential missing (set GEMINI_API_KEY)")]
    CredentialMissing,

    /// Opening or streaming over the duplex connection failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Malformed inbound message; handled as a skip, never fatal
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// Audio device or stream error
    #[error("audio error: {0}")]
    Audio(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket transport error
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}
