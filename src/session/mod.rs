//! Live session: wire protocol, transport task and lifecycle orchestration

pub mod controller;
pub mod transport;
pub mod wire;

pub use controller::SessionController;
pub use transport::{
    GeminiConnector, LiveConnector, LiveStream, SessionState, SessionTransport, StateMachine,
    Status, TransportEvent,
};
pub use wire::{ClientMessage, ServerMessage, SessionSetup};
