//! Room-scoped WebSocket signaling relay for WebRTC session setup

mod actor;
mod messages;
mod registry;
mod server;
mod types;

pub use actor::RelayHandle;
pub use messages::{ClientMessage, ServerMessage};
pub use registry::RoomRegistry;
pub use server::{DEFAULT_PORT, SignalingServer};
pub use types::{OutboundMessage, ParticipantId, RoomKey, SignalKind, SignalingError};
