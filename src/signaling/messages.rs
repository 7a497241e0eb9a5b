use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::{OutboundMessage, ParticipantId, RoomKey, SignalKind, SignalingError};

/// Messages sent from client to server.
///
/// Negotiation payloads are opaque: the relay carries them as raw JSON
/// values and never looks inside. Unknown extra fields on any variant are
/// ignored, so a client attaching a `target` to an `answer` still gets the
/// baseline room broadcast.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Join a room, creating it if this is the first member
    #[serde(rename = "join-room")]
    JoinRoom { room: RoomKey },

    /// Relay an SDP offer to the other members of the room
    #[serde(rename = "offer")]
    Offer { room: RoomKey, payload: Value },

    /// Relay an SDP answer to the other members of the room
    #[serde(rename = "answer")]
    Answer { room: RoomKey, payload: Value },

    /// Relay an ICE candidate to the other members of the room
    #[serde(rename = "ice-candidate")]
    IceCandidate { room: RoomKey, payload: Value },
}

impl ClientMessage {
    /// Parse one inbound text frame.
    pub fn parse(text: &str) -> Result<Self, SignalingError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Messages sent from server to client.
///
/// Everything that originates from a peer carries that peer's id in `from`,
/// so a receiver in a room with several concurrent negotiations can match
/// each message to the right originator.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// A participant joined a room this client is in
    #[serde(rename = "user-joined")]
    UserJoined { from: ParticipantId },

    /// A participant left a room this client is in
    #[serde(rename = "user-left")]
    UserLeft { from: ParticipantId },

    /// Relayed SDP offer
    #[serde(rename = "offer")]
    Offer { payload: Value, from: ParticipantId },

    /// Relayed SDP answer
    #[serde(rename = "answer")]
    Answer { payload: Value, from: ParticipantId },

    /// Relayed ICE candidate
    #[serde(rename = "ice-candidate")]
    IceCandidate { payload: Value, from: ParticipantId },

    /// Error response, sent only to the connection that caused it
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    /// Build the outbound counterpart of a relayed negotiation message.
    pub fn relay(kind: SignalKind, payload: Value, from: ParticipantId) -> Self {
        match kind {
            SignalKind::Offer => ServerMessage::Offer { payload, from },
            SignalKind::Answer => ServerMessage::Answer { payload, from },
            SignalKind::IceCandidate => ServerMessage::IceCandidate { payload, from },
        }
    }

    /// Serialize into a frame ready for the per-peer outbound channels.
    pub fn to_outbound(&self) -> OutboundMessage {
        let json =
            serde_json::to_string(self).expect("ServerMessage serialization should never fail");
        OutboundMessage::from(json)
    }
}
