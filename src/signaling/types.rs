use std::fmt;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tokio_tungstenite::tungstenite::Utf8Bytes;

/// Signaling relay errors
#[derive(Debug, Error)]
pub enum SignalingError {
    /// The relay engine task is gone; no further commands can be served.
    #[error("relay engine unavailable")]
    RelayClosed,

    #[error("invalid message: {0}")]
    InvalidMessage(#[from] serde_json::Error),
}

const PARTICIPANT_ID_LEN: usize = 13;
const HEX_CHARS: &[u8] = b"0123456789abcdef";

/// Participant ID: 13-byte fixed array ("user_" + 8 hex).
///
/// Assigned by the transport layer when a connection is accepted; clients
/// never pick their own. Peers learn each other's ids from `user-joined`
/// notifications and the `from` tag on relayed messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParticipantId {
    bytes: [u8; PARTICIPANT_ID_LEN],
    len: u8,
}

impl ParticipantId {
    pub fn generate() -> Self {
        let mut bytes = [0u8; PARTICIPANT_ID_LEN];
        bytes[..5].copy_from_slice(b"user_");

        let mut rng = rand::rng();
        let value: u32 = rng.random();

        for i in 0..8 {
            let nibble = ((value >> (28 - i * 4)) & 0xF) as usize;
            bytes[5 + i] = HEX_CHARS[nibble];
        }
        Self {
            bytes,
            len: PARTICIPANT_ID_LEN as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        let mut bytes = [0u8; PARTICIPANT_ID_LEN];
        let src = s.as_bytes();
        let len = src.len().min(PARTICIPANT_ID_LEN);
        bytes[..len].copy_from_slice(&src[..len]);
        Self {
            bytes,
            len: len as u8,
        }
    }
}

impl Serialize for ParticipantId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ParticipantId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <&str>::deserialize(deserializer)?;
        Ok(ParticipantId::from(s))
    }
}

/// Room key: caller-supplied string naming a group of participants.
///
/// Unlike participant ids these are arbitrary client input, so the full
/// string is kept: two distinct keys must never collapse into one room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomKey(String);

impl RoomKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RoomKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The three negotiation message kinds the relay forwards verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    /// Wire event name, matching the inbound and outbound message tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        }
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wrapper for outbound WebSocket messages using tungstenite's Utf8Bytes.
///
/// A fan-out serializes the frame once and hands clones to every recipient,
/// so cloning must stay O(1).
#[derive(Debug, Clone)]
pub struct OutboundMessage(Utf8Bytes);

impl OutboundMessage {
    /// Create a new outbound message from any string type
    pub fn new(s: impl Into<Utf8Bytes>) -> Self {
        Self(s.into())
    }

    /// Get the inner Utf8Bytes for tungstenite Message::Text
    pub fn into_inner(self) -> Utf8Bytes {
        self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<String> for OutboundMessage {
    fn from(s: String) -> Self {
        Self(Utf8Bytes::from(s))
    }
}
