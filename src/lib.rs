//! Relay server that forwards WebRTC signaling between room members

pub mod signaling;
