use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::messages::ServerMessage;
use super::registry::RoomRegistry;
use super::types::{OutboundMessage, ParticipantId, RoomKey, SignalKind, SignalingError};

/// Commands sent to the relay actor
pub(crate) enum RelayCommand {
    /// Register a participant's outbound channel at connection creation
    Connect {
        id: ParticipantId,
        tx: mpsc::UnboundedSender<OutboundMessage>,
    },
    /// Add the participant to a room and notify the existing members
    Join { id: ParticipantId, room: RoomKey },
    /// Forward an opaque negotiation message to the room's other members
    Signal {
        id: ParticipantId,
        room: RoomKey,
        kind: SignalKind,
        payload: Value,
    },
    /// Channel closed: remove the participant everywhere and notify
    Disconnect { id: ParticipantId },
    /// Membership query
    IsMember {
        room: RoomKey,
        id: ParticipantId,
        reply: oneshot::Sender<bool>,
    },
}

/// The single task that owns all room and channel state.
///
/// Commands arrive over one FIFO queue, so every fan-out sees the member
/// sets exactly as they stood when its command was dequeued. A connection
/// handler submits its own participant's events in order, which serializes
/// them relative to each other without any locking here.
pub(crate) async fn relay_actor(mut rx: mpsc::UnboundedReceiver<RelayCommand>) {
    let mut registry = RoomRegistry::new();
    let mut channels: HashMap<ParticipantId, mpsc::UnboundedSender<OutboundMessage>> =
        HashMap::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RelayCommand::Connect { id, tx } => {
                debug!("Channel registered for {}", id);
                channels.insert(id, tx);
            }

            RelayCommand::Join { id, room } => {
                if registry.join(&room, id) {
                    info!("Participant {} joined room {}", id, room);
                } else {
                    debug!("Participant {} re-joined room {}", id, room);
                }

                let notice = ServerMessage::UserJoined { from: id }.to_outbound();
                fan_out(&channels, registry.members(&room), Some(&id), &notice);
            }

            RelayCommand::Signal {
                id,
                room,
                kind,
                payload,
            } => {
                debug!("Relaying {} from {} to room {}", kind, id, room);
                let msg = ServerMessage::relay(kind, payload, id).to_outbound();
                fan_out(&channels, registry.members(&room), Some(&id), &msg);
            }

            RelayCommand::Disconnect { id } => {
                channels.remove(&id);

                let affected = registry.leave(&id);
                if affected.is_empty() {
                    debug!("Participant {} disconnected without room membership", id);
                    continue;
                }

                let notice = ServerMessage::UserLeft { from: id }.to_outbound();
                for room in &affected {
                    fan_out(&channels, registry.members(room), None, &notice);
                    if !registry.contains_room(room) {
                        info!("Room {} removed (empty)", room);
                    }
                }
                info!(
                    "Participant {} disconnected from {} room(s)",
                    id,
                    affected.len()
                );
            }

            RelayCommand::IsMember { room, id, reply } => {
                let _ = reply.send(registry.is_member(&room, &id));
            }
        }
    }
}

/// Deliver one pre-serialized frame to every listed member except `except`.
///
/// Sends are fire-and-forget: a member without a live channel, or whose
/// channel is already closed, is skipped. `members == None` means the room
/// does not exist, which is a no-op rather than an error.
fn fan_out(
    channels: &HashMap<ParticipantId, mpsc::UnboundedSender<OutboundMessage>>,
    members: Option<&HashSet<ParticipantId>>,
    except: Option<&ParticipantId>,
    msg: &OutboundMessage,
) {
    let Some(members) = members else {
        return;
    };

    for member in members {
        if Some(member) == except {
            continue;
        }
        match channels.get(member) {
            Some(tx) => {
                if tx.send(msg.clone()).is_err() {
                    debug!("Channel for {} closed, dropping message", member);
                }
            }
            None => debug!("No live channel for {}, dropping message", member),
        }
    }
}

/// Handle to communicate with the relay actor
#[derive(Clone)]
pub struct RelayHandle {
    pub(crate) tx: mpsc::UnboundedSender<RelayCommand>,
}

impl RelayHandle {
    /// Register a participant's outbound channel.
    ///
    /// Submission is synchronous and never blocks, so it can also run from
    /// a `Drop` impl; if the relay is gone the command is silently dropped,
    /// matching the best-effort contract of every non-query operation.
    pub fn connect(&self, id: ParticipantId, peer_tx: mpsc::UnboundedSender<OutboundMessage>) {
        let _ = self.tx.send(RelayCommand::Connect { id, tx: peer_tx });
    }

    /// Put the participant into a room, creating it on first join.
    pub fn join(&self, id: ParticipantId, room: RoomKey) {
        let _ = self.tx.send(RelayCommand::Join { id, room });
    }

    /// Relay one negotiation message to the room's other members.
    pub fn signal(&self, id: ParticipantId, room: RoomKey, kind: SignalKind, payload: Value) {
        let _ = self.tx.send(RelayCommand::Signal {
            id,
            room,
            kind,
            payload,
        });
    }

    /// Remove the participant from every room and notify each of them.
    pub fn disconnect(&self, id: ParticipantId) {
        let _ = self.tx.send(RelayCommand::Disconnect { id });
    }

    /// Query current room membership.
    pub async fn is_member(
        &self,
        room: RoomKey,
        id: ParticipantId,
    ) -> Result<bool, SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(RelayCommand::IsMember {
                room,
                id,
                reply: reply_tx,
            })
            .map_err(|_| SignalingError::RelayClosed)?;
        reply_rx.await.map_err(|_| SignalingError::RelayClosed)
    }
}
