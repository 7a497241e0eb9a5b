use std::collections::{HashMap, HashSet};

use super::types::{ParticipantId, RoomKey};

/// Room registry: room key → member set, plus a reverse index from
/// participant to the rooms it occupies.
///
/// Owned exclusively by the relay actor; nothing here is synchronized
/// because only that task ever touches it. Two invariants hold between
/// calls:
/// - a room entry exists iff its member set is non-empty
/// - the reverse index lists exactly the rooms whose member set holds the
///   participant
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomKey, HashSet<ParticipantId>>,
    memberships: HashMap<ParticipantId, HashSet<RoomKey>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a participant to a room, creating the room if absent.
    ///
    /// Set semantics: returns false when the participant was already a
    /// member, leaving the member set unchanged.
    pub fn join(&mut self, room: &RoomKey, id: ParticipantId) -> bool {
        let inserted = self.rooms.entry(room.clone()).or_default().insert(id);
        if inserted {
            self.memberships.entry(id).or_default().insert(room.clone());
        }
        inserted
    }

    /// Remove a participant from every room it occupies.
    ///
    /// Rooms left empty are deleted outright, so no empty-room entry ever
    /// survives a disconnect. Returns the keys of the rooms that contained
    /// the participant; unknown participants yield an empty list.
    pub fn leave(&mut self, id: &ParticipantId) -> Vec<RoomKey> {
        let Some(rooms) = self.memberships.remove(id) else {
            return Vec::new();
        };

        let mut affected = Vec::with_capacity(rooms.len());
        for room in rooms {
            if let Some(members) = self.rooms.get_mut(&room) {
                members.remove(id);
                if members.is_empty() {
                    self.rooms.remove(&room);
                }
            }
            affected.push(room);
        }
        affected
    }

    /// Pure query: is the participant currently a member of the room?
    pub fn is_member(&self, room: &RoomKey, id: &ParticipantId) -> bool {
        self.rooms
            .get(room)
            .is_some_and(|members| members.contains(id))
    }

    /// Member set of a room, if the room exists (i.e. is non-empty).
    pub fn members(&self, room: &RoomKey) -> Option<&HashSet<ParticipantId>> {
        self.rooms.get(room)
    }

    pub fn contains_room(&self, room: &RoomKey) -> bool {
        self.rooms.contains_key(room)
    }

    /// Number of live (non-empty) rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::from(s)
    }

    #[test]
    fn join_creates_room_on_first_member() {
        let mut registry = RoomRegistry::new();
        let r1 = RoomKey::from("r1");

        assert!(!registry.contains_room(&r1));
        assert!(registry.join(&r1, id("user_a")));
        assert!(registry.contains_room(&r1));
        assert!(registry.is_member(&r1, &id("user_a")));
    }

    #[test]
    fn join_is_idempotent_on_member_set() {
        let mut registry = RoomRegistry::new();
        let r1 = RoomKey::from("r1");

        assert!(registry.join(&r1, id("user_a")));
        assert!(!registry.join(&r1, id("user_a")));

        assert_eq!(registry.members(&r1).unwrap().len(), 1);
        assert!(registry.is_member(&r1, &id("user_a")));
    }

    #[test]
    fn participant_can_occupy_several_rooms() {
        let mut registry = RoomRegistry::new();
        let r1 = RoomKey::from("r1");
        let r2 = RoomKey::from("r2");

        registry.join(&r1, id("user_a"));
        registry.join(&r2, id("user_a"));

        assert!(registry.is_member(&r1, &id("user_a")));
        assert!(registry.is_member(&r2, &id("user_a")));
        assert_eq!(registry.room_count(), 2);
    }

    #[test]
    fn leave_reports_every_affected_room() {
        let mut registry = RoomRegistry::new();
        let r1 = RoomKey::from("r1");
        let r2 = RoomKey::from("r2");
        let r3 = RoomKey::from("r3");

        registry.join(&r1, id("user_a"));
        registry.join(&r2, id("user_a"));
        registry.join(&r3, id("user_b"));

        let affected = registry.leave(&id("user_a"));
        assert_eq!(affected.len(), 2);
        assert!(affected.contains(&r1));
        assert!(affected.contains(&r2));
        assert!(!affected.contains(&r3));
    }

    #[test]
    fn leave_deletes_emptied_rooms() {
        let mut registry = RoomRegistry::new();
        let r1 = RoomKey::from("r1");

        registry.join(&r1, id("user_a"));
        registry.leave(&id("user_a"));

        assert!(!registry.contains_room(&r1));
        assert_eq!(registry.room_count(), 0);
        assert!(registry.members(&r1).is_none());
    }

    #[test]
    fn leave_keeps_rooms_with_remaining_members() {
        let mut registry = RoomRegistry::new();
        let r1 = RoomKey::from("r1");

        registry.join(&r1, id("user_a"));
        registry.join(&r1, id("user_b"));
        registry.leave(&id("user_a"));

        assert!(registry.contains_room(&r1));
        assert!(!registry.is_member(&r1, &id("user_a")));
        assert!(registry.is_member(&r1, &id("user_b")));
        assert_eq!(registry.members(&r1).unwrap().len(), 1);
    }

    #[test]
    fn leave_unknown_participant_is_noop() {
        let mut registry = RoomRegistry::new();
        let r1 = RoomKey::from("r1");
        registry.join(&r1, id("user_a"));

        let affected = registry.leave(&id("user_ghost"));
        assert!(affected.is_empty());
        assert_eq!(registry.members(&r1).unwrap().len(), 1);
    }

    #[test]
    fn leave_twice_reports_nothing_second_time() {
        let mut registry = RoomRegistry::new();
        let r1 = RoomKey::from("r1");
        registry.join(&r1, id("user_a"));

        assert_eq!(registry.leave(&id("user_a")).len(), 1);
        assert!(registry.leave(&id("user_a")).is_empty());
    }

    #[test]
    fn rejoin_after_cleanup_starts_from_empty_room() {
        let mut registry = RoomRegistry::new();
        let r1 = RoomKey::from("r1");

        registry.join(&r1, id("user_a"));
        registry.join(&r1, id("user_b"));
        registry.leave(&id("user_a"));
        registry.leave(&id("user_b"));
        assert!(!registry.contains_room(&r1));

        registry.join(&r1, id("user_c"));
        let members = registry.members(&r1).unwrap();
        assert_eq!(members.len(), 1);
        assert!(members.contains(&id("user_c")));
        assert!(!registry.is_member(&r1, &id("user_a")));
        assert!(!registry.is_member(&r1, &id("user_b")));
    }

    #[test]
    fn is_member_on_unknown_room_is_false() {
        let registry = RoomRegistry::new();
        assert!(!registry.is_member(&RoomKey::from("nowhere"), &id("user_a")));
    }

    #[test]
    fn distinct_keys_map_to_distinct_rooms() {
        let mut registry = RoomRegistry::new();
        let r1 = RoomKey::from("r1");
        let r2 = RoomKey::from("r1-suffix");

        registry.join(&r1, id("user_a"));
        registry.join(&r2, id("user_b"));

        assert!(!registry.is_member(&r1, &id("user_b")));
        assert!(!registry.is_member(&r2, &id("user_a")));
    }
}
