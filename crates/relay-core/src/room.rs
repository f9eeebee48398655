//! Room abstraction.
//!
//! A room is the set of connections sharing one signaling session.

use relay_protocol::{ConnectionId, RoomId};
use std::collections::HashSet;
use tracing::debug;

/// Default maximum room id length.
pub const MAX_ROOM_ID_LENGTH: usize = 256;

/// Validate a room id.
///
/// Room ids are caller-chosen and otherwise opaque; only ids that cannot
/// name a room at all are refused.
///
/// # Errors
///
/// Returns an error message if the room id is unusable.
pub fn validate_room_id(id: &str, max_len: usize) -> Result<(), &'static str> {
    if id.is_empty() {
        return Err("Room id cannot be empty");
    }
    if id.len() > max_len {
        return Err("Room id too long");
    }
    if id.chars().any(char::is_control) {
        return Err("Room id contains control characters");
    }
    Ok(())
}

/// Membership of a single room.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    members: HashSet<ConnectionId>,
}

impl Room {
    /// Create an empty room.
    #[must_use]
    pub fn new(id: impl Into<RoomId>) -> Self {
        Self {
            id: id.into(),
            members: HashSet::new(),
        }
    }

    /// Get the room id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the room has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check if a connection is a member.
    #[must_use]
    pub fn contains(&self, connection_id: &str) -> bool {
        self.members.contains(connection_id)
    }

    /// Add a member.
    ///
    /// Returns `true` if the connection was not already a member.
    pub fn insert(&mut self, connection_id: ConnectionId) -> bool {
        let id = connection_id.to_string();
        let added = self.members.insert(connection_id);
        if added {
            debug!(room = %self.id, connection = %id, "Member added");
        }
        added
    }

    /// Remove a member.
    ///
    /// Returns `true` if the connection was a member.
    pub fn remove(&mut self, connection_id: &str) -> bool {
        let removed = self.members.remove(connection_id);
        if removed {
            debug!(room = %self.id, connection = %connection_id, "Member removed");
        }
        removed
    }

    /// Snapshot of all member ids, sorted for stable output.
    #[must_use]
    pub fn members(&self) -> Vec<ConnectionId> {
        let mut members: Vec<_> = self.members.iter().cloned().collect();
        members.sort();
        members
    }

    /// Snapshot of every member except `connection_id`.
    #[must_use]
    pub fn others(&self, connection_id: &str) -> Vec<ConnectionId> {
        self.members
            .iter()
            .filter(|member| member.as_str() != connection_id)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_creation() {
        let room = Room::new("interview:1");
        assert_eq!(room.id(), "interview:1");
        assert_eq!(room.len(), 0);
        assert!(room.is_empty());
    }

    #[test]
    fn test_room_insert_remove() {
        let mut room = Room::new("r1");

        assert!(room.insert("conn-1".into()));
        assert!(!room.insert("conn-1".into()));
        assert_eq!(room.len(), 1);
        assert!(room.contains("conn-1"));

        assert!(room.insert("conn-2".into()));
        assert_eq!(room.len(), 2);

        assert!(room.remove("conn-1"));
        assert!(!room.contains("conn-1"));
        assert!(!room.remove("conn-1"));
        assert_eq!(room.len(), 1);
    }

    #[test]
    fn test_room_others_excludes_sender() {
        let mut room = Room::new("r1");
        room.insert("a".into());
        room.insert("b".into());
        room.insert("c".into());

        let mut others = room.others("b");
        others.sort();
        assert_eq!(others, vec![ConnectionId::from("a"), ConnectionId::from("c")]);
        assert_eq!(room.others("stranger").len(), 3);
    }

    #[test]
    fn test_room_id_validation() {
        assert!(validate_room_id("interview-42", MAX_ROOM_ID_LENGTH).is_ok());
        assert!(validate_room_id("$anything goes", MAX_ROOM_ID_LENGTH).is_ok());
        assert!(validate_room_id("", MAX_ROOM_ID_LENGTH).is_err());
        assert!(validate_room_id("line\nbreak", MAX_ROOM_ID_LENGTH).is_err());

        let long_id = "a".repeat(MAX_ROOM_ID_LENGTH + 1);
        assert!(validate_room_id(&long_id, MAX_ROOM_ID_LENGTH).is_err());
    }
}
