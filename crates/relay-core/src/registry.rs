//! Connection registry.
//!
//! Maps room ids to their member sets and keeps a reverse index from each
//! connection to the one room it is in. The registry is plain data; the
//! router owns it behind a lock so that every composite operation here
//! (remove-then-add, remove-then-drop-empty-room) runs atomically.

use crate::room::Room;
use relay_protocol::{ConnectionId, RoomId};
use std::collections::HashMap;
use tracing::debug;

/// A connection leaving a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    /// The room that was left.
    pub room_id: RoomId,
    /// Members still in the room.
    pub remaining: Vec<ConnectionId>,
    /// Whether the room became empty and was removed.
    pub room_closed: bool,
}

/// Result of [`Registry::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Member count of the joined room after the join.
    pub size: usize,
    /// All members of the joined room after the join.
    pub members: Vec<ConnectionId>,
    /// `false` if the connection was already in this room.
    pub added: bool,
    /// The room that was implicitly left, if any.
    pub previous: Option<Departure>,
}

/// Result of [`Registry::leave`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// Whether the connection was a member and got removed.
    pub removed: bool,
    /// Members of the room after the call.
    pub remaining: Vec<ConnectionId>,
}

impl LeaveOutcome {
    /// Member count after the call.
    #[must_use]
    pub fn size(&self) -> usize {
        self.remaining.len()
    }
}

/// Registry statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of non-empty rooms.
    pub room_count: usize,
    /// Number of connections currently in a room.
    pub member_count: usize,
}

/// Room membership registry.
#[derive(Debug, Default)]
pub struct Registry {
    /// Rooms indexed by id. Never holds an empty room.
    rooms: HashMap<RoomId, Room>,
    /// Connection -> the room it is in.
    memberships: HashMap<ConnectionId, RoomId>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a connection into `room_id`, leaving its current room first.
    ///
    /// Joining the room the connection is already in changes nothing.
    pub fn join(&mut self, connection_id: &ConnectionId, room_id: &str) -> JoinOutcome {
        if self.room_of(connection_id.as_str()) == Some(room_id) {
            if let Some(room) = self.rooms.get(room_id) {
                return JoinOutcome {
                    size: room.len(),
                    members: room.members(),
                    added: false,
                    previous: None,
                };
            }
        }

        let previous = self
            .memberships
            .remove(connection_id)
            .and_then(|old| self.remove_member(connection_id.as_str(), &old));

        let room = self.rooms.entry(room_id.to_string()).or_insert_with(|| {
            debug!(room = %room_id, "Creating room");
            Room::new(room_id)
        });
        let added = room.insert(connection_id.clone());
        let outcome = JoinOutcome {
            size: room.len(),
            members: room.members(),
            added,
            previous,
        };

        self.memberships
            .insert(connection_id.clone(), room_id.to_string());

        outcome
    }

    /// Take a connection out of `room_id`.
    ///
    /// A connection that is not in the room is left untouched.
    pub fn leave(&mut self, connection_id: &str, room_id: &str) -> LeaveOutcome {
        match self.remove_member(connection_id, room_id) {
            Some(departure) => {
                if self.room_of(connection_id) == Some(room_id) {
                    self.memberships.remove(connection_id);
                }
                LeaveOutcome {
                    removed: true,
                    remaining: departure.remaining,
                }
            }
            None => LeaveOutcome {
                removed: false,
                remaining: self.members(room_id),
            },
        }
    }

    /// Remove a connection from every room it is in.
    ///
    /// Returns one departure per room left; empty for unknown connections.
    pub fn disconnect_all(&mut self, connection_id: &str) -> Vec<Departure> {
        let departures: Vec<Departure> = self
            .memberships
            .remove(connection_id)
            .and_then(|room_id| self.remove_member(connection_id, &room_id))
            .into_iter()
            .collect();

        debug_assert!(
            self.rooms.values().all(|room| !room.contains(connection_id)),
            "membership index out of sync"
        );

        departures
    }

    /// Remove one member, dropping the room if it empties.
    fn remove_member(&mut self, connection_id: &str, room_id: &str) -> Option<Departure> {
        let room = self.rooms.get_mut(room_id)?;
        if !room.remove(connection_id) {
            return None;
        }

        let remaining = room.members();
        let room_closed = room.is_empty();
        if room_closed {
            self.rooms.remove(room_id);
            debug!(room = %room_id, "Removed empty room");
        }

        Some(Departure {
            room_id: room_id.to_string(),
            remaining,
            room_closed,
        })
    }

    /// The room a connection is in, if any.
    #[must_use]
    pub fn room_of(&self, connection_id: &str) -> Option<&str> {
        self.memberships.get(connection_id).map(String::as_str)
    }

    /// Check if a room exists.
    #[must_use]
    pub fn contains_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Member count of a room; 0 for unknown rooms.
    #[must_use]
    pub fn room_len(&self, room_id: &str) -> usize {
        self.rooms.get(room_id).map(Room::len).unwrap_or(0)
    }

    /// Members of a room; empty for unknown rooms.
    #[must_use]
    pub fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(Room::members)
            .unwrap_or_default()
    }

    /// Members of a room other than `connection_id`.
    #[must_use]
    pub fn others(&self, room_id: &str, connection_id: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|room| room.others(connection_id))
            .unwrap_or_default()
    }

    /// Number of rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            room_count: self.rooms.len(),
            member_count: self.memberships.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ConnectionId {
        ConnectionId::from(s)
    }

    #[test]
    fn test_join_creates_room() {
        let mut registry = Registry::new();

        let outcome = registry.join(&id("a"), "r1");
        assert!(outcome.added);
        assert_eq!(outcome.size, 1);
        assert_eq!(outcome.members, vec![id("a")]);
        assert!(outcome.previous.is_none());
        assert!(registry.contains_room("r1"));
        assert_eq!(registry.room_of("a"), Some("r1"));
    }

    #[test]
    fn test_join_same_room_is_idempotent() {
        let mut registry = Registry::new();
        registry.join(&id("a"), "r1");
        registry.join(&id("b"), "r1");

        let outcome = registry.join(&id("a"), "r1");
        assert!(!outcome.added);
        assert_eq!(outcome.size, 2);
        assert!(outcome.previous.is_none());
        assert_eq!(registry.room_len("r1"), 2);
    }

    #[test]
    fn test_join_switches_rooms() {
        let mut registry = Registry::new();
        registry.join(&id("a"), "r1");
        registry.join(&id("b"), "r1");

        let outcome = registry.join(&id("a"), "r2");
        assert_eq!(
            outcome.previous,
            Some(Departure {
                room_id: "r1".into(),
                remaining: vec![id("b")],
                room_closed: false,
            })
        );
        assert_eq!(registry.room_len("r1"), 1);
        assert_eq!(registry.room_len("r2"), 1);
        assert_eq!(registry.room_of("a"), Some("r2"));
    }

    #[test]
    fn test_join_switch_closes_sole_member_room() {
        let mut registry = Registry::new();
        registry.join(&id("a"), "r1");

        let outcome = registry.join(&id("a"), "r2");
        assert!(outcome.previous.unwrap().room_closed);
        assert!(!registry.contains_room("r1"));
        assert_eq!(registry.room_count(), 1);
    }

    #[test]
    fn test_leave() {
        let mut registry = Registry::new();
        registry.join(&id("a"), "r1");
        registry.join(&id("b"), "r1");

        let outcome = registry.leave("a", "r1");
        assert!(outcome.removed);
        assert_eq!(outcome.size(), 1);
        assert_eq!(registry.room_of("a"), None);

        let outcome = registry.leave("b", "r1");
        assert!(outcome.removed);
        assert_eq!(outcome.size(), 0);
        assert!(!registry.contains_room("r1"));
    }

    #[test]
    fn test_leave_non_member_is_noop() {
        let mut registry = Registry::new();
        registry.join(&id("a"), "r1");

        let outcome = registry.leave("b", "r1");
        assert!(!outcome.removed);
        assert_eq!(outcome.size(), 1);

        let outcome = registry.leave("a", "unknown");
        assert!(!outcome.removed);
        assert_eq!(outcome.size(), 0);
        assert_eq!(registry.room_of("a"), Some("r1"));
    }

    #[test]
    fn test_disconnect_all() {
        let mut registry = Registry::new();
        registry.join(&id("a"), "r1");
        registry.join(&id("b"), "r1");

        let departures = registry.disconnect_all("b");
        assert_eq!(departures.len(), 1);
        assert_eq!(departures[0].room_id, "r1");
        assert_eq!(departures[0].remaining, vec![id("a")]);
        assert!(!departures[0].room_closed);

        let departures = registry.disconnect_all("a");
        assert!(departures[0].room_closed);
        assert_eq!(registry.room_count(), 0);

        assert!(registry.disconnect_all("a").is_empty());
    }

    #[test]
    fn test_stats() {
        let mut registry = Registry::new();
        registry.join(&id("a"), "r1");
        registry.join(&id("b"), "r1");
        registry.join(&id("c"), "r2");

        let stats = registry.stats();
        assert_eq!(stats.room_count, 2);
        assert_eq!(stats.member_count, 3);
    }
}
