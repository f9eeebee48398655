//! Signaling event router.
//!
//! Turns one inbound event from one connection into registry effects and
//! the list of outbound dispatches they imply. The registry lock is held
//! only while membership is read or changed; recipient lists are
//! snapshots taken under the lock and delivered after it is released.

use crate::dispatch::Dispatch;
use crate::registry::{Registry, RegistryStats};
use crate::room::{validate_room_id, MAX_ROOM_ID_LENGTH};
use relay_protocol::{codes, ClientEvent, ConnectionId, RoomId, Routed, ServerEvent};
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, trace};

/// Router errors.
///
/// These reject a single event; the sender's session carries on.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RouterError {
    /// Invalid room id.
    #[error("Invalid room id: {0}")]
    InvalidRoom(&'static str),

    /// The room is at capacity.
    #[error("Room {room} is full ({capacity} participants)")]
    RoomFull {
        /// The room that was full.
        room: RoomId,
        /// Configured capacity.
        capacity: usize,
    },
}

impl RouterError {
    /// The error code sent to the client.
    #[must_use]
    pub fn code(&self) -> u16 {
        match self {
            RouterError::InvalidRoom(_) => codes::INVALID_ROOM,
            RouterError::RoomFull { .. } => codes::ROOM_FULL,
        }
    }

    /// The error event sent to the client.
    #[must_use]
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::error(self.code(), self.to_string())
    }
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Maximum members per room; `None` accepts any number.
    pub max_room_size: Option<usize>,
    /// Maximum room id length in bytes.
    pub max_room_id_length: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_room_size: None,
            max_room_id_length: MAX_ROOM_ID_LENGTH,
        }
    }
}

/// The signaling router.
pub struct SignalRouter {
    registry: Mutex<Registry>,
    config: RouterConfig,
}

impl SignalRouter {
    /// Create a new router with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    /// Create a new router with custom configuration.
    #[must_use]
    pub fn with_config(config: RouterConfig) -> Self {
        info!("Creating signal router with config: {:?}", config);
        Self {
            registry: Mutex::new(Registry::new()),
            config,
        }
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle one inbound event from `sender`.
    ///
    /// # Errors
    ///
    /// Returns an error if the room id is invalid or the room is full.
    pub fn handle(
        &self,
        sender: &ConnectionId,
        event: ClientEvent,
    ) -> Result<Vec<Dispatch>, RouterError> {
        validate_room_id(event.room_id(), self.config.max_room_id_length)
            .map_err(RouterError::InvalidRoom)?;

        match event.into_routed(sender) {
            Routed::Join(room_id) => self.join(sender, &room_id),
            Routed::Leave(room_id) => Ok(self.leave(sender, &room_id)),
            Routed::Relay { room_id, event } => Ok(self.relay(sender, &room_id, event)),
        }
    }

    fn join(&self, sender: &ConnectionId, room_id: &str) -> Result<Vec<Dispatch>, RouterError> {
        let outcome = {
            let mut registry = self.registry();

            if let Some(capacity) = self.config.max_room_size {
                let already_member = registry.room_of(sender.as_str()) == Some(room_id);
                if !already_member && registry.room_len(room_id) >= capacity {
                    return Err(RouterError::RoomFull {
                        room: room_id.to_string(),
                        capacity,
                    });
                }
            }

            registry.join(sender, room_id)
        };

        debug!(
            connection = %sender,
            room = %room_id,
            size = outcome.size,
            "Joined room"
        );

        let mut dispatches = Vec::with_capacity(4);

        if let Some(previous) = outcome.previous {
            if !previous.remaining.is_empty() {
                dispatches.push(Dispatch::new(
                    previous.remaining,
                    ServerEvent::UserLeft(sender.clone()),
                ));
            }
        }

        if outcome.added {
            let others: Vec<ConnectionId> = outcome
                .members
                .iter()
                .filter(|member| *member != sender)
                .cloned()
                .collect();
            if !others.is_empty() {
                dispatches.push(Dispatch::new(
                    others,
                    ServerEvent::UserJoined(sender.clone()),
                ));
            }
        }

        dispatches.push(Dispatch::new(
            outcome.members.clone(),
            ServerEvent::RoomUsers {
                count: outcome.size,
                users: outcome.members.clone(),
            },
        ));

        if outcome.added && outcome.size == 2 {
            info!(room = %room_id, "Both participants present, ready to call");
            dispatches.push(Dispatch::new(outcome.members, ServerEvent::ReadyToCall));
        }

        Ok(dispatches)
    }

    fn leave(&self, sender: &ConnectionId, room_id: &str) -> Vec<Dispatch> {
        let outcome = self.registry().leave(sender.as_str(), room_id);

        if !outcome.removed {
            trace!(connection = %sender, room = %room_id, "Leave ignored, not a member");
            return Vec::new();
        }

        debug!(connection = %sender, room = %room_id, size = outcome.size(), "Left room");

        if outcome.remaining.is_empty() {
            Vec::new()
        } else {
            vec![Dispatch::new(
                outcome.remaining,
                ServerEvent::UserLeft(sender.clone()),
            )]
        }
    }

    fn relay(
        &self,
        sender: &ConnectionId,
        room_id: &str,
        outbound: ServerEvent,
    ) -> Vec<Dispatch> {
        let others = self.registry().others(room_id, sender.as_str());
        trace!(
            connection = %sender,
            room = %room_id,
            event = outbound.name(),
            recipients = others.len(),
            "Relaying"
        );

        if others.is_empty() {
            Vec::new()
        } else {
            vec![Dispatch::new(others, outbound)]
        }
    }

    /// Remove a disconnected connection from every room.
    ///
    /// Produces a `user-left` for the remaining members of each room it
    /// was in. Unknown connections produce nothing.
    pub fn disconnect(&self, connection_id: &ConnectionId) -> Vec<Dispatch> {
        let departures = self.registry().disconnect_all(connection_id.as_str());

        departures
            .into_iter()
            .filter_map(|departure| {
                if departure.room_closed {
                    debug!(room = %departure.room_id, "Room cleaned up");
                    None
                } else {
                    Some(Dispatch::new(
                        departure.remaining,
                        ServerEvent::UserLeft(connection_id.clone()),
                    ))
                }
            })
            .collect()
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        self.registry().stats()
    }

    /// Number of active rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.registry().room_count()
    }

    /// Member count of a room.
    #[must_use]
    pub fn room_len(&self, room_id: &str) -> usize {
        self.registry().room_len(room_id)
    }

    /// Members of a room.
    #[must_use]
    pub fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        self.registry().members(room_id)
    }

    /// The room a connection is in.
    #[must_use]
    pub fn room_of(&self, connection_id: &str) -> Option<RoomId> {
        self.registry().room_of(connection_id).map(str::to_string)
    }
}

impl Default for SignalRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_protocol::client;
    use serde_json::json;

    fn id(s: &str) -> ConnectionId {
        ConnectionId::from(s)
    }

    fn join(router: &SignalRouter, conn: &str, room: &str) -> Vec<Dispatch> {
        router
            .handle(&id(conn), ClientEvent::JoinRoom(room.into()))
            .unwrap()
    }

    /// Events addressed to `conn`, in dispatch order.
    fn received(dispatches: &[Dispatch], conn: &str) -> Vec<ServerEvent> {
        dispatches
            .iter()
            .filter(|d| d.is_addressed_to(conn))
            .map(|d| (*d.event).clone())
            .collect()
    }

    #[test]
    fn test_first_join() {
        let router = SignalRouter::new();

        let dispatches = join(&router, "a", "r1");
        assert_eq!(
            received(&dispatches, "a"),
            vec![ServerEvent::RoomUsers {
                count: 1,
                users: vec![id("a")],
            }]
        );
    }

    #[test]
    fn test_second_join_triggers_ready_to_call() {
        let router = SignalRouter::new();
        join(&router, "a", "r1");

        let dispatches = join(&router, "b", "r1");
        let room_users = ServerEvent::RoomUsers {
            count: 2,
            users: vec![id("a"), id("b")],
        };

        assert_eq!(
            received(&dispatches, "a"),
            vec![
                ServerEvent::UserJoined(id("b")),
                room_users.clone(),
                ServerEvent::ReadyToCall,
            ]
        );
        assert_eq!(
            received(&dispatches, "b"),
            vec![room_users, ServerEvent::ReadyToCall]
        );
    }

    #[test]
    fn test_third_join_does_not_retrigger() {
        let router = SignalRouter::new();
        join(&router, "a", "r1");
        join(&router, "b", "r1");

        let dispatches = join(&router, "c", "r1");
        assert!(dispatches
            .iter()
            .all(|d| *d.event != ServerEvent::ReadyToCall));
        assert_eq!(router.room_len("r1"), 3);
    }

    #[test]
    fn test_rejoin_same_room_only_refreshes_users() {
        let router = SignalRouter::new();
        join(&router, "a", "r1");
        join(&router, "b", "r1");

        let dispatches = join(&router, "a", "r1");
        assert_eq!(dispatches.len(), 1);
        assert!(matches!(
            *dispatches[0].event,
            ServerEvent::RoomUsers { count: 2, .. }
        ));
    }

    #[test]
    fn test_room_switch_notifies_old_room() {
        let router = SignalRouter::new();
        join(&router, "a", "r1");
        join(&router, "b", "r1");

        let dispatches = join(&router, "a", "r2");
        assert_eq!(
            received(&dispatches, "b"),
            vec![ServerEvent::UserLeft(id("a"))]
        );
        assert_eq!(router.room_len("r1"), 1);
        assert_eq!(router.room_of("a").as_deref(), Some("r2"));
    }

    #[test]
    fn test_offer_goes_to_others_only() {
        let router = SignalRouter::new();
        join(&router, "a", "r1");
        join(&router, "b", "r1");

        let dispatches = router
            .handle(
                &id("a"),
                ClientEvent::Offer(client::Offer {
                    room_id: "r1".into(),
                    offer: json!("X"),
                }),
            )
            .unwrap();

        assert!(received(&dispatches, "a").is_empty());
        assert_eq!(
            received(&dispatches, "b"),
            vec![ServerEvent::Offer(relay_protocol::server::Offer {
                offer: json!("X"),
                from: id("a"),
            })]
        );
    }

    #[test]
    fn test_relay_to_unknown_room_is_dropped() {
        let router = SignalRouter::new();

        let dispatches = router
            .handle(
                &id("a"),
                ClientEvent::QuestionAsked(client::QuestionAsked {
                    room_id: "nobody-here".into(),
                    question: json!({"questiontext": "Why Rust?"}),
                }),
            )
            .unwrap();
        assert!(dispatches.is_empty());
        assert_eq!(router.room_count(), 0);
    }

    #[test]
    fn test_leave_non_member_is_silent() {
        let router = SignalRouter::new();
        join(&router, "a", "r1");

        let dispatches = router
            .handle(&id("b"), ClientEvent::LeaveRoom("r1".into()))
            .unwrap();
        assert!(dispatches.is_empty());
        assert_eq!(router.room_len("r1"), 1);
    }

    #[test]
    fn test_leave_notifies_remaining() {
        let router = SignalRouter::new();
        join(&router, "a", "r1");
        join(&router, "b", "r1");

        let dispatches = router
            .handle(&id("b"), ClientEvent::LeaveRoom("r1".into()))
            .unwrap();
        assert_eq!(
            received(&dispatches, "a"),
            vec![ServerEvent::UserLeft(id("b"))]
        );
    }

    #[test]
    fn test_disconnect_scenario() {
        let router = SignalRouter::new();
        join(&router, "a", "r1");
        join(&router, "b", "r1");

        let dispatches = router.disconnect(&id("b"));
        assert_eq!(
            received(&dispatches, "a"),
            vec![ServerEvent::UserLeft(id("b"))]
        );
        assert_eq!(router.room_len("r1"), 1);
        assert_eq!(router.room_count(), 1);

        let dispatches = router.disconnect(&id("a"));
        assert!(dispatches.is_empty());
        assert_eq!(router.room_count(), 0);
    }

    #[test]
    fn test_invalid_room_rejected() {
        let router = SignalRouter::new();

        let err = router
            .handle(&id("a"), ClientEvent::JoinRoom(String::new()))
            .unwrap_err();
        assert_eq!(err.code(), codes::INVALID_ROOM);
        assert_eq!(router.room_count(), 0);
    }

    #[test]
    fn test_room_capacity() {
        let router = SignalRouter::with_config(RouterConfig {
            max_room_size: Some(2),
            ..Default::default()
        });
        join(&router, "a", "r1");
        join(&router, "b", "r1");
        join(&router, "c", "r2");

        let err = router
            .handle(&id("c"), ClientEvent::JoinRoom("r1".into()))
            .unwrap_err();
        assert_eq!(
            err,
            RouterError::RoomFull {
                room: "r1".into(),
                capacity: 2,
            }
        );
        assert_eq!(router.room_of("c").as_deref(), Some("r2"));
        assert!(matches!(err.to_event(), ServerEvent::Error { code: 1003, .. }));

        // Members may still re-join a full room.
        assert!(router
            .handle(&id("a"), ClientEvent::JoinRoom("r1".into()))
            .is_ok());
    }
}
