//! Connection hub.
//!
//! The hub pairs the router with one outbox per live connection. Router
//! dispatches are pushed into the recipients' outboxes; each connection's
//! session task drains its own outbox onto its transport. Delivery is best
//! effort: recipients without an open outbox are skipped.

use crate::dispatch::Dispatch;
use crate::router::{RouterConfig, RouterError, SignalRouter};
use dashmap::DashMap;
use relay_protocol::{ClientEvent, ConnectionId, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Receiving end of a connection's outbox.
pub type Outbox = mpsc::UnboundedReceiver<Arc<ServerEvent>>;

/// Router plus per-connection outboxes.
pub struct Hub {
    router: SignalRouter,
    outboxes: DashMap<ConnectionId, mpsc::UnboundedSender<Arc<ServerEvent>>>,
}

impl Hub {
    /// Create a hub with default router configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    /// Create a hub with custom router configuration.
    #[must_use]
    pub fn with_config(config: RouterConfig) -> Self {
        Self {
            router: SignalRouter::with_config(config),
            outboxes: DashMap::new(),
        }
    }

    /// Access the router.
    #[must_use]
    pub fn router(&self) -> &SignalRouter {
        &self.router
    }

    /// Register a connection and return its outbox.
    ///
    /// Registering an id twice replaces the earlier outbox.
    pub fn connect(&self, connection_id: ConnectionId) -> Outbox {
        let (tx, rx) = mpsc::unbounded_channel();
        debug!(connection = %connection_id, "Outbox opened");
        self.outboxes.insert(connection_id, tx);
        rx
    }

    /// Route one inbound event and deliver the result.
    ///
    /// Returns the number of events delivered.
    ///
    /// # Errors
    ///
    /// Returns the router's error if the event was rejected.
    pub fn handle(&self, sender: &ConnectionId, event: ClientEvent) -> Result<usize, RouterError> {
        let dispatches = self.router.handle(sender, event)?;
        Ok(self.deliver(dispatches))
    }

    /// Tear down a connection: close its outbox and remove it from its room.
    ///
    /// Returns the number of `user-left` events delivered.
    pub fn disconnect(&self, connection_id: &ConnectionId) -> usize {
        self.outboxes.remove(connection_id);
        let dispatches = self.router.disconnect(connection_id);
        let delivered = self.deliver(dispatches);
        debug!(connection = %connection_id, notified = delivered, "Connection removed");
        delivered
    }

    /// Deliver dispatches to their recipients' outboxes.
    ///
    /// Returns the number of events that reached an open outbox.
    pub fn deliver(&self, dispatches: Vec<Dispatch>) -> usize {
        let mut delivered = 0;

        for dispatch in dispatches {
            for recipient in &dispatch.recipients {
                let Some(outbox) = self.outboxes.get(recipient) else {
                    trace!(connection = %recipient, "No outbox, dropping event");
                    continue;
                };
                if outbox.send(Arc::clone(&dispatch.event)).is_ok() {
                    delivered += 1;
                }
            }
        }

        delivered
    }

    /// Send an event to a single connection.
    ///
    /// Returns `false` if the connection has no open outbox.
    pub fn send_to(&self, connection_id: &ConnectionId, event: ServerEvent) -> bool {
        self.deliver(vec![Dispatch::to_one(connection_id.clone(), event)]) == 1
    }

    /// Number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.outboxes.len()
    }

    /// Number of active rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.router.room_count()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
