//! Outbound dispatches produced by the router.

use relay_protocol::{ConnectionId, ServerEvent};
use std::sync::Arc;

/// One outbound event and the connections that should receive it.
///
/// The event is shared so fan-out does not clone payloads per recipient.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Target connection IDs.
    pub recipients: Vec<ConnectionId>,
    /// The event to deliver.
    pub event: Arc<ServerEvent>,
}

impl Dispatch {
    /// Create a new dispatch.
    #[must_use]
    pub fn new(recipients: Vec<ConnectionId>, event: ServerEvent) -> Self {
        Self {
            recipients,
            event: Arc::new(event),
        }
    }

    /// Create a dispatch addressed to a single connection.
    #[must_use]
    pub fn to_one(recipient: ConnectionId, event: ServerEvent) -> Self {
        Self::new(vec![recipient], event)
    }

    /// Check if a connection is among the recipients.
    #[must_use]
    pub fn is_addressed_to(&self, connection_id: &str) -> bool {
        self.recipients.iter().any(|r| r.as_str() == connection_id)
    }
}
