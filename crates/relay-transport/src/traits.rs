//! Transport abstraction traits.
//!
//! A connection is split into a source of inbound events and a sink for
//! outbound ones, so a session can wait on the peer and write to it from
//! different branches of one `select!`.

use async_trait::async_trait;
use relay_protocol::{ClientEvent, ProtocolError, ServerEvent};
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection was closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Failed to receive data.
    #[error("Receive failed: {0}")]
    ReceiveFailed(String),

    /// Inbound message exceeds the configured limit.
    #[error("Message size {size} exceeds maximum {max}")]
    MessageTooLarge {
        /// Size of the rejected message.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Protocol error.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl TransportError {
    /// Whether the connection is still usable after this error.
    ///
    /// Malformed or oversized input rejects one message; anything else
    /// means the link is gone.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TransportError::Protocol(_) | TransportError::MessageTooLarge { .. }
        )
    }
}

/// Something read from a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    /// A decoded signaling event.
    Event(ClientEvent),
    /// Transport-level liveness traffic (ping or pong).
    Heartbeat,
}

/// The inbound half of a connection.
#[async_trait]
pub trait EventSource: Send {
    /// Receive the next event or heartbeat.
    ///
    /// Returns `Ok(None)` if the connection closed cleanly.
    async fn recv(&mut self) -> Result<Option<Received>, TransportError>;
}

/// The outbound half of a connection.
#[async_trait]
pub trait EventSink: Send {
    /// Send an event to the peer.
    async fn send(&mut self, event: &ServerEvent) -> Result<(), TransportError>;

    /// Send a liveness probe.
    async fn ping(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    /// Close the connection gracefully.
    async fn close(&mut self) -> Result<(), TransportError>;
}
