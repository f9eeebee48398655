//! # relay-transport
//!
//! Per-connection transports for the signal-relay server.
//!
//! A connection is split into an [`EventSource`] (decoded inbound events
//! and heartbeats) and an [`EventSink`] (outbound events, pings, close).
//!
//! - **WebSocket** - axum WebSocket, JSON text or MessagePack binary
//! - **Memory** - channel-backed, for driving sessions without sockets
//!
//! ```rust,ignore
//! use relay_transport::{EventSource, Received};
//!
//! async fn read_all(mut source: impl EventSource) {
//!     while let Ok(Some(received)) = source.recv().await {
//!         if let Received::Event(event) = received {
//!             // Route event
//!         }
//!     }
//! }
//! ```

pub mod memory;
pub mod traits;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use traits::{EventSink, EventSource, Received, TransportError};

#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketSink, WebSocketSource};
