//! # relay-protocol
//!
//! Event catalog and wire codec for the signal-relay signaling server.
//!
//! Every frame is an object with an `event` name and an optional `data`
//! payload, mirroring the event-emitter style browser clients use:
//!
//! ```json
//! {"event": "join-room", "data": "interview-42"}
//! {"event": "offer", "data": {"roomId": "interview-42", "offer": {"sdp": "..."}}}
//! ```
//!
//! - [`ClientEvent`] - what participants send
//! - [`ServerEvent`] - what the relay sends back
//! - [`codec`] - JSON text and length-prefixed MessagePack encodings
//!
//! ## Example
//!
//! ```rust
//! use relay_protocol::{codec, ClientEvent};
//!
//! let event: ClientEvent = codec::decode_json(r#"{"event":"join-room","data":"r1"}"#).unwrap();
//! assert_eq!(event.room_id(), "r1");
//!
//! let packed = codec::encode(&event).unwrap();
//! let unpacked: ClientEvent = codec::decode(&packed).unwrap();
//! assert_eq!(event, unpacked);
//! ```

pub mod client;
pub mod codec;
pub mod ids;
pub mod server;

pub use client::{ClientEvent, Routed};
pub use codec::{Encoding, ProtocolError};
pub use ids::{ConnectionId, RoomId};
pub use server::{codes, ServerEvent};
