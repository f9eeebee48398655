//! # relay-core
//!
//! Room membership and event routing for the signal-relay server.
//!
//! - **Room** - the member set of one signaling session
//! - **Registry** - room id -> members, plus connection -> room index
//! - **Router** - turns inbound events into registry effects and dispatches
//! - **Hub** - delivers dispatches into per-connection outboxes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Session    │────▶│    Hub      │────▶│   Router    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        ▲                   │                   │
//!        │                   ▼                   ▼
//!        │            ┌─────────────┐     ┌─────────────┐
//!        └────────────│  Outboxes   │     │  Registry   │
//!                     └─────────────┘     └─────────────┘
//! ```

pub mod dispatch;
pub mod hub;
pub mod registry;
pub mod room;
pub mod router;

pub use dispatch::Dispatch;
pub use hub::{Hub, Outbox};
pub use registry::{Departure, JoinOutcome, LeaveOutcome, Registry, RegistryStats};
pub use room::Room;
pub use router::{RouterConfig, RouterError, SignalRouter};
