//! Bout state types and the pure logic around them.
//!
//! - `distance` - distance classes and their pixel spacing
//! - `bout` - fencer and bout snapshots as sent by the simulator
//! - `store` - the single live snapshot with change notification
//! - `connection` - connection lifecycle state machine
//!
//! # Data Flow
//!
//! ```text
//! ┌──────────────┐  frame   ┌─────────────────────┐  replace  ┌───────────────┐
//! │  simulator   │─────────▶│  ConnectionManager  │──────────▶│ BoutStateStore │
//! └──────────────┘          │ (ConnectionLifecycle)│           └───────┬───────┘
//!                           └──────────┬──────────┘                   │ subscribe
//!                                      │ status                       ▼
//!                                      └─────────────────────▶   renderer
//! ```
//!
//! Nothing in this module does I/O.

pub mod bout;
pub mod connection;
pub mod distance;
pub mod store;

// Re-export commonly used types
pub use bout::{BoutState, FencerState, Side};
pub use connection::{ConnectionEvent, ConnectionLifecycle, ConnectionStatus, InvalidTransition};
pub use distance::{Distance, DistanceClass, DistanceGeometryMapper, DEFAULT_SPACING};
pub use store::{BoutStateStore, Snapshot, SnapshotWatch};
