//! Piste Watch
//!
//! Live visualization client for a fencing bout simulator.
//!
//! # Overview
//!
//! The simulator streams complete bout snapshots as JSON over a WebSocket.
//! This crate provides:
//!
//! - **Distance mapping** - Qualitative distance classes mapped to the pixel
//!   spacing used to place the fencers, with a fixed fallback for unknown values.
//!
//! - **Bout state store** - Holds exactly one snapshot, replaced wholesale on
//!   every frame, with watch-style change notification for renderers.
//!
//! - **Connection management** - A `Disconnected → Connecting → Connected`
//!   lifecycle driving a receive-only WebSocket client.
//!
//! - **Rendering** - Piste geometry and a terminal frame built from the
//!   current snapshot and connection status.
//!
//! # Design Principles
//!
//! 1. **Snapshots are never merged** - Each frame supersedes everything before it.
//!
//! 2. **Bad frames are not fatal** - A frame that fails to parse is logged and
//!    dropped; the last good snapshot stays on screen.
//!
//! 3. **State machines validate transitions** - The lifecycle rejects events
//!    that make no sense for the current status.
//!
//! # Example
//!
//! ```rust
//! use piste_watch::{BoutStateStore, ClientConfig, ConnectionManager, DistanceGeometryMapper};
//!
//! let store = BoutStateStore::new();
//! let manager = ConnectionManager::new(ClientConfig::default(), store.clone());
//!
//! let frame = r#"{"distance":"LUNGE",
//!     "fencer1":{"name":"A","score":1,"blade_position":"Sixte","has_priority":true},
//!     "fencer2":{"name":"B","score":0,"blade_position":"Quarte","has_priority":false},
//!     "rounds":2}"#;
//! manager.on_message(frame).unwrap();
//!
//! let current = store.current();
//! assert_eq!(DistanceGeometryMapper::spacing_for(Some(&current.distance)), 300);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod render;
pub mod state;

pub use client::{ConnectionManager, StatusWatch};
pub use config::{ClientConfig, ReconnectPolicy};
pub use error::{ClientError, ParseError, TransportError};
pub use state::*;
