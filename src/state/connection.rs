//! Connection lifecycle state machine.
//!
//! Pure transition logic with no socket attached. The
//! [`ConnectionManager`](crate::client::ConnectionManager) feeds it events as
//! the transport reports them.
//!
//! # State Diagram
//!
//! ```text
//! ┌──────────────┐   start    ┌────────────┐   opened   ┌───────────┐
//! │ Disconnected │───────────▶│ Connecting │───────────▶│ Connected │
//! └──────────────┘            └─────┬──────┘            └─────┬─────┘
//!        ▲                          │ closed / failed         │ closed / failed
//!        └──────────────────────────┴─────────────────────────┘
//! ```
//!
//! `Closed` and `Failed` are accepted from every state and always land in
//! `Disconnected`.

use std::fmt;

use chrono::{DateTime, Utc};

pub use crate::error::InvalidTransition;

/// Connectivity as shown to the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// No socket open
    #[default]
    Disconnected,
    /// Handshake in progress
    Connecting,
    /// Receiving bout snapshots
    Connected,
}

impl ConnectionStatus {
    /// Lowercase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        }
    }

    /// Check if snapshots are being received.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }

    /// Connecting or connected.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }

    /// Status line text for the viewer.
    pub fn indicator(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting...",
            Self::Connected => "Connected to simulator",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Transport-level happenings that drive the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// A connection attempt was initiated
    Start,
    /// The handshake completed
    Opened,
    /// The socket was closed (by either side)
    Closed,
    /// Refused, reset or timed out
    Failed,
}

/// Lifecycle of the single connection to the bout source.
#[derive(Debug, Clone, Default)]
pub struct ConnectionLifecycle {
    status: ConnectionStatus,
    attempts: u32,
    changed_at: Option<DateTime<Utc>>,
}

impl ConnectionLifecycle {
    /// Create a lifecycle in `Disconnected`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current status.
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Number of `Start` events accepted.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// When the status last changed.
    pub fn changed_at(&self) -> Option<DateTime<Utc>> {
        self.changed_at
    }

    /// Apply an event, returning the resulting lifecycle.
    pub fn apply(&self, event: ConnectionEvent) -> Result<Self, InvalidTransition> {
        let mut next = self.clone();
        next.apply_mut(event)?;
        Ok(next)
    }

    /// Apply an event in place. Returns the previous status.
    pub fn apply_mut(
        &mut self,
        event: ConnectionEvent,
    ) -> Result<ConnectionStatus, InvalidTransition> {
        let previous = self.status;
        self.status = self.transition(event)?;
        if event == ConnectionEvent::Start {
            self.attempts += 1;
        }
        if previous != self.status {
            self.changed_at = Some(Utc::now());
        }
        Ok(previous)
    }

    fn transition(&self, event: ConnectionEvent) -> Result<ConnectionStatus, InvalidTransition> {
        use ConnectionEvent::*;
        use ConnectionStatus::*;

        let invalid = |reason: &'static str| InvalidTransition {
            from: self.status,
            event,
            reason,
        };

        match (self.status, event) {
            // Start: Disconnected -> Connecting
            (Disconnected, Start) => Ok(Connecting),
            (Connecting, Start) => Err(invalid("Already connecting")),
            (Connected, Start) => Err(invalid("Already connected")),

            // Opened: Connecting -> Connected
            (Connecting, Opened) => Ok(Connected),
            (Connected, Opened) => Err(invalid("Already connected")),
            (Disconnected, Opened) => Err(invalid("No connection attempt in progress")),

            // Closed / Failed: Any -> Disconnected
            (_, Closed) | (_, Failed) => Ok(Disconnected),
        }
    }

    /// Check if the lifecycle is in `Connected`.
    pub fn is_connected(&self) -> bool {
        self.status.is_connected()
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
