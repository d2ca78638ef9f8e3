//! Error types.
//!
//! Nothing in here is fatal to the process. Transport failures end up as a
//! `Disconnected` status, parse failures leave the last good snapshot in place.

use std::time::Duration;

use thiserror::Error;

use crate::state::connection::{ConnectionEvent, ConnectionStatus};

/// Failure to reach or stay connected to the bout source.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection attempt timed out after {after:?}")]
    TimedOut { after: Duration },

    #[error("websocket protocol error: {0}")]
    Protocol(tokio_tungstenite::tungstenite::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for TransportError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        match err {
            tokio_tungstenite::tungstenite::Error::Io(io) => Self::Io(io),
            other => Self::Protocol(other),
        }
    }
}

/// An inbound frame that could not be turned into a bout snapshot.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("frame is not a valid bout state: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("binary frame is not valid UTF-8")]
    NotUtf8,
}

/// A lifecycle event that is not allowed from the current status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition from {from} via {event:?}: {reason}")]
pub struct InvalidTransition {
    pub from: ConnectionStatus,
    pub event: ConnectionEvent,
    pub reason: &'static str,
}

/// Top-level error for the CLI.
///
/// Parse failures and rejected transitions are logged where they happen and
/// never reach the top level.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
}
