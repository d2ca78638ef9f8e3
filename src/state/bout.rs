//! Bout snapshot types.
//!
//! A [`BoutState`] is the full displayable picture of a bout at one instant.
//! The simulator sends one per frame as a JSON object:
//!
//! ```json
//! {
//!   "distance": "SHORT",
//!   "fencer1": { "name": "A", "score": 3, "blade_position": "en-garde", "has_priority": true },
//!   "fencer2": { "name": "B", "score": 2, "blade_position": "en-garde", "has_priority": false },
//!   "current_action": "attack",
//!   "rounds": 5
//! }
//! ```
//!
//! Every field is required except `current_action`. Scores and rounds are
//! unsigned, so a negative value fails to parse like any other shape error.

use serde::{Deserialize, Serialize};

use super::distance::Distance;
use crate::error::ParseError;

/// One competitor's displayed status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FencerState {
    pub name: String,
    pub score: u32,
    pub blade_position: String,
    pub has_priority: bool,
}

impl FencerState {
    /// A fencer with the given name and everything else zeroed.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Which side of the piste a fencer is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Complete snapshot of a bout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoutState {
    pub distance: Distance,
    pub fencer1: FencerState,
    pub fencer2: FencerState,
    #[serde(default)]
    pub current_action: Option<String>,
    pub rounds: u32,
}

impl BoutState {
    /// Parse one inbound frame.
    pub fn from_json(payload: &str) -> Result<Self, ParseError> {
        Ok(serde_json::from_str(payload)?)
    }

    /// Serialize back to the wire shape.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "distance": self.distance,
            "fencer1": self.fencer1,
            "fencer2": self.fencer2,
            "current_action": self.current_action,
            "rounds": self.rounds,
        })
    }

    /// Current action, treating an empty string as no action.
    pub fn action(&self) -> Option<&str> {
        self.current_action
            .as_deref()
            .filter(|action| !action.trim().is_empty())
    }

    /// The fencer on the given side.
    pub fn fencer(&self, side: Side) -> &FencerState {
        match side {
            Side::Left => &self.fencer1,
            Side::Right => &self.fencer2,
        }
    }

    /// The side holding priority, if exactly one does.
    pub fn priority(&self) -> Option<Side> {
        match (self.fencer1.has_priority, self.fencer2.has_priority) {
            (true, false) => Some(Side::Left),
            (false, true) => Some(Side::Right),
            _ => None,
        }
    }

    /// Both fencers claim priority. Upstream should never send this.
    pub fn priority_conflict(&self) -> bool {
        self.fencer1.has_priority && self.fencer2.has_priority
    }
}
