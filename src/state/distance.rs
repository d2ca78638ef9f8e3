//! Distance classification and its geometric spacing.
//!
//! The simulator reports how far apart the fencers are as one of six
//! qualitative classes. For layout each class maps to a fixed pixel spacing
//! between the two fencers; anything the client does not recognise is drawn
//! at medium distance.
//!
//! | Class            | Wire key          | Spacing |
//! |------------------|-------------------|---------|
//! | Out of distance  | `OUT_OF_DISTANCE` | 600     |
//! | Long             | `LONG`            | 500     |
//! | Medium           | `MEDIUM`          | 400     |
//! | Lunge            | `LUNGE`           | 300     |
//! | Short            | `SHORT`           | 200     |
//! | Infighting       | `INFIGHTING`      | 100     |

use std::fmt;

use serde::{Deserialize, Serialize};

/// Spacing used when the distance is missing or unrecognised.
pub const DEFAULT_SPACING: u32 = 400;

/// Qualitative distance between the two fencers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DistanceClass {
    /// Beyond attack distance (over 3m)
    OutOfDistance,
    /// Preparation distance (2-3m)
    Long,
    /// Standard engagement distance (1.5-2m)
    #[default]
    Medium,
    /// Lunge attack distance (1-1.5m)
    Lunge,
    /// Short attack distance (0.5-1m)
    Short,
    /// Corps-a-corps range (under 0.5m)
    Infighting,
}

impl DistanceClass {
    /// Every class, farthest first.
    pub const ALL: [DistanceClass; 6] = [
        Self::OutOfDistance,
        Self::Long,
        Self::Medium,
        Self::Lunge,
        Self::Short,
        Self::Infighting,
    ];

    /// Pixel spacing between the fencers for this class.
    pub fn spacing(&self) -> u32 {
        match self {
            Self::OutOfDistance => 600,
            Self::Long => 500,
            Self::Medium => 400,
            Self::Lunge => 300,
            Self::Short => 200,
            Self::Infighting => 100,
        }
    }

    /// Key used on the wire.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::OutOfDistance => "OUT_OF_DISTANCE",
            Self::Long => "LONG",
            Self::Medium => "MEDIUM",
            Self::Lunge => "LUNGE",
            Self::Short => "SHORT",
            Self::Infighting => "INFIGHTING",
        }
    }

    /// Human-readable label shown under the piste.
    pub fn label(&self) -> &'static str {
        match self {
            Self::OutOfDistance => "Out of Distance",
            Self::Long => "Long Distance",
            Self::Medium => "Medium Distance",
            Self::Lunge => "Lunge Distance",
            Self::Short => "Short Distance",
            Self::Infighting => "Infighting",
        }
    }

    /// One-line explanation shown beside the label.
    pub fn description(&self) -> &'static str {
        match self {
            Self::OutOfDistance => "Beyond attack distance",
            Self::Long => "Long preparation distance",
            Self::Medium => "Standard engagement distance",
            Self::Lunge => "Lunge attack distance",
            Self::Short => "Short attack distance",
            Self::Infighting => "Infighting distance",
        }
    }

    /// Real-world separation covered by this class, in metres (`min..max`).
    pub fn range_m(&self) -> (f32, f32) {
        match self {
            Self::OutOfDistance => (3.0, f32::INFINITY),
            Self::Long => (2.0, 3.0),
            Self::Medium => (1.5, 2.0),
            Self::Lunge => (1.0, 1.5),
            Self::Short => (0.5, 1.0),
            Self::Infighting => (0.0, 0.5),
        }
    }

    /// Parse a wire key (any case) or a display label.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL.into_iter().find(|class| {
            class.wire_name().eq_ignore_ascii_case(raw) || class.label().eq_ignore_ascii_case(raw)
        })
    }
}

impl fmt::Display for DistanceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Distance as received from the simulator.
///
/// Unknown values are kept verbatim rather than rejected, so one odd frame
/// still updates scores and fencers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawDistance", into = "String")]
pub enum Distance {
    Known(DistanceClass),
    Unrecognized(String),
}

impl Default for Distance {
    fn default() -> Self {
        Self::Known(DistanceClass::Medium)
    }
}

impl Distance {
    /// Classify a raw wire string, keeping it verbatim when unknown.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        match DistanceClass::parse(&raw) {
            Some(class) => Self::Known(class),
            None => Self::Unrecognized(raw),
        }
    }

    /// The recognised class, if any.
    pub fn class(&self) -> Option<DistanceClass> {
        match self {
            Self::Known(class) => Some(*class),
            Self::Unrecognized(_) => None,
        }
    }

    /// Check if the value maps to a known class.
    pub fn is_recognized(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Label for display; unknown values are shown as received.
    pub fn label(&self) -> &str {
        match self {
            Self::Known(class) => class.label(),
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl From<DistanceClass> for Distance {
    fn from(class: DistanceClass) -> Self {
        Self::Known(class)
    }
}

impl From<Distance> for String {
    fn from(distance: Distance) -> Self {
        match distance {
            Distance::Known(class) => class.wire_name().to_string(),
            Distance::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for Distance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Whatever JSON value sits in the `distance` field.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawDistance {
    Text(String),
    Other(serde_json::Value),
}

impl From<RawDistance> for Distance {
    fn from(raw: RawDistance) -> Self {
        match raw {
            RawDistance::Text(text) => Distance::from_raw(text),
            RawDistance::Other(value) => Distance::Unrecognized(value.to_string()),
        }
    }
}

/// Maps a distance to the spacing used to place the fencers.
///
/// Total over its input: a missing or unrecognised distance yields
/// [`DEFAULT_SPACING`].
#[derive(Debug, Clone, Copy, Default)]
pub struct DistanceGeometryMapper;

impl DistanceGeometryMapper {
    /// Spacing for a parsed distance, or the default when absent or unknown.
    pub fn spacing_for(distance: Option<&Distance>) -> u32 {
        match distance.and_then(Distance::class) {
            Some(class) => class.spacing(),
            None => DEFAULT_SPACING,
        }
    }

    /// Same mapping, straight from a raw wire value.
    pub fn spacing_for_raw(raw: Option<&str>) -> u32 {
        raw.and_then(DistanceClass::parse)
            .map_or(DEFAULT_SPACING, |class| class.spacing())
    }
}
