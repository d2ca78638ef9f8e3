//! Piste geometry and terminal rendering.
//!
//! Everything here is derived from a [`Snapshot`] and a [`ConnectionStatus`];
//! nothing is stored between frames.

use std::fmt;

use crate::state::bout::{FencerState, Side};
use crate::state::connection::ConnectionStatus;
use crate::state::distance::DistanceGeometryMapper;
use crate::state::store::Snapshot;

/// Touches shown as pips before the score overflows into digits only.
pub const SCORE_PIPS: u32 = 5;

/// Direction a fencer's blade points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facing {
    Left,
    Right,
}

/// Where one fencer is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FencerPlacement {
    /// Left edge of the body
    pub x: f32,
    pub y: f32,
    pub facing: Facing,
    /// Blade tip, measured from the body's left edge
    pub blade_tip_x: f32,
}

/// Scene dimensions for the piste view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PisteLayout {
    pub width: f32,
    pub height: f32,
    pub centerline: f32,
    pub piste_start: f32,
    pub piste_end: f32,
    pub piste_y: f32,
    pub body_width: f32,
    pub body_height: f32,
    pub body_y: f32,
    pub blade_length: f32,
}

impl Default for PisteLayout {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 200.0,
            centerline: 400.0,
            piste_start: 100.0,
            piste_end: 700.0,
            piste_y: 120.0,
            body_width: 20.0,
            body_height: 60.0,
            body_y: 130.0,
            blade_length: 50.0,
        }
    }
}

impl PisteLayout {
    /// Place both fencers `spacing` apart, symmetric about the centerline,
    /// each facing the other.
    pub fn place(&self, spacing: u32) -> (FencerPlacement, FencerPlacement) {
        let half = spacing as f32 / 2.0;

        let left_x = self.centerline - half;
        let left = FencerPlacement {
            x: left_x,
            y: self.body_y,
            facing: Facing::Right,
            blade_tip_x: left_x + self.body_width + self.blade_length,
        };

        let right_x = self.centerline + half - self.body_width;
        let right = FencerPlacement {
            x: right_x,
            y: self.body_y,
            facing: Facing::Left,
            blade_tip_x: right_x - self.blade_length,
        };

        (left, right)
    }

    /// Length of the strip between the end lines.
    pub fn piste_length(&self) -> f32 {
        self.piste_end - self.piste_start
    }
}

/// Score as filled and empty pips, e.g. `●●●○○ [3]`.
pub fn score_pips(score: u32) -> String {
    let filled = score.min(SCORE_PIPS) as usize;
    let empty = SCORE_PIPS.saturating_sub(score) as usize;
    format!("{}{} [{}]", "●".repeat(filled), "○".repeat(empty), score)
}

/// ASCII piste line with the two fencers, `width` columns wide.
///
/// Both fencers are placed with [`PisteLayout::place`] and the scene is scaled
/// down to `width` columns, so the gap tracks the mapped spacing.
pub fn piste_line(layout: &PisteLayout, spacing: u32, width: usize) -> String {
    const LEFT: &str = "{<";
    const RIGHT: &str = ">}";

    let scale = width as f32 / layout.width;
    let (left, right) = layout.place(spacing);
    let start = (left.x * scale).round() as usize;
    let end = ((right.x + layout.body_width) * scale).round() as usize;
    let gap = end
        .saturating_sub(start + LEFT.len() + RIGHT.len())
        .max(1);

    format!("{}{}{}{}", " ".repeat(start), LEFT, " ".repeat(gap), RIGHT)
}

fn fencer_line(fencer: &FencerState, holds_priority: bool) -> String {
    let name = if fencer.name.is_empty() { "-" } else { fencer.name.as_str() };
    let priority = if holds_priority { " (Priority)" } else { "" };
    format!("{}: {}{}", name, fencer.score, priority)
}

/// One terminal frame: status, scores, piste and bout details.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub snapshot: &'a Snapshot,
    pub status: ConnectionStatus,
    pub layout: &'a PisteLayout,
}

impl Frame<'_> {
    const WIDTH: usize = 60;
}

impl fmt::Display for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = Self::WIDTH;
        let state = &self.snapshot.state;
        let spacing = DistanceGeometryMapper::spacing_for(Some(&state.distance));
        let rule = "═".repeat(width);
        let piste = "─".repeat(width);

        writeln!(f, "{}", self.status.indicator())?;
        writeln!(f, "{}", rule)?;

        // only a single holder is highlighted; a conflict shows neither
        let holder = state.priority();
        let left = fencer_line(&state.fencer1, holder == Some(Side::Left));
        let right = fencer_line(&state.fencer2, holder == Some(Side::Right));
        let pad = width.saturating_sub(left.chars().count() + right.chars().count()).max(1);
        writeln!(f, "{}{}{}", left, " ".repeat(pad), right)?;
        writeln!(
            f,
            "{:<30}{:>30}",
            score_pips(state.fencer1.score),
            score_pips(state.fencer2.score)
        )?;

        writeln!(f, "{}", piste)?;
        writeln!(f, "{}", piste_line(self.layout, spacing, width))?;
        writeln!(f, "{}", piste)?;

        writeln!(f, "Round: {}", state.rounds)?;
        if let Some(action) = state.action() {
            writeln!(f, "Current Action: {}", action)?;
        }
        match state.distance.class() {
            Some(class) => writeln!(f, "Distance: {} ({})", class.label(), class.description())?,
            None => writeln!(f, "Distance: {}", state.distance.label())?,
        }

        if let Some(received_at) = self.snapshot.received_at {
            writeln!(f, "Updated {}", received_at.format("%H:%M:%S"))?;
        }
        write!(f, "{}", rule)
    }
}

/// Render one terminal frame with the default layout.
pub fn render_frame(snapshot: &Snapshot, status: ConnectionStatus) -> String {
    Frame {
        snapshot,
        status,
        layout: &PisteLayout::default(),
    }
    .to_string()
}
