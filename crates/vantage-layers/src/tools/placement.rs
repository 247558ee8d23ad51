// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! N-point placement state machine.
//!
//! ```text
//! Idle --start--> PlaceFirstPoint --click--> PlaceSecondPoint --click--> ... --click--> Idle
//!   ^                                                                          (completed)
//!   +------------------------------ stop (any state) ------------------------------+
//! ```
//!
//! The state is derived from the captured point count, so it cannot disagree
//! with the points. Pointer motion only moves the uncommitted preview point.

use glam::Vec3;

/// Where the machine is in a placement flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlacementState {
    /// Not placing.
    Idle,
    /// Waiting for point 1.
    PlaceFirstPoint,
    /// Waiting for point 2.
    PlaceSecondPoint,
    /// Waiting for point `n + 1` (zero-based `n >= 2`).
    PlacePoint(usize),
}

/// Result of a click.
#[derive(Clone, Debug, PartialEq)]
pub enum ClickOutcome {
    /// Not placing; nothing happened.
    Ignored,
    /// A point was captured and more are needed.
    Captured,
    /// The last point was captured; the machine is idle again.
    Completed(Vec<Vec3>),
}

/// Placement of `required` ordered points.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementMachine {
    required: usize,
    active: bool,
    points: Vec<Vec3>,
    preview: Option<Vec3>,
}

impl PlacementMachine {
    /// Machine completing after `required` clicks (at least one).
    pub fn new(required: usize) -> Self {
        let required = required.max(1);
        Self {
            required,
            active: false,
            points: Vec::with_capacity(required),
            preview: None,
        }
    }

    /// Points needed to complete.
    pub fn required(&self) -> usize {
        self.required
    }

    /// Current state.
    pub fn state(&self) -> PlacementState {
        if !self.active {
            return PlacementState::Idle;
        }
        match self.points.len() {
            0 => PlacementState::PlaceFirstPoint,
            1 => PlacementState::PlaceSecondPoint,
            n => PlacementState::PlacePoint(n),
        }
    }

    /// Whether a placement is in progress.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Committed points.
    pub fn captured(&self) -> &[Vec3] {
        &self.points
    }

    /// Uncommitted hover point.
    pub fn preview(&self) -> Option<Vec3> {
        self.preview
    }

    /// Committed points followed by the hover point, capped at `required`.
    pub fn preview_points(&self) -> Vec<Vec3> {
        let mut points = self.points.clone();
        if let Some(preview) = self.preview.filter(|_| self.active) {
            points.push(preview);
        }
        points.truncate(self.required);
        points
    }

    /// `Idle -> PlaceFirstPoint`. Returns `false` (and changes nothing) when
    /// already placing.
    pub fn start(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        self.points.clear();
        self.preview = None;
        true
    }

    /// Commits `point`.
    pub fn click(&mut self, point: Vec3) -> ClickOutcome {
        if !self.active {
            return ClickOutcome::Ignored;
        }
        self.points.push(point);
        if self.points.len() < self.required {
            return ClickOutcome::Captured;
        }
        let points = core::mem::take(&mut self.points);
        self.reset();
        ClickOutcome::Completed(points)
    }

    /// Moves the preview point. Returns whether anything changed.
    pub fn hover(&mut self, point: Vec3) -> bool {
        if !self.active || self.preview == Some(point) {
            return false;
        }
        self.preview = Some(point);
        true
    }

    /// Cancels from any state. Returns whether a placement was in progress.
    pub fn stop(&mut self) -> bool {
        let was_active = self.active;
        self.reset();
        was_active
    }

    fn reset(&mut self) {
        self.active = false;
        self.points.clear();
        self.preview = None;
    }
}
