// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Interactive tools driven by pointer input.
//!
//! [`placement::PlacementMachine`] is the pure N-point state machine;
//! [`volume::VolumeTool`] wraps it as a scene extension that owns pointer
//! listeners, preview geometry and a subscriber list for [`ToolEvent`]s.

pub mod placement;
pub mod volume;

use glam::Vec3;

/// Axis-aligned volume spanned by two placed points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeShape {
    /// The placed points, in click order.
    pub corners: [Vec3; 2],
}

impl VolumeShape {
    /// Component-wise minimum corner.
    pub fn min(&self) -> Vec3 {
        self.corners[0].min(self.corners[1])
    }

    /// Component-wise maximum corner.
    pub fn max(&self) -> Vec3 {
        self.corners[0].max(self.corners[1])
    }

    /// Edge lengths.
    pub fn size(&self) -> Vec3 {
        self.max() - self.min()
    }
}

/// Notifications emitted by tools to their subscribers.
#[derive(Clone, Debug, PartialEq)]
pub enum ToolEvent {
    /// Placement began.
    Started,
    /// Placement left its active states; `shape` is `None` on cancellation.
    Ended {
        /// The completed shape.
        shape: Option<VolumeShape>,
    },
}
