// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Pointer input delivered by the host's picking layer.

use glam::Vec3;

/// Kind of pointer event an interactive tool can listen for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PointerEventKind {
    /// Primary button click.
    Click,
    /// Pointer motion.
    Move,
}

/// A pointer event with its resolved world-space hit point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerEvent {
    /// Event kind.
    pub kind: PointerEventKind,
    /// Hit point in the render frame; `None` when the pointer is off every
    /// pickable surface. Consumers treat `None` as a no-op.
    pub world_point: Option<Vec3>,
}

impl PointerEvent {
    /// Click at a world point.
    #[must_use]
    pub fn click(point: Vec3) -> Self {
        Self {
            kind: PointerEventKind::Click,
            world_point: Some(point),
        }
    }

    /// Move to a world point.
    #[must_use]
    pub fn moved(point: Vec3) -> Self {
        Self {
            kind: PointerEventKind::Move,
            world_point: Some(point),
        }
    }

    /// Event with no resolved world point.
    #[must_use]
    pub fn off_surface(kind: PointerEventKind) -> Self {
        Self {
            kind,
            world_point: None,
        }
    }
}
