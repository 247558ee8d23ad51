// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Rigid poses used for renderable placement.

use glam::{Quat, Vec3};

/// Rigid transform: rotation followed by translation.
///
/// Conventions:
/// - `position` in meters, expressed in the parent frame.
/// - `orientation` is a unit quaternion; [`Pose::new`] normalizes its input
///   and treats a zero-length quaternion as identity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    /// Translation component.
    pub position: Vec3,
    /// Rotation component.
    pub orientation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    /// The identity pose.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };

    /// Creates a pose, normalizing the orientation.
    #[must_use]
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        let orientation = if orientation.length_squared() <= f32::EPSILON {
            Quat::IDENTITY
        } else {
            orientation.normalize()
        };
        Self {
            position,
            orientation,
        }
    }

    /// Pose with translation only.
    #[must_use]
    pub fn from_translation(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
        }
    }

    /// Composes `self * child`: `child` expressed in `self`'s frame.
    #[must_use]
    pub fn compose(&self, child: &Self) -> Self {
        Self {
            position: self.position + self.orientation * child.position,
            orientation: self.orientation * child.orientation,
        }
    }

    /// The inverse pose.
    #[must_use]
    pub fn inverse(&self) -> Self {
        let orientation = self.orientation.inverse();
        Self {
            position: orientation * -self.position,
            orientation,
        }
    }

    /// Maps a point from this pose's local frame into its parent frame.
    #[must_use]
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.orientation * point
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use core::f32::consts::FRAC_PI_2;

    #[test]
    fn zero_quaternion_becomes_identity() {
        let pose = Pose::new(Vec3::X, Quat::from_xyzw(0.0, 0.0, 0.0, 0.0));
        assert_eq!(pose.orientation, Quat::IDENTITY);
    }

    #[test]
    fn compose_then_inverse_is_identity() {
        let a = Pose::new(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_z(FRAC_PI_2));
        let round = a.compose(&a.inverse());
        assert_relative_eq!(round.position.length(), 0.0, epsilon = 1e-5);
        assert_relative_eq!(round.orientation.w.abs(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn transform_point_rotates_then_translates() {
        let pose = Pose::new(Vec3::new(10.0, 0.0, 0.0), Quat::from_rotation_z(FRAC_PI_2));
        let p = pose.transform_point(Vec3::X);
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-5);
        assert_relative_eq!(p.y, 1.0, epsilon = 1e-5);
    }
}
