// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory transform resolver for headless testing.
//!
//! [`StaticTransforms`] stores one time-invariant pose per frame, expressed in
//! a common root, and counts lookups so tests can assert call budgets.

use std::cell::Cell;
use std::collections::HashMap;

use crate::{Pose, TransformError, TransformQuery, TransformResolver};

/// Time-invariant frame table.
#[derive(Debug, Default)]
pub struct StaticTransforms {
    frames: HashMap<String, Pose>,
    lookups: Cell<usize>,
}

impl StaticTransforms {
    /// Creates an empty table (every query is unresolvable).
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a frame, posed relative to the shared root.
    pub fn insert_frame(&mut self, frame_id: impl Into<String>, pose: Pose) {
        self.frames.insert(frame_id.into(), pose);
    }

    /// Builder form of [`StaticTransforms::insert_frame`].
    #[must_use]
    pub fn with_frame(mut self, frame_id: impl Into<String>, pose: Pose) -> Self {
        self.insert_frame(frame_id, pose);
        self
    }

    /// Removes a frame; subsequent queries touching it fail.
    pub fn remove_frame(&mut self, frame_id: &str) {
        self.frames.remove(frame_id);
    }

    /// Number of `resolve` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.get()
    }
}

impl TransformResolver for StaticTransforms {
    fn resolve(&self, query: &TransformQuery<'_>) -> Result<Pose, TransformError> {
        self.lookups.set(self.lookups.get() + 1);
        let missing = || TransformError::Missing {
            from: query.source_frame_id.to_owned(),
            to: query.render_frame_id.to_owned(),
        };
        let source = self.frames.get(query.source_frame_id).ok_or_else(missing)?;
        let render = self.frames.get(query.render_frame_id).ok_or_else(missing)?;
        Ok(render.inverse().compose(source))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    use super::*;
    use crate::Time;
    use glam::Vec3;

    fn query<'a>(source: &'a str, render: &'a str) -> TransformQuery<'a> {
        TransformQuery {
            render_frame_id: render,
            fixed_frame_id: render,
            source_frame_id: source,
            render_time: Time::ZERO,
            source_time: Time::ZERO,
        }
    }

    #[test]
    fn resolves_relative_to_render_frame() {
        let tf = StaticTransforms::new()
            .with_frame("map", Pose::IDENTITY)
            .with_frame("base", Pose::from_translation(Vec3::new(2.0, 0.0, 0.0)));
        let pose = tf.resolve(&query("base", "map")).unwrap();
        assert_eq!(pose.position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(tf.lookups(), 1);
    }

    #[test]
    fn unknown_frame_is_missing() {
        let tf = StaticTransforms::new().with_frame("map", Pose::IDENTITY);
        let err = tf.resolve(&query("lidar", "map")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "missing transform from frame <lidar> to frame <map>"
        );
    }
}
