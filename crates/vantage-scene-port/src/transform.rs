// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Transform resolution port.

use thiserror::Error;

use crate::{Pose, Time};

/// One pose lookup: where is `source_frame_id` (as of `source_time`) inside
/// `render_frame_id` (as of `render_time`), pivoting through the fixed frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransformQuery<'a> {
    /// Frame the scene is rendered in.
    pub render_frame_id: &'a str,
    /// Frame treated as static across time (e.g. `map`).
    pub fixed_frame_id: &'a str,
    /// Frame the renderable's data is expressed in.
    pub source_frame_id: &'a str,
    /// Current render time.
    pub render_time: Time,
    /// Timestamp of the data.
    pub source_time: Time,
}

/// Why a query could not be answered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    /// No path exists between the two frames (yet).
    #[error("missing transform from frame <{from}> to frame <{to}>")]
    Missing {
        /// Source frame id.
        from: String,
        /// Render frame id.
        to: String,
    },
}

/// Coordinate-transform collaborator.
///
/// Scene extensions call this once per renderable per frame. An error is the
/// normal answer while the frame tree is still being received; callers hide
/// the renderable and retry on the next frame.
pub trait TransformResolver {
    /// Resolves the pose of `query.source_frame_id` in the render frame.
    fn resolve(&self, query: &TransformQuery<'_>) -> Result<Pose, TransformError>;
}
