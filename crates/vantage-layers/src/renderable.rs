// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Per-object state holder and its disposal contract.
//!
//! A [`Renderable`] pairs common bookkeeping ([`UserData`]: timestamps, frame,
//! pose, settings) with a layer-specific payload. Payloads own their GPU
//! resources and implement [`RenderablePayload`]; the [`RenderableKind`] tag
//! identifies the variant without a type hierarchy.

use vantage_scene_port::{Pose, Time, TransformError, TransformQuery, TransformResolver};

use crate::context::FrameState;
use crate::resources::SceneResources;
use crate::settings::SettingsPath;

/// Capability tag of a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RenderableKind {
    /// Concentric ring grid.
    Grid,
    /// Instanced object list with labels.
    ObjectList,
    /// Single marker primitive.
    Marker,
    /// Preview geometry of an interactive tool.
    ToolPreview,
}

/// Settings as seen by the shared pose/visibility logic.
pub trait LayerSettings {
    /// Frame override; `None` defers to the message frame or the render frame.
    fn frame_id(&self) -> Option<&str> {
        None
    }

    /// User visibility toggle.
    fn visible(&self) -> bool {
        true
    }
}

/// Layer-specific contents of a renderable.
pub trait RenderablePayload {
    /// Variant tag.
    fn kind(&self) -> RenderableKind;

    /// Releases every exclusively-owned resource and returns pooled ones.
    ///
    /// Must tolerate repeated calls and never-initialised resources.
    fn dispose(&mut self, resources: &mut SceneResources);
}

/// Bookkeeping shared by every renderable.
#[derive(Clone, Debug, PartialEq)]
pub struct UserData<S> {
    /// When the latest message arrived.
    pub receive_time: Time,
    /// Timestamp carried by the latest message.
    pub message_time: Time,
    /// Effective frame, re-derived at the start of every frame.
    pub frame_id: String,
    /// Frame named by the latest message header, if any.
    pub message_frame_id: Option<String>,
    /// Local pose within `frame_id`.
    pub pose: Pose,
    /// Where this renderable's settings live.
    pub settings_path: SettingsPath,
    /// Settings as of the last reconciliation.
    pub settings: S,
}

/// A live scene object.
#[derive(Debug)]
pub struct Renderable<S, P> {
    key: String,
    /// Shared bookkeeping.
    pub user_data: UserData<S>,
    /// Layer-specific contents.
    pub payload: P,
    visible: bool,
    world_pose: Pose,
    transform_error: Option<TransformError>,
    disposed: bool,
}

impl<S, P> Renderable<S, P>
where
    S: LayerSettings,
    P: RenderablePayload,
{
    /// Creates a renderable with zero timestamps and an identity pose.
    pub fn new(
        key: impl Into<String>,
        settings_path: SettingsPath,
        settings: S,
        payload: P,
    ) -> Self {
        Self {
            key: key.into(),
            user_data: UserData {
                receive_time: Time::ZERO,
                message_time: Time::ZERO,
                frame_id: String::new(),
                message_frame_id: None,
                pose: Pose::IDENTITY,
                settings_path,
                settings,
            },
            payload,
            visible: false,
            world_pose: Pose::IDENTITY,
            transform_error: None,
            disposed: false,
        }
    }

    /// Registry key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Variant tag of the payload.
    pub fn kind(&self) -> RenderableKind {
        self.payload.kind()
    }

    /// Whether the renderable was drawn as of the last frame.
    pub fn is_visible(&self) -> bool {
        self.visible && !self.disposed
    }

    /// Pose in the render frame as of the last successful resolution.
    pub fn world_pose(&self) -> Pose {
        self.world_pose
    }

    /// Why the last frame could not place this renderable.
    pub fn transform_error(&self) -> Option<&TransformError> {
        self.transform_error.as_ref()
    }

    /// Whether [`Renderable::dispose`] has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Records the timestamps and header frame of a freshly ingested message.
    pub fn record_message(&mut self, receive_time: Time, message_time: Time, frame_id: &str) {
        self.user_data.receive_time = receive_time;
        self.user_data.message_time = message_time;
        if frame_id.is_empty() {
            self.user_data.message_frame_id = None;
        } else if self.user_data.message_frame_id.as_deref() != Some(frame_id) {
            self.user_data.message_frame_id = Some(frame_id.to_owned());
        }
    }

    /// Re-derives the effective frame for this frame.
    ///
    /// Precedence: settings override, then the message header frame, then the
    /// render frame. Allocates only when the frame actually changes.
    pub fn refresh_frame_id(&mut self, frame: &FrameState) {
        let effective = self
            .user_data
            .settings
            .frame_id()
            .or(self.user_data.message_frame_id.as_deref())
            .unwrap_or(frame.render_frame_id.as_str());
        if self.user_data.frame_id != effective {
            self.user_data.frame_id = effective.to_owned();
        }
    }

    /// Base pose/visibility update: one resolver call, no geometry work.
    ///
    /// An unresolvable frame hides the renderable until a later frame
    /// resolves it; it is never removed here.
    pub fn update_pose(&mut self, frame: &FrameState, resolver: &dyn TransformResolver) {
        self.refresh_frame_id(frame);
        let query = TransformQuery {
            render_frame_id: &frame.render_frame_id,
            fixed_frame_id: &frame.fixed_frame_id,
            source_frame_id: &self.user_data.frame_id,
            render_time: frame.current_time,
            source_time: self.user_data.message_time,
        };
        match resolver.resolve(&query) {
            Ok(frame_pose) => {
                self.world_pose = frame_pose.compose(&self.user_data.pose);
                self.transform_error = None;
                self.visible = self.user_data.settings.visible();
            }
            Err(err) => {
                tracing::trace!(key = %self.key, %err, "hiding renderable");
                self.transform_error = Some(err);
                self.visible = false;
            }
        }
    }

    /// Places the renderable without a resolver (data already in the render frame).
    pub fn place_in_render_frame(&mut self, frame: &FrameState) {
        self.refresh_frame_id(frame);
        self.world_pose = self.user_data.pose;
        self.transform_error = None;
        self.visible = self.user_data.settings.visible();
    }

    /// Releases the payload's resources once; later calls are no-ops.
    /// Returns whether this call did the work.
    pub fn dispose(&mut self, resources: &mut SceneResources) -> bool {
        if self.disposed {
            return false;
        }
        self.payload.dispose(resources);
        self.disposed = true;
        self.visible = false;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{GeometryData, GeometryHandle, Topology};
    use glam::Vec3;
    use vantage_scene_port::mock::StaticTransforms;

    #[derive(Default)]
    struct Fixed {
        frame: Option<String>,
    }

    impl LayerSettings for Fixed {
        fn frame_id(&self) -> Option<&str> {
            self.frame.as_deref()
        }
    }

    #[derive(Default)]
    struct OneBuffer {
        geometry: Option<GeometryHandle>,
    }

    impl RenderablePayload for OneBuffer {
        fn kind(&self) -> RenderableKind {
            RenderableKind::Marker
        }

        fn dispose(&mut self, resources: &mut SceneResources) {
            if let Some(geometry) = self.geometry.take() {
                resources.arena.release_geometry(geometry);
            }
        }
    }

    fn frame(render: &str) -> FrameState {
        FrameState::new(Time::ZERO, render, render)
    }

    #[test]
    fn frame_id_falls_back_to_render_frame_every_frame() {
        let mut r = Renderable::new("k", vec![], Fixed::default(), OneBuffer::default());
        r.refresh_frame_id(&frame("map"));
        assert_eq!(r.user_data.frame_id, "map");
        r.refresh_frame_id(&frame("odom"));
        assert_eq!(r.user_data.frame_id, "odom");

        r.user_data.settings.frame = Some("base".into());
        r.refresh_frame_id(&frame("odom"));
        assert_eq!(r.user_data.frame_id, "base");
    }

    #[test]
    fn unresolvable_frame_hides_without_disposing() {
        let tf = StaticTransforms::new().with_frame("map", Pose::IDENTITY);
        let mut r = Renderable::new("k", vec![], Fixed::default(), OneBuffer::default());
        r.record_message(Time::ZERO, Time::ZERO, "lidar");
        r.update_pose(&frame("map"), &tf);
        assert!(!r.is_visible());
        assert!(r.transform_error().is_some());
        assert!(!r.is_disposed());
    }

    #[test]
    fn resolved_pose_composes_local_pose() {
        let tf = StaticTransforms::new()
            .with_frame("map", Pose::IDENTITY)
            .with_frame("base", Pose::from_translation(Vec3::X));
        let mut r = Renderable::new("k", vec![], Fixed::default(), OneBuffer::default());
        r.user_data.pose = Pose::from_translation(Vec3::Y);
        r.record_message(Time::ZERO, Time::ZERO, "base");
        r.update_pose(&frame("map"), &tf);
        assert!(r.is_visible());
        assert_eq!(r.world_pose().position, Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut resources = SceneResources::default();
        let geometry = resources
            .arena
            .create_geometry(GeometryData::new(Topology::Points, vec![Vec3::ZERO]));
        let mut r = Renderable::new(
            "k",
            vec![],
            Fixed::default(),
            OneBuffer {
                geometry: Some(geometry),
            },
        );
        assert!(r.dispose(&mut resources));
        assert!(!r.dispose(&mut resources));
        assert_eq!(resources.arena.released_count(), 1);
    }
}
