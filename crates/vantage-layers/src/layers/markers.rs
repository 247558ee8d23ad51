// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Single-primitive markers, one renderable per topic.
//!
//! Cubes and spheres borrow a shared unit template and carry the message
//! `scale` on the payload ([`MarkerPayload::scale`]) for the host to apply
//! per instance, so resizing one never rebuilds or touches the template.
//! Line strips and point sets own a buffer built from the message points; it
//! is rebuilt only when the primitive type, the points or the scale change,
//! so a marker republished with a new timestamp keeps its geometry. Color is
//! a material uniform and never triggers a rebuild.

use std::any::Any;
use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{FrameState, SceneContext};
use crate::extension::{MessageEvent, SceneExtension};
use crate::layers::{
    edit_topic_field, split_topic_path, topic_path, topic_settings, unit_box, unit_sphere,
};
use crate::normalize::{normalize_event, ColorRgba, Marker, MarkerKind, PartialMarker, Vector3};
use crate::registry::Registry;
use crate::renderable::{LayerSettings, Renderable, RenderableKind, RenderablePayload};
use crate::resources::{
    GeometryData, GeometryHandle, MaterialData, MaterialHandle, ResourceId, SceneResources,
    SharedGeometry, Topology,
};
use crate::settings::{
    parse_rgba, SettingsAction, SettingsTreeEntry, SettingsTreeField, SettingsTreeNode,
};

/// Schema handled by [`MarkerLayer`].
pub const MARKER_SCHEMA: &str = "vantage.Marker";
/// Shared cube template.
pub const UNIT_CUBE: &str = "unit-cube";
/// Shared sphere template.
pub const UNIT_SPHERE: &str = "unit-sphere";

/// Per-topic settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MarkerSettings {
    /// Visibility toggle.
    pub visible: bool,
    /// Frame override.
    pub frame_id: Option<String>,
    /// `#rrggbb[aa]` color replacing the message color.
    pub color: Option<String>,
}

impl Default for MarkerSettings {
    fn default() -> Self {
        Self {
            visible: true,
            frame_id: None,
            color: None,
        }
    }
}

impl LayerSettings for MarkerSettings {
    fn frame_id(&self) -> Option<&str> {
        self.frame_id.as_deref().filter(|id| !id.is_empty())
    }

    fn visible(&self) -> bool {
        self.visible
    }
}

/// Inputs that determine the marker's vertex buffer.
#[derive(Clone, Debug, PartialEq)]
enum GeometryKey {
    Template(MarkerKind),
    Owned {
        kind: MarkerKind,
        points: Vec<Vector3>,
        scale: Vector3,
    },
}

impl GeometryKey {
    fn of(marker: &Marker) -> Option<Self> {
        let kind = marker.kind()?;
        Some(if kind.is_templated() {
            Self::Template(kind)
        } else {
            Self::Owned {
                kind,
                points: marker.points.clone(),
                scale: marker.scale,
            }
        })
    }
}

#[derive(Debug)]
enum MarkerGeometry {
    Shared(SharedGeometry),
    Owned(GeometryHandle),
}

/// Resources of one marker.
#[derive(Debug, Default)]
pub struct MarkerPayload {
    key: Option<GeometryKey>,
    geometry: Option<MarkerGeometry>,
    material: Option<MaterialHandle>,
    scale: Vec3,
    builds: usize,
}

impl MarkerPayload {
    /// Identity of the buffer currently drawn (template or owned).
    pub fn geometry_id(&self) -> Option<ResourceId> {
        self.geometry.as_ref().map(|geometry| match geometry {
            MarkerGeometry::Shared(shared) => shared.id(),
            MarkerGeometry::Owned(owned) => owned.id(),
        })
    }

    /// The color material.
    pub fn material(&self) -> Option<&MaterialHandle> {
        self.material.as_ref()
    }

    /// Per-axis extents applied to the shared unit template.
    ///
    /// Always [`Vec3::ONE`] for owned buffers, whose points are already final.
    pub fn scale(&self) -> Vec3 {
        self.scale
    }

    /// How many buffers have been built or borrowed over the marker's life.
    pub fn builds(&self) -> usize {
        self.builds
    }

    fn release_geometry(&mut self, resources: &mut SceneResources) {
        match self.geometry.take() {
            Some(MarkerGeometry::Shared(shared)) => resources.arena.release_shared(shared),
            Some(MarkerGeometry::Owned(owned)) => resources.arena.release_geometry(owned),
            None => {}
        }
    }

    fn update(
        &mut self,
        marker: &Marker,
        settings: &MarkerSettings,
        resources: &mut SceneResources,
    ) {
        let key = GeometryKey::of(marker);
        if key != self.key {
            self.release_geometry(resources);
            self.geometry = key.as_ref().map(|key| Self::build(key, resources));
            if self.geometry.is_some() {
                self.builds += 1;
            } else {
                debug!(marker_type = marker.marker_type, "unsupported marker type");
            }
            self.key = key;
        }
        self.scale = match self.key {
            Some(GeometryKey::Template(_)) => marker.scale.to_vec3(),
            _ => Vec3::ONE,
        };

        let color = settings
            .color
            .as_deref()
            .and_then(parse_rgba)
            .unwrap_or_else(|| ColorRgba::to_array(marker.color));
        #[allow(clippy::cast_possible_truncation)]
        let line_width = marker.scale.x as f32;
        let visible = settings.visible && self.geometry.is_some();
        match &self.material {
            Some(handle) => {
                if let Some(material) = resources.arena.material_mut(handle) {
                    material.color = color;
                    material.line_width = line_width;
                    material.visible = visible;
                }
            }
            None => {
                self.material = Some(resources.arena.create_material(MaterialData {
                    color,
                    line_width,
                    visible,
                }));
            }
        }
    }

    fn build(key: &GeometryKey, resources: &mut SceneResources) -> MarkerGeometry {
        match key {
            GeometryKey::Template(MarkerKind::Sphere) => {
                MarkerGeometry::Shared(resources.arena.acquire_shared(UNIT_SPHERE, unit_sphere))
            }
            GeometryKey::Template(_) => {
                MarkerGeometry::Shared(resources.arena.acquire_shared(UNIT_CUBE, unit_box))
            }
            GeometryKey::Owned { kind, points, .. } => {
                let topology = if *kind == MarkerKind::LineStrip {
                    Topology::LineStrip
                } else {
                    Topology::Points
                };
                let positions = points.iter().map(|p| p.to_vec3()).collect();
                let data = GeometryData::new(topology, positions);
                MarkerGeometry::Owned(resources.arena.create_geometry(data))
            }
        }
    }
}

impl RenderablePayload for MarkerPayload {
    fn kind(&self) -> RenderableKind {
        RenderableKind::Marker
    }

    fn dispose(&mut self, resources: &mut SceneResources) {
        self.release_geometry(resources);
        if let Some(material) = self.material.take() {
            resources.arena.release_material(material);
        }
        self.key = None;
    }
}

/// A marker renderable.
pub type MarkerRenderable = Renderable<MarkerSettings, MarkerPayload>;

/// Extension drawing `vantage.Marker` topics.
#[derive(Debug, Default)]
pub struct MarkerLayer {
    registry: Registry<MarkerSettings, MarkerPayload>,
    last: BTreeMap<String, Marker>,
}

impl MarkerLayer {
    /// Creates an empty layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Live markers keyed by topic.
    pub fn registry(&self) -> &Registry<MarkerSettings, MarkerPayload> {
        &self.registry
    }

    fn apply(&mut self, topic: &str, ctx: &mut SceneContext) {
        let Some(marker) = self.last.get(topic) else {
            return;
        };
        let settings: MarkerSettings = topic_settings(ctx, topic);
        let resources = &mut ctx.resources;
        let renderable = self.registry.get_or_insert_with(topic, || {
            Renderable::new(
                topic,
                topic_path(topic),
                settings.clone(),
                MarkerPayload::default(),
            )
        });
        renderable.payload.update(marker, &settings, resources);
        renderable.user_data.pose = marker.pose.to_pose();
        renderable.user_data.settings = settings;
        ctx.request_render();
    }
}

impl SceneExtension for MarkerLayer {
    fn extension_id(&self) -> &'static str {
        "vantage.markers"
    }

    fn supported_schemas(&self) -> &'static [&'static str] {
        &[MARKER_SCHEMA]
    }

    fn settings_nodes(&mut self, ctx: &mut SceneContext) -> Vec<SettingsTreeEntry> {
        let _ = ctx;
        self.registry
            .iter()
            .map(|marker| {
                let settings = &marker.user_data.settings;
                SettingsTreeEntry {
                    path: marker.user_data.settings_path.clone(),
                    node: SettingsTreeNode {
                        label: marker.key().to_owned(),
                        visible: Some(settings.visible),
                        fields: vec![
                            SettingsTreeField::string(
                                "frameId",
                                "Frame",
                                settings.frame_id.as_deref(),
                                Some("<message frame>"),
                            ),
                            SettingsTreeField::string(
                                "color",
                                "Color override",
                                settings.color.as_deref(),
                                None,
                            ),
                        ],
                        error: marker.transform_error().map(ToString::to_string),
                        ..SettingsTreeNode::default()
                    },
                }
            })
            .collect()
    }

    fn handle_settings_action(
        &mut self,
        action: &SettingsAction,
        ctx: &mut SceneContext,
    ) -> bool {
        let SettingsAction::Update { path, value } = action else {
            return false;
        };
        let Some((topic, Some(field))) = split_topic_path(path) else {
            return false;
        };
        if !self.registry.contains(topic) {
            return false;
        }
        if edit_topic_field::<MarkerSettings>(ctx, topic, field, value.clone()) {
            self.apply(topic, ctx);
        }
        true
    }

    fn start_frame(&mut self, frame: &FrameState, ctx: &mut SceneContext) {
        let (transforms, resources) = ctx.frame_parts();
        self.registry.start_frame(frame, transforms);
        for marker in self.registry.iter() {
            let drawn = marker.is_visible() && marker.payload.geometry_id().is_some();
            let Some(handle) = marker.payload.material() else {
                continue;
            };
            if let Some(material) = resources.arena.material_mut(handle) {
                material.visible = drawn;
            }
        }
    }

    fn handle_message(&mut self, event: &MessageEvent, ctx: &mut SceneContext) {
        let marker = normalize_event::<PartialMarker>(event);
        let (stamp, frame_id) = (marker.header.stamp, marker.header.frame_id.clone());
        self.last.insert(event.topic.clone(), marker);
        self.apply(&event.topic, ctx);
        if let Some(renderable) = self.registry.get_mut(&event.topic) {
            renderable.record_message(event.receive_time, stamp, &frame_id);
        }
    }

    fn remove_all_renderables(&mut self, ctx: &mut SceneContext) {
        self.registry.clear(&mut ctx.resources);
        self.last.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::expect_used)]
    use super::*;
    use serde_json::{json, Value};
    use vantage_scene_port::mock::StaticTransforms;
    use vantage_scene_port::Time;

    fn event(message: Value) -> MessageEvent {
        MessageEvent::new("/marker", MARKER_SCHEMA, Time::new(5, 0), message)
    }

    fn payload(layer: &MarkerLayer) -> &MarkerPayload {
        &layer.registry().get("/marker").unwrap().payload
    }

    fn material<'a>(ctx: &'a SceneContext, payload: &MarkerPayload) -> &'a MaterialData {
        let handle = payload.material().unwrap();
        ctx.resources.arena.material(handle).unwrap()
    }

    #[test]
    fn cubes_share_one_template() {
        let mut ctx = SceneContext::new(StaticTransforms::new());
        let mut layer = MarkerLayer::new();
        layer.handle_message(&event(json!({ "type": 0 })), &mut ctx);
        let mut other = event(json!({ "type": 0 }));
        other.topic = "/other".into();
        layer.handle_message(&other, &mut ctx);
        assert_eq!(ctx.resources.arena.shared_refs(UNIT_CUBE), 2);

        layer.remove_all_renderables(&mut ctx);
        assert_eq!(ctx.resources.arena.shared_refs(UNIT_CUBE), 0);
        assert_eq!(ctx.resources.arena.live_count(), 0);
    }

    #[test]
    fn changed_points_rebuild_owned_geometry() {
        let mut ctx = SceneContext::new(StaticTransforms::new());
        let mut layer = MarkerLayer::new();
        let first = json!({ "type": 2, "points": [{ "x": 0 }, { "x": 1 }] });
        layer.handle_message(&event(first), &mut ctx);
        let before = payload(&layer).geometry_id().unwrap();

        let second = json!({ "type": 2, "points": [{ "x": 0 }, { "x": 2 }] });
        layer.handle_message(&event(second), &mut ctx);
        let after = payload(&layer).geometry_id().unwrap();
        assert_ne!(before, after);
        assert!(!ctx.resources.arena.is_live(before));
    }

    #[test]
    fn color_change_keeps_geometry() {
        let mut ctx = SceneContext::new(StaticTransforms::new());
        let mut layer = MarkerLayer::new();
        let plain = json!({ "type": 3, "points": [{ "y": 1 }] });
        layer.handle_message(&event(plain), &mut ctx);
        let before = payload(&layer).geometry_id();

        let red = json!({ "type": 3, "points": [{ "y": 1 }], "color": { "r": 1, "a": 1 } });
        layer.handle_message(&event(red), &mut ctx);
        assert_eq!(payload(&layer).geometry_id(), before);
        assert_eq!(material(&ctx, payload(&layer)).color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn color_override_wins() {
        let mut ctx = SceneContext::new(StaticTransforms::new());
        let mut layer = MarkerLayer::new();
        layer.handle_message(&event(json!({ "type": 1 })), &mut ctx);
        let action = SettingsAction::update(["topics", "/marker", "color"], "#00ff00");
        assert!(layer.handle_settings_action(&action, &mut ctx));
        assert_eq!(material(&ctx, payload(&layer)).color, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(payload(&layer).builds(), 1);
    }

    #[test]
    fn unknown_type_draws_nothing() {
        let mut ctx = SceneContext::new(StaticTransforms::new());
        let mut layer = MarkerLayer::new();
        layer.handle_message(&event(json!({ "type": 99 })), &mut ctx);
        assert_eq!(payload(&layer).geometry_id(), None);
        assert!(!material(&ctx, payload(&layer)).visible);
    }

    #[test]
    fn template_scale_rides_on_the_payload() {
        let mut ctx = SceneContext::new(StaticTransforms::new());
        let mut layer = MarkerLayer::new();
        let cube = json!({ "type": 0, "scale": { "x": 2, "y": 3, "z": 4 } });
        layer.handle_message(&event(cube), &mut ctx);
        assert_eq!(payload(&layer).scale(), Vec3::new(2.0, 3.0, 4.0));
        let template = payload(&layer).geometry_id();

        let resized = json!({ "type": 0, "scale": { "x": 1, "y": 1, "z": 0.5 } });
        layer.handle_message(&event(resized), &mut ctx);
        assert_eq!(payload(&layer).scale(), Vec3::new(1.0, 1.0, 0.5));
        assert_eq!(payload(&layer).geometry_id(), template);
        assert_eq!(payload(&layer).builds(), 1);
        assert_eq!(ctx.resources.arena.shared_refs(UNIT_CUBE), 1);

        let strip = json!({ "type": 2, "scale": { "x": 3 }, "points": [{ "x": 1 }] });
        layer.handle_message(&event(strip), &mut ctx);
        assert_eq!(payload(&layer).scale(), Vec3::ONE);
        assert_eq!(ctx.resources.arena.shared_refs(UNIT_CUBE), 0);
    }

    #[test]
    fn visibility_round_trip_leaves_layout_minimal() {
        let mut ctx = SceneContext::new(StaticTransforms::new());
        let mut layer = MarkerLayer::new();
        layer.handle_message(&event(json!({ "type": 0 })), &mut ctx);
        let shown = |layer: &MarkerLayer| {
            let marker = layer.registry().get("/marker").unwrap();
            marker.user_data.settings.visible
        };

        let hide = SettingsAction::update(["topics", "/marker", "visible"], false);
        assert!(layer.handle_settings_action(&hide, &mut ctx));
        let stored = ctx.settings.config().topics.get("/marker");
        assert_eq!(stored.unwrap().get("visible"), Some(&json!(false)));
        assert!(!shown(&layer));
        assert!(!material(&ctx, payload(&layer)).visible);

        let show = SettingsAction::update(["topics", "/marker", "visible"], true);
        assert!(layer.handle_settings_action(&show, &mut ctx));
        assert!(!ctx.settings.config().topics.contains_key("/marker"));
        assert!(shown(&layer));
        assert!(material(&ctx, payload(&layer)).visible);
    }
}
