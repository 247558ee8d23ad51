// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config-driven concentric ring grids.
//!
//! Grids have no message stream: each instance is a layer entry in the layout
//! (`layerId = "grid"`), added from the `["layers"]` node and removed with its
//! own "delete" action. The registry follows the layout, never the reverse.
//!
//! # Rebuilds
//!
//! Ring radii depend on `minSize`, `maxSize` and `step` only ([`RingSpec`]).
//! The ring buffer is replaced (old one released first) exactly when the
//! `RingSpec` changes; color and line width are material uniforms updated in place,
//! and the position only moves the pose.

use std::any::Any;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;
use vantage_app_core::{ConfigSection, FieldMap, LAYER_ID_FIELD};
use vantage_scene_port::Pose;

use crate::context::{FrameState, SceneContext};
use crate::extension::SceneExtension;
use crate::registry::Registry;
use crate::renderable::{LayerSettings, Renderable, RenderableKind, RenderablePayload};
use crate::resources::{
    GeometryData, GeometryHandle, MaterialData, MaterialHandle, SceneResources, Topology,
};
use crate::settings::{
    apply_field_edit, parse_rgba, settings_or_default, settings_path, SettingsAction,
    SettingsNodeAction, SettingsTreeEntry, SettingsTreeField, SettingsTreeNode,
};

/// `layerId` of grid entries.
pub const GRID_LAYER_ID: &str = "grid";
/// Node action on `["layers"]` that adds a grid.
pub const ADD_GRID_ACTION: &str = "add-grid";
/// Node action on `["layers", id]` that deletes the grid.
pub const DELETE_ACTION: &str = "delete";

/// Line segments per ring.
pub const RING_SEGMENTS: usize = 64;
/// Upper bound on rings per grid; larger requests are truncated.
pub const MAX_RINGS: usize = 1024;

const DEFAULT_COLOR: &str = "#a0a0a4ff";

/// Persisted settings of one grid instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GridSettings {
    /// Display name.
    pub label: String,
    /// Visibility toggle.
    pub visible: bool,
    /// Frame override; `None` draws in the render frame.
    pub frame_id: Option<String>,
    /// Innermost ring radius (meters).
    pub min_size: f64,
    /// Rings are drawn strictly below this radius.
    pub max_size: f64,
    /// Radius increment between rings.
    pub step: f64,
    /// `#rrggbb[aa]` line color.
    pub color: String,
    /// Line width in pixels.
    pub line_width: f64,
    /// Offset of the grid centre within its frame.
    pub position: [f64; 3],
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            label: "Grid".to_owned(),
            visible: true,
            frame_id: None,
            min_size: 1.0,
            max_size: 10.0,
            step: 1.0,
            color: DEFAULT_COLOR.to_owned(),
            line_width: 1.0,
            position: [0.0; 3],
        }
    }
}

impl LayerSettings for GridSettings {
    fn frame_id(&self) -> Option<&str> {
        self.frame_id.as_deref().filter(|id| !id.is_empty())
    }

    fn visible(&self) -> bool {
        self.visible
    }
}

impl GridSettings {
    #[allow(clippy::cast_possible_truncation)]
    fn material(&self) -> MaterialData {
        let fallback = parse_rgba(DEFAULT_COLOR).unwrap_or([1.0; 4]);
        MaterialData {
            color: parse_rgba(&self.color).unwrap_or(fallback),
            line_width: self.line_width as f32,
            visible: self.visible,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn pose(&self) -> Pose {
        let [x, y, z] = self.position;
        Pose::from_translation(Vec3::new(x as f32, y as f32, z as f32))
    }
}

/// The geometry-affecting subset of [`GridSettings`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RingSpec {
    /// Innermost radius.
    pub min: f64,
    /// Exclusive outer bound.
    pub max: f64,
    /// Increment.
    pub step: f64,
}

impl From<&GridSettings> for RingSpec {
    fn from(settings: &GridSettings) -> Self {
        Self {
            min: settings.min_size,
            max: settings.max_size,
            step: settings.step,
        }
    }
}

impl RingSpec {
    /// Radii `min + i * step` strictly below `max`, skipping non-positive ones.
    ///
    /// A non-positive or non-finite step draws at most the `min` ring.
    pub fn radii(&self) -> Vec<f64> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Vec::new();
        }
        if !(self.step.is_finite() && self.step > 0.0) {
            return if self.min > 0.0 && self.min < self.max {
                vec![self.min]
            } else {
                Vec::new()
            };
        }
        // Index of the first positive radius; the walk itself is bounded.
        let first = if self.min > 0.0 {
            0.0
        } else {
            (-self.min / self.step).floor() + 1.0
        };
        (0_u32..)
            .take(MAX_RINGS)
            .map(|i| self.min + (first + f64::from(i)) * self.step)
            .take_while(|r| *r < self.max)
            .filter(|r| *r > 0.0)
            .collect()
    }

    /// Line-list vertices for every ring, in the XY plane.
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn geometry(&self) -> GeometryData {
        let radii = self.radii();
        let mut positions = Vec::with_capacity(radii.len() * RING_SEGMENTS * 2);
        for radius in radii {
            let radius = radius as f32;
            for i in 0..RING_SEGMENTS {
                for j in [i, i + 1] {
                    let theta = core::f32::consts::TAU * j as f32 / RING_SEGMENTS as f32;
                    let (s, c) = theta.sin_cos();
                    positions.push(Vec3::new(c * radius, s * radius, 0.0));
                }
            }
        }
        GeometryData::new(Topology::LineList, positions)
    }
}

/// Resources of one grid.
#[derive(Debug, Default)]
pub struct GridPayload {
    rings: Option<RingSpec>,
    geometry: Option<GeometryHandle>,
    material: Option<MaterialHandle>,
    builds: usize,
}

impl GridPayload {
    /// Ring parameters of the current buffer.
    pub fn rings(&self) -> Option<RingSpec> {
        self.rings
    }

    /// The current ring buffer.
    pub fn geometry(&self) -> Option<&GeometryHandle> {
        self.geometry.as_ref()
    }

    /// The line material.
    pub fn material(&self) -> Option<&MaterialHandle> {
        self.material.as_ref()
    }

    /// How many ring buffers have been built over the grid's life.
    pub fn builds(&self) -> usize {
        self.builds
    }

    fn sync(&mut self, settings: &GridSettings, resources: &mut SceneResources) {
        let wanted = RingSpec::from(settings);
        if self.rings != Some(wanted) || self.geometry.is_none() {
            if let Some(old) = self.geometry.take() {
                resources.arena.release_geometry(old);
            }
            self.geometry = Some(resources.arena.create_geometry(wanted.geometry()));
            self.rings = Some(wanted);
            self.builds += 1;
        }

        let material = settings.material();
        match &self.material {
            Some(handle) => {
                if let Some(data) = resources.arena.material_mut(handle) {
                    data.color = material.color;
                    data.line_width = material.line_width;
                }
            }
            None => self.material = Some(resources.arena.create_material(material)),
        }
    }
}

impl RenderablePayload for GridPayload {
    fn kind(&self) -> RenderableKind {
        RenderableKind::Grid
    }

    fn dispose(&mut self, resources: &mut SceneResources) {
        if let Some(geometry) = self.geometry.take() {
            resources.arena.release_geometry(geometry);
        }
        if let Some(material) = self.material.take() {
            resources.arena.release_material(material);
        }
        self.rings = None;
    }
}

/// A grid renderable.
pub type GridRenderable = Renderable<GridSettings, GridPayload>;

/// Extension owning every grid instance.
#[derive(Debug, Default)]
pub struct GridLayer {
    registry: Registry<GridSettings, GridPayload>,
}

fn layers_root() -> Vec<String> {
    settings_path([ConfigSection::Layers.key()])
}

fn instance_path(instance_id: &str) -> Vec<String> {
    settings_path([ConfigSection::Layers.key(), instance_id])
}

fn owned_by_grid(fields: &FieldMap) -> bool {
    fields.get(LAYER_ID_FIELD).and_then(Value::as_str) == Some(GRID_LAYER_ID)
}

impl GridLayer {
    /// Creates an empty layer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Live grids keyed by instance id.
    pub fn registry(&self) -> &Registry<GridSettings, GridPayload> {
        &self.registry
    }

    /// Adds a grid entry with default settings and returns its instance id
    /// (`grid-<n>`, smallest unused `n`).
    pub fn add_grid(&mut self, ctx: &mut SceneContext) -> String {
        let instance_id = ctx.settings.modify(|cfg| {
            let instance_id = (1..)
                .map(|n| format!("{GRID_LAYER_ID}-{n}"))
                .find(|id| !cfg.layers.contains_key(id))
                .unwrap_or_default();
            cfg.insert_layer(GRID_LAYER_ID, &instance_id, Map::new());
            instance_id
        });
        debug!(instance_id = %instance_id, "added grid");
        self.sync_instance(&instance_id, ctx);
        ctx.request_settings_refresh();
        instance_id
    }

    /// Removes a grid from the layout and the registry as one step.
    /// Returns `false` when `instance_id` is not a grid.
    pub fn delete_grid(&mut self, instance_id: &str, ctx: &mut SceneContext) -> bool {
        let section = ConfigSection::Layers;
        let removed = ctx.settings.modify(|cfg| {
            let owned = cfg.entry(section, instance_id).is_some_and(owned_by_grid);
            owned && cfg.remove_entry(section, instance_id).is_some()
        });
        if !removed && !self.registry.contains(instance_id) {
            return false;
        }
        self.registry.remove(instance_id, &mut ctx.resources);
        ctx.request_settings_refresh();
        ctx.request_render();
        debug!(instance_id, "deleted grid");
        true
    }

    /// Brings one instance in line with its layout entry: create, update, or
    /// dispose when the entry is gone.
    fn sync_instance(&mut self, instance_id: &str, ctx: &mut SceneContext) {
        let entry = ctx
            .settings
            .config()
            .entry(ConfigSection::Layers, instance_id)
            .filter(|fields| owned_by_grid(fields));
        let Some(fields) = entry else {
            if self.registry.remove(instance_id, &mut ctx.resources) {
                ctx.request_render();
            }
            return;
        };
        let settings: GridSettings = settings_or_default(instance_id, Some(fields));
        let resources = &mut ctx.resources;
        let changed = match self.registry.get_mut(instance_id) {
            Some(grid) => Self::apply(grid, settings, resources),
            None => {
                let mut payload = GridPayload::default();
                payload.sync(&settings, resources);
                let pose = settings.pose();
                let path = instance_path(instance_id);
                let mut grid = Renderable::new(instance_id, path, settings, payload);
                grid.user_data.pose = pose;
                self.registry.insert(grid, resources);
                true
            }
        };
        if changed {
            ctx.request_render();
        }
    }

    fn apply(
        grid: &mut GridRenderable,
        settings: GridSettings,
        resources: &mut SceneResources,
    ) -> bool {
        if grid.user_data.settings == settings {
            return false;
        }
        grid.payload.sync(&settings, resources);
        grid.user_data.pose = settings.pose();
        grid.user_data.settings = settings;
        true
    }

    /// Adopts configured grids without a renderable and disposes renderables
    /// whose entry is gone.
    fn reconcile(&mut self, ctx: &mut SceneContext) {
        let configured: Vec<String> = ctx
            .settings
            .config()
            .layers_of(GRID_LAYER_ID)
            .map(|(id, _)| id.to_owned())
            .collect();
        let keep = |key: &str| configured.iter().any(|id| id == key);
        let dropped = self.registry.retain(keep, &mut ctx.resources);
        for key in dropped {
            debug!(instance_id = %key, "disposed unconfigured grid");
        }
        for id in &configured {
            self.sync_instance(id, ctx);
        }
    }

    fn node(grid: &GridRenderable) -> SettingsTreeNode {
        let s = &grid.user_data.settings;
        let d = GridSettings::default();
        SettingsTreeNode {
            label: s.label.clone(),
            visible: Some(s.visible),
            fields: vec![
                SettingsTreeField::string("label", "Label", Some(&s.label), Some(&d.label)),
                SettingsTreeField::string(
                    "frameId",
                    "Frame",
                    s.frame_id.as_deref(),
                    Some("<render frame>"),
                ),
                SettingsTreeField::vec3("position", "Position", s.position, d.position),
                SettingsTreeField::rgba("color", "Color", &s.color, &d.color),
                SettingsTreeField::number("lineWidth", "Line width", s.line_width, d.line_width)
                    .with_bounds(Some(0.0), None)
                    .with_step(0.5, 1),
                SettingsTreeField::number("minSize", "Min size", s.min_size, d.min_size)
                    .with_bounds(Some(0.0), None),
                SettingsTreeField::number("maxSize", "Max size", s.max_size, d.max_size)
                    .with_bounds(Some(0.0), None),
                SettingsTreeField::number("step", "Step", s.step, d.step)
                    .with_bounds(Some(0.0), None)
                    .with_help("Radius increment between rings"),
            ],
            actions: vec![SettingsNodeAction::new(DELETE_ACTION, "Delete grid")],
            error: grid.transform_error().map(ToString::to_string),
            order: None,
        }
    }

    fn edit(
        &mut self,
        instance_id: &str,
        field: &str,
        value: Option<Value>,
        ctx: &mut SceneContext,
    ) {
        let node = self.registry.get(instance_id).map(Self::node);
        let input = node.and_then(|node| node.field(field).map(|f| f.input.clone()));
        let value = match (value, input) {
            (Some(value), Some(input)) => Some(input.clamp(value)),
            (value, _) => value,
        };
        let result = ctx.settings.update(|cfg| {
            let Some(fields) = cfg
                .entry_mut(ConfigSection::Layers, instance_id)
                .filter(|fields| owned_by_grid(fields))
            else {
                return Ok(false);
            };
            apply_field_edit::<GridSettings>(instance_id, fields, field, value)
        });
        match result {
            Ok(true) => self.sync_instance(instance_id, ctx),
            Ok(false) => {}
            Err(err) => debug!(instance_id, field, %err, "ignoring grid edit"),
        }
    }
}

impl SceneExtension for GridLayer {
    fn extension_id(&self) -> &'static str {
        "vantage.grid"
    }

    fn settings_nodes(&mut self, ctx: &mut SceneContext) -> Vec<SettingsTreeEntry> {
        self.reconcile(ctx);
        let mut entries = vec![SettingsTreeEntry {
            path: layers_root(),
            node: SettingsTreeNode {
                label: "Custom layers".to_owned(),
                actions: vec![SettingsNodeAction::new(ADD_GRID_ACTION, "Add grid")],
                ..SettingsTreeNode::default()
            },
        }];
        entries.extend(self.registry.iter().map(|grid| SettingsTreeEntry {
            path: grid.user_data.settings_path.clone(),
            node: Self::node(grid),
        }));
        entries
    }

    fn handle_settings_action(
        &mut self,
        action: &SettingsAction,
        ctx: &mut SceneContext,
    ) -> bool {
        let path = action.path();
        if path.first().map(String::as_str) != Some(ConfigSection::Layers.key()) {
            return false;
        }
        match (action, &path[1..]) {
            (SettingsAction::PerformNodeAction { id, .. }, []) if id == ADD_GRID_ACTION => {
                self.add_grid(ctx);
                true
            }
            (SettingsAction::PerformNodeAction { id, .. }, [grid]) if id == DELETE_ACTION => {
                self.delete_grid(grid, ctx)
            }
            (SettingsAction::Update { value, .. }, [instance_id, field]) => {
                let ours = ctx
                    .settings
                    .config()
                    .entry(ConfigSection::Layers, instance_id)
                    .is_some_and(owned_by_grid);
                if ours {
                    self.edit(instance_id, field, value.clone(), ctx);
                }
                ours
            }
            _ => false,
        }
    }

    fn start_frame(&mut self, frame: &FrameState, ctx: &mut SceneContext) {
        let (transforms, resources) = ctx.frame_parts();
        self.registry.start_frame(frame, transforms);
        for grid in self.registry.iter() {
            let Some(handle) = grid.payload.material() else {
                continue;
            };
            if let Some(material) = resources.arena.material_mut(handle) {
                material.visible = grid.is_visible();
            }
        }
    }

    fn remove_all_renderables(&mut self, ctx: &mut SceneContext) {
        self.registry.clear(&mut ctx.resources);
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
    use approx::assert_relative_eq;
    use serde_json::json;
    use vantage_scene_port::mock::StaticTransforms;

    fn ctx() -> SceneContext {
        SceneContext::new(StaticTransforms::new().with_frame("map", Pose::IDENTITY))
    }

    fn rings(min: f64, max: f64, step: f64) -> RingSpec {
        RingSpec { min, max, step }
    }

    #[test]
    fn ring_radii_exclude_upper_bound() {
        let base = rings(30.0, 100.0, 20.0);
        assert_eq!(base.radii(), vec![30.0, 50.0, 70.0, 90.0]);
        let base = RingSpec { step: 10.0, ..base };
        assert_eq!(base.radii().len(), 7);
    }

    #[test]
    fn degenerate_steps_draw_at_most_min_ring() {
        assert_eq!(rings(2.0, 5.0, 0.0).radii(), vec![2.0]);
        assert_eq!(rings(2.0, 5.0, f64::NAN).radii(), vec![2.0]);
        assert!(rings(6.0, 5.0, 1.0).radii().is_empty());
        assert_eq!(rings(-1.0, 2.5, 1.0).radii(), vec![1.0, 2.0]);
    }

    #[test]
    fn negative_min_starts_at_first_positive_radius() {
        assert_eq!(rings(-25.0, 30.0, 10.0).radii(), vec![5.0, 15.0, 25.0]);
        assert!(rings(-25.0, -5.0, 10.0).radii().is_empty());
    }

    #[test]
    fn negative_min_with_tiny_step_is_bounded() {
        let radii = rings(-10.0, 10.0, 1e-9).radii();
        assert!(radii.len() >= MAX_RINGS - 2 && radii.len() <= MAX_RINGS);
        assert!(radii.iter().all(|r| *r > 0.0 && *r < 1e-5));
    }

    #[test]
    fn ring_count_is_capped() {
        assert_eq!(rings(1.0, 1.0e9, 1.0).radii().len(), MAX_RINGS);
    }

    #[test]
    fn ring_vertices_lie_on_radius() {
        let geometry = rings(2.0, 3.0, 5.0).geometry();
        assert_eq!(geometry.positions.len(), RING_SEGMENTS * 2);
        for p in &geometry.positions {
            assert_relative_eq!(p.length(), 2.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn ids_fill_smallest_gap() {
        let mut ctx = ctx();
        let mut layer = GridLayer::new();
        assert_eq!(layer.add_grid(&mut ctx), "grid-1");
        assert_eq!(layer.add_grid(&mut ctx), "grid-2");
        assert!(layer.delete_grid("grid-1", &mut ctx));
        assert_eq!(layer.add_grid(&mut ctx), "grid-1");
    }

    #[test]
    fn color_edit_updates_material_in_place() {
        let mut ctx = ctx();
        let mut layer = GridLayer::new();
        let id = layer.add_grid(&mut ctx);
        let grid = layer.registry().get(&id).unwrap();
        let geometry = grid.payload.geometry().unwrap().id();

        let action = SettingsAction::update(["layers", id.as_str(), "color"], json!("#ff0000ff"));
        assert!(layer.handle_settings_action(&action, &mut ctx));

        let grid = layer.registry().get(&id).unwrap();
        assert_eq!(grid.payload.geometry().unwrap().id(), geometry);
        let handle = grid.payload.material().unwrap();
        let material = ctx.resources.arena.material(handle).unwrap();
        assert_eq!(material.color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(grid.payload.builds(), 1);
    }

    #[test]
    fn negative_line_width_is_clamped() {
        let mut ctx = ctx();
        let mut layer = GridLayer::new();
        let id = layer.add_grid(&mut ctx);
        let action = SettingsAction::update(["layers", id.as_str(), "lineWidth"], json!(-3));
        layer.handle_settings_action(&action, &mut ctx);
        let config = ctx.settings.config();
        let stored = config.entry(ConfigSection::Layers, &id).unwrap();
        assert_eq!(stored.get("lineWidth"), Some(&json!(0.0)));
    }

    #[test]
    fn foreign_layer_entries_are_left_alone() {
        let mut ctx = ctx();
        ctx.settings
            .modify(|cfg| cfg.insert_layer("tiles", "tiles-1", Map::new()));
        let mut layer = GridLayer::new();
        layer.settings_nodes(&mut ctx);
        assert!(layer.registry().is_empty());

        let delete = SettingsAction::node_action(["layers", "tiles-1"], DELETE_ACTION);
        assert!(!layer.handle_settings_action(&delete, &mut ctx));
        assert!(ctx.settings.config().layers.contains_key("tiles-1"));
    }
}
