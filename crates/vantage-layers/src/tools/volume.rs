// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Two-click volume drawing tool.
//!
//! While placing, the tool holds exactly one click and one move listener.
//! The preview (anchor points plus the provisional box outline) is written
//! in place into buffers allocated once, and is hidden until two points
//! (committed or hovered) exist. The preview is expressed in the render
//! frame, so a render-frame change cancels the placement.

use std::any::Any;

use glam::Vec3;
use tracing::debug;
use vantage_scene_port::{PointerEvent, PointerEventKind};

use crate::context::{FrameState, ListenerId, SceneContext};
use crate::events::Subscribers;
use crate::extension::SceneExtension;
use crate::layers::box_edge_positions;
use crate::renderable::{LayerSettings, Renderable, RenderableKind, RenderablePayload};
use crate::resources::{
    GeometryData, GeometryHandle, MaterialData, MaterialHandle, SceneResources, Topology,
};
use crate::settings::{
    settings_path, SettingsAction, SettingsNodeAction, SettingsTreeEntry, SettingsTreeNode,
};
use crate::tools::placement::{ClickOutcome, PlacementMachine, PlacementState};
use crate::tools::{ToolEvent, VolumeShape};

/// Listener owner and extension id.
pub const VOLUME_TOOL_ID: &str = "vantage.volume-tool";
/// Node action starting a placement.
pub const START_ACTION: &str = "start";
/// Node action cancelling a placement.
pub const CANCEL_ACTION: &str = "cancel";

const ANCHOR_CAPACITY: usize = 2;
const OUTLINE_VERTICES: usize = 24;

/// In-memory preview settings (never persisted).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PreviewSettings;

impl LayerSettings for PreviewSettings {}

/// Preview buffers.
#[derive(Debug, Default)]
pub struct PreviewPayload {
    anchors: Option<GeometryHandle>,
    outline: Option<GeometryHandle>,
    material: Option<MaterialHandle>,
    shown: bool,
}

impl PreviewPayload {
    fn allocate(resources: &mut SceneResources) -> Self {
        let arena = &mut resources.arena;
        let anchors = GeometryData::with_capacity(Topology::Points, ANCHOR_CAPACITY);
        let outline = GeometryData::with_capacity(Topology::LineList, OUTLINE_VERTICES);
        Self {
            anchors: Some(arena.create_geometry(anchors)),
            outline: Some(arena.create_geometry(outline)),
            material: Some(arena.create_material(MaterialData {
                color: [1.0, 0.8, 0.2, 1.0],
                line_width: 2.0,
                visible: false,
            })),
            shown: false,
        }
    }

    /// Anchor-point buffer.
    pub fn anchors(&self) -> Option<&GeometryHandle> {
        self.anchors.as_ref()
    }

    /// Box-outline buffer.
    pub fn outline(&self) -> Option<&GeometryHandle> {
        self.outline.as_ref()
    }

    /// Whether the preview is drawn.
    pub fn is_shown(&self) -> bool {
        self.shown
    }

    /// Rewrites both buffers from `points` without reallocating.
    fn write(&mut self, points: &[Vec3], required: usize, resources: &mut SceneResources) {
        self.shown = points.len() >= required;
        let arena = &mut resources.arena;
        if let Some(anchors) = self.anchors.as_ref().and_then(|h| arena.geometry_mut(h)) {
            let n = points.len().min(anchors.positions.len());
            anchors.positions[..n].copy_from_slice(&points[..n]);
            anchors.draw_count = if self.shown { n } else { 0 };
        }
        if let Some(outline) = self.outline.as_ref().and_then(|h| arena.geometry_mut(h)) {
            if let [a, b, ..] = points {
                outline.positions.copy_from_slice(&box_edge_positions(a.min(*b), a.max(*b)));
            }
            outline.draw_count = if self.shown { OUTLINE_VERTICES } else { 0 };
        }
        if let Some(material) = self.material.as_ref().and_then(|h| arena.material_mut(h)) {
            material.visible = self.shown;
        }
    }
}

impl RenderablePayload for PreviewPayload {
    fn kind(&self) -> RenderableKind {
        RenderableKind::ToolPreview
    }

    fn dispose(&mut self, resources: &mut SceneResources) {
        if let Some(anchors) = self.anchors.take() {
            resources.arena.release_geometry(anchors);
        }
        if let Some(outline) = self.outline.take() {
            resources.arena.release_geometry(outline);
        }
        if let Some(material) = self.material.take() {
            resources.arena.release_material(material);
        }
        self.shown = false;
    }
}

/// The preview renderable.
pub type PreviewRenderable = Renderable<PreviewSettings, PreviewPayload>;

/// Volume drawing tool.
#[derive(Debug)]
pub struct VolumeTool {
    machine: PlacementMachine,
    listeners: Option<(ListenerId, ListenerId)>,
    preview: Option<PreviewRenderable>,
    render_frame_id: Option<String>,
    events: Subscribers<ToolEvent>,
}

impl Default for VolumeTool {
    fn default() -> Self {
        Self {
            machine: PlacementMachine::new(2),
            listeners: None,
            preview: None,
            render_frame_id: None,
            events: Subscribers::new(),
        }
    }
}

fn tool_path() -> Vec<String> {
    settings_path(["tools", "volume"])
}

impl VolumeTool {
    /// Creates an idle tool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current placement state.
    pub fn state(&self) -> PlacementState {
        self.machine.state()
    }

    /// Committed points of the placement in progress.
    pub fn captured(&self) -> &[Vec3] {
        self.machine.captured()
    }

    /// The preview renderable, once a placement has started.
    pub fn preview(&self) -> Option<&PreviewRenderable> {
        self.preview.as_ref()
    }

    /// Subscriber list for [`ToolEvent`]s.
    pub fn events_mut(&mut self) -> &mut Subscribers<ToolEvent> {
        &mut self.events
    }

    /// Enters placement. A no-op while already placing.
    pub fn start(&mut self, ctx: &mut SceneContext) {
        if !self.machine.start() {
            return;
        }
        if self.listeners.is_none() {
            let pointer = &mut ctx.pointer;
            let click = pointer.register(PointerEventKind::Click, VOLUME_TOOL_ID);
            let moved = pointer.register(PointerEventKind::Move, VOLUME_TOOL_ID);
            self.listeners = Some((click, moved));
        }
        if self.preview.is_none() {
            let payload = PreviewPayload::allocate(&mut ctx.resources);
            let preview = Renderable::new(VOLUME_TOOL_ID, tool_path(), PreviewSettings, payload);
            self.preview = Some(preview);
        }
        self.refresh_preview(ctx);
        debug!("volume placement started");
        self.events.emit(&ToolEvent::Started);
        ctx.request_settings_refresh();
    }

    /// Cancels placement from any state.
    pub fn stop(&mut self, ctx: &mut SceneContext) {
        if self.machine.stop() {
            self.finish(None, ctx);
        }
    }

    fn finish(&mut self, shape: Option<VolumeShape>, ctx: &mut SceneContext) {
        if let Some((click, moved)) = self.listeners.take() {
            ctx.pointer.unregister(click);
            ctx.pointer.unregister(moved);
        }
        self.refresh_preview(ctx);
        debug!(completed = shape.is_some(), "volume placement ended");
        self.events.emit(&ToolEvent::Ended { shape });
        ctx.request_settings_refresh();
    }

    fn refresh_preview(&mut self, ctx: &mut SceneContext) {
        if let Some(preview) = &mut self.preview {
            let points = self.machine.preview_points();
            preview
                .payload
                .write(&points, self.machine.required(), &mut ctx.resources);
            ctx.request_render();
        }
    }
}

impl SceneExtension for VolumeTool {
    fn extension_id(&self) -> &'static str {
        VOLUME_TOOL_ID
    }

    fn settings_nodes(&mut self, ctx: &mut SceneContext) -> Vec<SettingsTreeEntry> {
        let _ = ctx;
        let action = if self.machine.is_active() {
            SettingsNodeAction::new(CANCEL_ACTION, "Cancel")
        } else {
            SettingsNodeAction::new(START_ACTION, "Draw volume")
        };
        vec![SettingsTreeEntry {
            path: tool_path(),
            node: SettingsTreeNode {
                label: "Volume".to_owned(),
                actions: vec![action],
                ..SettingsTreeNode::default()
            },
        }]
    }

    fn handle_settings_action(
        &mut self,
        action: &SettingsAction,
        ctx: &mut SceneContext,
    ) -> bool {
        if action.path() != tool_path().as_slice() {
            return false;
        }
        match action {
            SettingsAction::PerformNodeAction { id, .. } if id == START_ACTION => self.start(ctx),
            SettingsAction::PerformNodeAction { id, .. } if id == CANCEL_ACTION => self.stop(ctx),
            _ => debug!(?action, "ignoring volume tool action"),
        }
        true
    }

    fn start_frame(&mut self, frame: &FrameState, ctx: &mut SceneContext) {
        let moved = self
            .render_frame_id
            .as_deref()
            .is_some_and(|previous| previous != frame.render_frame_id);
        if moved && self.machine.is_active() {
            debug!(frame = %frame.render_frame_id, "render frame changed; cancelling placement");
            self.stop(ctx);
        }
        if self.render_frame_id.as_deref() != Some(frame.render_frame_id.as_str()) {
            self.render_frame_id = Some(frame.render_frame_id.clone());
        }
        if let Some(preview) = &mut self.preview {
            preview.place_in_render_frame(frame);
        }
    }

    fn handle_pointer(&mut self, event: &PointerEvent, ctx: &mut SceneContext) {
        let Some(point) = event.world_point else {
            return;
        };
        match event.kind {
            PointerEventKind::Move => {
                if self.machine.hover(point) {
                    self.refresh_preview(ctx);
                }
            }
            PointerEventKind::Click => match self.machine.click(point) {
                ClickOutcome::Ignored => {}
                ClickOutcome::Captured => self.refresh_preview(ctx),
                ClickOutcome::Completed(points) => {
                    let shape = match points.as_slice() {
                        [a, b] => Some(VolumeShape { corners: [*a, *b] }),
                        _ => None,
                    };
                    self.finish(shape, ctx);
                }
            },
        }
    }

    fn remove_all_renderables(&mut self, ctx: &mut SceneContext) {
        self.stop(ctx);
        if let Some(mut preview) = self.preview.take() {
            preview.dispose(&mut ctx.resources);
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
