// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Dispatcher over a set of extensions sharing one [`SceneContext`].
//!
//! The rendering host owns a [`Scene`] and drives it from its three event
//! sources. Every entry point runs to completion before returning and ends by
//! forwarding any pending render request to the [`RenderPort`].

use serde_json::Value;
use tracing::{debug, trace};
use vantage_app_core::{ConfigError, ConfigService, ConfigStore, SettingsStore};
use vantage_scene_port::{PointerEvent, RenderPort, Time};

use crate::context::{FrameState, SceneContext};
use crate::extension::{MessageEvent, SceneExtension};
use crate::layers::grid::GridLayer;
use crate::layers::markers::MarkerLayer;
use crate::layers::object_list::ObjectListLayer;
use crate::settings::{SettingsAction, SettingsTreeEntry};
use crate::tools::volume::VolumeTool;

/// Extensions plus the state they share.
pub struct Scene {
    ctx: SceneContext,
    extensions: Vec<Box<dyn SceneExtension>>,
    render_port: Option<Box<dyn RenderPort>>,
    frame: Option<FrameState>,
}

impl core::fmt::Debug for Scene {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let ids: Vec<&str> = self
            .extensions
            .iter()
            .map(|ext| ext.extension_id())
            .collect();
        f.debug_struct("Scene")
            .field("ctx", &self.ctx)
            .field("extensions", &ids)
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

impl Scene {
    /// Scene without extensions.
    pub fn new(ctx: SceneContext) -> Self {
        Self {
            ctx,
            extensions: Vec::new(),
            render_port: None,
            frame: None,
        }
    }

    /// Scene with the grid, object-list, marker and volume-tool extensions.
    pub fn with_standard_layers(ctx: SceneContext) -> Self {
        let mut scene = Self::new(ctx);
        scene.add_extension(GridLayer::new());
        scene.add_extension(ObjectListLayer::new());
        scene.add_extension(MarkerLayer::new());
        scene.add_extension(VolumeTool::new());
        scene
    }

    /// Registers an extension. Settings actions are offered to extensions in
    /// registration order.
    pub fn add_extension(&mut self, extension: impl SceneExtension) -> &mut Self {
        debug!(extension = extension.extension_id(), "registered extension");
        self.extensions.push(Box::new(extension));
        self
    }

    /// Installs the redraw port.
    pub fn set_render_port(&mut self, port: impl RenderPort + 'static) {
        self.render_port = Some(Box::new(port));
    }

    /// Shared state.
    pub fn context(&self) -> &SceneContext {
        &self.ctx
    }

    /// Shared state, mutably (e.g. to swap the transform resolver).
    pub fn context_mut(&mut self) -> &mut SceneContext {
        &mut self.ctx
    }

    /// The frame passed to the last [`Scene::start_frame`].
    pub fn frame(&self) -> Option<&FrameState> {
        self.frame.as_ref()
    }

    /// Looks up an extension by concrete type.
    pub fn extension<T: SceneExtension>(&self) -> Option<&T> {
        self.extensions
            .iter()
            .find_map(|ext| ext.as_any().downcast_ref::<T>())
    }

    /// Looks up an extension by concrete type, mutably, together with the
    /// context it needs for its own operations.
    pub fn extension_mut<T: SceneExtension>(&mut self) -> Option<(&mut T, &mut SceneContext)> {
        let ext = self
            .extensions
            .iter_mut()
            .find_map(|ext| ext.as_any_mut().downcast_mut::<T>())?;
        Some((ext, &mut self.ctx))
    }

    /// Per-frame pass over every extension.
    pub fn start_frame(&mut self, current_time: Time, render_frame_id: &str, fixed_frame_id: &str) {
        if let Some(previous) = &self.frame {
            if current_time < previous.current_time {
                let previous = previous.current_time;
                debug!(%current_time, %previous, "frame clock went backwards");
            }
        }
        let frame = FrameState::new(current_time, render_frame_id, fixed_frame_id);
        for ext in &mut self.extensions {
            ext.start_frame(&frame, &mut self.ctx);
        }
        self.frame = Some(frame);
        self.flush();
    }

    /// Delivers a message to every extension supporting `event.schema_name`.
    pub fn handle_message(&mut self, event: &MessageEvent) {
        let schema = event.schema_name.as_str();
        let mut delivered = false;
        for ext in &mut self.extensions {
            if ext.supported_schemas().contains(&schema) {
                ext.handle_message(event, &mut self.ctx);
                delivered = true;
            }
        }
        if !delivered {
            trace!(topic = %event.topic, schema = %event.schema_name, "no extension for schema");
        }
        self.flush();
    }

    /// Builds and delivers a [`MessageEvent`].
    pub fn ingest(&mut self, topic: &str, schema_name: &str, receive_time: Time, message: Value) {
        let event = MessageEvent::new(topic, schema_name, receive_time, message);
        self.handle_message(&event);
    }

    /// Offers `action` to each extension until one handles it. Returns whether
    /// any did; unclaimed actions are ignored.
    pub fn handle_settings_action(&mut self, action: &SettingsAction) -> bool {
        let handled = self
            .extensions
            .iter_mut()
            .any(|ext| ext.handle_settings_action(action, &mut self.ctx));
        if !handled {
            debug!(path = ?action.path(), "no extension handled settings action");
        }
        self.flush();
        handled
    }

    /// Routes pointer input to the extensions listening for its kind.
    pub fn handle_pointer(&mut self, event: &PointerEvent) {
        let owners = self.ctx.pointer.owners(event.kind);
        for ext in &mut self.extensions {
            if owners.contains(&ext.extension_id()) {
                ext.handle_pointer(event, &mut self.ctx);
            }
        }
        self.flush();
    }

    /// The full settings tree, in extension order. Consumes any pending
    /// refresh request.
    pub fn settings_tree(&mut self) -> Vec<SettingsTreeEntry> {
        let mut entries = Vec::new();
        for ext in &mut self.extensions {
            entries.extend(ext.settings_nodes(&mut self.ctx));
        }
        self.ctx.take_settings_refresh();
        self.flush();
        entries
    }

    /// Whether an extension asked for the settings tree to be rebuilt.
    pub fn settings_refresh_pending(&self) -> bool {
        self.ctx.settings_refresh_pending()
    }

    /// Disposes every renderable of every extension.
    pub fn remove_all_renderables(&mut self) {
        for ext in &mut self.extensions {
            ext.remove_all_renderables(&mut self.ctx);
        }
        self.ctx.request_render();
        self.flush();
    }

    /// Replaces the layout, e.g. after loading another one. Renderables follow
    /// on the next [`Scene::settings_tree`].
    pub fn replace_layout(&mut self, settings: SettingsStore) {
        self.remove_all_renderables();
        self.ctx.settings = settings;
        self.ctx.request_settings_refresh();
    }

    /// Persists the layout under [`SettingsStore::DEFAULT_KEY`].
    pub fn save_layout<S: ConfigStore>(
        &self,
        service: &ConfigService<S>,
    ) -> Result<(), ConfigError> {
        self.ctx.settings.save(service, SettingsStore::DEFAULT_KEY)
    }

    /// Tears down every extension.
    pub fn dispose(&mut self) {
        for ext in &mut self.extensions {
            ext.dispose(&mut self.ctx);
        }
        self.flush();
    }

    fn flush(&mut self) {
        if self.ctx.take_render_request() {
            if let Some(port) = &self.render_port {
                port.request_redraw();
            }
        }
    }
}
