// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The contract every visual layer implements.

use core::any::Any;

use serde_json::Value;
use vantage_scene_port::{PointerEvent, Time};

use crate::context::{FrameState, SceneContext};
use crate::settings::{SettingsAction, SettingsTreeEntry};

/// A message delivered by the bus for a subscribed schema.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageEvent {
    /// Topic the message arrived on.
    pub topic: String,
    /// Schema name used for routing.
    pub schema_name: String,
    /// Arrival time.
    pub receive_time: Time,
    /// Decoded message; any field may be missing.
    pub message: Value,
}

impl MessageEvent {
    /// Creates an event.
    pub fn new(topic: &str, schema_name: &str, receive_time: Time, message: Value) -> Self {
        Self {
            topic: topic.to_owned(),
            schema_name: schema_name.to_owned(),
            receive_time,
            message,
        }
    }
}

/// A visual layer: a registry of renderables kept in sync with messages,
/// settings and frames.
///
/// Entry points never run concurrently with each other. Each one mutates the
/// layout first (where relevant), then the registry, then derived geometry.
pub trait SceneExtension: Any {
    /// Stable identifier (also the pointer-listener owner name).
    fn extension_id(&self) -> &'static str;

    /// Schemas whose messages this extension ingests.
    fn supported_schemas(&self) -> &'static [&'static str] {
        &[]
    }

    /// Settings nodes for this extension, derived from the current layout.
    ///
    /// Also reconciles the registry: configured entries without a renderable
    /// get one, renderables without an entry are disposed.
    fn settings_nodes(&mut self, ctx: &mut SceneContext) -> Vec<SettingsTreeEntry>;

    /// Applies a user edit or node action. Returns `false` when the path does
    /// not belong to this extension (the action is then ignored).
    fn handle_settings_action(&mut self, action: &SettingsAction, ctx: &mut SceneContext) -> bool;

    /// Per-frame pose/visibility pass.
    fn start_frame(&mut self, frame: &FrameState, ctx: &mut SceneContext);

    /// Ingests one message for a supported schema.
    fn handle_message(&mut self, event: &MessageEvent, ctx: &mut SceneContext) {
        let _ = (event, ctx);
    }

    /// Handles pointer input this extension registered for.
    fn handle_pointer(&mut self, event: &PointerEvent, ctx: &mut SceneContext) {
        let _ = (event, ctx);
    }

    /// Disposes every renderable.
    fn remove_all_renderables(&mut self, ctx: &mut SceneContext);

    /// Teardown; releases everything the extension holds.
    fn dispose(&mut self, ctx: &mut SceneContext) {
        self.remove_all_renderables(ctx);
    }

    /// Upcast for hosts and tests that need the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}
