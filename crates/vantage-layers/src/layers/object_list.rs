// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Instanced object lists with pooled labels, one renderable per topic.
//!
//! Every object of a list is drawn as an instance of the shared `unit-box`
//! template. The instance buffer has a fixed capacity; lists longer than that
//! draw only the leading objects. Labels are borrowed from the host pool and
//! returned as soon as fewer objects need them.

use std::any::Any;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::{FrameState, SceneContext};
use crate::extension::{MessageEvent, SceneExtension};
use crate::labels::Label;
use crate::layers::{edit_topic_field, split_topic_path, topic_path, topic_settings, unit_box};
use crate::normalize::{normalize_event, ObjectList, PartialObjectList};
use crate::registry::Registry;
use crate::renderable::{LayerSettings, Renderable, RenderableKind, RenderablePayload};
use crate::resources::{InstanceBufferHandle, SceneResources, SharedGeometry};
use crate::settings::{SettingsAction, SettingsTreeEntry, SettingsTreeField, SettingsTreeNode};

/// Schema handled by [`ObjectListLayer`].
pub const OBJECT_LIST_SCHEMA: &str = "vantage.ObjectList";
/// Name of the shared instance template.
pub const UNIT_BOX: &str = "unit-box";
/// Default instance-buffer capacity.
pub const DEFAULT_INSTANCE_CAPACITY: usize = 4096;

/// Per-topic settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectListSettings {
    /// Visibility toggle.
    pub visible: bool,
    /// Frame override.
    pub frame_id: Option<String>,
    /// Whether object labels are drawn.
    pub show_labels: bool,
    /// Label text height in meters.
    pub label_size: f64,
}

impl Default for ObjectListSettings {
    fn default() -> Self {
        Self {
            visible: true,
            frame_id: None,
            show_labels: true,
            label_size: 0.25,
        }
    }
}

impl LayerSettings for ObjectListSettings {
    fn frame_id(&self) -> Option<&str> {
        self.frame_id.as_deref().filter(|id| !id.is_empty())
    }

    fn visible(&self) -> bool {
        self.visible
    }
}

/// Resources and last data of one object list.
#[derive(Debug, Default)]
pub struct ObjectListPayload {
    template: Option<SharedGeometry>,
    instances: Option<InstanceBufferHandle>,
    labels: Vec<Label>,
    data: ObjectList,
}

impl ObjectListPayload {
    /// The latest normalized list.
    pub fn data(&self) -> &ObjectList {
        &self.data
    }

    /// The per-instance buffer.
    pub fn instances(&self) -> Option<&InstanceBufferHandle> {
        self.instances.as_ref()
    }

    /// Labels currently borrowed from the pool.
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    fn ensure_resources(&mut self, capacity: usize, resources: &mut SceneResources) {
        if self.template.is_none() {
            self.template = Some(resources.arena.acquire_shared(UNIT_BOX, unit_box));
        }
        if self.instances.is_none() {
            self.instances = Some(resources.arena.create_instance_buffer(capacity));
        }
    }

    /// Writes instances and labels for the stored list. Buffers are updated in
    /// place; only the label loan count changes.
    fn write(&mut self, settings: &ObjectListSettings, resources: &mut SceneResources) {
        let Some(buffer) = self
            .instances
            .as_ref()
            .and_then(|handle| resources.arena.instance_buffer_mut(handle))
        else {
            return;
        };
        let drawn = buffer.set_count(self.data.objects.len());
        if drawn < self.data.objects.len() {
            debug!(
                requested = self.data.objects.len(),
                capacity = buffer.capacity(),
                "clamping object list"
            );
        }
        for (i, object) in self.data.objects.iter().take(drawn).enumerate() {
            let pose = object.pose.to_pose();
            buffer.positions[i] = pose.position;
            buffer.scales[i] = object.scale.to_vec3();
            buffer.colors[i] = object.color.to_array();
        }

        let wanted = if settings.show_labels { drawn } else { 0 };
        while self.labels.len() > wanted {
            if let Some(label) = self.labels.pop() {
                resources.labels.release(label);
            }
        }
        while self.labels.len() < wanted {
            self.labels.push(resources.labels.acquire());
        }
        #[allow(clippy::cast_possible_truncation)]
        let size = settings.label_size as f32;
        for (label, object) in self.labels.iter().zip(&self.data.objects) {
            if let Some(text) = resources.labels.get_mut(label) {
                text.text = if object.label.is_empty() {
                    object.id.clone()
                } else {
                    object.label.clone()
                };
                text.position = object.pose.to_pose().position + Vec3::Z * size;
                text.size = size;
                text.visible = settings.visible;
            }
        }
    }
}

impl RenderablePayload for ObjectListPayload {
    fn kind(&self) -> RenderableKind {
        RenderableKind::ObjectList
    }

    fn dispose(&mut self, resources: &mut SceneResources) {
        for label in self.labels.drain(..) {
            resources.labels.release(label);
        }
        if let Some(instances) = self.instances.take() {
            resources.arena.release_instance_buffer(instances);
        }
        if let Some(template) = self.template.take() {
            resources.arena.release_shared(template);
        }
    }
}

/// An object-list renderable.
pub type ObjectListRenderable = Renderable<ObjectListSettings, ObjectListPayload>;

/// Extension drawing `vantage.ObjectList` topics.
#[derive(Debug)]
pub struct ObjectListLayer {
    registry: Registry<ObjectListSettings, ObjectListPayload>,
    capacity: usize,
}

impl Default for ObjectListLayer {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_INSTANCE_CAPACITY)
    }
}

impl ObjectListLayer {
    /// Layer with the default instance capacity.
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer whose instance buffers hold at most `capacity` objects.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            registry: Registry::new(),
            capacity,
        }
    }

    /// Live lists keyed by topic.
    pub fn registry(&self) -> &Registry<ObjectListSettings, ObjectListPayload> {
        &self.registry
    }

    fn resync(&mut self, topic: &str, ctx: &mut SceneContext) {
        let settings: ObjectListSettings = topic_settings(ctx, topic);
        if let Some(list) = self.registry.get_mut(topic) {
            list.payload.write(&settings, &mut ctx.resources);
            list.user_data.settings = settings;
            ctx.request_render();
        }
    }
}

impl SceneExtension for ObjectListLayer {
    fn extension_id(&self) -> &'static str {
        "vantage.object-list"
    }

    fn supported_schemas(&self) -> &'static [&'static str] {
        &[OBJECT_LIST_SCHEMA]
    }

    fn settings_nodes(&mut self, ctx: &mut SceneContext) -> Vec<SettingsTreeEntry> {
        let _ = ctx;
        let defaults = ObjectListSettings::default();
        self.registry
            .iter()
            .map(|list| {
                let settings = &list.user_data.settings;
                SettingsTreeEntry {
                    path: list.user_data.settings_path.clone(),
                    node: SettingsTreeNode {
                        label: list.key().to_owned(),
                        visible: Some(settings.visible),
                        fields: vec![
                            SettingsTreeField::string(
                                "frameId",
                                "Frame",
                                settings.frame_id.as_deref(),
                                Some("<message frame>"),
                            ),
                            SettingsTreeField::boolean(
                                "showLabels",
                                "Labels",
                                settings.show_labels,
                                defaults.show_labels,
                            ),
                            SettingsTreeField::number(
                                "labelSize",
                                "Label size",
                                settings.label_size,
                                defaults.label_size,
                            )
                            .with_bounds(Some(0.0), None)
                            .with_step(0.05, 2),
                        ],
                        error: list.transform_error().map(ToString::to_string),
                        ..SettingsTreeNode::default()
                    },
                }
            })
            .collect()
    }

    fn handle_settings_action(&mut self, action: &SettingsAction, ctx: &mut SceneContext) -> bool {
        let SettingsAction::Update { path, value } = action else {
            return false;
        };
        let Some((topic, Some(field))) = split_topic_path(path) else {
            return false;
        };
        if !self.registry.contains(topic) {
            return false;
        }
        if edit_topic_field::<ObjectListSettings>(ctx, topic, field, value.clone()) {
            self.resync(topic, ctx);
        }
        true
    }

    fn start_frame(&mut self, frame: &FrameState, ctx: &mut SceneContext) {
        let (transforms, resources) = ctx.frame_parts();
        self.registry.start_frame(frame, transforms);
        for list in self.registry.iter() {
            let shown = list.is_visible();
            for label in list.payload.labels() {
                if let Some(data) = resources.labels.get_mut(label) {
                    data.visible = shown;
                }
            }
        }
    }

    fn handle_message(&mut self, event: &MessageEvent, ctx: &mut SceneContext) {
        let data = normalize_event::<PartialObjectList>(event);
        let settings: ObjectListSettings = topic_settings(ctx, &event.topic);
        let capacity = self.capacity;
        let resources = &mut ctx.resources;
        let list = self.registry.get_or_insert_with(&event.topic, || {
            Renderable::new(
                event.topic.as_str(),
                topic_path(&event.topic),
                settings.clone(),
                ObjectListPayload::default(),
            )
        });
        let header = &data.header;
        list.record_message(event.receive_time, header.stamp, &header.frame_id);
        list.payload.ensure_resources(capacity, resources);
        list.payload.data = data;
        list.payload.write(&settings, resources);
        list.user_data.settings = settings;
        ctx.request_render();
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
