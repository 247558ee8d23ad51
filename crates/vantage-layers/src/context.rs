// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Host-owned state handed to extensions on every entry point.

use vantage_app_core::SettingsStore;
use vantage_scene_port::{PointerEventKind, Time, TransformResolver};

use crate::resources::SceneResources;

/// Per-frame inputs from the rendering host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameState {
    /// Render clock (monotonically non-decreasing).
    pub current_time: Time,
    /// Frame the scene is drawn in.
    pub render_frame_id: String,
    /// Frame treated as static across time.
    pub fixed_frame_id: String,
}

impl FrameState {
    /// Creates a frame description.
    pub fn new(current_time: Time, render_frame_id: &str, fixed_frame_id: &str) -> Self {
        Self {
            current_time,
            render_frame_id: render_frame_id.to_owned(),
            fixed_frame_id: fixed_frame_id.to_owned(),
        }
    }
}

/// Handle of one registered pointer listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Debug)]
struct ListenerEntry {
    id: ListenerId,
    kind: PointerEventKind,
    owner: &'static str,
}

/// Pointer listener table; the host routes input to listed owners.
#[derive(Debug, Default)]
pub struct PointerListeners {
    next_id: u64,
    entries: Vec<ListenerEntry>,
}

impl PointerListeners {
    /// Registers `owner` (an extension id) for events of `kind`.
    pub fn register(&mut self, kind: PointerEventKind, owner: &'static str) -> ListenerId {
        self.next_id += 1;
        let id = ListenerId(self.next_id);
        self.entries.push(ListenerEntry { id, kind, owner });
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unregister(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.id != id);
        self.entries.len() != before
    }

    /// Listeners registered for `kind`.
    pub fn count(&self, kind: PointerEventKind) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.kind == kind)
            .count()
    }

    /// Listeners registered by `owner` for `kind`.
    pub fn count_for(&self, owner: &str, kind: PointerEventKind) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.kind == kind && entry.owner == owner)
            .count()
    }

    /// Owners listening for `kind`, in registration order, without repeats.
    pub fn owners(&self, kind: PointerEventKind) -> Vec<&'static str> {
        let mut owners: Vec<&'static str> = Vec::new();
        for entry in self.entries.iter().filter(|entry| entry.kind == kind) {
            if !owners.contains(&entry.owner) {
                owners.push(entry.owner);
            }
        }
        owners
    }
}

/// Everything extensions share: resources, layout, transforms, input routing.
pub struct SceneContext {
    /// Arena and label pool.
    pub resources: SceneResources,
    /// Persisted layout (the source of truth for settings).
    pub settings: SettingsStore,
    /// Pointer listener table.
    pub pointer: PointerListeners,
    transforms: Box<dyn TransformResolver>,
    settings_refresh: bool,
    render_requested: bool,
}

impl core::fmt::Debug for SceneContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SceneContext")
            .field("resources", &self.resources)
            .field("settings", &self.settings)
            .field("pointer", &self.pointer)
            .field("settings_refresh", &self.settings_refresh)
            .field("render_requested", &self.render_requested)
            .finish_non_exhaustive()
    }
}

impl SceneContext {
    /// Creates a context with an empty layout.
    pub fn new(transforms: impl TransformResolver + 'static) -> Self {
        Self::with_settings(transforms, SettingsStore::default())
    }

    /// Creates a context around an existing layout (e.g. one loaded from disk).
    pub fn with_settings(
        transforms: impl TransformResolver + 'static,
        settings: SettingsStore,
    ) -> Self {
        Self {
            resources: SceneResources::default(),
            settings,
            pointer: PointerListeners::default(),
            transforms: Box::new(transforms),
            settings_refresh: false,
            render_requested: false,
        }
    }

    /// The transform collaborator.
    pub fn transforms(&self) -> &dyn TransformResolver {
        self.transforms.as_ref()
    }

    /// Swaps the transform collaborator.
    pub fn set_transforms(&mut self, transforms: impl TransformResolver + 'static) {
        self.transforms = Box::new(transforms);
    }

    /// Split borrow used by per-frame passes.
    pub fn frame_parts(&mut self) -> (&dyn TransformResolver, &mut SceneResources) {
        (self.transforms.as_ref(), &mut self.resources)
    }

    /// Asks the host to re-query `settings_nodes()`.
    pub fn request_settings_refresh(&mut self) {
        self.settings_refresh = true;
    }

    /// Consumes a pending settings refresh request.
    pub fn take_settings_refresh(&mut self) -> bool {
        core::mem::take(&mut self.settings_refresh)
    }

    /// Whether a settings refresh is pending.
    pub fn settings_refresh_pending(&self) -> bool {
        self.settings_refresh
    }

    /// Asks the host to draw another frame.
    pub fn request_render(&mut self) {
        self.render_requested = true;
    }

    /// Consumes a pending render request.
    pub fn take_render_request(&mut self) -> bool {
        core::mem::take(&mut self.render_requested)
    }
}
