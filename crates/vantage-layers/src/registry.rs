// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Keyed collection of live renderables owned by one extension.
//!
//! Every removal path goes through [`Renderable::dispose`], so a renderable
//! cannot leave the registry while still holding resources. Iteration is in
//! key order, which keeps settings-tree output and test expectations stable.

use std::collections::BTreeMap;

use vantage_scene_port::TransformResolver;

use crate::context::FrameState;
use crate::renderable::{LayerSettings, Renderable, RenderablePayload};
use crate::resources::SceneResources;

/// Key → renderable map with disposal on removal.
#[derive(Debug)]
pub struct Registry<S, P> {
    entries: BTreeMap<String, Renderable<S, P>>,
}

impl<S, P> Default for Registry<S, P> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<S, P> Registry<S, P>
where
    S: LayerSettings,
    P: RenderablePayload,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of renderables.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Looks up a renderable.
    pub fn get(&self, key: &str) -> Option<&Renderable<S, P>> {
        self.entries.get(key)
    }

    /// Looks up a renderable mutably.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Renderable<S, P>> {
        self.entries.get_mut(key)
    }

    /// Registered keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Renderables in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Renderable<S, P>> {
        self.entries.values()
    }

    /// Renderables in key order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Renderable<S, P>> {
        self.entries.values_mut()
    }

    /// Returns the renderable for `key`, creating it with `create` if absent.
    pub fn get_or_insert_with<F>(&mut self, key: &str, create: F) -> &mut Renderable<S, P>
    where
        F: FnOnce() -> Renderable<S, P>,
    {
        self.entries.entry(key.to_owned()).or_insert_with(create)
    }

    /// Inserts a renderable, disposing any renderable it replaces.
    pub fn insert(&mut self, renderable: Renderable<S, P>, resources: &mut SceneResources) {
        let key = renderable.key().to_owned();
        if let Some(mut previous) = self.entries.insert(key, renderable) {
            previous.dispose(resources);
        }
    }

    /// Disposes and removes `key`. Returns `false` when it was not registered.
    pub fn remove(&mut self, key: &str, resources: &mut SceneResources) -> bool {
        match self.entries.remove(key) {
            Some(mut renderable) => {
                renderable.dispose(resources);
                true
            }
            None => false,
        }
    }

    /// Disposes and removes every renderable whose key fails `keep`.
    /// Returns the removed keys.
    pub fn retain<F>(&mut self, mut keep: F, resources: &mut SceneResources) -> Vec<String>
    where
        F: FnMut(&str) -> bool,
    {
        let doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|key| !keep(key.as_str()))
            .cloned()
            .collect();
        for key in &doomed {
            self.remove(key, resources);
        }
        doomed
    }

    /// Disposes and removes everything.
    pub fn clear(&mut self, resources: &mut SceneResources) {
        for renderable in self.entries.values_mut() {
            renderable.dispose(resources);
        }
        self.entries.clear();
    }

    /// Per-frame pass: effective frame id plus pose/visibility for each entry.
    pub fn start_frame(&mut self, frame: &FrameState, resolver: &dyn TransformResolver) {
        for renderable in self.entries.values_mut() {
            renderable.update_pose(frame, resolver);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderable::RenderableKind;
    use crate::resources::{MaterialData, MaterialHandle};

    struct Plain;
    impl LayerSettings for Plain {}

    struct Tinted(Option<MaterialHandle>);
    impl RenderablePayload for Tinted {
        fn kind(&self) -> RenderableKind {
            RenderableKind::Grid
        }

        fn dispose(&mut self, resources: &mut SceneResources) {
            if let Some(material) = self.0.take() {
                resources.arena.release_material(material);
            }
        }
    }

    fn tinted(resources: &mut SceneResources, key: &str) -> Renderable<Plain, Tinted> {
        let material = resources.arena.create_material(MaterialData::default());
        Renderable::new(key, vec![key.to_owned()], Plain, Tinted(Some(material)))
    }

    #[test]
    fn replacing_disposes_previous() {
        let mut resources = SceneResources::default();
        let mut registry = Registry::new();
        let first = tinted(&mut resources, "a");
        registry.insert(first, &mut resources);
        let second = tinted(&mut resources, "a");
        registry.insert(second, &mut resources);
        assert_eq!(registry.len(), 1);
        assert_eq!(resources.arena.live_count(), 1);
        assert_eq!(resources.arena.released_count(), 1);
    }

    #[test]
    fn retain_disposes_dropped_keys() {
        let mut resources = SceneResources::default();
        let mut registry = Registry::new();
        for key in ["a", "b", "c"] {
            let r = tinted(&mut resources, key);
            registry.insert(r, &mut resources);
        }
        let removed = registry.retain(|key| key != "b", &mut resources);
        assert_eq!(removed, vec!["b".to_owned()]);
        assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["a", "c"]);
        assert_eq!(resources.arena.live_count(), 2);

        registry.clear(&mut resources);
        assert!(registry.is_empty());
        assert_eq!(resources.arena.live_count(), 0);
    }

    #[test]
    fn removing_unknown_key_is_noop() {
        let mut resources = SceneResources::default();
        let mut registry: Registry<Plain, Tinted> = Registry::new();
        assert!(!registry.remove("ghost", &mut resources));
        assert_eq!(resources.arena.released_count(), 0);
    }
}
