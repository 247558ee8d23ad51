// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persisted layout document and the settings store that owns it.
//!
//! The [`SettingsStore`] is the single source of truth for every editable
//! field in the scene. Scene extensions never cache settings across calls;
//! they read the store fresh on each message, frame, or settings action.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::{ConfigError, ConfigService, ConfigStore};

/// Field values of one settings entry, keyed by field name.
pub type FieldMap = serde_json::Map<String, Value>;

/// Key under which layer entries record which extension owns them.
pub const LAYER_ID_FIELD: &str = "layerId";
/// Key under which layer entries record their own instance id.
pub const INSTANCE_ID_FIELD: &str = "instanceId";

/// Top-level sections of the layout document (first settings path segment).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConfigSection {
    /// Per-topic settings for message-driven layers.
    Topics,
    /// User-added, config-driven layer instances.
    Layers,
}

impl ConfigSection {
    /// Path segment naming this section.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Topics => "topics",
            Self::Layers => "layers",
        }
    }

    /// Parses a path root back into a section.
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "topics" => Some(Self::Topics),
            "layers" => Some(Self::Layers),
            _ => None,
        }
    }
}

/// The persisted layout: every settings entry, grouped by section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Topic name -> field values.
    pub topics: BTreeMap<String, FieldMap>,
    /// Instance id -> field values (always including `layerId` / `instanceId`).
    pub layers: BTreeMap<String, FieldMap>,
}

impl LayoutConfig {
    /// Borrow a whole section.
    pub fn section(&self, section: ConfigSection) -> &BTreeMap<String, FieldMap> {
        match section {
            ConfigSection::Topics => &self.topics,
            ConfigSection::Layers => &self.layers,
        }
    }

    /// Mutably borrow a whole section.
    pub fn section_mut(&mut self, section: ConfigSection) -> &mut BTreeMap<String, FieldMap> {
        match section {
            ConfigSection::Topics => &mut self.topics,
            ConfigSection::Layers => &mut self.layers,
        }
    }

    /// Look up one entry.
    pub fn entry(&self, section: ConfigSection, key: &str) -> Option<&FieldMap> {
        self.section(section).get(key)
    }

    /// Look up one entry mutably.
    pub fn entry_mut(&mut self, section: ConfigSection, key: &str) -> Option<&mut FieldMap> {
        self.section_mut(section).get_mut(key)
    }

    /// Fetch an entry, creating an empty one when absent.
    pub fn entry_or_default(&mut self, section: ConfigSection, key: &str) -> &mut FieldMap {
        self.section_mut(section).entry(key.to_owned()).or_default()
    }

    /// Remove an entry, returning its fields.
    pub fn remove_entry(&mut self, section: ConfigSection, key: &str) -> Option<FieldMap> {
        self.section_mut(section).remove(key)
    }

    /// Layer entries owned by the extension registered as `layer_id`, in key order.
    pub fn layers_of<'a>(
        &'a self,
        layer_id: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a FieldMap)> + 'a {
        self.layers.iter().filter_map(move |(key, fields)| {
            (fields.get(LAYER_ID_FIELD).and_then(Value::as_str) == Some(layer_id))
                .then_some((key.as_str(), fields))
        })
    }

    /// Insert a fresh layer entry stamped with its owner and instance id.
    pub fn insert_layer(&mut self, layer_id: &str, instance_id: &str, mut fields: FieldMap) {
        fields.insert(LAYER_ID_FIELD.into(), Value::from(layer_id));
        fields.insert(INSTANCE_ID_FIELD.into(), Value::from(instance_id));
        self.layers.insert(instance_id.to_owned(), fields);
    }
}

/// In-memory source of truth for the layout, with atomic updates.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    config: LayoutConfig,
    revision: u64,
}

impl SettingsStore {
    /// Key used when persisting through a [`ConfigService`].
    pub const DEFAULT_KEY: &'static str = "layout";

    /// Wrap an existing layout.
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            config,
            revision: 0,
        }
    }

    /// Current layout.
    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    /// Monotonic counter bumped by every update that changed the layout.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Read-modify-write under `mutate`.
    ///
    /// The mutation runs against a draft; the draft is committed only when
    /// `mutate` returns `Ok`, so a failing mutation leaves no partial edits.
    pub fn update<T, E, F>(&mut self, mutate: F) -> Result<T, E>
    where
        F: FnOnce(&mut LayoutConfig) -> Result<T, E>,
    {
        let mut draft = self.config.clone();
        let out = mutate(&mut draft)?;
        if draft != self.config {
            self.config = draft;
            self.revision += 1;
        }
        Ok(out)
    }

    /// Infallible form of [`SettingsStore::update`].
    pub fn modify<T, F>(&mut self, mutate: F) -> T
    where
        F: FnOnce(&mut LayoutConfig) -> T,
    {
        let result: Result<T, core::convert::Infallible> = self.update(|cfg| Ok(mutate(cfg)));
        match result {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Load the layout stored under `key`, or an empty layout when missing.
    pub fn load<S: ConfigStore>(
        service: &ConfigService<S>,
        key: &str,
    ) -> Result<Self, ConfigError> {
        let config: LayoutConfig = service.load_or_default(key)?;
        debug!(
            key,
            topics = config.topics.len(),
            layers = config.layers.len(),
            "loaded layout"
        );
        Ok(Self::new(config))
    }

    /// Persist the current layout under `key`.
    pub fn save<S: ConfigStore>(
        &self,
        service: &ConfigService<S>,
        key: &str,
    ) -> Result<(), ConfigError> {
        service.save(key, &self.config)
    }
}
