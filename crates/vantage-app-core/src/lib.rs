// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Layout configuration services for Vantage scene extensions.
//! Keeps scene extensions independent of where layouts are persisted.

pub mod config;
pub mod layout;
pub mod memory;

pub use config::{validate_key, ConfigError, ConfigService, ConfigStore};
pub use layout::{
    ConfigSection, FieldMap, LayoutConfig, SettingsStore, INSTANCE_ID_FIELD, LAYER_ID_FIELD,
};
pub use memory::MemoryConfigStore;
