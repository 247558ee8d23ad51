// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Renderable lifecycle and settings synchronization for Vantage scene extensions.
//!
//! Every visual layer follows one protocol:
//!
//! 1. Keep a keyed [`Registry`] of live [`Renderable`]s (keyed by topic, or by
//!    instance id for user-added layers).
//! 2. Reconcile that registry against arriving messages and against the
//!    persisted layout in the [`SettingsStore`](vantage_app_core::SettingsStore).
//! 3. Rebuild derived geometry only when geometry-affecting inputs change, and
//!    release every GPU-side resource exactly once.
//! 4. Describe editable fields as a settings tree that is a pure projection of
//!    the layout.
//!
//! # Entry points
//!
//! All mutation happens synchronously inside one of three entry points on a
//! [`SceneExtension`]: message ingestion, settings actions, and `start_frame`.
//! The host guarantees they never overlap, so no locking is involved.
//! [`Scene`] is a thin dispatcher over a set of extensions and one
//! [`SceneContext`].

mod context;
mod error;
mod events;
mod extension;
mod labels;
mod registry;
mod renderable;
mod resources;
mod scene;

pub mod layers;
pub mod normalize;
pub mod settings;
pub mod tools;

pub use context::{FrameState, ListenerId, PointerListeners, SceneContext};
pub use error::LayerError;
pub use events::{Subscribers, SubscriptionId};
pub use extension::{MessageEvent, SceneExtension};
pub use labels::{Label, LabelData, LabelPool};
pub use registry::Registry;
pub use renderable::{LayerSettings, Renderable, RenderableKind, RenderablePayload, UserData};
pub use resources::{
    GeometryData, GeometryHandle, InstanceBufferData, InstanceBufferHandle, MaterialData,
    MaterialHandle, ResourceArena, ResourceId, SceneResources, SharedGeometry, Topology,
};
pub use scene::Scene;
