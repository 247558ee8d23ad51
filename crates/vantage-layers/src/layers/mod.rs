// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Concrete scene extensions.
//!
//! - [`grid::GridLayer`]: config-driven ring grids under `["layers", id]`.
//! - [`object_list::ObjectListLayer`]: instanced boxes with labels, per topic.
//! - [`markers::MarkerLayer`]: single primitives, per topic.
//!
//! Message-driven layers keep per-topic settings under `["topics", topic]` and
//! share the edit routine below.

pub mod grid;
pub mod markers;
pub mod object_list;

use glam::Vec3;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use vantage_app_core::ConfigSection;

use crate::context::SceneContext;
use crate::error::LayerError;
use crate::resources::{GeometryData, Topology};
use crate::settings::{apply_field_edit, settings_or_default, SettingsPath};

/// Settings path of a topic node.
pub fn topic_path(topic: &str) -> SettingsPath {
    vec![ConfigSection::Topics.key().to_owned(), topic.to_owned()]
}

/// Splits `["topics", topic, field?]`.
pub(crate) fn split_topic_path(path: &[String]) -> Option<(&str, Option<&str>)> {
    let (root, rest) = path.split_first()?;
    if root != ConfigSection::Topics.key() {
        return None;
    }
    match rest {
        [topic] => Some((topic.as_str(), None)),
        [topic, field] => Some((topic.as_str(), Some(field.as_str()))),
        _ => None,
    }
}

/// Current settings for `topic`, read fresh from the layout.
pub(crate) fn topic_settings<S>(ctx: &SceneContext, topic: &str) -> S
where
    S: DeserializeOwned + Default,
{
    let fields = ctx.settings.config().entry(ConfigSection::Topics, topic);
    settings_or_default(topic, fields)
}

/// Writes one topic field edit atomically. Empty entries are dropped so the
/// layout only lists topics with non-default settings.
pub(crate) fn edit_topic_field<S>(
    ctx: &mut SceneContext,
    topic: &str,
    field: &str,
    value: Option<Value>,
) -> bool
where
    S: Serialize + DeserializeOwned + Default,
{
    let result = ctx.settings.update(|cfg| {
        let fields = cfg.entry_or_default(ConfigSection::Topics, topic);
        let changed = apply_field_edit::<S>(topic, fields, field, value)?;
        if fields.is_empty() {
            cfg.remove_entry(ConfigSection::Topics, topic);
        }
        Ok::<_, LayerError>(changed)
    });
    match result {
        Ok(changed) => changed,
        Err(err) => {
            debug!(topic, field, %err, "ignoring settings edit");
            false
        }
    }
}

/// Wireframe cube of edge length 1 centred on the origin.
pub(crate) fn unit_box() -> GeometryData {
    box_edges(Vec3::splat(-0.5), Vec3::splat(0.5))
}

/// Three great circles of a unit-diameter sphere.
pub(crate) fn unit_sphere() -> GeometryData {
    const SEGMENTS: usize = 32;
    let mut positions = Vec::with_capacity(SEGMENTS * 6);
    for axis in 0..3 {
        for i in 0..SEGMENTS {
            for j in [i, i + 1] {
                #[allow(clippy::cast_precision_loss)]
                let theta = core::f32::consts::TAU * j as f32 / SEGMENTS as f32;
                let (s, c) = theta.sin_cos();
                let p = match axis {
                    0 => Vec3::new(c, s, 0.0),
                    1 => Vec3::new(0.0, c, s),
                    _ => Vec3::new(s, 0.0, c),
                };
                positions.push(p * 0.5);
            }
        }
    }
    GeometryData::new(Topology::LineList, positions)
}

/// The 12 edges of an axis-aligned box as a line list (24 vertices).
pub(crate) fn box_edges(min: Vec3, max: Vec3) -> GeometryData {
    GeometryData::new(Topology::LineList, box_edge_positions(min, max).to_vec())
}

#[rustfmt::skip]
pub(crate) fn box_edge_positions(min: Vec3, max: Vec3) -> [Vec3; 24] {
    let c = |x: bool, y: bool, z: bool| {
        Vec3::new(
            if x { max.x } else { min.x },
            if y { max.y } else { min.y },
            if z { max.z } else { min.z },
        )
    };
    [
        c(false, false, false), c(true, false, false),
        c(true, false, false), c(true, true, false),
        c(true, true, false), c(false, true, false),
        c(false, true, false), c(false, false, false),
        c(false, false, true), c(true, false, true),
        c(true, false, true), c(true, true, true),
        c(true, true, true), c(false, true, true),
        c(false, true, true), c(false, false, true),
        c(false, false, false), c(false, false, true),
        c(true, false, false), c(true, false, true),
        c(true, true, false), c(true, true, true),
        c(false, true, false), c(false, true, true),
    ]
}
