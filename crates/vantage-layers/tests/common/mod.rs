// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use glam::Vec3;
use serde_json::{json, Value};
use vantage_layers::layers::grid::{GridLayer, GridRenderable};
use vantage_layers::settings::SettingsAction;
use vantage_layers::{Scene, SceneContext};
use vantage_scene_port::mock::StaticTransforms;
use vantage_scene_port::{Pose, Time};

pub const RENDER_FRAME: &str = "map";

pub fn transforms() -> StaticTransforms {
    StaticTransforms::new()
        .with_frame(RENDER_FRAME, Pose::IDENTITY)
        .with_frame("base", Pose::from_translation(Vec3::new(1.0, 0.0, 0.0)))
}

pub fn scene() -> Scene {
    Scene::with_standard_layers(SceneContext::new(transforms()))
}

pub fn frame(scene: &mut Scene, sec: u32) {
    scene.start_frame(Time::new(sec, 0), RENDER_FRAME, RENDER_FRAME);
}

pub fn add_grid(scene: &mut Scene) -> String {
    let before: Vec<String> = grid_ids(scene);
    let add = SettingsAction::node_action(["layers"], "add-grid");
    assert!(scene.handle_settings_action(&add));
    grid_ids(scene)
        .into_iter()
        .find(|id| !before.contains(id))
        .expect("add-grid creates an instance")
}

pub fn edit_grid(scene: &mut Scene, id: &str, field: &str, value: Value) -> bool {
    scene.handle_settings_action(&SettingsAction::update(["layers", id, field], value))
}

pub fn grid_ids(scene: &Scene) -> Vec<String> {
    scene
        .extension::<GridLayer>()
        .expect("grid layer registered")
        .registry()
        .keys()
        .map(str::to_owned)
        .collect()
}

pub fn grid<'a>(scene: &'a Scene, id: &str) -> &'a GridRenderable {
    scene
        .extension::<GridLayer>()
        .and_then(|layer| layer.registry().get(id))
        .expect("grid exists")
}

pub fn object_list(stamp: u32, ids: &[&str]) -> Value {
    let objects: Vec<Value> = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            json!({
                "id": id,
                "label": format!("object {id}"),
                "pose": { "position": { "x": i, "y": 0, "z": 0 }, "orientation": { "w": 1 } },
                "scale": { "x": 1, "y": 1, "z": 1 },
                "color": { "r": 0.2, "g": 0.4, "b": 0.6, "a": 1 },
            })
        })
        .collect();
    json!({
        "header": { "stamp": { "sec": stamp, "nsec": 0 }, "frameId": "base" },
        "objects": objects,
    })
}
