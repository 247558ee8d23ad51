// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Message-driven layers: object lists and markers.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use common::{frame, object_list, scene};
use serde_json::json;
use vantage_layers::layers::markers::{MarkerLayer, MARKER_SCHEMA};
use vantage_layers::layers::object_list::{
    ObjectListLayer, ObjectListRenderable, OBJECT_LIST_SCHEMA,
};
use vantage_layers::settings::SettingsAction;
use vantage_layers::Scene;
use vantage_scene_port::Time;

const TOPIC: &str = "/perception/objects";

fn list(scene: &Scene) -> &ObjectListRenderable {
    scene
        .extension::<ObjectListLayer>()
        .and_then(|layer| layer.registry().get(TOPIC))
        .expect("object list exists")
}

fn instance_count(scene: &Scene) -> usize {
    let handle = list(scene).payload.instances();
    let arena = &scene.context().resources.arena;
    let buffer = arena.instance_buffer(handle.expect("instances allocated"));
    buffer.unwrap().count()
}

fn publish(scene: &mut Scene, stamp: u32, ids: &[&str]) {
    let message = object_list(stamp, ids);
    scene.ingest(TOPIC, OBJECT_LIST_SCHEMA, Time::new(stamp, 0), message);
}

fn set_topic(scene: &mut Scene, field: &str, value: bool) -> bool {
    let update = SettingsAction::update(["topics", TOPIC, field], value);
    scene.handle_settings_action(&update)
}

#[test]
fn shrinking_list_draws_one_instance_and_returns_two_labels() {
    let mut scene = scene();
    publish(&mut scene, 1, &["a", "b", "c"]);
    assert_eq!(instance_count(&scene), 3);
    assert_eq!(scene.context().resources.labels.outstanding(), 3);

    publish(&mut scene, 2, &["a"]);
    frame(&mut scene, 2);

    assert_eq!(instance_count(&scene), 1);
    assert!(list(&scene).is_visible());
    let labels = &scene.context().resources.labels;
    assert_eq!(labels.outstanding(), 1);
    assert_eq!(labels.available(), 2);
    assert_eq!(labels.created(), 3);
}

#[test]
fn republishing_reuses_buffers() {
    let mut scene = scene();
    publish(&mut scene, 1, &["a", "b"]);
    let buffer = list(&scene).payload.instances().unwrap().id();
    let allocated = scene.context().resources.arena.allocated_count();

    for stamp in 2..10 {
        publish(&mut scene, stamp, &["a", "b"]);
    }

    assert_eq!(list(&scene).payload.instances().unwrap().id(), buffer);
    assert_eq!(scene.context().resources.arena.allocated_count(), allocated);
    assert_eq!(list(&scene).user_data.message_time, Time::new(9, 0));
    assert_eq!(list(&scene).user_data.receive_time, Time::new(9, 0));
}

#[test]
fn settings_edit_applies_to_the_next_message() {
    let mut scene = scene();
    publish(&mut scene, 1, &["a"]);
    assert!(set_topic(&mut scene, "showLabels", false));
    publish(&mut scene, 2, &["a", "b"]);
    assert!(list(&scene).payload.labels().is_empty());
    assert_eq!(scene.context().resources.labels.outstanding(), 0);
}

#[test]
fn topic_visibility_hides_without_disposing() {
    let mut scene = scene();
    publish(&mut scene, 1, &["a"]);
    set_topic(&mut scene, "visible", false);
    frame(&mut scene, 1);
    assert!(!list(&scene).is_visible());
    assert!(!list(&scene).is_disposed());

    let tree = scene.settings_tree();
    let entry = tree.iter().find(|e| e.path == ["topics", TOPIC]);
    assert_eq!(entry.unwrap().node.visible, Some(false));
}

#[test]
fn empty_message_creates_an_empty_list() {
    let mut scene = scene();
    scene.ingest(TOPIC, OBJECT_LIST_SCHEMA, Time::new(1, 0), json!({}));
    assert_eq!(instance_count(&scene), 0);
    frame(&mut scene, 1);
    // No header frame: drawn in the render frame.
    assert_eq!(list(&scene).user_data.frame_id, "map");
}

#[test]
fn remove_all_releases_everything() {
    let mut scene = scene();
    publish(&mut scene, 1, &["a", "b"]);
    let cube = json!({ "type": 1 });
    scene.ingest("/marker", MARKER_SCHEMA, Time::new(1, 0), cube);
    scene.remove_all_renderables();

    let resources = &scene.context().resources;
    assert_eq!(resources.arena.live_count(), 0);
    assert_eq!(resources.labels.outstanding(), 0);
    let layer = scene.extension::<ObjectListLayer>().unwrap();
    assert!(layer.registry().is_empty());
}

#[test]
fn timestamp_only_marker_update_keeps_geometry() {
    let mut scene = scene();
    let marker = |sec: u32| {
        json!({
            "header": { "stamp": { "sec": sec }, "frameId": "base" },
            "type": 2,
            "scale": { "x": 0.1 },
            "points": [{ "x": 0 }, { "x": 1, "y": 1 }, { "x": 2 }],
        })
    };
    scene.ingest("/path", MARKER_SCHEMA, Time::new(1, 0), marker(1));
    let layer = scene.extension::<MarkerLayer>().unwrap();
    let before = layer.registry().get("/path").unwrap().payload.geometry_id();
    let allocated = scene.context().resources.arena.allocated_count();

    scene.ingest("/path", MARKER_SCHEMA, Time::new(2, 0), marker(2));

    let layer = scene.extension::<MarkerLayer>().unwrap();
    let renderable = layer.registry().get("/path").unwrap();
    assert_eq!(renderable.payload.geometry_id(), before);
    assert_eq!(renderable.payload.builds(), 1);
    assert_eq!(renderable.user_data.message_time, Time::new(2, 0));
    assert_eq!(scene.context().resources.arena.allocated_count(), allocated);
}

#[test]
fn unsubscribed_schema_is_ignored() {
    let mut scene = scene();
    let image = json!({ "width": 4 });
    scene.ingest("/image", "vantage.Image", Time::new(1, 0), image);
    assert_eq!(scene.context().resources.arena.allocated_count(), 0);
}
