// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config-driven grid lifecycle: add, rebuild, delete, adoption.

#![allow(missing_docs)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use approx::assert_relative_eq;
use common::{add_grid, edit_grid, frame, grid, grid_ids, scene};
use serde_json::json;
use vantage_app_core::{
    ConfigService, ConfigSection, LayoutConfig, MemoryConfigStore, SettingsStore,
};
use vantage_layers::layers::grid::{MAX_RINGS, RING_SEGMENTS};
use vantage_layers::settings::SettingsAction;
use vantage_layers::{Scene, SceneContext};
use vantage_scene_port::{Pose, Time};

fn ring_radii(scene: &Scene, id: &str) -> Vec<f64> {
    let rings = grid(scene, id).payload.rings();
    rings.expect("rings built").radii()
}

fn vertex_count(scene: &Scene, id: &str) -> usize {
    let geometry = grid(scene, id).payload.geometry().expect("geometry built");
    let arena = &scene.context().resources.arena;
    arena.geometry(geometry).map_or(0, |g| g.positions.len())
}

fn delete_grid(scene: &mut Scene, id: &str) -> bool {
    let delete = SettingsAction::node_action(["layers", id], "delete");
    scene.handle_settings_action(&delete)
}

#[test]
fn step_change_rebuilds_rings_and_releases_old_geometry_once() {
    let mut scene = scene();
    let id = add_grid(&mut scene);
    edit_grid(&mut scene, &id, "minSize", json!(30));
    edit_grid(&mut scene, &id, "maxSize", json!(100));
    edit_grid(&mut scene, &id, "step", json!(20));
    assert_eq!(ring_radii(&scene, &id), vec![30.0, 50.0, 70.0, 90.0]);

    let old = grid(&scene, &id).payload.geometry().unwrap().id();
    assert_eq!(vertex_count(&scene, &id), 4 * RING_SEGMENTS * 2);
    let released = scene.context().resources.arena.released_count();
    let builds = grid(&scene, &id).payload.builds();

    assert!(edit_grid(&mut scene, &id, "step", json!(10)));
    let radii = ring_radii(&scene, &id);
    assert_eq!(radii.len(), 7);
    for (i, r) in radii.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let expected = 30.0 + 10.0 * i as f64;
        assert_relative_eq!(*r, expected);
    }

    let arena = &scene.context().resources.arena;
    assert!(!arena.is_live(old));
    assert_eq!(arena.released_count(), released + 1);
    assert_eq!(vertex_count(&scene, &id), 7 * RING_SEGMENTS * 2);
    assert_eq!(grid(&scene, &id).payload.builds(), builds + 1);
}

#[test]
fn rewriting_equal_values_does_not_rebuild() {
    let mut scene = scene();
    let id = add_grid(&mut scene);
    edit_grid(&mut scene, &id, "step", json!(2));
    let builds = grid(&scene, &id).payload.builds();
    let allocated = scene.context().resources.arena.allocated_count();

    edit_grid(&mut scene, &id, "step", json!(2.0));
    edit_grid(&mut scene, &id, "lineWidth", json!(3));
    edit_grid(&mut scene, &id, "position", json!([1, 2, 3]));
    edit_grid(&mut scene, &id, "visible", json!(false));

    assert_eq!(grid(&scene, &id).payload.builds(), builds);
    assert_eq!(scene.context().resources.arena.allocated_count(), allocated);
}

#[test]
fn delete_removes_entry_renderable_and_tree_node_together() {
    let mut scene = scene();
    let keep = add_grid(&mut scene);
    let doomed = add_grid(&mut scene);
    scene.settings_tree();
    let live = scene.context().resources.arena.live_count();
    let released = scene.context().resources.arena.released_count();

    assert!(delete_grid(&mut scene, &doomed));

    assert_eq!(grid_ids(&scene), vec![keep.clone()]);
    let config = scene.context().settings.config();
    assert!(config.entry(ConfigSection::Layers, &doomed).is_none());
    assert!(scene.settings_refresh_pending());
    let arena = &scene.context().resources.arena;
    assert_eq!(arena.live_count(), live - 2);
    assert_eq!(arena.released_count(), released + 2);

    let tree = scene.settings_tree();
    assert!(tree.iter().all(|entry| entry.path.last() != Some(&doomed)));
    assert!(tree.iter().any(|entry| entry.path.last() == Some(&keep)));

    // A second delete finds nothing to do and frees nothing.
    assert!(!delete_grid(&mut scene, &doomed));
    let arena = &scene.context().resources.arena;
    assert_eq!(arena.released_count(), released + 2);
}

#[test]
fn unknown_paths_and_fields_leave_everything_untouched() {
    let mut scene = scene();
    let id = add_grid(&mut scene);
    let revision = scene.context().settings.revision();

    assert!(!edit_grid(&mut scene, "grid-99", "step", json!(3)));
    edit_grid(&mut scene, &id, "notAField", json!(3));
    edit_grid(&mut scene, &id, "step", json!("wide"));

    assert_eq!(scene.context().settings.revision(), revision);
    assert_eq!(grid_ids(&scene), vec![id]);
}

#[test]
fn unresolvable_frame_hides_grid_and_reports_it() {
    let mut scene = scene();
    let id = add_grid(&mut scene);
    edit_grid(&mut scene, &id, "frameId", json!("lidar"));
    frame(&mut scene, 1);
    assert!(!grid(&scene, &id).is_visible());

    let tree = scene.settings_tree();
    let entry = tree.iter().find(|entry| entry.path.last() == Some(&id));
    let node = &entry.unwrap().node;
    assert_eq!(
        node.error.as_deref(),
        Some("missing transform from frame <lidar> to frame <map>")
    );

    let transforms = common::transforms().with_frame("lidar", Pose::IDENTITY);
    scene.context_mut().set_transforms(transforms);
    frame(&mut scene, 2);
    assert!(grid(&scene, &id).is_visible());
    assert!(grid(&scene, &id).transform_error().is_none());
}

#[test]
fn grid_follows_render_frame_without_override() {
    let mut scene = scene();
    let id = add_grid(&mut scene);
    frame(&mut scene, 1);
    assert_eq!(grid(&scene, &id).user_data.frame_id, "map");
    scene.start_frame(Time::new(2, 0), "base", "map");
    assert_eq!(grid(&scene, &id).user_data.frame_id, "base");
}

#[test]
fn saved_layout_is_adopted_on_first_tree_pass() {
    let service = ConfigService::new(MemoryConfigStore::new());
    let mut layout = LayoutConfig::default();
    let fields = json!({ "minSize": 30, "maxSize": 100, "step": 20 });
    let serde_json::Value::Object(fields) = fields else {
        unreachable!()
    };
    layout.insert_layer("grid", "grid-7", fields);
    let store = SettingsStore::new(layout);
    store.save(&service, SettingsStore::DEFAULT_KEY).unwrap();

    let settings = SettingsStore::load(&service, SettingsStore::DEFAULT_KEY).unwrap();
    let mut scene =
        Scene::with_standard_layers(SceneContext::with_settings(common::transforms(), settings));
    assert!(grid_ids(&scene).is_empty());

    scene.settings_tree();
    assert_eq!(grid_ids(&scene), vec!["grid-7".to_owned()]);
    assert_eq!(ring_radii(&scene, "grid-7"), vec![30.0, 50.0, 70.0, 90.0]);

    edit_grid(&mut scene, "grid-7", "step", json!(35));
    scene.save_layout(&service).unwrap();
    let reloaded = SettingsStore::load(&service, SettingsStore::DEFAULT_KEY).unwrap();
    let stored = reloaded.config().entry(ConfigSection::Layers, "grid-7");
    assert_eq!(stored.unwrap().get("step"), Some(&json!(35)));
}

#[test]
fn adopted_layout_with_negative_min_and_tiny_step_builds_bounded_rings() {
    let mut layout = LayoutConfig::default();
    let fields = json!({ "minSize": -10, "maxSize": 10, "step": 1e-9 });
    let serde_json::Value::Object(fields) = fields else {
        unreachable!()
    };
    layout.insert_layer("grid", "grid-1", fields);
    let context = SceneContext::with_settings(common::transforms(), SettingsStore::new(layout));
    let mut scene = Scene::with_standard_layers(context);

    scene.settings_tree();
    let radii = ring_radii(&scene, "grid-1");
    assert!(!radii.is_empty() && radii.len() <= MAX_RINGS);
    assert!(radii.iter().all(|r| *r > 0.0));
    let expected = radii.len() * RING_SEGMENTS * 2;
    assert_eq!(vertex_count(&scene, "grid-1"), expected);
}

#[test]
fn externally_removed_entry_is_torn_down_before_next_tree() {
    let mut scene = scene();
    let id = add_grid(&mut scene);
    scene
        .context_mut()
        .settings
        .modify(|cfg| cfg.remove_entry(ConfigSection::Layers, &id));
    let tree = scene.settings_tree();
    assert!(grid_ids(&scene).is_empty());
    assert!(tree.iter().all(|entry| entry.path.last() != Some(&id)));
    assert_eq!(scene.context().resources.arena.live_count(), 0);
}
