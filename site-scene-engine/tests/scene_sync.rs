use bevy::math::{DMat4, DVec3, DVec4};
use bevy::prelude::*;
use constants::coordinate_system::MAP_AXIS_SWAP;
use site_scene_engine::engine::scene::objects::PlacedObject;
use site_scene_engine::engine::scene::root::SiteFrame;
use site_scene_engine::tools::measure::{Measurement, format_distance};
use site_scene_engine::{
    CatalogEntry, ClipDepth, EngineConfig, EngineError, GeoPoint, HostChannel, HostFrame,
    HostSurface, ListenerId, LocalPoint, MapHost, ObjectId, PlacementObject, SceneSyncEngine,
    TypeCatalog,
};
use std::sync::{Arc, Mutex};

const SCREEN: f32 = 800.0;
const ORIGIN: GeoPoint = GeoPoint::new(-0.1276, 51.5072);

#[derive(Default, Debug)]
struct HostLog {
    subscribed: Vec<HostChannel>,
    unsubscribed: Vec<ListenerId>,
    pan_locks: Vec<bool>,
    repaints: usize,
}

struct RecordingHost {
    surface: Option<HostSurface>,
    next_listener: u64,
    log: Arc<Mutex<HostLog>>,
}

impl RecordingHost {
    fn new() -> (Self, Arc<Mutex<HostLog>>) {
        let log = Arc::new(Mutex::new(HostLog::default()));
        let host = Self {
            surface: Some(HostSurface::new(SCREEN, SCREEN, "map-canvas")),
            next_listener: 0,
            log: log.clone(),
        };
        (host, log)
    }

    fn without_surface() -> Self {
        let (mut host, _) = Self::new();
        host.surface = None;
        host
    }
}

impl MapHost for RecordingHost {
    fn surface(&self) -> Option<HostSurface> {
        self.surface.clone()
    }

    fn subscribe(&mut self, channel: HostChannel) -> ListenerId {
        self.next_listener += 1;
        self.log.lock().unwrap().subscribed.push(channel);
        ListenerId(self.next_listener)
    }

    fn unsubscribe(&mut self, listener: ListenerId) {
        self.log.lock().unwrap().unsubscribed.push(listener);
    }

    fn set_pan_locked(&mut self, locked: bool) {
        self.log.lock().unwrap().pan_locks.push(locked);
    }

    fn request_repaint(&mut self) {
        self.log.lock().unwrap().repaints += 1;
    }
}

fn catalog() -> TypeCatalog {
    TypeCatalog::new(vec![
        CatalogEntry::new("box", 1.0, 1.0, 1.0),
        CatalogEntry::new("cabin", 6.0, 2.4, 2.6).with_color("#f2b134"),
    ])
}

fn square() -> Vec<LocalPoint> {
    vec![
        LocalPoint::new(0.0, 0.0),
        LocalPoint::new(10.0, 0.0),
        LocalPoint::new(10.0, 10.0),
        LocalPoint::new(0.0, 10.0),
    ]
}

/// Camera straight above `target`, 20 m up.
fn top_down(target: DVec3, depth: ClipDepth) -> DMat4 {
    let fov = 60f64.to_radians();
    let projection = match depth {
        ClipDepth::ZeroToOne => DMat4::perspective_rh(fov, 1.0, 0.1, 100.0),
        ClipDepth::NegativeOneToOne => DMat4::perspective_rh_gl(fov, 1.0, 0.1, 100.0),
    };
    let view = DMat4::look_at_rh(target + DVec3::new(0.0, 20.0, 0.0), target, DVec3::NEG_Z);
    projection * view
}

fn screen_of(clip_from_local: DMat4, local: DVec3) -> Vec2 {
    let clip = clip_from_local * DVec4::from((local, 1.0));
    let ndc = clip.truncate() / clip.w;
    Vec2::new(
        ((ndc.x + 1.0) * 0.5 * f64::from(SCREEN)) as f32,
        ((1.0 - ndc.y) * 0.5 * f64::from(SCREEN)) as f32,
    )
}

/// Attached engine in the local host frame, a 10 m square site and one box
/// at (5, 5) under a top-down camera.
fn local_engine() -> (SceneSyncEngine, Arc<Mutex<HostLog>>, DMat4) {
    let config = EngineConfig::default().with_host_frame(HostFrame::Local, ClipDepth::ZeroToOne);
    let mut engine = SceneSyncEngine::new(config);
    let (host, log) = RecordingHost::new();

    engine.set_origin(Some(ORIGIN));
    engine.set_boundary(square());
    engine.attach(Box::new(host)).unwrap();
    engine.set_catalog(catalog());
    engine.upsert_objects(vec![PlacementObject::new("a", "box", 5.0, 5.0)]);

    let camera = top_down(DVec3::new(5.0, 0.0, 5.0), ClipDepth::ZeroToOne);
    engine.render_frame(camera.to_cols_array());
    (engine, log, camera)
}

fn object_entities(engine: &mut SceneSyncEngine) -> Vec<ObjectId> {
    let world = engine.app_mut().world_mut();
    let mut query = world.query::<&PlacedObject>();
    let mut ids: Vec<ObjectId> = query.iter(world).map(|object| object.id.clone()).collect();
    ids.sort();
    ids
}

#[test]
fn attach_subscribes_once() {
    let mut engine = SceneSyncEngine::default();
    let (host, log) = RecordingHost::new();
    engine.attach(Box::new(host)).unwrap();

    let (second, second_log) = RecordingHost::new();
    engine.attach(Box::new(second)).unwrap();

    assert!(engine.is_attached());
    assert_eq!(
        log.lock().unwrap().subscribed,
        vec![HostChannel::PointerClick, HostChannel::CameraMove]
    );
    assert!(second_log.lock().unwrap().subscribed.is_empty());
}

#[test]
fn attach_without_surface_fails() {
    let mut engine = SceneSyncEngine::default();
    let result = engine.attach(Box::new(RecordingHost::without_surface()));

    assert!(matches!(result, Err(EngineError::MissingSurface)));
    assert!(!engine.is_attached());
    assert!(!engine.lifecycle().is_active());
}

#[test]
fn site_boundary_sets_origin_and_ground() {
    let mut engine = SceneSyncEngine::default();
    engine.set_site_boundary(Some(vec![
        ORIGIN,
        GeoPoint::new(-0.1270, 51.5072),
        GeoPoint::new(-0.1270, 51.5076),
        GeoPoint::new(-0.1276, 51.5076),
    ]));

    assert_eq!(engine.origin(), Some(ORIGIN));
    assert_eq!(engine.boundary().len(), 4);
    assert_eq!(engine.boundary()[0], LocalPoint::ZERO);
    assert!(engine.has_ground());

    engine.set_site_boundary(None);
    assert_eq!(engine.origin(), None);
    assert!(engine.boundary().is_empty());
    assert!(!engine.has_ground());
}

#[test]
fn pick_selects_object_under_pointer() {
    let (mut engine, log, camera) = local_engine();
    let center = screen_of(camera, DVec3::new(5.0, 0.5, 5.0));

    assert_eq!(engine.pick(center.x, center.y), Some(ObjectId::from("a")));
    let anchor = engine.selection_anchor().unwrap();
    assert!(anchor.distance(center) < 1.0, "anchor {anchor:?}");

    assert_eq!(engine.pick(5.0, 5.0), None);
    assert_eq!(engine.selection_anchor(), None);
    assert!(log.lock().unwrap().repaints >= 1);
}

#[test]
fn drag_outside_boundary_rolls_back() {
    let (mut engine, log, camera) = local_engine();
    let center = screen_of(camera, DVec3::new(5.0, 0.5, 5.0));
    engine.pick(center.x, center.y);

    engine.begin_drag();
    engine.drag_to(LocalPoint::new(11.0, 5.0));
    engine.end_drag();

    let id = ObjectId::from("a");
    assert_eq!(engine.committed_position(&id), Some(LocalPoint::new(5.0, 5.0)));
    assert!(engine.take_patches().is_empty());
    assert_eq!(log.lock().unwrap().pan_locks, vec![true, false]);
    assert_eq!(engine.selection(), Some(id));
}

#[test]
fn drag_inside_boundary_snaps_and_emits_patch() {
    let (mut engine, _log, camera) = local_engine();
    let center = screen_of(camera, DVec3::new(5.0, 0.5, 5.0));
    engine.pick(center.x, center.y);

    engine.begin_drag();
    engine.drag_to(LocalPoint::new(3.2, 3.2));
    engine.end_drag();

    let id = ObjectId::from("a");
    assert_eq!(engine.committed_position(&id), Some(LocalPoint::new(3.0, 3.0)));
    let patches = engine.take_patches();
    assert_eq!(patches.len(), 1);
    assert_eq!(patches[0].id, id);
    assert_eq!(patches[0].x, Some(3.0));
    assert_eq!(patches[0].z, Some(3.0));
}

#[test]
fn upsert_during_drag_leaves_dragged_object_alone() {
    let (mut engine, _log, camera) = local_engine();
    let center = screen_of(camera, DVec3::new(5.0, 0.5, 5.0));
    engine.pick(center.x, center.y);

    engine.begin_drag();
    engine.drag_to(LocalPoint::new(3.2, 3.2));
    engine.upsert_objects(vec![PlacementObject::new("a", "box", 8.0, 8.0)]);
    engine.drag_to(LocalPoint::new(11.0, 5.0));

    let id = ObjectId::from("a");
    assert_eq!(engine.committed_position(&id), Some(LocalPoint::new(3.0, 3.0)));
    engine.end_drag();
    assert_eq!(engine.committed_position(&id), Some(LocalPoint::new(3.0, 3.0)));
    assert_eq!(engine.take_patches().len(), 1);

    engine.upsert_objects(vec![PlacementObject::new("a", "box", 8.0, 8.0)]);
    assert_eq!(engine.committed_position(&id), Some(LocalPoint::new(8.0, 8.0)));
}

#[test]
fn drag_to_screen_follows_ground_hit() {
    let (mut engine, _log, camera) = local_engine();
    let center = screen_of(camera, DVec3::new(5.0, 0.5, 5.0));
    engine.pick(center.x, center.y);

    let target = screen_of(camera, DVec3::new(7.1, 0.0, 2.9));
    engine.begin_drag();
    engine.drag_to_screen(target.x, target.y);
    engine.end_drag();

    assert_eq!(
        engine.committed_position(&ObjectId::from("a")),
        Some(LocalPoint::new(7.0, 3.0))
    );
}

#[test]
fn rotate_selected_emits_rotation_patch() {
    let (mut engine, _log, camera) = local_engine();
    engine.rotate(0.5);
    assert!(engine.take_patches().is_empty());

    let center = screen_of(camera, DVec3::new(5.0, 0.5, 5.0));
    engine.pick(center.x, center.y);
    engine.rotate(0.5);
    engine.rotate_step();

    let id = ObjectId::from("a");
    let expected = 0.5 + std::f32::consts::FRAC_PI_8;
    assert!((engine.rotation(&id).unwrap() - expected).abs() < 1e-6);
    let patches = engine.take_patches();
    assert_eq!(patches.len(), 2);
    assert_eq!(patches[1].x, None);
    assert!((patches[1].rotation.unwrap() - expected).abs() < 1e-6);
}

#[test]
fn measurement_overlay_needs_two_points() {
    let (mut engine, _log, _camera) = local_engine();

    let start = LocalPoint::new(0.0, 0.0);
    let end = LocalPoint::new(3.0, 4.0);
    engine.set_measurement_overlay(vec![start, end]);
    assert!(engine.has_measurement_overlay());
    assert_eq!(format_distance(f64::from(start.distance(end))), "5.00 m");

    engine.set_measurement_overlay(vec![start]);
    assert!(!engine.has_measurement_overlay());

    let measurement = Measurement::between(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.001, 0.0));
    assert_eq!(measurement.distance_label(), "111.20 m");
}

#[test]
fn upsert_reconciles_by_id() {
    let mut engine = SceneSyncEngine::default();
    engine.set_catalog(catalog());

    engine.upsert_objects(vec![
        PlacementObject::new("1", "box", 1.0, 1.0),
        PlacementObject::new("2", "cabin", 4.0, 4.0),
    ]);
    let meshes_before = engine.world().resource::<Assets<Mesh>>().len();

    engine.upsert_objects(vec![
        PlacementObject::new("2", "cabin", 6.0, 4.0),
        PlacementObject::new("3", "box", 2.0, 8.0),
    ]);

    let expected = vec![ObjectId::from("2"), ObjectId::from("3")];
    assert_eq!(engine.mesh_ids(), expected);
    assert_eq!(object_entities(&mut engine), expected);
    assert_eq!(engine.world().resource::<Assets<Mesh>>().len(), meshes_before);
    assert_eq!(
        engine.committed_position(&ObjectId::from("2")),
        Some(LocalPoint::new(6.0, 4.0))
    );
}

#[test]
fn upsert_order_does_not_matter() {
    let objects = vec![
        PlacementObject::new("x", "box", 1.0, 1.0),
        PlacementObject::new("y", "cabin", 4.0, 4.0),
        PlacementObject::new("z", "box", 7.0, 2.0),
    ];

    let mut direct = SceneSyncEngine::default();
    direct.set_catalog(catalog());
    direct.upsert_objects(objects.clone());

    let mut staged = SceneSyncEngine::default();
    staged.set_catalog(catalog());
    staged.upsert_objects(vec![PlacementObject::new("w", "box", 0.0, 0.0), objects[1].clone()]);
    staged.upsert_objects(objects);

    assert_eq!(direct.mesh_ids(), staged.mesh_ids());
}

#[test]
fn unknown_types_are_skipped() {
    let mut engine = SceneSyncEngine::default();
    engine.set_catalog(catalog());
    engine.upsert_objects(vec![
        PlacementObject::new("a", "box", 1.0, 1.0),
        PlacementObject::new("b", "spaceship", 2.0, 2.0),
    ]);

    assert_eq!(engine.mesh_ids(), vec![ObjectId::from("a")]);
}

#[test]
fn removing_selected_object_clears_selection() {
    let (mut engine, log, camera) = local_engine();
    let center = screen_of(camera, DVec3::new(5.0, 0.5, 5.0));
    engine.pick(center.x, center.y);
    engine.begin_drag();

    engine.upsert_objects(Vec::new());

    assert_eq!(engine.selection(), None);
    assert!(engine.mesh_ids().is_empty());
    assert_eq!(log.lock().unwrap().pan_locks, vec![true, false]);
}

#[test]
fn dispose_releases_everything() {
    let (mut engine, log, camera) = local_engine();
    engine.set_measurement_overlay(vec![LocalPoint::new(1.0, 1.0), LocalPoint::new(4.0, 5.0)]);
    let center = screen_of(camera, DVec3::new(5.0, 0.5, 5.0));
    engine.pick(center.x, center.y);
    engine.begin_drag();

    engine.dispose();

    assert!(engine.lifecycle().is_disposed());
    assert!(!engine.is_attached());
    assert!(!engine.has_ground());
    assert!(!engine.has_measurement_overlay());
    assert!(engine.mesh_ids().is_empty());
    assert_eq!(engine.world().resource::<Assets<Mesh>>().len(), 0);
    assert_eq!(engine.world().resource::<Assets<StandardMaterial>>().len(), 0);

    {
        let log = log.lock().unwrap();
        assert_eq!(log.pan_locks.last(), Some(&false));
        assert_eq!(log.unsubscribed.len(), 2);
    }

    engine.dispose();
    engine.upsert_objects(vec![PlacementObject::new("late", "box", 1.0, 1.0)]);
    assert!(engine.mesh_ids().is_empty());

    let (host, _) = RecordingHost::new();
    assert!(matches!(engine.attach(Box::new(host)), Err(EngineError::Disposed)));
}

#[test]
fn pick_in_mercator_host_frame() {
    let mut engine = SceneSyncEngine::default();
    let (host, _log) = RecordingHost::new();
    engine.set_site_boundary(Some(vec![
        ORIGIN,
        GeoPoint::new(-0.1270, 51.5072),
        GeoPoint::new(-0.1270, 51.5076),
        GeoPoint::new(-0.1276, 51.5076),
    ]));
    engine.attach(Box::new(host)).unwrap();
    engine.set_catalog(catalog());
    engine.upsert_objects(vec![PlacementObject::new("crane", "box", 10.0, 10.0)]);

    // The host sees mercator space; hand it the camera that lands on the
    // same local view once composed with the site placement.
    let local_camera = top_down(DVec3::new(10.0, 0.0, 10.0), ClipDepth::NegativeOneToOne);
    let world_from_local = SiteFrame::placement_for(Some(ORIGIN));
    let swap = DMat4::from_cols_array_2d(&MAP_AXIS_SWAP);
    let host_matrix = local_camera * (swap * world_from_local).inverse();
    engine.render_frame(host_matrix.to_cols_array());

    let center = screen_of(local_camera, DVec3::new(10.0, 0.5, 10.0));
    assert_eq!(engine.pick(center.x, center.y), Some(ObjectId::from("crane")));
}

#[test]
fn design_document_drives_the_scene() {
    let mut engine = SceneSyncEngine::default();
    engine.set_catalog(catalog());
    engine
        .load_design_json(
            r#"{
                "boundary": [[-0.1276, 51.5072], [-0.1270, 51.5072], [-0.1270, 51.5076]],
                "objects": [
                    { "id": "c1", "type": "cabin", "x": 8.0, "z": 4.0, "rotation": 0.5 },
                    { "id": "b1", "type": "box", "x": 20.0, "z": 6.0 }
                ]
            }"#,
        )
        .unwrap();

    assert_eq!(engine.origin(), Some(ORIGIN));
    assert_eq!(engine.boundary().len(), 3);
    assert!(engine.has_ground());
    assert_eq!(engine.mesh_ids(), vec![ObjectId::from("b1"), ObjectId::from("c1")]);
    assert_eq!(engine.rotation(&ObjectId::from("c1")), Some(0.5));

    let bad = engine.load_design_json(r#"{ "boundary": [[0, 0], [1, 1]] }"#);
    assert!(matches!(bad, Err(EngineError::Config(_))));
}
