use bevy::asset::AssetMetaCheck;
use bevy::input::mouse::{AccumulatedMouseMotion, AccumulatedMouseScroll};
use bevy::math::DMat4;
use bevy::prelude::*;
use bevy::window::{PresentMode, PrimaryWindow, WindowResized};
use bevy_common_assets::json::JsonAssetPlugin;
use site_scene_engine::engine::core::events::{
    CameraMovedEvent, ClearSelectionEvent, DragEvent, LoadDesignEvent, PointerClickEvent,
    RenderFrameEvent, RotateSelectedEvent, SetMeasurementEvent,
};
use site_scene_engine::engine::host::adapter::{HostAdapter, attach_host};
use site_scene_engine::engine::host::camera::{HostCamera, ray_ground_hit};
use site_scene_engine::rpc::web_rpc::WebRpcPlugin;
use site_scene_engine::tools::interaction::state::InteractionState;
use site_scene_engine::tools::measure::{MeasurementSample, format_distance};
use site_scene_engine::{
    ClipDepth, EngineConfig, HostChannel, HostFrame, HostSurface, ListenerId, MapHost,
    SiteDesign, SiteScenePlugin, TypeCatalog,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const CATALOG_PATH: &str = "site.catalog.json";
const DEMO_DESIGN: &str = include_str!("../assets/demo.design.json");

const CAMERA_FOV: f32 = std::f32::consts::FRAC_PI_4;
const CAMERA_NEAR: f32 = 0.1;
const CAMERA_FAR: f32 = 2000.0;
/// Pixels the cursor must travel with the button held before a press
/// becomes a drag.
const DRAG_THRESHOLD: f32 = 4.0;

fn main() {
    let mut app = create_app();

    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(async move {
            app.run();
        });
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        app.run();
    }
}

fn create_app() -> App {
    let config = EngineConfig::default().with_host_frame(HostFrame::Local, ClipDepth::ZeroToOne);
    let pan_lock = Arc::new(AtomicBool::new(false));

    let mut app = App::new();
    app.add_plugins(create_default_plugins())
        .add_plugins(JsonAssetPlugin::<TypeCatalog>::new(&["catalog.json"]))
        .add_plugins(SiteScenePlugin { config })
        .add_plugins(WebRpcPlugin);

    app.init_resource::<CatalogLoader>()
        .init_resource::<PointerGesture>()
        .init_resource::<ViewerMeasurement>()
        .insert_resource(ViewerCamera::new(pan_lock.clone()))
        .insert_resource(PendingHost(Some(WindowHost::new(pan_lock))))
        .add_systems(Startup, (setup, attach_window_host))
        .add_systems(
            Update,
            (
                load_catalog_system,
                track_surface_size,
                viewer_camera_controller,
                pointer_gesture_system,
                keyboard_shortcuts,
            ),
        );

    #[cfg(not(target_arch = "wasm32"))]
    app.add_systems(Last, log_outgoing_messages);

    app
}

fn create_default_plugins() -> impl PluginGroup {
    let window_config = WindowPlugin {
        primary_window: Some(create_window_config()),
        ..default()
    };

    let asset_config = AssetPlugin {
        meta_check: AssetMetaCheck::Never,
        ..default()
    };

    DefaultPlugins.set(window_config).set(asset_config)
}

fn create_window_config() -> Window {
    #[cfg(target_arch = "wasm32")]
    {
        Window {
            canvas: Some("#bevy".into()),
            fit_canvas_to_parent: true,
            prevent_default_event_handling: false,
            present_mode: PresentMode::AutoVsync,
            ..default()
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        Window {
            title: "Site Scene Viewer".into(),
            present_mode: PresentMode::AutoVsync,
            ..default()
        }
    }
}

/// The viewer window acting as the map host.
struct WindowHost {
    surface: Option<HostSurface>,
    next_listener: u64,
    pan_lock: Arc<AtomicBool>,
}

impl WindowHost {
    fn new(pan_lock: Arc<AtomicBool>) -> Self {
        Self {
            surface: None,
            next_listener: 0,
            pan_lock,
        }
    }
}

impl MapHost for WindowHost {
    fn surface(&self) -> Option<HostSurface> {
        self.surface.clone()
    }

    fn subscribe(&mut self, channel: HostChannel) -> ListenerId {
        self.next_listener += 1;
        debug!("Listening for {:?}", channel);
        ListenerId(self.next_listener)
    }

    fn unsubscribe(&mut self, listener: ListenerId) {
        debug!("Dropped listener {}", listener.0);
    }

    fn set_pan_locked(&mut self, locked: bool) {
        self.pan_lock.store(locked, Ordering::Relaxed);
    }

    // Winit redraws continuously.
    fn request_repaint(&mut self) {}
}

#[derive(Resource)]
struct PendingHost(Option<WindowHost>);

#[derive(Resource, Default)]
struct CatalogLoader {
    handle: Option<Handle<TypeCatalog>>,
    loaded: bool,
}

/// Orbit camera around a ground focus point. Orbiting stops while the engine
/// holds the pan lock.
#[derive(Resource)]
struct ViewerCamera {
    focus: Vec3,
    distance: f32,
    yaw: f32,
    pitch: f32,
    pan_lock: Arc<AtomicBool>,
    initialized: bool,
}

impl ViewerCamera {
    fn new(pan_lock: Arc<AtomicBool>) -> Self {
        Self {
            focus: Vec3::new(20.0, 0.0, 20.0),
            distance: 80.0,
            yaw: 0.0,
            pitch: -0.9,
            pan_lock,
            initialized: false,
        }
    }

    fn transform(&self) -> Transform {
        let rotation = Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(self.pitch);
        let position = self.focus + rotation * Vec3::new(0.0, 0.0, self.distance);
        Transform::from_translation(position).looking_at(self.focus, Vec3::Y)
    }

    /// Column-major clip-from-world matrix with zero-to-one depth.
    fn clip_from_world(&self, transform: &Transform, aspect: f32) -> [f64; 16] {
        let projection = DMat4::perspective_rh(
            f64::from(CAMERA_FOV),
            f64::from(aspect),
            f64::from(CAMERA_NEAR),
            f64::from(CAMERA_FAR),
        );
        let view = transform.compute_matrix().as_dmat4().inverse();
        (projection * view).to_cols_array()
    }
}

#[derive(Resource, Default)]
struct PointerGesture {
    press: Option<Vec2>,
    dragging: bool,
}

#[derive(Resource, Default)]
struct ViewerMeasurement {
    active: bool,
    sample: MeasurementSample,
}

fn setup(
    mut commands: Commands,
    asset_server: Res<AssetServer>,
    mut loader: ResMut<CatalogLoader>,
    viewer: Res<ViewerCamera>,
) {
    info!("=== SITE SCENE VIEWER ===");
    info!("Left click: select, left drag: move, R: rotate, Esc: clear, M: measure");

    loader.handle = Some(asset_server.load(CATALOG_PATH));

    commands.spawn((
        Camera3d::default(),
        Projection::Perspective(PerspectiveProjection {
            fov: CAMERA_FOV,
            near: CAMERA_NEAR,
            far: CAMERA_FAR,
            ..default()
        }),
        viewer.transform(),
    ));
}

/// Bind the primary window as the host surface.
fn attach_window_host(world: &mut World) {
    let Some(mut host) = world
        .get_resource_mut::<PendingHost>()
        .and_then(|mut pending| pending.0.take())
    else {
        return;
    };

    let mut windows = world.query_filtered::<&Window, With<PrimaryWindow>>();
    host.surface = windows
        .iter(world)
        .next()
        .map(|window| HostSurface::new(window.width(), window.height(), "primary window"));

    if let Err(err) = attach_host(world, Box::new(host)) {
        error!("Failed to attach viewer window: {}", err);
    }
}

/// Wait for the catalog, then load the demo design against it.
fn load_catalog_system(
    mut commands: Commands,
    mut loader: ResMut<CatalogLoader>,
    catalogs: Res<Assets<TypeCatalog>>,
    mut designs: EventWriter<LoadDesignEvent>,
) {
    if loader.loaded {
        return;
    }
    let Some(catalog) = loader.handle.as_ref().and_then(|handle| catalogs.get(handle)) else {
        return;
    };

    info!("Catalog loaded with {} types", catalog.len());
    commands.insert_resource(catalog.clone());
    loader.loaded = true;

    match SiteDesign::from_json(DEMO_DESIGN) {
        Ok(design) => {
            designs.write(LoadDesignEvent(design));
        }
        Err(err) => error!("Demo design is invalid: {}", err),
    }
}

fn track_surface_size(
    mut resized: EventReader<WindowResized>,
    adapter: Option<ResMut<HostAdapter>>,
) {
    let Some(last) = resized.read().last() else {
        return;
    };
    if let Some(mut adapter) = adapter {
        adapter.set_surface_size(last.width, last.height);
    }
}

fn viewer_camera_controller(
    mut viewer: ResMut<ViewerCamera>,
    mut camera_query: Query<&mut Transform, With<Camera3d>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    motion: Res<AccumulatedMouseMotion>,
    scroll: Res<AccumulatedMouseScroll>,
    mut frames: EventWriter<RenderFrameEvent>,
    mut camera_moves: EventWriter<CameraMovedEvent>,
) {
    let Ok(mut transform) = camera_query.single_mut() else {
        return;
    };
    let Ok(window) = windows.single() else {
        return;
    };

    let mut moved = !viewer.initialized;
    let locked = viewer.pan_lock.load(Ordering::Relaxed);

    if !locked && mouse_button.pressed(MouseButton::Right) && motion.delta != Vec2::ZERO {
        viewer.yaw -= motion.delta.x * 0.005;
        viewer.pitch = (viewer.pitch - motion.delta.y * 0.005).clamp(-1.5, -0.1);
        moved = true;
    }
    if !locked && scroll.delta.y != 0.0 {
        viewer.distance = (viewer.distance * (1.0 - scroll.delta.y * 0.1)).clamp(5.0, 800.0);
        moved = true;
    }

    if !moved {
        return;
    }
    viewer.initialized = true;
    *transform = viewer.transform();

    let aspect = window.width() / window.height().max(1.0);
    frames.write(RenderFrameEvent {
        matrix: viewer.clip_from_world(&transform, aspect),
    });
    camera_moves.write(CameraMovedEvent);
}

/// Press selects, press-and-move drags, release ends the drag. In measure
/// mode presses collect ground points instead.
fn pointer_gesture_system(
    mut gesture: ResMut<PointerGesture>,
    mut measurement: ResMut<ViewerMeasurement>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    interaction: Res<InteractionState>,
    host_camera: Res<HostCamera>,
    adapter: Option<Res<HostAdapter>>,
    mut clicks: EventWriter<PointerClickEvent>,
    mut drags: EventWriter<DragEvent>,
    mut overlays: EventWriter<SetMeasurementEvent>,
) {
    let Ok(window) = windows.single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        return;
    };

    if mouse_button.just_pressed(MouseButton::Left) {
        if measurement.active {
            let hit = adapter
                .as_deref()
                .and_then(|adapter| host_camera.screen_ray(cursor, adapter.surface()))
                .and_then(|(origin, direction)| ray_ground_hit(origin, direction, 0.0));
            if let Some(hit) = hit {
                measurement.sample.push(site_scene_engine::LocalPoint::new(hit.x, hit.z));
                let points = measurement.sample.points();
                if let [start, end] = points.as_slice() {
                    info!("Measured {}", format_distance(f64::from(start.distance(*end))));
                }
                overlays.write(SetMeasurementEvent(points));
            }
            return;
        }
        gesture.press = Some(cursor);
        gesture.dragging = false;
        clicks.write(PointerClickEvent { screen: cursor });
        return;
    }

    if mouse_button.pressed(MouseButton::Left) {
        let Some(press) = gesture.press else {
            return;
        };
        if !gesture.dragging
            && press.distance(cursor) > DRAG_THRESHOLD
            && interaction.active_object().is_some()
        {
            gesture.dragging = true;
            drags.write(DragEvent::Begin);
        }
        if gesture.dragging {
            drags.write(DragEvent::ToScreen(cursor));
        }
    }

    if mouse_button.just_released(MouseButton::Left) {
        if gesture.dragging {
            drags.write(DragEvent::End);
        }
        *gesture = PointerGesture::default();
    }
}

fn keyboard_shortcuts(
    keyboard: Res<ButtonInput<KeyCode>>,
    config: Res<EngineConfig>,
    mut measurement: ResMut<ViewerMeasurement>,
    mut rotations: EventWriter<RotateSelectedEvent>,
    mut clears: EventWriter<ClearSelectionEvent>,
    mut overlays: EventWriter<SetMeasurementEvent>,
) {
    if keyboard.just_pressed(KeyCode::KeyR) {
        rotations.write(RotateSelectedEvent {
            delta: config.rotation_step,
        });
    }
    if keyboard.just_pressed(KeyCode::Escape) {
        clears.write(ClearSelectionEvent);
    }
    if keyboard.just_pressed(KeyCode::KeyM) {
        measurement.active = !measurement.active;
        measurement.sample.clear();
        overlays.write(SetMeasurementEvent(Vec::new()));
        info!(
            "Measure mode {}",
            if measurement.active { "on" } else { "off" }
        );
    }
}

/// Without a parent page, engine notifications end up in the log.
#[cfg(not(target_arch = "wasm32"))]
fn log_outgoing_messages(
    mut rpc_interface: ResMut<site_scene_engine::rpc::web_rpc::WebRpcInterface>,
) {
    for message in rpc_interface.take_sent() {
        info!("-> {}", message);
    }
}
