//! Synchronous entry point for hosts that drive the engine call by call.
//!
//! Each operation queues its event and runs one `App::update`, so effects
//! are visible as soon as the call returns.

use super::events::*;
use super::lifecycle::EngineLifecycle;
use super::plugin::SiteScenePlugin;
use crate::engine::assets::catalog::TypeCatalog;
use crate::engine::assets::design::SiteDesign;
use crate::engine::assets::placement::{ObjectId, ObjectPatch, PlacementObject};
use crate::engine::config::EngineConfig;
use crate::engine::host::MapHost;
use crate::engine::host::adapter::{HostAdapter, attach_host};
use crate::engine::scene::ground::GroundPlane;
use crate::engine::scene::objects::MeshRegistry;
use crate::engine::scene::root::SiteFrame;
use crate::error::EngineError;
use crate::projection::{GeoPoint, LocalPoint};
use crate::tools::interaction::state::{InteractionState, PatchOutbox, SelectionHandle};
use crate::tools::measure::MeasurementOverlay;
use bevy::app::PluginsState;
use bevy::prelude::*;

pub struct SceneSyncEngine {
    app: App,
}

impl SceneSyncEngine {
    /// Headless engine: ECS, assets and the scene plugin, no renderer.
    pub fn new(config: EngineConfig) -> Self {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, AssetPlugin::default()))
            .init_asset::<Mesh>()
            .init_asset::<StandardMaterial>()
            .add_plugins(SiteScenePlugin { config });
        Self::from_app(app)
    }

    /// Wrap an app that already has `SiteScenePlugin`.
    pub fn from_app(mut app: App) -> Self {
        if app.plugins_state() == PluginsState::Ready {
            app.finish();
            app.cleanup();
        }
        app.update();
        Self { app }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    pub fn app_mut(&mut self) -> &mut App {
        &mut self.app
    }

    pub fn world(&self) -> &World {
        self.app.world()
    }

    fn dispatch<E: Event>(&mut self, event: E) {
        self.app.world_mut().send_event(event);
        self.app.update();
    }

    pub fn attach(&mut self, host: Box<dyn MapHost>) -> Result<(), EngineError> {
        attach_host(self.app.world_mut(), host)?;
        self.app.update();
        Ok(())
    }

    pub fn set_origin(&mut self, origin: Option<GeoPoint>) {
        self.dispatch(SetOriginEvent(origin));
    }

    pub fn set_boundary(&mut self, points: Vec<LocalPoint>) {
        self.dispatch(SetBoundaryEvent(points));
    }

    /// Drawing-tool entry: origin and boundary from one geographic ring.
    pub fn set_site_boundary(&mut self, ring: Option<Vec<GeoPoint>>) {
        self.dispatch(SiteBoundaryEvent(ring));
    }

    /// Replace the catalog. Takes effect on the next `upsert_objects`.
    pub fn set_catalog(&mut self, catalog: TypeCatalog) {
        self.app.world_mut().insert_resource(catalog);
    }

    pub fn upsert_objects(&mut self, objects: Vec<PlacementObject>) {
        self.dispatch(UpsertObjectsEvent(objects));
    }

    /// Pick at a screen position; returns the selection afterwards.
    pub fn pick(&mut self, screen_x: f32, screen_y: f32) -> Option<ObjectId> {
        self.dispatch(PointerClickEvent {
            screen: Vec2::new(screen_x, screen_y),
        });
        self.selection()
    }

    pub fn clear_selection(&mut self) {
        self.dispatch(ClearSelectionEvent);
    }

    pub fn begin_drag(&mut self) {
        self.dispatch(DragEvent::Begin);
    }

    pub fn drag_to(&mut self, point: LocalPoint) {
        self.dispatch(DragEvent::To(point));
    }

    pub fn drag_to_screen(&mut self, screen_x: f32, screen_y: f32) {
        self.dispatch(DragEvent::ToScreen(Vec2::new(screen_x, screen_y)));
    }

    pub fn end_drag(&mut self) {
        self.dispatch(DragEvent::End);
    }

    pub fn rotate(&mut self, delta: f32) {
        self.dispatch(RotateSelectedEvent { delta });
    }

    pub fn rotate_step(&mut self) {
        let delta = self.world().resource::<EngineConfig>().rotation_step;
        self.rotate(delta);
    }

    pub fn set_measurement_overlay(&mut self, points: Vec<LocalPoint>) {
        self.dispatch(SetMeasurementEvent(points));
    }

    /// Column-major host camera matrix for this frame.
    pub fn render_frame(&mut self, matrix: [f64; 16]) {
        self.dispatch(RenderFrameEvent { matrix });
    }

    pub fn camera_moved(&mut self) {
        self.dispatch(CameraMovedEvent);
    }

    pub fn load_design(&mut self, design: SiteDesign) {
        self.dispatch(LoadDesignEvent(design));
    }

    pub fn load_design_json(&mut self, json: &str) -> Result<(), EngineError> {
        let design = SiteDesign::from_json(json)?;
        self.load_design(design);
        Ok(())
    }

    /// Release everything. Repeated calls do nothing.
    pub fn dispose(&mut self) {
        if self.lifecycle().is_disposed() {
            return;
        }
        self.dispatch(DisposeEvent);
    }

    /// Patches emitted since the last call, oldest first.
    pub fn take_patches(&mut self) -> Vec<ObjectPatch> {
        self.app.world_mut().resource_mut::<PatchOutbox>().drain()
    }

    pub fn lifecycle(&self) -> EngineLifecycle {
        *self.world().resource::<EngineLifecycle>()
    }

    pub fn interaction(&self) -> &InteractionState {
        self.world().resource::<InteractionState>()
    }

    pub fn selection(&self) -> Option<ObjectId> {
        self.interaction().active_object().cloned()
    }

    pub fn selection_anchor(&self) -> Option<Vec2> {
        self.world().resource::<SelectionHandle>().anchor
    }

    pub fn origin(&self) -> Option<GeoPoint> {
        self.world().resource::<SiteFrame>().origin
    }

    pub fn boundary(&self) -> &[LocalPoint] {
        &self.world().resource::<SiteFrame>().boundary
    }

    pub fn has_ground(&self) -> bool {
        self.world().resource::<GroundPlane>().is_built()
    }

    pub fn has_measurement_overlay(&self) -> bool {
        !self.world().resource::<MeasurementOverlay>().is_empty()
    }

    pub fn is_attached(&self) -> bool {
        self.world().contains_resource::<HostAdapter>()
    }

    pub fn mesh_ids(&self) -> Vec<ObjectId> {
        self.world().resource::<MeshRegistry>().ids()
    }

    /// Last position of `id` that passed containment.
    pub fn committed_position(&self, id: &ObjectId) -> Option<LocalPoint> {
        self.world()
            .resource::<MeshRegistry>()
            .get(id)
            .map(|entry| entry.committed)
    }

    pub fn rotation(&self, id: &ObjectId) -> Option<f32> {
        self.world()
            .resource::<MeshRegistry>()
            .get(id)
            .map(|entry| entry.rotation)
    }
}

impl Default for SceneSyncEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
