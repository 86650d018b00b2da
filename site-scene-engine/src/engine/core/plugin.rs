use super::events::*;
use super::lifecycle::{EngineLifecycle, not_disposed};
use crate::engine::assets::catalog::TypeCatalog;
use crate::engine::config::EngineConfig;
use crate::engine::host::adapter::HostAdapter;
use crate::engine::host::camera::{HostCamera, apply_render_frame, recompose_on_origin_change};
use crate::engine::scene::grid::{SceneFixtures, release_fixtures, spawn_scene_fixtures};
use crate::engine::scene::ground::{GroundPlane, apply_boundary};
use crate::engine::scene::objects::{MeshRegistry, reconcile_objects};
use crate::engine::scene::root::{
    SiteFrame, apply_origin, apply_site_boundary, spawn_site_root,
};
use crate::tools::interaction::manipulation::{handle_drag_events, handle_rotate_events};
use crate::tools::interaction::selection::{
    handle_clear_selection, handle_pointer_clicks, refresh_selection_handle, sync_outline_colors,
};
use crate::tools::interaction::state::{InteractionState, PatchOutbox, SelectionHandle};
use crate::tools::measure::{
    MeasureTool, MeasurementOverlay, project_geo_measurement, update_measurement_overlay,
};
use bevy::prelude::*;

/// Every engine system runs in this set, in a fixed order:
/// site, objects, interaction, measurement, camera, dispose.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SceneSyncSet;

/// Registers the scene synchronization engine.
#[derive(Default)]
pub struct SiteScenePlugin {
    pub config: EngineConfig,
}

impl Plugin for SiteScenePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(self.config.clone())
            .init_resource::<EngineLifecycle>()
            .init_resource::<SiteFrame>()
            .init_resource::<GroundPlane>()
            .init_resource::<SceneFixtures>()
            .init_resource::<MeshRegistry>()
            .init_resource::<TypeCatalog>()
            .init_resource::<InteractionState>()
            .init_resource::<PatchOutbox>()
            .init_resource::<SelectionHandle>()
            .init_resource::<HostCamera>()
            .init_resource::<MeasureTool>()
            .init_resource::<MeasurementOverlay>();

        app.add_event::<SiteBoundaryEvent>()
            .add_event::<LoadDesignEvent>()
            .add_event::<SetOriginEvent>()
            .add_event::<SetBoundaryEvent>()
            .add_event::<UpsertObjectsEvent>()
            .add_event::<PointerClickEvent>()
            .add_event::<ClearSelectionEvent>()
            .add_event::<DragEvent>()
            .add_event::<RotateSelectedEvent>()
            .add_event::<SetMeasurementEvent>()
            .add_event::<SetGeoMeasurementEvent>()
            .add_event::<RenderFrameEvent>()
            .add_event::<CameraMovedEvent>()
            .add_event::<DisposeEvent>()
            .add_event::<HostAttachedEvent>()
            .add_event::<SelectionChangedEvent>()
            .add_event::<PanLockEvent>();

        app.configure_sets(Update, SceneSyncSet.run_if(not_disposed))
            .add_systems(Startup, spawn_site_root)
            .add_systems(
                Update,
                (
                    // Site
                    (
                        apply_design,
                        apply_site_boundary,
                        apply_origin,
                        recompose_on_origin_change,
                        apply_boundary,
                    )
                        .chain(),
                    // Objects and fixtures
                    (reconcile_objects, spawn_scene_fixtures).chain(),
                    // Interaction
                    (
                        handle_pointer_clicks,
                        handle_clear_selection,
                        handle_drag_events,
                        handle_rotate_events,
                        sync_outline_colors,
                    )
                        .chain(),
                    (project_geo_measurement, update_measurement_overlay).chain(),
                    // Camera
                    (apply_render_frame, refresh_selection_handle).chain(),
                    dispose_engine,
                )
                    .chain()
                    .in_set(SceneSyncSet),
            );
    }
}

/// Fan an imported design out into boundary and object events. The boundary
/// ring decides the origin; a design without a ring falls back to its
/// explicit origin.
pub fn apply_design(
    mut events: EventReader<LoadDesignEvent>,
    mut site_events: EventWriter<SiteBoundaryEvent>,
    mut origin_events: EventWriter<SetOriginEvent>,
    mut boundary_events: EventWriter<SetBoundaryEvent>,
    mut object_events: EventWriter<UpsertObjectsEvent>,
) {
    for LoadDesignEvent(design) in events.read() {
        match design.boundary.as_deref() {
            Some(ring) if !ring.is_empty() => {
                if design.origin.is_some_and(|origin| origin != ring[0]) {
                    warn!("Design origin differs from the first boundary vertex, using the boundary");
                }
                site_events.write(SiteBoundaryEvent(Some(ring.to_vec())));
            }
            _ => match design.origin {
                Some(origin) => {
                    origin_events.write(SetOriginEvent(Some(origin)));
                    boundary_events.write(SetBoundaryEvent(Vec::new()));
                }
                None => {
                    site_events.write(SiteBoundaryEvent(None));
                }
            },
        }
        object_events.write(UpsertObjectsEvent(design.objects.clone()));
        info!("Design loaded with {} objects", design.objects.len());
    }
}

/// Tear everything down once. Later dispose requests never reach here
/// because the whole set stops running.
pub fn dispose_engine(
    mut events: EventReader<DisposeEvent>,
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut lifecycle: ResMut<EngineLifecycle>,
    mut registry: ResMut<MeshRegistry>,
    mut ground: ResMut<GroundPlane>,
    mut fixtures: ResMut<SceneFixtures>,
    mut overlay: ResMut<MeasurementOverlay>,
    mut interaction: ResMut<InteractionState>,
    mut adapter: Option<ResMut<HostAdapter>>,
    mut pan_events: EventWriter<PanLockEvent>,
    frame: Res<SiteFrame>,
) {
    if events.read().last().is_none() || !lifecycle.on_dispose() {
        return;
    }

    let released = registry.len();
    for (_, entry) in registry.drain() {
        entry.release(&mut commands, &mut meshes, &mut materials);
    }
    if let Some((entity, assets)) = ground.take() {
        commands.entity(entity).despawn();
        assets.release(&mut meshes, &mut materials);
    }
    release_fixtures(&mut commands, &mut meshes, &mut materials, &mut fixtures);
    overlay.release(&mut commands, &mut meshes, &mut materials);

    if interaction.is_dragging() {
        pan_events.write(PanLockEvent { locked: false });
    }
    *interaction = InteractionState::Idle;

    if let Some(adapter) = adapter.as_deref_mut() {
        adapter.detach();
        commands.remove_resource::<HostAdapter>();
    }
    if let Some(root) = frame.root {
        commands.entity(root).despawn();
    }

    info!("Engine disposed, released {} objects", released);
}
