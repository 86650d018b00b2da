use super::ray::pick_nearest;
use super::state::{InteractionState, SelectionHandle};
use crate::engine::config::{EngineConfig, parse_color};
use crate::engine::core::events::{
    CameraMovedEvent, ClearSelectionEvent, PointerClickEvent, SelectionChangedEvent,
};
use crate::engine::core::lifecycle::EngineLifecycle;
use crate::engine::host::adapter::HostAdapter;
use crate::engine::host::camera::HostCamera;
use crate::engine::scene::objects::MeshRegistry;
use bevy::prelude::*;
use constants::render_settings::{OUTLINE_COLOR, SELECTION_COLOR};

/// Pick on click: nearest object under the pointer becomes the selection, a
/// miss clears it.
pub fn handle_pointer_clicks(
    mut events: EventReader<PointerClickEvent>,
    mut interaction: ResMut<InteractionState>,
    mut selection_events: EventWriter<SelectionChangedEvent>,
    registry: Res<MeshRegistry>,
    camera: Res<HostCamera>,
    adapter: Option<Res<HostAdapter>>,
    lifecycle: Res<EngineLifecycle>,
) {
    let Some(adapter) = adapter.filter(|_| lifecycle.is_active()) else {
        events.clear();
        return;
    };

    for PointerClickEvent { screen } in events.read() {
        if interaction.is_dragging() {
            debug!("Click ignored while dragging");
            continue;
        }
        let Some((origin, direction)) = camera.screen_ray(*screen, adapter.surface()) else {
            debug!("Click ignored, no host camera yet");
            continue;
        };

        let hit = pick_nearest(origin, direction, &registry);
        if interaction.select(hit.clone()) {
            debug!("Selection changed: {:?}", hit);
            selection_events.write(SelectionChangedEvent { selected: hit });
        }
    }
}

pub fn handle_clear_selection(
    mut events: EventReader<ClearSelectionEvent>,
    mut interaction: ResMut<InteractionState>,
    mut selection_events: EventWriter<SelectionChangedEvent>,
) {
    if events.read().last().is_some() && interaction.clear() {
        selection_events.write(SelectionChangedEvent { selected: None });
    }
}

/// Outline colour follows the selection.
pub fn sync_outline_colors(
    interaction: Res<InteractionState>,
    registry: Res<MeshRegistry>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    config: Res<EngineConfig>,
) {
    if !interaction.is_changed() && !registry.is_changed() {
        return;
    }

    let active = interaction.active_object();
    let highlight = parse_color(&config.selection_color, SELECTION_COLOR);
    let normal = parse_color(&config.outline_color, OUTLINE_COLOR);

    for (id, entry) in registry.iter() {
        if let Some(material) = materials.get_mut(&entry.outline.material) {
            material.base_color = if Some(id) == active { highlight } else { normal };
        }
    }
}

/// Screen anchor for the host's selection handle: top centre of the selected
/// box, recomputed when the camera moves or the selection changes.
pub fn refresh_selection_handle(
    mut camera_moves: EventReader<CameraMovedEvent>,
    mut handle: ResMut<SelectionHandle>,
    interaction: Res<InteractionState>,
    registry: Res<MeshRegistry>,
    camera: Res<HostCamera>,
    adapter: Option<Res<HostAdapter>>,
    lifecycle: Res<EngineLifecycle>,
) {
    let moved = camera_moves.read().count() > 0;
    if !moved && !interaction.is_changed() && !registry.is_changed() {
        return;
    }
    let Some(adapter) = adapter.filter(|_| lifecycle.is_active()) else {
        return;
    };

    let anchor = interaction
        .active_object()
        .and_then(|id| registry.get(id))
        .and_then(|entry| {
            camera.project(entry.position.with_height(entry.size.y), adapter.surface())
        });
    if handle.anchor != anchor {
        handle.anchor = anchor;
    }
}
