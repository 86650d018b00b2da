use super::state::{DragOutcome, InteractionState, PatchOutbox, evaluate_drag};
use crate::engine::assets::placement::{ObjectId, ObjectPatch};
use crate::engine::config::EngineConfig;
use crate::engine::core::events::{DragEvent, PanLockEvent, RotateSelectedEvent};
use crate::engine::core::lifecycle::EngineLifecycle;
use crate::engine::host::adapter::HostAdapter;
use crate::engine::host::camera::{HostCamera, ray_ground_hit};
use crate::engine::scene::objects::{MeshRegistry, PlacedObject};
use crate::engine::scene::root::SiteFrame;
use crate::projection::LocalPoint;
use bevy::prelude::*;

/// Drag the selected object across the ground plane. Every step is snapped
/// and checked against the boundary; rejected steps put the object back at
/// its last committed position.
pub fn handle_drag_events(
    mut events: EventReader<DragEvent>,
    mut interaction: ResMut<InteractionState>,
    mut registry: ResMut<MeshRegistry>,
    mut outbox: ResMut<PatchOutbox>,
    mut transforms: Query<&mut Transform, With<PlacedObject>>,
    mut adapter: Option<ResMut<HostAdapter>>,
    mut pan_events: EventWriter<PanLockEvent>,
    camera: Res<HostCamera>,
    frame: Res<SiteFrame>,
    config: Res<EngineConfig>,
    lifecycle: Res<EngineLifecycle>,
) {
    let Some(adapter) = adapter.as_deref_mut().filter(|_| lifecycle.is_active()) else {
        events.clear();
        return;
    };

    for event in events.read() {
        match *event {
            DragEvent::Begin => {
                if let Some(id) = interaction.begin_drag() {
                    debug!("Drag started on {}", id);
                    adapter.set_pan_locked(true);
                    pan_events.write(PanLockEvent { locked: true });
                }
            }
            DragEvent::To(point) => {
                if let Some(id) = interaction.dragging() {
                    apply_drag_step(id, point, &mut registry, &mut outbox, &mut transforms, &frame, &config);
                }
            }
            DragEvent::ToScreen(screen) => {
                let Some(id) = interaction.dragging() else {
                    continue;
                };
                let Some(hit) = camera
                    .screen_ray(screen, adapter.surface())
                    .and_then(|(origin, direction)| ray_ground_hit(origin, direction, 0.0))
                else {
                    debug!("Drag pointer does not reach the ground plane");
                    continue;
                };
                let point = LocalPoint::new(hit.x, hit.z);
                apply_drag_step(id, point, &mut registry, &mut outbox, &mut transforms, &frame, &config);
            }
            DragEvent::End => {
                if let Some(id) = interaction.end_drag() {
                    debug!("Drag ended on {}", id);
                    adapter.set_pan_locked(false);
                    pan_events.write(PanLockEvent { locked: false });
                }
            }
        }
    }
}

fn apply_drag_step(
    id: &ObjectId,
    proposed: LocalPoint,
    registry: &mut MeshRegistry,
    outbox: &mut PatchOutbox,
    transforms: &mut Query<&mut Transform, With<PlacedObject>>,
    frame: &SiteFrame,
    config: &EngineConfig,
) {
    let Some(entry) = registry.get_mut(id) else {
        return;
    };

    match evaluate_drag(proposed, entry.committed, &frame.boundary, config.grid_size) {
        DragOutcome::Commit(position) => {
            entry.committed = position;
            entry.position = position;
            outbox.push(ObjectPatch::placement(id.clone(), position, entry.rotation));
        }
        DragOutcome::Rollback(position) => {
            debug!("Rejected {} at ({:.2}, {:.2})", id, proposed.x, proposed.z);
            entry.position = position;
        }
    }

    if let Ok(mut transform) = transforms.get_mut(entry.entity) {
        *transform = entry.transform();
    }
}

/// Rotate the selection about the vertical axis. Always accepted.
pub fn handle_rotate_events(
    mut events: EventReader<RotateSelectedEvent>,
    mut registry: ResMut<MeshRegistry>,
    mut outbox: ResMut<PatchOutbox>,
    mut transforms: Query<&mut Transform, With<PlacedObject>>,
    interaction: Res<InteractionState>,
) {
    for RotateSelectedEvent { delta } in events.read() {
        let Some(id) = interaction.active_object() else {
            debug!("Rotate ignored, nothing selected");
            continue;
        };
        let Some(entry) = registry.get_mut(id) else {
            continue;
        };

        entry.rotation += delta;
        if let Ok(mut transform) = transforms.get_mut(entry.entity) {
            *transform = entry.transform();
        }
        outbox.push(ObjectPatch::rotation(id.clone(), entry.rotation));
    }
}
