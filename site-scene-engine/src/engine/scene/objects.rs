use super::OwnedAssets;
use super::root::SiteFrame;
use crate::engine::assets::catalog::{CatalogEntry, TypeCatalog};
use crate::engine::assets::placement::{ObjectId, PlacementObject};
use crate::engine::config::{EngineConfig, parse_color};
use crate::engine::core::events::{PanLockEvent, SelectionChangedEvent, UpsertObjectsEvent};
use crate::engine::host::adapter::HostAdapter;
use crate::projection::LocalPoint;
use crate::tools::interaction::state::InteractionState;
use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use constants::render_settings::OUTLINE_COLOR;
use std::collections::{HashMap, HashSet};

/// Body entity of a placed object.
#[derive(Component, Debug, Clone)]
pub struct PlacedObject {
    pub id: ObjectId,
}

/// Edge outline child of a placed object.
#[derive(Component)]
pub struct ObjectOutline;

/// Engine-side record for one rendered placement.
#[derive(Debug)]
pub struct MeshEntry {
    pub entity: Entity,
    pub type_id: String,
    /// Box extents (width, height, depth).
    pub size: Vec3,
    /// Last position that passed containment.
    pub committed: LocalPoint,
    /// Position currently shown; differs from `committed` only mid-drag.
    pub position: LocalPoint,
    pub rotation: f32,
    pub body: OwnedAssets,
    pub outline: OwnedAssets,
}

impl MeshEntry {
    /// Base sits on the ground plane.
    pub fn transform(&self) -> Transform {
        Transform::from_translation(self.position.with_height(self.size.y * 0.5))
            .with_rotation(Quat::from_rotation_y(self.rotation))
    }

    pub fn release(
        self,
        commands: &mut Commands,
        meshes: &mut Assets<Mesh>,
        materials: &mut Assets<StandardMaterial>,
    ) {
        commands.entity(self.entity).despawn();
        self.body.release(meshes, materials);
        self.outline.release(meshes, materials);
    }
}

/// One entry per rendered object id.
#[derive(Resource, Default, Debug)]
pub struct MeshRegistry {
    entries: HashMap<ObjectId, MeshEntry>,
}

impl MeshRegistry {
    pub fn get(&self, id: &ObjectId) -> Option<&MeshEntry> {
        self.entries.get(id)
    }

    pub fn get_mut(&mut self, id: &ObjectId) -> Option<&mut MeshEntry> {
        self.entries.get_mut(id)
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sorted for stable comparisons.
    pub fn ids(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectId, &MeshEntry)> {
        self.entries.iter()
    }

    pub fn insert(&mut self, id: ObjectId, entry: MeshEntry) {
        self.entries.insert(id, entry);
    }

    pub fn remove(&mut self, id: &ObjectId) -> Option<MeshEntry> {
        self.entries.remove(id)
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (ObjectId, MeshEntry)> + '_ {
        self.entries.drain()
    }
}

/// Create/update/delete sets for one object list.
#[derive(Debug, Default, PartialEq)]
pub struct ReconcilePlan {
    pub removed: Vec<ObjectId>,
    pub created: Vec<PlacementObject>,
    pub retained: Vec<PlacementObject>,
    pub skipped: Vec<ObjectId>,
}

/// Compare the rendered `(id, type)` pairs against an incoming list.
///
/// Unknown types are skipped (and an existing mesh for that id removed). A
/// changed type removes and recreates. Duplicate ids keep the first
/// occurrence.
pub fn plan_reconcile<'a, I>(
    existing: I,
    incoming: &[PlacementObject],
    catalog: &TypeCatalog,
) -> ReconcilePlan
where
    I: IntoIterator<Item = (&'a ObjectId, &'a str)>,
{
    let existing: HashMap<&ObjectId, &str> = existing.into_iter().collect();
    let mut plan = ReconcilePlan::default();
    let mut seen: HashSet<&ObjectId> = HashSet::new();
    let mut wanted: HashSet<&ObjectId> = HashSet::new();

    for object in incoming {
        if !seen.insert(&object.id) {
            warn!("Duplicate object id {} ignored", object.id);
            continue;
        }
        if catalog.get(&object.type_id).is_none() {
            debug!("Skipping {}: unknown type {:?}", object.id, object.type_id);
            plan.skipped.push(object.id.clone());
            continue;
        }
        wanted.insert(&object.id);

        match existing.get(&object.id) {
            Some(type_id) if object.type_id.as_str() == *type_id => {
                plan.retained.push(object.clone())
            }
            Some(_) => {
                plan.removed.push(object.id.clone());
                plan.created.push(object.clone());
            }
            None => plan.created.push(object.clone()),
        }
    }

    for id in existing.keys() {
        if !wanted.contains(*id) {
            plan.removed.push((*id).clone());
        }
    }
    plan.removed.sort();
    plan
}

pub fn reconcile_objects(
    mut events: EventReader<UpsertObjectsEvent>,
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut registry: ResMut<MeshRegistry>,
    mut interaction: ResMut<InteractionState>,
    mut transforms: Query<&mut Transform, With<PlacedObject>>,
    mut adapter: Option<ResMut<HostAdapter>>,
    mut selection_events: EventWriter<SelectionChangedEvent>,
    mut pan_events: EventWriter<PanLockEvent>,
    catalog: Res<TypeCatalog>,
    frame: Res<SiteFrame>,
    config: Res<EngineConfig>,
) {
    for UpsertObjectsEvent(objects) in events.read() {
        let plan = {
            let existing = registry
                .iter()
                .map(|(id, entry)| (id, entry.type_id.as_str()));
            plan_reconcile(existing, objects, &catalog)
        };

        for id in &plan.removed {
            if let Some(entry) = registry.remove(id) {
                entry.release(&mut commands, &mut meshes, &mut materials);
            }
            if let Some(previous) = interaction.forget(id) {
                if previous.is_dragging() {
                    if let Some(adapter) = adapter.as_deref_mut() {
                        adapter.set_pan_locked(false);
                    }
                    pan_events.write(PanLockEvent { locked: false });
                }
                selection_events.write(SelectionChangedEvent { selected: None });
            }
        }

        for object in &plan.created {
            let Some(definition) = catalog.get(&object.type_id) else {
                continue;
            };
            let entry = spawn_object(
                &mut commands,
                &mut meshes,
                &mut materials,
                frame.root,
                object,
                definition,
                &config,
            );
            registry.insert(object.id.clone(), entry);
        }

        let dragged = interaction.dragging().cloned();
        for object in &plan.retained {
            if dragged.as_ref() == Some(&object.id) {
                continue;
            }
            let Some(entry) = registry.get_mut(&object.id) else {
                continue;
            };
            entry.committed = object.position();
            entry.position = object.position();
            entry.rotation = object.rotation;
            if let Ok(mut transform) = transforms.get_mut(entry.entity) {
                *transform = entry.transform();
            }
        }

        debug!(
            "Reconciled objects: {} created, {} retained, {} removed, {} skipped",
            plan.created.len(),
            plan.retained.len(),
            plan.removed.len(),
            plan.skipped.len()
        );
    }
}

fn spawn_object(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    root: Option<Entity>,
    object: &PlacementObject,
    definition: &CatalogEntry,
    config: &EngineConfig,
) -> MeshEntry {
    let size = definition.size();

    let body = OwnedAssets {
        mesh: meshes.add(Cuboid::new(size.x, size.y, size.z)),
        material: materials.add(StandardMaterial {
            base_color: definition.color(),
            perceptual_roughness: 0.8,
            ..default()
        }),
    };
    let outline = OwnedAssets {
        mesh: meshes.add(create_outline_mesh(size)),
        material: materials.add(StandardMaterial {
            base_color: parse_color(&config.outline_color, OUTLINE_COLOR),
            unlit: true,
            ..default()
        }),
    };

    let mut entry = MeshEntry {
        entity: Entity::PLACEHOLDER,
        type_id: object.type_id.clone(),
        size,
        committed: object.position(),
        position: object.position(),
        rotation: object.rotation,
        body,
        outline,
    };

    let outline_entity = commands
        .spawn((
            Mesh3d(entry.outline.mesh.clone()),
            MeshMaterial3d(entry.outline.material.clone()),
            Transform::IDENTITY,
            ObjectOutline,
        ))
        .id();
    entry.entity = commands
        .spawn((
            Mesh3d(entry.body.mesh.clone()),
            MeshMaterial3d(entry.body.material.clone()),
            entry.transform(),
            PlacedObject {
                id: object.id.clone(),
            },
            Name::new(format!("object-{}", object.id)),
        ))
        .add_child(outline_entity)
        .id();
    if let Some(root) = root {
        commands.entity(root).add_child(entry.entity);
    }

    entry
}

/// Box edges as a line list, 12 edges and 24 vertices, centred on the origin.
pub fn create_outline_mesh(size: Vec3) -> Mesh {
    let h = size * 0.5;
    let corners = [
        [-h.x, -h.y, -h.z],
        [h.x, -h.y, -h.z],
        [h.x, -h.y, h.z],
        [-h.x, -h.y, h.z],
        [-h.x, h.y, -h.z],
        [h.x, h.y, -h.z],
        [h.x, h.y, h.z],
        [-h.x, h.y, h.z],
    ];
    const EDGES: [(usize, usize); 12] = [
        (0, 1), (1, 2), (2, 3), (3, 0),
        (4, 5), (5, 6), (6, 7), (7, 4),
        (0, 4), (1, 5), (2, 6), (3, 7),
    ];
    let positions: Vec<[f32; 3]> = EDGES
        .iter()
        .flat_map(|&(a, b)| [corners[a], corners[b]])
        .collect();

    let mut mesh = Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::default());
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_indices(Indices::U32((0u32..24).collect()));
    mesh
}
