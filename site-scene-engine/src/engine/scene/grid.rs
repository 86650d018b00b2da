//! Site fixtures spawned once a host is attached: reference grid and key light.

use super::OwnedAssets;
use super::root::SiteFrame;
use crate::engine::config::{EngineConfig, ReferenceGridStyle, parse_color};
use crate::engine::core::events::HostAttachedEvent;
use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use constants::render_settings::REFERENCE_GRID_COLOR;

#[derive(Component)]
pub struct ReferenceGrid;

#[derive(Component)]
pub struct SiteLight;

#[derive(Resource, Default)]
pub struct SceneFixtures {
    grid: Option<(Entity, OwnedAssets)>,
    lights: Vec<Entity>,
}

impl SceneFixtures {
    pub fn is_spawned(&self) -> bool {
        self.grid.is_some() || !self.lights.is_empty()
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }
}

pub fn spawn_scene_fixtures(
    mut events: EventReader<HostAttachedEvent>,
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut fixtures: ResMut<SceneFixtures>,
    frame: Res<SiteFrame>,
    config: Res<EngineConfig>,
) {
    if events.read().last().is_none() || fixtures.is_spawned() {
        return;
    }

    let mut children = Vec::new();

    if let Some(style) = &config.reference_grid {
        let mesh = meshes.add(create_reference_grid_mesh(style));
        let material = materials.add(StandardMaterial {
            base_color: parse_color(&style.color, REFERENCE_GRID_COLOR),
            unlit: true,
            ..default()
        });
        let entity = commands
            .spawn((
                Mesh3d(mesh.clone()),
                MeshMaterial3d(material.clone()),
                Transform::from_xyz(0.0, style.elevation, 0.0),
                ReferenceGrid,
                Name::new("reference-grid"),
            ))
            .id();
        children.push(entity);
        fixtures.grid = Some((entity, OwnedAssets { mesh, material }));
    }

    let light_position = Vec3::from_array(config.key_light.position);
    let light = commands
        .spawn((
            DirectionalLight {
                illuminance: config.key_light.illuminance,
                shadows_enabled: false,
                ..default()
            },
            Transform::from_translation(light_position).looking_at(Vec3::ZERO, Vec3::Y),
            SiteLight,
            Name::new("key-light"),
        ))
        .id();
    children.push(light);
    fixtures.lights.push(light);

    if let Some(root) = frame.root {
        commands.entity(root).add_children(&children);
    }
    info!("Scene fixtures spawned");
}

/// Despawn fixtures and release the grid's assets.
pub fn release_fixtures(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    fixtures: &mut SceneFixtures,
) {
    if let Some((entity, assets)) = fixtures.grid.take() {
        commands.entity(entity).despawn();
        assets.release(meshes, materials);
    }
    for light in fixtures.lights.drain(..) {
        commands.entity(light).despawn();
    }
}

/// Square line grid centred on the origin, `divisions` cells per side.
pub fn create_reference_grid_mesh(style: &ReferenceGridStyle) -> Mesh {
    let half = style.size * 0.5;
    let step = style.size / style.divisions as f32;

    let mut positions: Vec<[f32; 3]> = Vec::with_capacity((style.divisions as usize + 1) * 4);
    for i in 0..=style.divisions {
        let offset = -half + i as f32 * step;
        // Line running north-south.
        positions.push([offset, 0.0, -half]);
        positions.push([offset, 0.0, half]);
        // Line running east-west.
        positions.push([-half, 0.0, offset]);
        positions.push([half, 0.0, offset]);
    }

    let count = positions.len() as u32;
    let mut mesh = Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::default());
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_indices(Indices::U32((0..count).collect()));
    mesh
}
