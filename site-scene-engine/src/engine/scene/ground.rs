use super::OwnedAssets;
use super::root::SiteFrame;
use crate::engine::config::{EngineConfig, parse_color};
use crate::engine::core::events::SetBoundaryEvent;
use crate::projection::LocalPoint;
use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use constants::render_settings::GROUND_COLOR;

#[derive(Component)]
pub struct SiteGround;

/// The current ground plane, if the boundary has at least three vertices.
#[derive(Resource, Default)]
pub struct GroundPlane {
    current: Option<(Entity, OwnedAssets)>,
}

impl GroundPlane {
    pub fn is_built(&self) -> bool {
        self.current.is_some()
    }

    pub fn entity(&self) -> Option<Entity> {
        self.current.as_ref().map(|(entity, _)| *entity)
    }

    pub fn take(&mut self) -> Option<(Entity, OwnedAssets)> {
        self.current.take()
    }
}

/// Replace the ground plane. The previous mesh and material are released
/// before anything new is allocated.
pub fn apply_boundary(
    mut events: EventReader<SetBoundaryEvent>,
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut frame: ResMut<SiteFrame>,
    mut ground: ResMut<GroundPlane>,
    config: Res<EngineConfig>,
) {
    let Some(SetBoundaryEvent(points)) = events.read().last() else {
        return;
    };

    if let Some((entity, assets)) = ground.take() {
        commands.entity(entity).despawn();
        assets.release(&mut meshes, &mut materials);
    }

    frame.boundary = points.clone();

    if points.len() < 3 {
        if !points.is_empty() {
            warn!(
                "Boundary has {} vertices; containment will reject every position",
                points.len()
            );
        }
        return;
    }

    let mesh = meshes.add(create_ground_mesh(points));
    let material = materials.add(StandardMaterial {
        base_color: parse_color(&config.ground.color, GROUND_COLOR)
            .with_alpha(config.ground.opacity),
        alpha_mode: AlphaMode::Blend,
        double_sided: true,
        cull_mode: None,
        perceptual_roughness: 1.0,
        ..default()
    });

    let entity = commands
        .spawn((
            Mesh3d(mesh.clone()),
            MeshMaterial3d(material.clone()),
            Transform::IDENTITY,
            SiteGround,
            Name::new("site-ground"),
        ))
        .id();
    if let Some(root) = frame.root {
        commands.entity(root).add_child(entity);
    }

    debug!("Ground plane rebuilt with {} vertices", points.len());
    ground.current = Some((entity, OwnedAssets { mesh, material }));
}

/// Flat ground mesh on y = 0 with upward normals.
pub fn create_ground_mesh(points: &[LocalPoint]) -> Mesh {
    let positions: Vec<[f32; 3]> = points.iter().map(|p| [p.x, 0.0, p.z]).collect();
    let normals: Vec<[f32; 3]> = vec![[0.0, 1.0, 0.0]; points.len()];
    let uvs: Vec<[f32; 2]> = points.iter().map(|p| [p.x, p.z]).collect();

    let mut mesh = Mesh::new(PrimitiveTopology::TriangleList, RenderAssetUsages::default());
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.insert_indices(Indices::U32(triangulate_ring(points)));
    mesh
}

/// Ear-clipping triangulation of a simple ring. Falls back to a fan from the
/// first vertex when ear clipping yields nothing (collinear input).
pub fn triangulate_ring(points: &[LocalPoint]) -> Vec<u32> {
    if points.len() < 3 {
        return Vec::new();
    }

    let flat: Vec<f64> = points
        .iter()
        .flat_map(|p| [f64::from(p.x), f64::from(p.z)])
        .collect();

    match earcutr::earcut(&flat, &[], 2) {
        Ok(indices) if !indices.is_empty() => indices.into_iter().map(|i| i as u32).collect(),
        _ => {
            debug!("Ear clipping produced no triangles, using fan");
            (1..points.len() as u32 - 1)
                .flat_map(|i| [0, i, i + 1])
                .collect()
        }
    }
}
