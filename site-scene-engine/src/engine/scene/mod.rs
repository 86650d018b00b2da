//! Scene graph owned by the engine: site root, ground plane, fixtures and
//! one mesh per placed object.

use bevy::prelude::*;

pub mod grid;
pub mod ground;
pub mod objects;
pub mod root;

/// Mesh and material allocated by the engine for one entity. Released
/// explicitly so removal does not wait on handle drop.
#[derive(Debug, Clone)]
pub struct OwnedAssets {
    pub mesh: Handle<Mesh>,
    pub material: Handle<StandardMaterial>,
}

impl OwnedAssets {
    pub fn release(self, meshes: &mut Assets<Mesh>, materials: &mut Assets<StandardMaterial>) {
        meshes.remove(&self.mesh);
        materials.remove(&self.material);
    }
}
