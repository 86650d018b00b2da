/// Catalog, placement and design data.
pub mod assets;

/// Engine configuration and colour parsing.
pub mod config;

/// Events, lifecycle, plugin and the synchronous facade.
pub mod core;

/// Host surface binding and camera.
pub mod host;

/// Scene graph: site root, ground, fixtures and object meshes.
pub mod scene;
