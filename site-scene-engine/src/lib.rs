//! Scene synchronization for site planning on a web map.
//!
//! A site boundary drawn in geographic coordinates becomes a local meter
//! frame; placed objects are mirrored as meshes in that frame and can be
//! picked, dragged (snapped, kept inside the boundary) and rotated. Every
//! committed change comes back out as an [`ObjectPatch`].
//!
//! Hosts either add [`SiteScenePlugin`] to their own Bevy app or drive a
//! headless [`SceneSyncEngine`] call by call.

pub mod engine;
pub mod error;
pub mod projection;
pub mod rpc;
pub mod tools;

pub use engine::assets::catalog::{CatalogEntry, TypeCatalog};
pub use engine::assets::design::SiteDesign;
pub use engine::assets::placement::{ObjectId, ObjectPatch, PlacementObject};
pub use engine::config::{ClipDepth, EngineConfig, HostFrame};
pub use engine::core::facade::SceneSyncEngine;
pub use engine::core::plugin::{SceneSyncSet, SiteScenePlugin};
pub use engine::host::{HostChannel, HostSurface, ListenerId, MapHost};
pub use error::{ConfigError, EngineError};
pub use projection::{GeoPoint, LocalPoint};
