//! Data the engine consumes from the outside world.
//!
//! The equipment catalog, the placement records owned by the external object
//! store, the patches sent back to it, and the persisted design document.

/// Equipment type catalog with footprint dimensions and colour hints.
pub mod catalog;

/// Persisted design document (boundary, origin, placements).
pub mod design;

/// Placement records, object identifiers and update patches.
pub mod placement;
