//! Shared numeric and styling constants for the site scene engine.

/// Geodetic constants, local-frame conventions and host axis layout.
pub mod coordinate_system;

/// Default colours and overlay geometry for engine-owned visuals.
pub mod render_settings;
