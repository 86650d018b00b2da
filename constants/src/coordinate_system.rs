/// Mean Earth radius used by web map renderers for mercator scale factors.
pub const EARTH_RADIUS_METERS: f64 = 6_371_008.8;

/// Earth circumference at the equator, derived from [`EARTH_RADIUS_METERS`].
pub const EARTH_CIRCUMFERENCE_METERS: f64 = 2.0 * std::f64::consts::PI * EARTH_RADIUS_METERS;

/// Latitude beyond which web mercator is undefined.
pub const MAX_MERCATOR_LATITUDE: f64 = 85.051_128_779_806_59;

/// Placement snapping step in meters.
pub const DEFAULT_GRID_SIZE: f32 = 0.5;

/// Yaw increment for a single rotate action (π/8).
pub const DEFAULT_ROTATION_STEP: f32 = std::f32::consts::FRAC_PI_8;

/// Axis swap from the engine world frame to the map host frame (column-major).
/// Engine world is Y-up with mercator y on Z; map hosts put altitude on Z.
/// (x, up, y) -> (x, y, up)
pub const MAP_AXIS_SWAP: [[f64; 4]; 4] = [
    [1.0, 0.0, 0.0, 0.0], // X = X
    [0.0, 0.0, 1.0, 0.0], // Y (up) -> Z
    [0.0, 1.0, 0.0, 0.0], // Z -> Y
    [0.0, 0.0, 0.0, 1.0],
];
