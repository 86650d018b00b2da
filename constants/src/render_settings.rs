/// Site ground plane fill.
pub const GROUND_COLOR: &str = "#1f2937";
pub const GROUND_OPACITY: f32 = 0.75;

/// Equipment outline and selection highlight.
pub const OUTLINE_COLOR: &str = "#e2e8f0";
pub const SELECTION_COLOR: &str = "#f97316";

/// Measurement overlay.
pub const MEASURE_LINE_COLOR: &str = "#f8fafc";
pub const MEASURE_MARKER_COLOR: &str = "#facc15";
pub const MEASURE_MARKER_RADIUS: f32 = 0.2;
pub const MEASURE_DASH_SIZE: f32 = 1.0;
pub const MEASURE_GAP_SIZE: f32 = 0.5;
/// Smallest accepted dash length, and the most dashes one overlay line may hold.
pub const MEASURE_MIN_DASH_SIZE: f32 = 0.01;
pub const MEASURE_MAX_DASHES: usize = 4096;
pub const MEASURE_LINE_ELEVATION: f32 = 0.1;

/// Reference grid drawn under the site once a host is attached.
pub const REFERENCE_GRID_SIZE: f32 = 200.0;
pub const REFERENCE_GRID_DIVISIONS: u32 = 200;
pub const REFERENCE_GRID_COLOR: &str = "#1e293b";
pub const REFERENCE_GRID_ELEVATION: f32 = 0.01;

/// Key light placement in local meters.
pub const KEY_LIGHT_POSITION: [f32; 3] = [100.0, 180.0, 120.0];
pub const KEY_LIGHT_ILLUMINANCE: f32 = 10_000.0;

/// Fallback for unparseable colour hints.
pub const FALLBACK_OBJECT_COLOR: &str = "#94a3b8";
