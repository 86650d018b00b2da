//! Engine and host-map configuration.
//!
//! Everything is passed in at construction. Missing JSON fields fall back to
//! the defaults in the `constants` crate.

use crate::error::ConfigError;
use crate::projection::GeoPoint;
use bevy::prelude::*;
use constants::coordinate_system::{DEFAULT_GRID_SIZE, DEFAULT_ROTATION_STEP};
use constants::render_settings::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Frame the host camera matrix is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostFrame {
    /// Map hosts: unit mercator with altitude on Z. The site root placement
    /// and axis swap are composed in before use.
    #[default]
    Mercator,
    /// Matrix already maps engine-local meters (Y up) to clip space.
    Local,
}

/// Clip-space depth range of the host projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipDepth {
    ZeroToOne,
    /// WebGL convention.
    #[default]
    NegativeOneToOne,
}

impl ClipDepth {
    pub fn near(self) -> f64 {
        match self {
            Self::ZeroToOne => 0.0,
            Self::NegativeOneToOne => -1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundStyle {
    pub color: String,
    pub opacity: f32,
}

impl Default for GroundStyle {
    fn default() -> Self {
        Self {
            color: GROUND_COLOR.to_string(),
            opacity: GROUND_OPACITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementStyle {
    pub line_color: String,
    pub marker_color: String,
    pub marker_radius: f32,
    pub dash_size: f32,
    pub gap_size: f32,
    pub elevation: f32,
}

impl Default for MeasurementStyle {
    fn default() -> Self {
        Self {
            line_color: MEASURE_LINE_COLOR.to_string(),
            marker_color: MEASURE_MARKER_COLOR.to_string(),
            marker_radius: MEASURE_MARKER_RADIUS,
            dash_size: MEASURE_DASH_SIZE,
            gap_size: MEASURE_GAP_SIZE,
            elevation: MEASURE_LINE_ELEVATION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceGridStyle {
    pub size: f32,
    pub divisions: u32,
    pub color: String,
    pub elevation: f32,
}

impl Default for ReferenceGridStyle {
    fn default() -> Self {
        Self {
            size: REFERENCE_GRID_SIZE,
            divisions: REFERENCE_GRID_DIVISIONS,
            color: REFERENCE_GRID_COLOR.to_string(),
            elevation: REFERENCE_GRID_ELEVATION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyLight {
    pub position: [f32; 3],
    pub illuminance: f32,
}

impl Default for KeyLight {
    fn default() -> Self {
        Self {
            position: KEY_LIGHT_POSITION,
            illuminance: KEY_LIGHT_ILLUMINANCE,
        }
    }
}

/// Host map settings. The engine never talks to a tile service itself; these
/// values are handed to the host so both sides agree on style and start view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapStyleConfig {
    pub app_name: String,
    pub default_style: String,
    pub styles: BTreeMap<String, String>,
    pub access_token: Option<String>,
    pub default_center: GeoPoint,
    pub default_zoom: f64,
    pub pitch: f64,
    pub terrain_enabled: bool,
    pub terrain_exaggeration: f64,
}

pub const STREETS_STYLE: &str = "streets";

impl Default for MapStyleConfig {
    fn default() -> Self {
        let styles = BTreeMap::from([
            (
                STREETS_STYLE.to_string(),
                "mapbox://styles/mapbox/streets-v12".to_string(),
            ),
            (
                "satellite".to_string(),
                "mapbox://styles/mapbox/satellite-streets-v12".to_string(),
            ),
        ]);

        Self {
            app_name: "Site Configurator".to_string(),
            default_style: STREETS_STYLE.to_string(),
            styles,
            access_token: None,
            default_center: GeoPoint::new(-0.1276, 51.5072),
            default_zoom: 16.0,
            pitch: 45.0,
            terrain_enabled: false,
            terrain_exaggeration: 1.2,
        }
    }
}

impl MapStyleConfig {
    /// Style URL for `key`; unknown keys resolve to the streets style.
    pub fn style_url(&self, key: &str) -> Option<&str> {
        self.styles
            .get(key)
            .or_else(|| self.styles.get(STREETS_STYLE))
            .map(String::as_str)
    }
}

/// Engine settings resource.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub grid_size: f32,
    pub rotation_step: f32,
    pub host_frame: HostFrame,
    pub clip_depth: ClipDepth,
    pub ground: GroundStyle,
    pub outline_color: String,
    pub selection_color: String,
    pub measurement: MeasurementStyle,
    /// `None` disables the reference grid.
    pub reference_grid: Option<ReferenceGridStyle>,
    pub key_light: KeyLight,
    pub map: MapStyleConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            rotation_step: DEFAULT_ROTATION_STEP,
            host_frame: HostFrame::default(),
            clip_depth: ClipDepth::default(),
            ground: GroundStyle::default(),
            outline_color: OUTLINE_COLOR.to_string(),
            selection_color: SELECTION_COLOR.to_string(),
            measurement: MeasurementStyle::default(),
            reference_grid: Some(ReferenceGridStyle::default()),
            key_light: KeyLight::default(),
            map: MapStyleConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.grid_size.is_finite() && self.grid_size > 0.0) {
            return Err(ConfigError::invalid(
                "grid_size",
                format!("must be a positive number, got {}", self.grid_size),
            ));
        }
        if !self.rotation_step.is_finite() {
            return Err(ConfigError::invalid("rotation_step", "must be finite"));
        }
        if !(0.0..=1.0).contains(&self.ground.opacity) {
            return Err(ConfigError::invalid(
                "ground.opacity",
                format!("must be within [0, 1], got {}", self.ground.opacity),
            ));
        }
        let m = &self.measurement;
        if !(m.dash_size.is_finite() && m.dash_size >= MEASURE_MIN_DASH_SIZE) {
            return Err(ConfigError::invalid(
                "measurement.dash_size",
                format!("must be at least {MEASURE_MIN_DASH_SIZE}, got {}", m.dash_size),
            ));
        }
        if !(m.gap_size.is_finite() && m.gap_size >= 0.0) {
            return Err(ConfigError::invalid("measurement.gap_size", "must be non-negative"));
        }
        if !(m.marker_radius > 0.0) {
            return Err(ConfigError::invalid("measurement.marker_radius", "must be positive"));
        }
        if let Some(grid) = &self.reference_grid {
            if grid.divisions == 0 || !(grid.size > 0.0) {
                return Err(ConfigError::invalid(
                    "reference_grid",
                    "size and divisions must be positive",
                ));
            }
        }
        if self.map.styles.is_empty() {
            return Err(ConfigError::invalid("map.styles", "at least one style is required"));
        }
        Ok(())
    }

    pub fn with_host_frame(mut self, host_frame: HostFrame, clip_depth: ClipDepth) -> Self {
        self.host_frame = host_frame;
        self.clip_depth = clip_depth;
        self
    }
}

/// Parse a `#rrggbb` hint, falling back (with a warning) when it is malformed.
pub fn parse_color(hex: &str, fallback: &str) -> Color {
    match Srgba::hex(hex) {
        Ok(color) => color.into(),
        Err(err) => {
            warn!("Invalid colour {:?} ({}), using {}", hex, err, fallback);
            Srgba::hex(fallback).map(Color::from).unwrap_or(Color::WHITE)
        }
    }
}
