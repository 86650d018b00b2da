use crate::engine::config::{EngineConfig, parse_color};
use crate::engine::core::events::{SetGeoMeasurementEvent, SetMeasurementEvent};
use crate::engine::scene::OwnedAssets;
use crate::engine::scene::root::SiteFrame;
use crate::projection::{GeoPoint, LocalPoint, geo_midpoint, ground_distance, to_local};
use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use constants::render_settings::{MEASURE_LINE_COLOR, MEASURE_MARKER_COLOR, MEASURE_MAX_DASHES};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Completed two-point measurement in geographic terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub start: GeoPoint,
    pub end: GeoPoint,
    /// Meters, scaled at `start`.
    pub distance: f64,
    pub midpoint: GeoPoint,
}

impl Measurement {
    pub fn between(start: GeoPoint, end: GeoPoint) -> Self {
        Self {
            start,
            end,
            distance: ground_distance(start, end),
            midpoint: geo_midpoint(start, end),
        }
    }

    pub fn distance_label(&self) -> String {
        format_distance(self.distance)
    }
}

pub fn format_distance(meters: f64) -> String {
    format!("{:.2} m", meters)
}

/// Last two measurement points; a third push evicts the oldest.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSample<T = LocalPoint> {
    points: VecDeque<T>,
}

impl<T> Default for MeasurementSample<T> {
    fn default() -> Self {
        Self {
            points: VecDeque::with_capacity(2),
        }
    }
}

impl<T: Copy> MeasurementSample<T> {
    pub const CAPACITY: usize = 2;

    pub fn push(&mut self, point: T) {
        if self.points.len() == Self::CAPACITY {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn points(&self) -> Vec<T> {
        self.points.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.points.len() == Self::CAPACITY
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

/// Measurement mode. Points are collected in geographic terms, the overlay
/// is drawn in local meters.
#[derive(Resource, Debug, Default)]
pub struct MeasureTool {
    is_active: bool,
    sample: MeasurementSample<GeoPoint>,
    pub current: Option<Measurement>,
}

impl MeasureTool {
    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.sample.clear();
        self.current = None;
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    /// Add a point; returns the measurement once two points are held.
    pub fn push(&mut self, point: GeoPoint) -> Option<Measurement> {
        self.sample.push(point);
        self.current = match self.sample.points().as_slice() {
            [start, end] => Some(Measurement::between(*start, *end)),
            _ => None,
        };
        self.current
    }

    pub fn points(&self) -> Vec<GeoPoint> {
        self.sample.points()
    }
}

#[derive(Component)]
pub struct MeasurementLine;

#[derive(Component)]
pub struct MeasurementMarker;

/// Entities and assets currently drawn for the measurement.
#[derive(Resource, Default)]
pub struct MeasurementOverlay {
    parts: Vec<(Entity, OwnedAssets)>,
}

impl MeasurementOverlay {
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn release(
        &mut self,
        commands: &mut Commands,
        meshes: &mut Assets<Mesh>,
        materials: &mut Assets<StandardMaterial>,
    ) {
        for (entity, assets) in self.parts.drain(..) {
            commands.entity(entity).despawn();
            assets.release(meshes, materials);
        }
    }
}

/// Turn geographic measurement points into local overlay points once the
/// site origin for this frame is settled.
pub fn project_geo_measurement(
    mut events: EventReader<SetGeoMeasurementEvent>,
    mut overlay_events: EventWriter<SetMeasurementEvent>,
    frame: Res<SiteFrame>,
) {
    let Some(SetGeoMeasurementEvent(points)) = events.read().last() else {
        return;
    };
    let local: Vec<LocalPoint> = match frame.origin {
        Some(origin) => points.iter().map(|p| to_local(origin, *p)).collect(),
        None => Vec::new(),
    };
    overlay_events.write(SetMeasurementEvent(local));
}

/// Rebuild the overlay: exactly two points draw a dashed segment with a
/// marker at each end, anything else clears it.
pub fn update_measurement_overlay(
    mut events: EventReader<SetMeasurementEvent>,
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut overlay: ResMut<MeasurementOverlay>,
    frame: Res<SiteFrame>,
    config: Res<EngineConfig>,
) {
    let Some(SetMeasurementEvent(points)) = events.read().last() else {
        return;
    };

    overlay.release(&mut commands, &mut meshes, &mut materials);

    let [a, b] = points.as_slice() else {
        return;
    };

    let style = &config.measurement;
    let start = a.with_height(style.elevation);
    let end = b.with_height(style.elevation);
    let mut spawned = Vec::new();

    let segments = dash_segments(start, end, style.dash_size, style.gap_size);
    if !segments.is_empty() {
        let assets = OwnedAssets {
            mesh: meshes.add(create_dashed_line_mesh(&segments)),
            material: materials.add(StandardMaterial {
                base_color: parse_color(&style.line_color, MEASURE_LINE_COLOR),
                unlit: true,
                ..default()
            }),
        };
        let entity = commands
            .spawn((
                Mesh3d(assets.mesh.clone()),
                MeshMaterial3d(assets.material.clone()),
                Transform::IDENTITY,
                MeasurementLine,
            ))
            .id();
        spawned.push((entity, assets));
    }

    for position in [start, end] {
        let assets = OwnedAssets {
            mesh: meshes.add(Sphere::new(style.marker_radius)),
            material: materials.add(StandardMaterial {
                base_color: parse_color(&style.marker_color, MEASURE_MARKER_COLOR),
                unlit: true,
                ..default()
            }),
        };
        let entity = commands
            .spawn((
                Mesh3d(assets.mesh.clone()),
                MeshMaterial3d(assets.material.clone()),
                Transform::from_translation(position),
                MeasurementMarker,
            ))
            .id();
        spawned.push((entity, assets));
    }

    if let Some(root) = frame.root {
        let children: Vec<Entity> = spawned.iter().map(|(entity, _)| *entity).collect();
        commands.entity(root).add_children(&children);
    }
    overlay.parts = spawned;
}

/// Split `start..end` into dashes of `dash` length separated by `gap`. The
/// last dash is clipped at `end`. At most `MEASURE_MAX_DASHES` are produced.
pub fn dash_segments(start: Vec3, end: Vec3, dash: f32, gap: f32) -> Vec<[Vec3; 2]> {
    let length = start.distance(end);
    if length <= f32::EPSILON || !(dash > 0.0) {
        return Vec::new();
    }
    let direction = (end - start) / length;
    let step = dash + gap.max(0.0);
    let count = ((length / step).ceil() as usize).min(MEASURE_MAX_DASHES);

    (0..count)
        .map(|i| {
            let t = i as f32 * step;
            let t_end = (t + dash).min(length);
            [start + direction * t, start + direction * t_end]
        })
        .collect()
}

fn create_dashed_line_mesh(segments: &[[Vec3; 2]]) -> Mesh {
    let positions: Vec<[f32; 3]> = segments
        .iter()
        .flat_map(|[a, b]| [a.to_array(), b.to_array()])
        .collect();
    let count = positions.len() as u32;

    let mut mesh = Mesh::new(PrimitiveTopology::LineList, RenderAssetUsages::default());
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_indices(Indices::U32((0..count).collect()));
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_meters_gives_four_dashes() {
        let segments = dash_segments(Vec3::ZERO, Vec3::new(3.0, 0.0, 4.0), 1.0, 0.5);
        assert_eq!(segments.len(), 4);
        let last = segments[3];
        assert!((last[1] - Vec3::new(3.0, 0.0, 4.0)).length() < 1e-5);
        assert!((last[0].distance(last[1]) - 0.5).abs() < 1e-5);
    }

    #[test]
    fn tiny_dashes_are_capped() {
        let segments = dash_segments(Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0), 1e-8, 0.0);
        assert_eq!(segments.len(), MEASURE_MAX_DASHES);
        assert!(segments.iter().all(|[a, b]| a.x <= b.x && b.x <= 5.0));
    }

    #[test]
    fn zero_length_has_no_dashes() {
        assert!(dash_segments(Vec3::ONE, Vec3::ONE, 1.0, 0.5).is_empty());
    }

    #[test]
    fn sample_keeps_last_two() {
        let mut sample = MeasurementSample::default();
        sample.push(LocalPoint::new(1.0, 0.0));
        sample.push(LocalPoint::new(2.0, 0.0));
        sample.push(LocalPoint::new(3.0, 0.0));
        assert_eq!(
            sample.points(),
            vec![LocalPoint::new(2.0, 0.0), LocalPoint::new(3.0, 0.0)]
        );
        assert!(sample.is_complete());
    }

    #[test]
    fn measurement_label_and_midpoint() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.001, 0.0);
        let measurement = Measurement::between(a, b);
        assert_eq!(measurement.distance_label(), "111.20 m");
        assert_eq!(measurement.midpoint, GeoPoint::new(0.0005, 0.0));
        assert_eq!(format_distance(5.0), "5.00 m");
    }

    #[test]
    fn tool_reports_after_second_point() {
        let mut tool = MeasureTool::default();
        tool.set_active(true);
        assert!(tool.push(GeoPoint::new(0.0, 0.0)).is_none());
        assert!(tool.push(GeoPoint::new(0.0, 0.001)).is_some());
        assert!(tool.push(GeoPoint::new(0.001, 0.001)).is_some());
        assert_eq!(tool.points()[0], GeoPoint::new(0.0, 0.001));

        tool.set_active(false);
        assert!(tool.points().is_empty() && tool.current.is_none());
    }
}
