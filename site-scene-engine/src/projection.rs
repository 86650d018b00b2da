//! Geographic to local-meter projection, containment and grid snapping.
//!
//! The local frame is a tangent-plane approximation anchored at an origin:
//! both points are projected to web mercator and their offset is divided by a
//! single meters-per-unit scale taken at the origin's latitude. This holds at
//! site scale (a few kilometers) and drifts for boundaries spanning large
//! latitude ranges.
//!
//! Local axes: `x` grows east, `z` grows north, 1 unit = 1 meter.

use bevy::math::Vec3;
use constants::coordinate_system::{EARTH_CIRCUMFERENCE_METERS, MAX_MERCATOR_LATITUDE};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Geographic position, serialized as `[lng, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct GeoPoint {
    pub lng: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub const fn new(lng: f64, lat: f64) -> Self {
        Self { lng, lat }
    }
}

impl From<[f64; 2]> for GeoPoint {
    fn from([lng, lat]: [f64; 2]) -> Self {
        Self { lng, lat }
    }
}

impl From<GeoPoint> for [f64; 2] {
    fn from(point: GeoPoint) -> Self {
        [point.lng, point.lat]
    }
}

/// Ground-plane position in meters relative to the site origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalPoint {
    pub x: f32,
    pub z: f32,
}

impl LocalPoint {
    pub const ZERO: Self = Self { x: 0.0, z: 0.0 };

    pub const fn new(x: f32, z: f32) -> Self {
        Self { x, z }
    }

    pub fn distance(self, other: Self) -> f32 {
        (self.x - other.x).hypot(self.z - other.z)
    }

    /// Lift onto the ground plane at the given height.
    pub fn with_height(self, y: f32) -> Vec3 {
        Vec3::new(self.x, y, self.z)
    }
}

/// Web mercator position in unit space ([0, 1] on both axes).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MercatorCoordinate {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl MercatorCoordinate {
    pub fn from_geo(point: GeoPoint, altitude: f64) -> Self {
        let lat = point.lat.clamp(-MAX_MERCATOR_LATITUDE, MAX_MERCATOR_LATITUDE);
        let x = (180.0 + point.lng) / 360.0;
        let y = (180.0 - (180.0 / PI) * (PI / 4.0 + lat * PI / 360.0).tan().ln()) / 360.0;
        let z = altitude / (EARTH_CIRCUMFERENCE_METERS * lat.to_radians().cos());
        Self { x, y, z }
    }

    pub fn latitude(&self) -> f64 {
        let y = 180.0 - self.y * 360.0;
        360.0 / PI * (y * PI / 180.0).exp().atan() - 90.0
    }

    /// Size of one meter in mercator units at this coordinate's latitude.
    pub fn meter_in_mercator_units(&self) -> f64 {
        1.0 / (EARTH_CIRCUMFERENCE_METERS * self.latitude().to_radians().cos())
    }
}

/// Ground-level mercator position of a geographic point.
pub fn mercator_from_geo(point: GeoPoint) -> MercatorCoordinate {
    MercatorCoordinate::from_geo(point, 0.0)
}

/// Offset of `point` from `origin` in local meters.
pub fn to_local(origin: GeoPoint, point: GeoPoint) -> LocalPoint {
    let origin_coord = mercator_from_geo(origin);
    let point_coord = mercator_from_geo(point);
    let meter_scale = origin_coord.meter_in_mercator_units();

    LocalPoint {
        x: ((point_coord.x - origin_coord.x) / meter_scale) as f32,
        z: ((origin_coord.y - point_coord.y) / meter_scale) as f32,
    }
}

/// Anchor a ring at its first vertex and express every vertex in local meters.
/// Returns `None` for an empty ring.
pub fn polygon_to_local(ring: &[GeoPoint]) -> Option<(GeoPoint, Vec<LocalPoint>)> {
    let origin = *ring.first()?;
    let points = ring.iter().map(|point| to_local(origin, *point)).collect();
    Some((origin, points))
}

/// Crossing-number containment test. Rings with fewer than three vertices
/// contain nothing. Points exactly on an edge may land either way.
pub fn point_in_polygon(point: LocalPoint, polygon: &[LocalPoint]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (xi, zi) = (polygon[i].x, polygon[i].z);
        let (xj, zj) = (polygon[j].x, polygon[j].z);
        let crosses = (zi > point.z) != (zj > point.z)
            && point.x < (xj - xi) * (point.z - zi) / (zj - zi) + xi;
        if crosses {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Round to the nearest multiple of `grid_size`, halves rounding up.
/// A non-positive or non-finite grid leaves the value untouched.
pub fn snap_to_grid(value: f32, grid_size: f32) -> f32 {
    if !(grid_size > 0.0 && grid_size.is_finite()) {
        return value;
    }
    (value / grid_size + 0.5).floor() * grid_size
}

pub fn snap_point(point: LocalPoint, grid_size: f32) -> LocalPoint {
    LocalPoint::new(
        snap_to_grid(point.x, grid_size),
        snap_to_grid(point.z, grid_size),
    )
}

/// Ground distance in meters between two geographic points, scaled at `a`.
pub fn ground_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let a_coord = MercatorCoordinate::from_geo(a, 0.0);
    let b_coord = MercatorCoordinate::from_geo(b, 0.0);
    let meter_scale = a_coord.meter_in_mercator_units();

    let dx = a_coord.x - b_coord.x;
    let dy = a_coord.y - b_coord.y;
    let dz = a_coord.z - b_coord.z;
    (dx * dx + dy * dy + dz * dz).sqrt() / meter_scale
}

pub fn geo_midpoint(a: GeoPoint, b: GeoPoint) -> GeoPoint {
    GeoPoint::new((a.lng + b.lng) * 0.5, (a.lat + b.lat) * 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: GeoPoint = GeoPoint::new(-0.1276, 51.5072);

    fn square() -> Vec<LocalPoint> {
        vec![
            LocalPoint::new(0.0, 0.0),
            LocalPoint::new(10.0, 0.0),
            LocalPoint::new(10.0, 10.0),
            LocalPoint::new(0.0, 10.0),
        ]
    }

    #[test]
    fn origin_maps_to_zero() {
        for origin in [ORIGIN, GeoPoint::new(0.0, 0.0), GeoPoint::new(151.2, -33.9)] {
            assert_eq!(to_local(origin, origin), LocalPoint::ZERO);
        }
    }

    #[test]
    fn east_and_north_offsets_are_positive_meters() {
        let origin = GeoPoint::new(0.0, 0.0);
        let east = to_local(origin, GeoPoint::new(0.001, 0.0));
        let north = to_local(origin, GeoPoint::new(0.0, 0.001));

        assert!((east.x - 111.195).abs() < 0.05, "east.x = {}", east.x);
        assert!(east.z.abs() < 1e-3);
        assert!((north.z - 111.195).abs() < 0.05, "north.z = {}", north.z);
        assert!(north.x.abs() < 1e-3);
    }

    #[test]
    fn polygon_anchors_at_first_vertex() {
        let ring = [
            ORIGIN,
            GeoPoint::new(-0.1270, 51.5072),
            GeoPoint::new(-0.1270, 51.5076),
        ];
        let (origin, points) = polygon_to_local(&ring).unwrap();
        assert_eq!(origin, ORIGIN);
        assert_eq!(points.len(), 3);
        assert_eq!(points[0], LocalPoint::ZERO);
        assert!(points[1].x > 0.0 && points[2].z > 0.0);
        assert!(polygon_to_local(&[]).is_none());
    }

    #[test]
    fn ground_distance_agrees_with_local_offset() {
        let other = GeoPoint::new(-0.1266, 51.5079);
        let local = to_local(ORIGIN, other);
        let distance = ground_distance(ORIGIN, other);
        assert!((distance as f32 - local.distance(LocalPoint::ZERO)).abs() < 0.01);
    }

    #[test]
    fn containment_in_square() {
        let polygon = square();
        assert!(point_in_polygon(LocalPoint::new(5.0, 5.0), &polygon));
        assert!(!point_in_polygon(LocalPoint::new(11.0, 5.0), &polygon));
        assert!(!point_in_polygon(LocalPoint::new(-0.5, 5.0), &polygon));
    }

    #[test]
    fn containment_ignores_rotation_and_winding() {
        let concave = vec![
            LocalPoint::new(0.0, 0.0),
            LocalPoint::new(8.0, 0.0),
            LocalPoint::new(8.0, 8.0),
            LocalPoint::new(4.0, 3.0),
            LocalPoint::new(0.0, 8.0),
        ];
        let probes = [
            LocalPoint::new(4.0, 1.0),
            LocalPoint::new(4.0, 6.0),
            LocalPoint::new(7.0, 6.0),
            LocalPoint::new(0.2, 7.5),
            LocalPoint::new(9.0, 1.0),
        ];

        let expected: Vec<bool> = probes.iter().map(|p| point_in_polygon(*p, &concave)).collect();
        assert_eq!(expected, vec![true, false, true, true, false]);

        for shift in 1..concave.len() {
            let mut rotated = concave.clone();
            rotated.rotate_left(shift);
            let got: Vec<bool> = probes.iter().map(|p| point_in_polygon(*p, &rotated)).collect();
            assert_eq!(got, expected, "rotation by {shift}");
        }

        let mut reversed = concave.clone();
        reversed.reverse();
        let got: Vec<bool> = probes.iter().map(|p| point_in_polygon(*p, &reversed)).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn degenerate_rings_contain_nothing() {
        let point = LocalPoint::new(0.5, 0.5);
        assert!(!point_in_polygon(point, &[]));
        assert!(!point_in_polygon(point, &[LocalPoint::ZERO]));
        assert!(!point_in_polygon(
            point,
            &[LocalPoint::ZERO, LocalPoint::new(1.0, 1.0)]
        ));
    }

    #[test]
    fn snapping_rounds_to_grid() {
        assert_eq!(snap_to_grid(3.2, 0.5), 3.0);
        assert_eq!(snap_to_grid(3.3, 0.5), 3.5);
        assert_eq!(snap_to_grid(3.25, 0.5), 3.5);
        assert_eq!(snap_to_grid(-1.1, 0.5), -1.0);
        assert_eq!(snap_to_grid(7.4, 1.0), 7.0);
        assert_eq!(snap_to_grid(2.7, 0.0), 2.7);
    }

    #[test]
    fn snapping_is_idempotent() {
        for grid in [0.1_f32, 0.25, 0.5, 1.0, 2.5] {
            let mut value = -20.0_f32;
            while value < 20.0 {
                let once = snap_to_grid(value, grid);
                assert_eq!(snap_to_grid(once, grid), once, "value {value} grid {grid}");
                value += 0.37;
            }
        }
    }

    #[test]
    fn geo_point_serializes_as_pair() {
        let json = serde_json::to_string(&GeoPoint::new(1.5, -2.0)).unwrap();
        assert_eq!(json, "[1.5,-2.0]");
        let back: GeoPoint = serde_json::from_str("[10.0, 20.0]").unwrap();
        assert_eq!(back, GeoPoint::new(10.0, 20.0));
    }
}
