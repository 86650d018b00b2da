use crate::engine::core::events::{SetBoundaryEvent, SetOriginEvent, SiteBoundaryEvent};
use crate::engine::core::lifecycle::EngineLifecycle;
use crate::projection::{GeoPoint, LocalPoint, mercator_from_geo, polygon_to_local};
use bevy::math::{DMat4, DQuat, DVec3};
use bevy::prelude::*;

/// Parent of every engine-spawned scene entity.
#[derive(Component)]
pub struct SiteRoot;

/// Site placement state.
///
/// The root's geographic placement lives here in f64 and is folded into the
/// host camera matrix, so the root entity's own `Transform` stays identity and
/// children keep meter-scale f32 transforms.
#[derive(Resource, Debug, Clone)]
pub struct SiteFrame {
    pub root: Option<Entity>,
    pub origin: Option<GeoPoint>,
    pub boundary: Vec<LocalPoint>,
    /// Local meters (Y up) to mercator world (x, altitude, y).
    pub world_from_local: DMat4,
}

impl Default for SiteFrame {
    fn default() -> Self {
        Self {
            root: None,
            origin: None,
            boundary: Vec::new(),
            world_from_local: DMat4::IDENTITY,
        }
    }
}

impl SiteFrame {
    pub fn set_origin(&mut self, origin: Option<GeoPoint>) {
        self.origin = origin;
        self.world_from_local = Self::placement_for(origin);
    }

    /// Translation to the origin's mercator position, scale `(s, s, -s)` with
    /// `s` one meter in mercator units. The negative Z scale turns local north
    /// into decreasing mercator y.
    pub fn placement_for(origin: Option<GeoPoint>) -> DMat4 {
        let Some(origin) = origin else {
            return DMat4::IDENTITY;
        };
        let coord = mercator_from_geo(origin);
        let s = coord.meter_in_mercator_units();
        DMat4::from_scale_rotation_translation(
            DVec3::new(s, s, -s),
            DQuat::IDENTITY,
            DVec3::new(coord.x, coord.z, coord.y),
        )
    }
}

pub fn spawn_site_root(mut commands: Commands, mut frame: ResMut<SiteFrame>) {
    let root = commands
        .spawn((SiteRoot, Transform::IDENTITY, Visibility::default(), Name::new("site-root")))
        .id();
    frame.root = Some(root);
}

/// Drawing-tool ring to origin + local boundary, so the origin is always the
/// ring's first vertex.
pub fn apply_site_boundary(
    mut events: EventReader<SiteBoundaryEvent>,
    mut origin_events: EventWriter<SetOriginEvent>,
    mut boundary_events: EventWriter<SetBoundaryEvent>,
) {
    for SiteBoundaryEvent(ring) in events.read() {
        match ring.as_deref().and_then(polygon_to_local) {
            Some((origin, points)) => {
                info!(
                    "Site boundary set: {} vertices, origin ({:.6}, {:.6})",
                    points.len(),
                    origin.lng,
                    origin.lat
                );
                origin_events.write(SetOriginEvent(Some(origin)));
                boundary_events.write(SetBoundaryEvent(points));
            }
            None => {
                info!("Site boundary cleared");
                origin_events.write(SetOriginEvent(None));
                boundary_events.write(SetBoundaryEvent(Vec::new()));
            }
        }
    }
}

pub fn apply_origin(
    mut events: EventReader<SetOriginEvent>,
    mut frame: ResMut<SiteFrame>,
    mut lifecycle: ResMut<EngineLifecycle>,
) {
    for SetOriginEvent(origin) in events.read() {
        frame.set_origin(*origin);
        lifecycle.on_origin(origin.is_some());
    }
}
