//! Events carrying every external input into the ECS world.

use crate::engine::assets::design::SiteDesign;
use crate::engine::assets::placement::{ObjectId, PlacementObject};
use crate::projection::{GeoPoint, LocalPoint};
use bevy::prelude::*;

/// Geographic ring from the boundary drawing tool; `None` clears the site.
#[derive(Event, Debug, Clone)]
pub struct SiteBoundaryEvent(pub Option<Vec<GeoPoint>>);

/// Imported design: boundary and objects applied together.
#[derive(Event, Debug, Clone)]
pub struct LoadDesignEvent(pub SiteDesign);

#[derive(Event, Debug, Clone, Copy)]
pub struct SetOriginEvent(pub Option<GeoPoint>);

#[derive(Event, Debug, Clone)]
pub struct SetBoundaryEvent(pub Vec<LocalPoint>);

#[derive(Event, Debug, Clone)]
pub struct UpsertObjectsEvent(pub Vec<PlacementObject>);

#[derive(Event, Debug, Clone, Copy)]
pub struct PointerClickEvent {
    pub screen: Vec2,
}

#[derive(Event, Debug, Clone, Copy, Default)]
pub struct ClearSelectionEvent;

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub enum DragEvent {
    Begin,
    To(LocalPoint),
    ToScreen(Vec2),
    End,
}

#[derive(Event, Debug, Clone, Copy)]
pub struct RotateSelectedEvent {
    pub delta: f32,
}

#[derive(Event, Debug, Clone)]
pub struct SetMeasurementEvent(pub Vec<LocalPoint>);

/// Measurement points in geographic terms, projected against the origin
/// that holds once this frame's site changes are applied.
#[derive(Event, Debug, Clone)]
pub struct SetGeoMeasurementEvent(pub Vec<GeoPoint>);

/// Host camera matrix for this frame, column-major.
#[derive(Event, Debug, Clone, Copy)]
pub struct RenderFrameEvent {
    pub matrix: [f64; 16],
}

#[derive(Event, Debug, Clone, Copy, Default)]
pub struct CameraMovedEvent;

#[derive(Event, Debug, Clone, Copy, Default)]
pub struct DisposeEvent;

/// A host surface was bound for the first time.
#[derive(Event, Debug, Clone, Copy, Default)]
pub struct HostAttachedEvent;

/// Outgoing: selection changed (pick, clear or removal of the selected mesh).
#[derive(Event, Debug, Clone, PartialEq)]
pub struct SelectionChangedEvent {
    pub selected: Option<ObjectId>,
}

/// Outgoing: host map panning must be locked or released.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct PanLockEvent {
    pub locked: bool,
}
