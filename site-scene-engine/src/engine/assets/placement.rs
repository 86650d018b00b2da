use crate::projection::LocalPoint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally assigned placement identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ObjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ObjectId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A placed piece of equipment as held by the external object store.
/// Position is already in local meters; rotation is yaw in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementObject {
    pub id: ObjectId,
    #[serde(rename = "type")]
    pub type_id: String,
    pub x: f32,
    pub z: f32,
    #[serde(default)]
    pub rotation: f32,
}

impl PlacementObject {
    pub fn new(id: impl Into<ObjectId>, type_id: &str, x: f32, z: f32) -> Self {
        Self {
            id: id.into(),
            type_id: type_id.to_string(),
            x,
            z,
            rotation: 0.0,
        }
    }

    pub fn with_rotation(mut self, rotation: f32) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn position(&self) -> LocalPoint {
        LocalPoint::new(self.x, self.z)
    }
}

/// Update intent emitted by the engine. The store merges present fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPatch {
    pub id: ObjectId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
}

impl ObjectPatch {
    /// Committed drag: full placement.
    pub fn placement(id: ObjectId, position: LocalPoint, rotation: f32) -> Self {
        Self {
            id,
            x: Some(position.x),
            z: Some(position.z),
            rotation: Some(rotation),
        }
    }

    pub fn rotation(id: ObjectId, rotation: f32) -> Self {
        Self {
            id,
            x: None,
            z: None,
            rotation: Some(rotation),
        }
    }

    /// Shallow merge, the way the store applies a patch.
    pub fn apply_to(&self, object: &mut PlacementObject) {
        if object.id != self.id {
            return;
        }
        if let Some(x) = self.x {
            object.x = x;
        }
        if let Some(z) = self.z {
            object.z = z;
        }
        if let Some(rotation) = self.rotation {
            object.rotation = rotation;
        }
    }
}
