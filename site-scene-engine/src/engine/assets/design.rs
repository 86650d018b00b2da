use super::placement::PlacementObject;
use crate::error::ConfigError;
use crate::projection::GeoPoint;
use serde::{Deserialize, Serialize};

/// Import/export document for a site design:
/// `{ "boundary": [[lng, lat], ...], "origin": [lng, lat], "objects": [...] }`.
/// Older exports name the ring `siteBoundary`; both are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteDesign {
    #[serde(default, alias = "siteBoundary")]
    pub boundary: Option<Vec<GeoPoint>>,
    #[serde(default)]
    pub origin: Option<GeoPoint>,
    #[serde(default)]
    pub objects: Vec<PlacementObject>,
}

impl SiteDesign {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let design: Self = serde_json::from_str(json)?;
        design.validate()?;
        Ok(design)
    }

    /// An empty or absent ring is allowed; one or two vertices are not.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ring) = &self.boundary {
            if !ring.is_empty() && ring.len() < 3 {
                return Err(ConfigError::invalid(
                    "boundary",
                    format!("ring needs at least 3 vertices, got {}", ring.len()),
                ));
            }
        }
        Ok(())
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Explicit origin, else the first boundary vertex.
    pub fn resolved_origin(&self) -> Option<GeoPoint> {
        self.origin
            .or_else(|| self.boundary.as_ref().and_then(|ring| ring.first().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESIGN: &str = r#"{
        "siteBoundary": [[-0.1276, 51.5072], [-0.1270, 51.5072], [-0.1270, 51.5076]],
        "objects": [{ "id": "x", "type": "container", "x": 3.0, "z": 4.0, "rotation": 0.25 }]
    }"#;

    #[test]
    fn origin_falls_back_to_first_vertex() {
        let design = SiteDesign::from_json(DESIGN).unwrap();
        assert_eq!(design.resolved_origin(), Some(GeoPoint::new(-0.1276, 51.5072)));
        assert_eq!(design.objects.len(), 1);
        assert_eq!(design.objects[0].rotation, 0.25);
    }

    #[test]
    fn export_round_trips_through_boundary_key() {
        let design = SiteDesign::from_json(DESIGN).unwrap();
        let json = design.to_json_pretty().unwrap();
        assert!(json.contains("\"boundary\""));
        assert_eq!(SiteDesign::from_json(&json).unwrap(), design);
    }

    #[test]
    fn empty_document_is_a_blank_design() {
        let design = SiteDesign::from_json("{}").unwrap();
        assert!(design.boundary.is_none());
        assert!(design.resolved_origin().is_none());
        assert!(design.objects.is_empty());
    }

    #[test]
    fn short_rings_are_rejected() {
        let json = r#"{ "boundary": [[0.0, 0.0], [1.0, 1.0]] }"#;
        assert!(SiteDesign::from_json(json).is_err());
    }
}
