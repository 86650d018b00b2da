use crate::engine::config::parse_color;
use crate::error::ConfigError;
use bevy::prelude::*;
use constants::render_settings::FALLBACK_OBJECT_COLOR;
use serde::{Deserialize, Serialize};

/// One equipment type. JSON keys follow the equipment library files:
/// `{ "id", "name", "width", "depth", "height", "color" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(rename = "id")]
    pub type_id: String,
    #[serde(rename = "name", default)]
    pub display_name: String,
    pub width: f32,
    pub depth: f32,
    pub height: f32,
    #[serde(rename = "color", default = "default_color_hint")]
    pub color_hint: String,
}

fn default_color_hint() -> String {
    FALLBACK_OBJECT_COLOR.to_string()
}

impl CatalogEntry {
    pub fn new(type_id: &str, width: f32, depth: f32, height: f32) -> Self {
        Self {
            type_id: type_id.to_string(),
            display_name: type_id.to_string(),
            width,
            depth,
            height,
            color_hint: default_color_hint(),
        }
    }

    pub fn with_color(mut self, color_hint: &str) -> Self {
        self.color_hint = color_hint.to_string();
        self
    }

    /// Box dimensions as (width, height, depth). Degenerate or non-finite
    /// extents are clamped so meshes and hit boxes stay valid.
    pub fn size(&self) -> Vec3 {
        let clamp = |v: f32| if v.is_finite() { v.max(0.001) } else { 0.001 };
        Vec3::new(clamp(self.width), clamp(self.height), clamp(self.depth))
    }

    pub fn color(&self) -> Color {
        parse_color(&self.color_hint, FALLBACK_OBJECT_COLOR)
    }
}

/// Equipment catalog keyed by type id. Placements may name types missing
/// from it.
#[derive(Asset, TypePath, Resource, Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeCatalog {
    pub entries: Vec<CatalogEntry>,
}

impl TypeCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let catalog: Self = serde_json::from_str(json)?;
        for entry in &catalog.entries {
            if entry.type_id.is_empty() {
                return Err(ConfigError::invalid("id", "catalog entry without a type id"));
            }
        }
        Ok(catalog)
    }

    pub fn get(&self, type_id: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|entry| entry.type_id == type_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_equipment_library_shape() {
        let json = r##"[
            { "id": "container", "name": "Container", "width": 6.0, "depth": 2.4, "height": 2.6, "color": "#2563eb" },
            { "id": "generator", "name": "Generator", "width": 2.0, "depth": 1.0, "height": 1.5 }
        ]"##;
        let catalog = TypeCatalog::from_json_str(json).unwrap();

        assert_eq!(catalog.len(), 2);
        let container = catalog.get("container").unwrap();
        assert_eq!(container.display_name, "Container");
        assert_eq!(container.size(), Vec3::new(6.0, 2.6, 2.4));
        assert_eq!(catalog.get("generator").unwrap().color_hint, FALLBACK_OBJECT_COLOR);
        assert!(catalog.get("crane").is_none());
    }

    #[test]
    fn rejects_entries_without_id() {
        let json = r#"[{ "id": "", "width": 1.0, "depth": 1.0, "height": 1.0 }]"#;
        assert!(matches!(
            TypeCatalog::from_json_str(json),
            Err(ConfigError::Invalid { field: "id", .. })
        ));
    }

    #[test]
    fn degenerate_sizes_are_clamped() {
        let entry = CatalogEntry::new("flat", 2.0, f32::NAN, -1.0);
        assert_eq!(entry.size(), Vec3::new(2.0, 0.001, 0.001));
    }
}
