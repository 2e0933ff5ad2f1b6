//! District boundary loading from GeoJSON.

use anyhow::{bail, Context, Result};
use geo::{BoundingRect, Geometry, MultiPolygon};
use geojson::{GeoJson, JsonObject};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info, warn};

/// A single district polygon with its display name
#[derive(Debug, Clone)]
pub struct District {
    /// Position in the source file; earlier districts win overlaps
    pub id: usize,
    pub name: String,
    /// Every property of the source feature, passed through to the map
    pub properties: JsonObject,
    pub geometry: MultiPolygon<f64>,
}

impl District {
    /// Get the bounding box of this district
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        self.geometry
            .bounding_rect()
            .map(|rect| (rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }
}

/// Load districts from a GeoJSON file
pub fn load_districts(path: &Path, name_property: &str) -> Result<Vec<District>> {
    info!("Loading districts from {}", path.display());
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_districts(&text, name_property)
}

/// Parse a FeatureCollection, keeping polygon features that carry `name_property`
pub fn parse_districts(text: &str, name_property: &str) -> Result<Vec<District>> {
    let geojson: GeoJson = text.parse().context("Invalid GeoJSON")?;

    let features = match geojson {
        GeoJson::FeatureCollection(fc) => fc.features,
        GeoJson::Feature(f) => vec![f],
        GeoJson::Geometry(_) => bail!("Expected a Feature or FeatureCollection, got a bare geometry"),
    };

    let total = features.len();
    let mut districts = Vec::new();

    for (idx, feature) in features.into_iter().enumerate() {
        let name = match feature.property(name_property) {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                debug!("Feature {} has no '{}' property, skipping", idx, name_property);
                continue;
            }
        };

        let geometry = match feature.geometry {
            Some(g) => g,
            None => {
                debug!("District '{}' has no geometry, skipping", name);
                continue;
            }
        };

        let geometry = match Geometry::<f64>::try_from(geometry) {
            Ok(g) => g,
            Err(e) => {
                warn!("Could not convert geometry of '{}': {}", name, e);
                continue;
            }
        };

        let geometry = match geometry {
            Geometry::Polygon(p) => MultiPolygon::new(vec![p]),
            Geometry::MultiPolygon(mp) => mp,
            _ => {
                debug!("District '{}' is not a polygon, skipping", name);
                continue;
            }
        };

        districts.push(District {
            id: districts.len(),
            name,
            properties: feature.properties.unwrap_or_default(),
            geometry,
        });
    }

    if districts.is_empty() && total > 0 {
        warn!(
            "None of {} features had a polygon with property '{}'",
            total, name_property
        );
    }
    info!("Found {} districts", districts.len());

    Ok(districts)
}
