//! Tabular record read from the input sheet.

/// Geographic point (lat/lon)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Build a point from optional raw values, rejecting NaN and out-of-range input
    pub fn from_parts(lat: Option<f64>, lon: Option<f64>) -> Option<Self> {
        let (lat, lon) = (lat?, lon?);
        if !lat.is_finite() || !lon.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return None;
        }
        Some(Self { lat, lon })
    }
}

/// One row of the input sheet, augmented with geocoding and join results.
#[derive(Debug, Clone, Default)]
pub struct Record {
    /// Raw address as written in the sheet (cache key)
    pub address: Option<String>,

    /// Category used for marker layers and filters
    pub category: Option<String>,

    /// Display name of the point
    pub name: Option<String>,

    /// Coordinates, either from the sheet or from geocoding
    pub location: Option<GeoPoint>,

    /// District containing the point, set by the spatial join
    pub district: Option<String>,
}

impl Record {
    pub fn new(address: Option<String>, category: Option<String>, name: Option<String>) -> Self {
        Self {
            address,
            category,
            name,
            location: None,
            district: None,
        }
    }

    pub fn with_location(mut self, location: GeoPoint) -> Self {
        self.location = Some(location);
        self
    }
}
