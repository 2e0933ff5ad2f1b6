use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub geocoding: GeocodingConfig,
    pub map: MapConfig,
    pub labels: Labels,
}

/// Column names in the input sheet
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct InputConfig {
    pub address_col: String,
    pub category_col: String,
    pub name_col: String,
    pub lat_col: String,
    pub lon_col: String,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            address_col: "Adres punktu".to_string(),
            category_col: "Rodzaj".to_string(),
            name_col: "Nazwa punktu".to_string(),
            lat_col: "lat".to_string(),
            lon_col: "lon".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GeocodingConfig {
    /// Appended to every query, e.g. "Łódź, Polska"
    pub city_hint: String,
    pub user_agent: String,
    pub nominatim_url: String,
    pub arcgis_url: String,
    pub timeout_secs: f64,
    /// Minimum delay between two calls to the same provider
    pub min_delay_secs: f64,
    pub max_retries: u32,
    pub error_wait_secs: f64,
    /// Flush the cache to disk every N entries
    pub checkpoint_every: usize,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            city_hint: "Łódź, Polska".to_string(),
            user_agent: "districtmap/0.1".to_string(),
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            arcgis_url:
                "https://geocode.arcgis.com/arcgis/rest/services/World/GeocodeServer".to_string(),
            timeout_secs: 10.0,
            min_delay_secs: 1.0,
            max_retries: 3,
            error_wait_secs: 2.0,
            checkpoint_every: 100,
        }
    }
}

impl GeocodingConfig {
    /// Command-line values win over the file
    pub fn apply_overrides(&mut self, city_hint: Option<&str>, min_delay_secs: Option<f64>) {
        if let Some(hint) = city_hint {
            self.city_hint = hint.to_string();
        }
        if let Some(delay) = min_delay_secs {
            self.min_delay_secs = delay;
        }
    }

    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }

    pub fn min_delay(&self) -> Duration {
        secs(self.min_delay_secs)
    }

    pub fn error_wait(&self) -> Duration {
        secs(self.error_wait_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MapConfig {
    pub tiles_url: String,
    pub tiles_attribution: String,
    pub zoom_start: u8,
    /// [lat, lon] used when there are no points to centre on
    pub default_center: [f64; 2],
    pub heat_radius: u32,
    pub heat_blur: u32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            tiles_url: "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png"
                .to_string(),
            tiles_attribution: "&copy; <a href=\"https://www.openstreetmap.org/copyright\">OpenStreetMap</a> contributors &copy; <a href=\"https://carto.com/attributions\">CARTO</a>".to_string(),
            zoom_start: 12,
            default_center: [51.759, 19.458],
            heat_radius: 15,
            heat_blur: 10,
        }
    }
}

/// UI strings rendered into the page
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Labels {
    pub page_title: String,
    pub sidebar_title: String,
    pub sidebar_subtitle: String,
    pub district_header: String,
    pub count_header: String,
    pub filter_title: String,
    pub boundaries_layer: String,
    pub density_layer: String,
    pub heat_layer: String,
    pub legend_title: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            page_title: "Mapa punktów".to_string(),
            sidebar_title: "Punkty z alkoholem".to_string(),
            sidebar_subtitle: "wg osiedli".to_string(),
            district_header: "Osiedle".to_string(),
            count_header: "Liczba".to_string(),
            filter_title: "Filtr typu".to_string(),
            boundaries_layer: "Granice".to_string(),
            density_layer: "Gęstość".to_string(),
            heat_layer: "Heat mapa".to_string(),
            legend_title: "Liczba punktów".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }
}

fn secs(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0))
}
