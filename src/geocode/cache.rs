//! CSV-backed geocoding cache keyed by raw address string.

use anyhow::{Context, Result};
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::models::GeoPoint;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// One cached lookup; `location` is `None` when every provider missed
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub location: Option<GeoPoint>,
    pub timestamp_iso: String,
}

/// On-disk row: `address,lat,lon,timestamp_iso`
#[derive(Debug, Serialize, Deserialize)]
struct CacheRow {
    address: String,
    #[serde(deserialize_with = "csv::invalid_option")]
    lat: Option<f64>,
    #[serde(deserialize_with = "csv::invalid_option")]
    lon: Option<f64>,
    #[serde(default)]
    timestamp_iso: Option<String>,
}

pub struct GeocodeCache {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
}

impl GeocodeCache {
    /// Load the cache file, or start empty if it does not exist yet
    pub fn load<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let mut entries = HashMap::new();

        if path.exists() {
            let mut reader = csv::Reader::from_path(&path)
                .with_context(|| format!("Failed to open cache {}", path.display()))?;

            for result in reader.deserialize::<CacheRow>() {
                let row = result.context("Malformed cache row")?;
                entries.insert(
                    row.address,
                    CacheEntry {
                        location: GeoPoint::from_parts(row.lat, row.lon),
                        timestamp_iso: row.timestamp_iso.unwrap_or_default(),
                    },
                );
            }

            info!(
                "Loaded {} cached addresses from {}",
                entries.len(),
                path.display()
            );
        } else {
            debug!("No cache at {}, starting empty", path.display());
        }

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, address: &str) -> Option<&CacheEntry> {
        self.entries.get(address)
    }

    /// Cached coordinates, if the address was resolved
    pub fn location(&self, address: &str) -> Option<GeoPoint> {
        self.entries.get(address).and_then(|e| e.location)
    }

    /// Addresses cached as missing are not resolved and get retried
    pub fn is_resolved(&self, address: &str) -> bool {
        self.location(address).is_some()
    }

    pub fn insert(&mut self, address: &str, location: Option<GeoPoint>) {
        self.entries.insert(
            address.to_string(),
            CacheEntry {
                location,
                timestamp_iso: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write all entries sorted by address, replacing the file atomically
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let tmp = NamedTempFile::new_in(&dir).context("Failed to create temporary cache file")?;
        {
            let mut writer = csv::Writer::from_writer(tmp.as_file());

            let mut addresses: Vec<&String> = self.entries.keys().collect();
            addresses.sort();

            for address in addresses {
                let entry = &self.entries[address];
                writer.serialize(CacheRow {
                    address: address.clone(),
                    lat: entry.location.map(|p| p.lat),
                    lon: entry.location.map(|p| p.lon),
                    timestamp_iso: Some(entry.timestamp_iso.clone()),
                })?;
            }
            writer.flush()?;
        }

        tmp.persist(&self.path)
            .with_context(|| format!("Failed to write cache {}", self.path.display()))?;

        debug!("Saved {} cache entries", self.entries.len());
        Ok(())
    }
}
