//! PIP service joining located records to districts.

use geo::{Centroid, MultiPoint, Point};
use hashbrown::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use super::{District, DistrictIndex};
use crate::models::{GeoPoint, Record};

/// Point-in-Polygon lookup service
pub struct PipService {
    index: DistrictIndex,
}

impl PipService {
    /// Create a new PIP service from a spatial index
    pub fn new(index: DistrictIndex) -> Self {
        Self { index }
    }

    /// District containing a point, if any
    pub fn lookup(&self, lon: f64, lat: f64) -> Option<Arc<District>> {
        self.index.lookup(lon, lat)
    }

    /// Left join: records without coordinates are dropped, records outside
    /// every district are kept with no district.
    pub fn join(&self, records: Vec<Record>) -> Vec<Record> {
        let total = records.len();

        let joined: Vec<Record> = records
            .into_iter()
            .filter_map(|mut record| {
                let location = record.location?;
                record.district = self
                    .lookup(location.lon, location.lat)
                    .map(|d| d.name.clone());
                Some(record)
            })
            .collect();

        let matched = joined.iter().filter(|r| r.district.is_some()).count();
        info!(
            "Spatial join: {} of {} records located, {} inside a district",
            joined.len(),
            total,
            matched
        );
        debug!("{} records dropped without coordinates", total - joined.len());

        joined
    }

    /// Get the spatial index (for districts and stats)
    pub fn index(&self) -> &DistrictIndex {
        &self.index
    }
}

/// Centroid of the distinct located points
pub fn points_centroid(records: &[Record]) -> Option<GeoPoint> {
    let mut seen = HashSet::new();
    let points: Vec<Point<f64>> = records
        .iter()
        .filter_map(|r| r.location)
        .filter(|p| seen.insert((p.lat.to_bits(), p.lon.to_bits())))
        .map(|p| Point::new(p.lon, p.lat))
        .collect();

    MultiPoint::new(points)
        .centroid()
        .map(|c| GeoPoint::new(c.y(), c.x()))
}
