//! Spatial index for fast district lookups.

use geo::{Contains, Point};
use rstar::{RTree, RTreeObject, AABB};
use std::sync::Arc;
use tracing::info;

use super::District;

/// Wrapper for R-tree indexing of districts
#[derive(Clone)]
pub struct IndexedDistrict {
    pub district: Arc<District>,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedDistrict {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

impl IndexedDistrict {
    pub fn new(district: Arc<District>) -> Option<Self> {
        let (min_x, min_y, max_x, max_y) = district.bbox()?;
        Some(Self {
            district,
            envelope: AABB::from_corners([min_x, min_y], [max_x, max_y]),
        })
    }
}

/// Spatial index for districts using R-tree
pub struct DistrictIndex {
    tree: RTree<IndexedDistrict>,
    /// All districts in file order, including ones without a usable envelope
    districts: Vec<Arc<District>>,
}

impl DistrictIndex {
    /// Build spatial index from districts
    pub fn build(districts: Vec<District>) -> Self {
        let districts: Vec<Arc<District>> = districts.into_iter().map(Arc::new).collect();

        let indexed: Vec<IndexedDistrict> = districts
            .iter()
            .cloned()
            .filter_map(IndexedDistrict::new)
            .collect();

        let tree = RTree::bulk_load(indexed);
        info!("Spatial index built with {} districts", tree.size());

        Self { tree, districts }
    }

    /// The containing district that comes first in the source file
    pub fn lookup(&self, lon: f64, lat: f64) -> Option<Arc<District>> {
        let point = Point::new(lon, lat);
        let query_envelope = AABB::from_point([lon, lat]);

        self.tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter(|id| id.district.geometry.contains(&point))
            .min_by_key(|id| id.district.id)
            .map(|id| Arc::clone(&id.district))
    }

    /// Get total number of indexed districts
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Iterate over all districts in file order
    pub fn districts(&self) -> impl Iterator<Item = &Arc<District>> {
        self.districts.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, MultiPolygon};
    use geojson::JsonObject;

    fn square(id: usize, name: &str, x0: f64, y0: f64, size: f64) -> District {
        let p = polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ];
        District {
            id,
            name: name.to_string(),
            properties: JsonObject::new(),
            geometry: MultiPolygon::new(vec![p]),
        }
    }

    #[test]
    fn test_lookup_inside_and_outside() {
        let index = DistrictIndex::build(vec![
            square(0, "A", 0.0, 0.0, 1.0),
            square(1, "B", 2.0, 0.0, 1.0),
        ]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup(0.5, 0.5).unwrap().name, "A");
        assert_eq!(index.lookup(2.5, 0.5).unwrap().name, "B");
        assert!(index.lookup(1.5, 0.5).is_none());
    }

    #[test]
    fn test_boundary_point_is_not_within() {
        let index = DistrictIndex::build(vec![square(0, "A", 0.0, 0.0, 1.0)]);
        assert!(index.lookup(1.0, 0.5).is_none());
    }

    #[test]
    fn test_overlap_prefers_file_order() {
        let big_first = DistrictIndex::build(vec![
            square(0, "Big", 0.0, 0.0, 4.0),
            square(1, "Small", 1.0, 1.0, 1.0),
        ]);
        assert_eq!(big_first.lookup(1.5, 1.5).unwrap().name, "Big");
        assert_eq!(big_first.lookup(3.5, 3.5).unwrap().name, "Big");

        let small_first = DistrictIndex::build(vec![
            square(0, "Small", 1.0, 1.0, 1.0),
            square(1, "Big", 0.0, 0.0, 4.0),
        ]);
        assert_eq!(small_first.lookup(1.5, 1.5).unwrap().name, "Small");
        assert_eq!(small_first.lookup(3.5, 3.5).unwrap().name, "Big");
    }
}
