//! Point-in-Polygon (PIP) district lookup.
//!
//! Loads district boundaries from GeoJSON and joins geocoded records
//! to them using an R-tree spatial index.

mod boundary;
mod index;
mod service;

pub use boundary::{load_districts, parse_districts, District};
pub use index::DistrictIndex;
pub use service::{points_centroid, PipService};
