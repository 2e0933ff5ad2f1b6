//! Core data models for the mapping pipeline.

pub mod record;

pub use record::{GeoPoint, Record};
