//! Districtmap - geocode a list of addresses, join them to district
//! polygons and render an interactive HTML map.
//!
//! This library provides the pipeline stages used by the `districtmap` binary.

pub mod config;
pub mod geocode;
pub mod models;
pub mod pip;
pub mod render;
pub mod sheet;

pub use config::Config;
pub use models::{GeoPoint, Record};
