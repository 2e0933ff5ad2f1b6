//! HTML map rendering.

mod html;
pub mod stats;

pub use html::{escape_html, MapPage};
pub use stats::{categories, ColorScale, DistrictCounts};
