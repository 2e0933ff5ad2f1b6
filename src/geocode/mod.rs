//! Address geocoding: CSV cache, rate-limited providers, fallback chain.

mod cache;
mod limiter;
pub mod normalize;
mod pipeline;
mod provider;

pub use cache::{CacheEntry, GeocodeCache};
pub use limiter::RateLimiter;
pub use normalize::{build_query, normalize_address, street_only};
pub use pipeline::{unique_addresses, GeocodeStats, Geocoder};
pub use provider::{ArcGisProvider, GeocodeError, GeocodeProvider, NominatimProvider};
