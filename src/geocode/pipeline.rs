//! Cache-first geocoding with provider fallback.

use anyhow::{Context, Result};
use hashbrown::HashSet;
use indicatif::ProgressBar;
use tracing::{debug, info};

use super::cache::GeocodeCache;
use super::limiter::RateLimiter;
use super::normalize::{build_query, street_only};
use super::provider::{ArcGisProvider, NominatimProvider};
use crate::config::GeocodingConfig;
use crate::models::{GeoPoint, Record};

/// Outcome of a geocoding run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GeocodeStats {
    pub unique: usize,
    pub cached: usize,
    pub resolved: usize,
    pub failed: usize,
}

pub struct Geocoder {
    providers: Vec<RateLimiter>,
    city_hint: String,
    checkpoint_every: usize,
}

impl Geocoder {
    /// Providers are tried in order; the first hit wins
    pub fn new(providers: Vec<RateLimiter>, city_hint: &str, checkpoint_every: usize) -> Self {
        Self {
            providers,
            city_hint: city_hint.to_string(),
            checkpoint_every: checkpoint_every.max(1),
        }
    }

    /// Nominatim first, ArcGIS as fallback
    pub fn from_config(config: &GeocodingConfig) -> Result<Self> {
        let nominatim =
            NominatimProvider::new(&config.nominatim_url, &config.user_agent, config.timeout())
                .context("Failed to create Nominatim client")?;
        let arcgis = ArcGisProvider::new(&config.arcgis_url, &config.user_agent, config.timeout())
            .context("Failed to create ArcGIS client")?;

        let wrap = |p: Box<dyn super::GeocodeProvider>| {
            RateLimiter::new(
                p,
                config.min_delay(),
                config.max_retries,
                config.error_wait(),
            )
        };

        Ok(Self::new(
            vec![wrap(Box::new(nominatim)), wrap(Box::new(arcgis))],
            &config.city_hint,
            config.checkpoint_every,
        ))
    }

    /// Full address first, then the street alone
    pub async fn lookup(&mut self, address: &str) -> Option<GeoPoint> {
        let full = build_query(address, &self.city_hint);
        if let Some(point) = self.first_hit(&full).await {
            return Some(point);
        }

        let street = street_only(address);
        if street.is_empty() {
            return None;
        }
        let street_query = build_query(&street, &self.city_hint);
        if street_query == full {
            return None;
        }

        debug!("Falling back to street-only query '{}'", street_query);
        self.first_hit(&street_query).await
    }

    async fn first_hit(&mut self, query: &str) -> Option<GeoPoint> {
        for provider in &mut self.providers {
            if let Some(point) = provider.geocode(query).await {
                debug!("{} resolved '{}'", provider.name(), query);
                return Some(point);
            }
        }
        None
    }

    /// Resolve every unique address through the cache and copy coordinates onto the records
    pub async fn geocode_records(
        &mut self,
        records: &mut [Record],
        cache: &mut GeocodeCache,
        progress: &ProgressBar,
    ) -> Result<GeocodeStats> {
        let addresses = unique_addresses(records);
        let mut stats = GeocodeStats {
            unique: addresses.len(),
            ..Default::default()
        };

        info!("Geocoding {} unique addresses", addresses.len());
        progress.set_length(addresses.len() as u64);

        let mut since_checkpoint = 0;
        for address in &addresses {
            if cache.is_resolved(address) {
                stats.cached += 1;
                progress.inc(1);
                continue;
            }

            let location = self.lookup(address).await;
            match location {
                Some(_) => stats.resolved += 1,
                None => {
                    debug!("No provider could locate '{}'", address);
                    stats.failed += 1;
                }
            }
            cache.insert(address, location);

            since_checkpoint += 1;
            if since_checkpoint >= self.checkpoint_every {
                cache.save()?;
                since_checkpoint = 0;
            }
            progress.inc(1);
        }
        progress.finish_and_clear();
        cache.save()?;

        for record in records.iter_mut() {
            if record.location.is_some() {
                continue;
            }
            if let Some(address) = &record.address {
                record.location = cache.location(address);
            }
        }

        info!(
            "Geocoding done: {} cached, {} resolved, {} failed",
            stats.cached, stats.resolved, stats.failed
        );
        Ok(stats)
    }
}

/// Non-empty addresses in first-seen order, without duplicates
pub fn unique_addresses(records: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|r| r.address.as_deref())
        .filter(|a| !a.trim().is_empty())
        .filter(|a| seen.insert(*a))
        .map(String::from)
        .collect()
}
