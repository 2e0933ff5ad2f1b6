//! Minimum-delay and retry wrapper around a provider.

use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::warn;

use super::provider::GeocodeProvider;
use crate::models::GeoPoint;

/// Spaces calls to one provider and retries transient failures.
///
/// Errors that survive all retries are swallowed: the lookup counts as a miss.
pub struct RateLimiter {
    provider: Box<dyn GeocodeProvider>,
    min_delay: Duration,
    max_retries: u32,
    error_wait: Duration,
    last_call: Option<Instant>,
    calls: u64,
}

impl RateLimiter {
    pub fn new(
        provider: Box<dyn GeocodeProvider>,
        min_delay: Duration,
        max_retries: u32,
        error_wait: Duration,
    ) -> Self {
        Self {
            provider,
            min_delay,
            max_retries,
            error_wait,
            last_call: None,
            calls: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.provider.name()
    }

    /// Number of requests sent to the provider, retries included
    pub fn calls(&self) -> u64 {
        self.calls
    }

    pub async fn geocode(&mut self, query: &str) -> Option<GeoPoint> {
        let mut attempt = 0;
        loop {
            self.wait_turn().await;
            self.calls += 1;

            match self.provider.geocode(query).await {
                Ok(result) => return result,
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        "{} failed for '{}' (attempt {}/{}): {}",
                        self.name(),
                        query,
                        attempt,
                        self.max_retries + 1,
                        e
                    );
                    sleep(self.error_wait).await;
                }
                Err(e) => {
                    warn!("{} gave up on '{}': {}", self.name(), query, e);
                    return None;
                }
            }
        }
    }

    async fn wait_turn(&mut self) {
        if let Some(last) = self.last_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                sleep(self.min_delay - elapsed).await;
            }
        }
        self.last_call = Some(Instant::now());
    }
}
