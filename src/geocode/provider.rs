//! HTTP geocoding providers (Nominatim and ArcGIS).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::models::GeoPoint;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{provider} returned status {status}")]
    Status { provider: &'static str, status: u16 },

    #[error("invalid response from {provider}: {message}")]
    Parse {
        provider: &'static str,
        message: String,
    },

    #[error("invalid provider url: {0}")]
    Url(#[from] url::ParseError),
}

/// A forward geocoder: free-form query in, best match out
#[async_trait]
pub trait GeocodeProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the provider answered but found nothing
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError>;
}

fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, GeocodeError> {
    Ok(Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?)
}

fn endpoint(base_url: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, GeocodeError> {
    let url = format!("{}/{}", base_url.trim_end_matches('/'), path);
    Ok(Url::parse_with_params(&url, params)?)
}

/// OpenStreetMap Nominatim search API
pub struct NominatimProvider {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimHit {
    lat: String,
    lon: String,
}

impl NominatimProvider {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, GeocodeError> {
        Ok(Self {
            client: build_client(user_agent, timeout)?,
            base_url: base_url.to_string(),
        })
    }
}

#[async_trait]
impl GeocodeProvider for NominatimProvider {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        let url = endpoint(
            &self.base_url,
            "search",
            &[("q", query), ("format", "json"), ("limit", "1")],
        )?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(GeocodeError::Status {
                provider: self.name(),
                status: response.status().as_u16(),
            });
        }

        let hits: Vec<NominatimHit> = response.json().await?;
        let hit = match hits.into_iter().next() {
            Some(h) => h,
            None => {
                debug!("nominatim: no match for '{}'", query);
                return Ok(None);
            }
        };

        let parse = |v: &str| {
            v.parse::<f64>().map_err(|e| GeocodeError::Parse {
                provider: "nominatim",
                message: format!("bad coordinate '{}': {}", v, e),
            })
        };

        Ok(GeoPoint::from_parts(Some(parse(&hit.lat)?), Some(parse(&hit.lon)?)))
    }
}

/// Esri ArcGIS World Geocoding Service
pub struct ArcGisProvider {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ArcGisResponse {
    #[serde(default)]
    candidates: Vec<ArcGisCandidate>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ArcGisCandidate {
    location: ArcGisLocation,
}

#[derive(Debug, Deserialize)]
struct ArcGisLocation {
    x: f64,
    y: f64,
}

impl ArcGisProvider {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self, GeocodeError> {
        Ok(Self {
            client: build_client(user_agent, timeout)?,
            base_url: base_url.to_string(),
        })
    }
}

#[async_trait]
impl GeocodeProvider for ArcGisProvider {
    fn name(&self) -> &'static str {
        "arcgis"
    }

    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        let url = endpoint(
            &self.base_url,
            "findAddressCandidates",
            &[("SingleLine", query), ("f", "json"), ("maxLocations", "1")],
        )?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(GeocodeError::Status {
                provider: self.name(),
                status: response.status().as_u16(),
            });
        }

        let body: ArcGisResponse = response.json().await?;

        // ArcGIS reports errors inside a 200 response
        if let Some(error) = body.error {
            return Err(GeocodeError::Parse {
                provider: self.name(),
                message: error.to_string(),
            });
        }

        match body.candidates.into_iter().next() {
            Some(c) => Ok(GeoPoint::from_parts(Some(c.location.y), Some(c.location.x))),
            None => {
                debug!("arcgis: no match for '{}'", query);
                Ok(None)
            }
        }
    }
}
