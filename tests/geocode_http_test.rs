use std::time::Duration;

use districtmap::config::GeocodingConfig;
use districtmap::geocode::{
    ArcGisProvider, GeocodeCache, GeocodeError, GeocodeProvider, Geocoder, NominatimProvider,
};
use districtmap::models::{GeoPoint, Record};
use httpmock::prelude::*;
use indicatif::ProgressBar;
use tempfile::TempDir;

fn config_for(server: &MockServer) -> GeocodingConfig {
    GeocodingConfig {
        city_hint: "Łódź, Polska".to_string(),
        nominatim_url: server.url("/osm"),
        arcgis_url: server.url("/arc"),
        min_delay_secs: 0.0,
        error_wait_secs: 0.0,
        max_retries: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_nominatim_parses_first_hit() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/search")
                .query_param("q", "Piotrkowska 12, Łódź")
                .query_param("format", "json")
                .header("user-agent", "districtmap-test");
            then.status(200).json_body(serde_json::json!([
                {"lat": "51.7592", "lon": "19.4560", "display_name": "Piotrkowska 12"},
                {"lat": "0", "lon": "0"}
            ]));
        })
        .await;

    let provider =
        NominatimProvider::new(&server.base_url(), "districtmap-test", Duration::from_secs(5))
            .unwrap();
    let point = provider.geocode("Piotrkowska 12, Łódź").await.unwrap();

    mock.assert_async().await;
    assert_eq!(point, Some(GeoPoint::new(51.7592, 19.456)));
}

#[tokio::test]
async fn test_nominatim_empty_and_error_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/search").query_param("q", "nowhere");
            then.status(200).json_body(serde_json::json!([]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/search").query_param("q", "busy");
            then.status(429);
        })
        .await;

    let provider =
        NominatimProvider::new(&server.base_url(), "districtmap-test", Duration::from_secs(5))
            .unwrap();

    assert_eq!(provider.geocode("nowhere").await.unwrap(), None);
    assert!(matches!(
        provider.geocode("busy").await,
        Err(GeocodeError::Status { status: 429, .. })
    ));
}

#[tokio::test]
async fn test_arcgis_candidate_and_embedded_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/findAddressCandidates")
                .query_param("SingleLine", "Zgierska 5, Łódź")
                .query_param("f", "json");
            then.status(200).json_body(serde_json::json!({
                "candidates": [
                    {"address": "Zgierska 5", "location": {"x": 19.45, "y": 51.79}, "score": 100}
                ]
            }));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/findAddressCandidates")
                .query_param("SingleLine", "broken");
            then.status(200).json_body(serde_json::json!({
                "error": {"code": 498, "message": "Invalid token"}
            }));
        })
        .await;

    let provider =
        ArcGisProvider::new(&server.base_url(), "districtmap-test", Duration::from_secs(5))
            .unwrap();

    assert_eq!(
        provider.geocode("Zgierska 5, Łódź").await.unwrap(),
        Some(GeoPoint::new(51.79, 19.45))
    );
    assert!(matches!(
        provider.geocode("broken").await,
        Err(GeocodeError::Parse { .. })
    ));
}

#[tokio::test]
async fn test_geocoder_falls_back_and_caches() {
    let server = MockServer::start_async().await;

    // Nominatim knows nothing and fails once for the street-only query
    let osm_full = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/osm/search")
                .query_param("q", "Zgierska 5, Łódź, Polska");
            then.status(200).json_body(serde_json::json!([]));
        })
        .await;
    let osm_street = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/osm/search")
                .query_param("q", "Zgierska, Łódź, Polska");
            then.status(500);
        })
        .await;

    // ArcGIS misses the full address but finds the street
    let arc_full = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/arc/findAddressCandidates")
                .query_param("SingleLine", "Zgierska 5, Łódź, Polska");
            then.status(200)
                .json_body(serde_json::json!({ "candidates": [] }));
        })
        .await;
    let arc_street = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/arc/findAddressCandidates")
                .query_param("SingleLine", "Zgierska, Łódź, Polska");
            then.status(200).json_body(serde_json::json!({
                "candidates": [{"location": {"x": 19.44, "y": 51.80}}]
            }));
        })
        .await;

    let dir = TempDir::new().unwrap();
    let cache_path = dir.path().join("geocode_cache.csv");
    let mut cache = GeocodeCache::load(&cache_path).unwrap();
    let mut geocoder = Geocoder::from_config(&config_for(&server)).unwrap();

    let mut records = vec![
        Record::new(Some("ul. Zgierska 5".into()), Some("sklep".into()), None),
        Record::new(Some("ul. Zgierska 5".into()), Some("bar".into()), None),
    ];

    let stats = geocoder
        .geocode_records(&mut records, &mut cache, &ProgressBar::hidden())
        .await
        .unwrap();

    assert_eq!(stats.unique, 1);
    assert_eq!(stats.resolved, 1);
    osm_full.assert_hits_async(1).await;
    // One try plus one retry before giving up
    osm_street.assert_hits_async(2).await;
    arc_full.assert_hits_async(1).await;
    arc_street.assert_hits_async(1).await;

    let expected = Some(GeoPoint::new(51.80, 19.44));
    assert_eq!(records[0].location, expected);
    assert_eq!(records[1].location, expected);

    // Second run is served entirely from the cache file
    let mut cache = GeocodeCache::load(&cache_path).unwrap();
    let mut records = vec![Record::new(Some("ul. Zgierska 5".into()), None, None)];
    let stats = geocoder
        .geocode_records(&mut records, &mut cache, &ProgressBar::hidden())
        .await
        .unwrap();

    assert_eq!(stats.cached, 1);
    arc_street.assert_hits_async(1).await;
    assert_eq!(records[0].location, expected);
}
