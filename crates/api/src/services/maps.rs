//! Google Maps client: geocoding, reverse geocoding, directions and
//! map-link resolution.
//!
//! Geocoding answers are cached for 24 hours; addresses and coordinates
//! rarely move.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use bazaar_core::{Coordinates, extract_coordinates, is_short_map_link};

use crate::config::MapsConfig;

const MAPS_API_BASE: &str = "https://maps.googleapis.com/maps/api";

/// Errors that can occur when talking to Google Maps.
#[derive(Debug, Error)]
pub enum MapsError {
    /// Google found nothing for the query.
    #[error("no results")]
    NoResults,

    /// A map link without recognizable coordinates.
    #[error("{0}")]
    InvalidLink(String),

    /// HTTP request failed.
    #[error("Google Maps request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Google answered with an error status.
    #[error("Google Maps API error: {0}")]
    Api(String),
}

/// A geocoded place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Place {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
}

/// A driving route.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub distance_meters: u64,
    pub duration_seconds: u64,
    /// Encoded overview polyline.
    pub polyline: String,
    pub summary: String,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeResult>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    formatted_address: String,
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    routes: Vec<DirectionsRoute>,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DirectionsRoute {
    #[serde(default)]
    summary: String,
    overview_polyline: Polyline,
    #[serde(default)]
    legs: Vec<Leg>,
}

#[derive(Debug, Deserialize)]
struct Polyline {
    points: String,
}

#[derive(Debug, Deserialize)]
struct Leg {
    distance: Measure,
    duration: Measure,
}

#[derive(Debug, Deserialize)]
struct Measure {
    value: u64,
}

/// Google Maps API client.
#[derive(Clone)]
pub struct MapsClient {
    inner: Arc<MapsClientInner>,
}

struct MapsClientInner {
    client: Client,
    api_key: SecretString,
    base_url: String,
    places: Cache<String, Place>,
    addresses: Cache<String, String>,
}

impl std::fmt::Debug for MapsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapsClient")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl MapsClient {
    /// Create a new client.
    #[must_use]
    pub fn new(client: Client, config: &MapsConfig) -> Self {
        Self::with_base_url(client, config, MAPS_API_BASE)
    }

    /// Create a client against another base URL (tests, proxies).
    #[must_use]
    pub fn with_base_url(client: Client, config: &MapsConfig, base_url: &str) -> Self {
        let cache_ttl = Duration::from_secs(24 * 60 * 60);

        Self {
            inner: Arc::new(MapsClientInner {
                client,
                api_key: config.api_key.clone(),
                base_url: base_url.trim_end_matches('/').to_string(),
                places: Cache::builder()
                    .max_capacity(10_000)
                    .time_to_live(cache_ttl)
                    .build(),
                addresses: Cache::builder()
                    .max_capacity(10_000)
                    .time_to_live(cache_ttl)
                    .build(),
            }),
        }
    }

    /// Forward-geocode a free-form address.
    ///
    /// # Errors
    ///
    /// Returns `MapsError::NoResults` when Google finds nothing.
    #[instrument(skip(self))]
    pub async fn geocode(&self, address: &str) -> Result<Place, MapsError> {
        let key = address.trim().to_lowercase();
        if let Some(place) = self.inner.places.get(&key).await {
            debug!("Geocode cache hit");
            return Ok(place);
        }

        let response: GeocodeResponse = self
            .get("geocode/json", &[("address", address.trim())])
            .await?;
        let place = first_place(response)?;

        self.inner.places.insert(key, place.clone()).await;
        Ok(place)
    }

    /// Reverse-geocode coordinates to a formatted address.
    ///
    /// # Errors
    ///
    /// Returns `MapsError::NoResults` when Google finds nothing.
    #[instrument(skip(self))]
    pub async fn reverse_geocode(&self, at: Coordinates) -> Result<String, MapsError> {
        // ~1 m precision is plenty for an address lookup.
        let key = format!("{:.5},{:.5}", at.latitude, at.longitude);
        if let Some(address) = self.inner.addresses.get(&key).await {
            debug!("Reverse geocode cache hit");
            return Ok(address);
        }

        let response: GeocodeResponse = self
            .get("geocode/json", &[("latlng", at.to_query_value().as_str())])
            .await?;
        let address = first_place(response)?.formatted_address;

        self.inner.addresses.insert(key, address.clone()).await;
        Ok(address)
    }

    /// Driving directions between two points.
    ///
    /// # Errors
    ///
    /// Returns `MapsError::NoResults` when no route exists.
    #[instrument(skip(self))]
    pub async fn directions(
        &self,
        origin: Coordinates,
        destination: Coordinates,
    ) -> Result<Route, MapsError> {
        let response: DirectionsResponse = self
            .get(
                "directions/json",
                &[
                    ("origin", origin.to_query_value().as_str()),
                    ("destination", destination.to_query_value().as_str()),
                ],
            )
            .await?;
        first_route(response)
    }

    /// Pull coordinates out of a map link, following short-link redirects.
    ///
    /// # Errors
    ///
    /// Returns `MapsError::InvalidLink` when no coordinates can be found.
    #[instrument(skip(self))]
    pub async fn extract_from_link(&self, link: &str) -> Result<Coordinates, MapsError> {
        let link = link.trim();
        if let Some(found) = extract_coordinates(link) {
            return Ok(found);
        }
        if !is_short_map_link(link) {
            return Err(MapsError::InvalidLink(
                "no coordinates found in link".to_string(),
            ));
        }

        let response = self.inner.client.get(link).send().await?;
        let resolved = response.url().to_string();
        debug!(resolved = %resolved, "Short map link resolved");
        if let Some(found) = extract_coordinates(&resolved) {
            return Ok(found);
        }

        // Some short links land on an interstitial that embeds the target.
        let body = response.text().await.unwrap_or_default();
        extract_coordinates(&body)
            .ok_or_else(|| MapsError::InvalidLink("no coordinates found in link".to_string()))
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, MapsError> {
        let response = self
            .inner
            .client
            .get(format!("{}/{path}", self.inner.base_url))
            .query(params)
            .query(&[("key", self.inner.api_key.expose_secret())])
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }
}

/// Map Google's `status` field onto our errors.
fn check_status(status: &str, error_message: Option<String>) -> Result<(), MapsError> {
    match status {
        "OK" => Ok(()),
        "ZERO_RESULTS" | "NOT_FOUND" => Err(MapsError::NoResults),
        other => {
            let message = error_message.unwrap_or_else(|| other.to_string());
            warn!(status = %other, message = %message, "Google Maps error status");
            Err(MapsError::Api(message))
        }
    }
}

fn first_place(response: GeocodeResponse) -> Result<Place, MapsError> {
    check_status(&response.status, response.error_message)?;
    let result = response.results.into_iter().next().ok_or(MapsError::NoResults)?;
    Ok(Place {
        latitude: result.geometry.location.lat,
        longitude: result.geometry.location.lng,
        formatted_address: result.formatted_address,
    })
}

fn first_route(response: DirectionsResponse) -> Result<Route, MapsError> {
    check_status(&response.status, response.error_message)?;
    let route = response.routes.into_iter().next().ok_or(MapsError::NoResults)?;
    Ok(Route {
        distance_meters: route.legs.iter().map(|l| l.distance.value).sum(),
        duration_seconds: route.legs.iter().map(|l| l.duration.value).sum(),
        polyline: route.overview_polyline.points,
        summary: route.summary,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_first_place() {
        let response: GeocodeResponse = serde_json::from_str(
            r#"{
                "status": "OK",
                "results": [{
                    "formatted_address": "MG Road, Bengaluru",
                    "geometry": {"location": {"lat": 12.9756, "lng": 77.6050}}
                }]
            }"#,
        )
        .unwrap();
        let place = first_place(response).unwrap();
        assert_eq!(place.formatted_address, "MG Road, Bengaluru");
        assert!((place.latitude - 12.9756).abs() < 1e-9);
    }

    #[test]
    fn test_zero_results() {
        let response: GeocodeResponse =
            serde_json::from_str(r#"{"status": "ZERO_RESULTS", "results": []}"#).unwrap();
        assert!(matches!(first_place(response), Err(MapsError::NoResults)));
    }

    #[test]
    fn test_denied_is_api_error() {
        let response: GeocodeResponse = serde_json::from_str(
            r#"{"status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."}"#,
        )
        .unwrap();
        match first_place(response) {
            Err(MapsError::Api(msg)) => assert!(msg.contains("API key")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_route_sums_legs() {
        let response: DirectionsResponse = serde_json::from_str(
            r#"{
                "status": "OK",
                "routes": [{
                    "summary": "NH 48",
                    "overview_polyline": {"points": "abc"},
                    "legs": [
                        {"distance": {"value": 1000, "text": "1 km"}, "duration": {"value": 120, "text": "2 mins"}},
                        {"distance": {"value": 500, "text": "0.5 km"}, "duration": {"value": 60, "text": "1 min"}}
                    ]
                }]
            }"#,
        )
        .unwrap();
        let route = first_route(response).unwrap();
        assert_eq!(route.distance_meters, 1500);
        assert_eq!(route.duration_seconds, 180);
        assert_eq!(route.summary, "NH 48");
    }

    #[tokio::test]
    async fn test_extract_without_network() {
        let client = MapsClient::new(
            Client::new(),
            &MapsConfig {
                api_key: SecretString::from("test"),
            },
        );
        let found = client
            .extract_from_link("https://www.google.com/maps/@12.9716,77.5946,15z")
            .await
            .unwrap();
        assert!((found.latitude - 12.9716).abs() < 1e-9);

        assert!(matches!(
            client.extract_from_link("https://example.com/nothing").await,
            Err(MapsError::InvalidLink(_))
        ));
    }
}
