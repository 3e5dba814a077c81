//! Free-text place resolution.
//!
//! Coordinate-shaped input is recognized locally and never sent to a
//! geocoder; everything else goes through the keyed geocoder when a key
//! is configured, then the keyless one. Geocoder trouble degrades to a
//! miss, so the only outcome here is "a location" or "not found".

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::{Config, ServiceId};
use crate::model::Location;
use crate::provider::http_client;

const GOOGLE_BASE_URL: &str = "https://maps.googleapis.com";
const GEO_SEARCH_BASE_URL: &str = "https://geocoding-api.open-meteo.com";
/// Candidate count for suggestion lookups.
const SUGGESTION_LIMIT: usize = 5;

#[derive(Debug, Clone)]
pub struct PlaceResolver {
    http: Client,
    geocoder_key: Option<String>,
    google_base: String,
    geo_search_base: String,
}

impl PlaceResolver {
    pub fn new(config: &Config) -> Self {
        Self {
            http: http_client(),
            geocoder_key: config.api_key(ServiceId::Geocoder).map(str::to_owned),
            google_base: GOOGLE_BASE_URL.to_string(),
            geo_search_base: GEO_SEARCH_BASE_URL.to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_base_urls(
        geocoder_key: Option<String>,
        google_base: &str,
        geo_search_base: &str,
    ) -> Self {
        Self {
            http: http_client(),
            geocoder_key,
            google_base: google_base.to_string(),
            geo_search_base: geo_search_base.to_string(),
        }
    }

    /// Resolve free text into a location, or `None` when nothing matched.
    ///
    /// Literal coordinates keep `city` and `region` unset; only geocoded
    /// queries carry place names.
    pub async fn resolve(&self, query: &str) -> Option<Location> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Some(location) = parse_literal_pair(trimmed).or_else(|| parse_cardinal_pair(trimmed))
        {
            debug!(
                "query {trimmed:?} parsed as coordinates ({}, {})",
                location.latitude, location.longitude
            );
            return Some(location);
        }

        if let Some(location) = self.query_google(trimmed).await {
            return Some(location);
        }
        self.geo_search_candidates(trimmed, 1).await.into_iter().next()
    }

    /// Candidate locations for a partially typed query.
    pub async fn suggest(&self, query: &str) -> Vec<Location> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        self.geo_search_candidates(trimmed, SUGGESTION_LIMIT).await
    }

    async fn query_google(&self, query: &str) -> Option<Location> {
        let key = self.geocoder_key.as_deref()?;
        debug!("querying the keyed geocoder for {query:?}");

        let url = format!("{}/maps/api/geocode/json", self.google_base);
        let res = match self
            .http
            .get(&url)
            .query(&[("address", query), ("key", key)])
            .send()
            .await
        {
            Ok(res) => res,
            Err(err) => {
                debug!("keyed geocoder request failed: {err}");
                return None;
            }
        };

        if !res.status().is_success() {
            debug!("keyed geocoder returned status {}", res.status());
            return None;
        }

        let parsed: GoogleGeocodeResponse = match res.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!("keyed geocoder response did not parse: {err}");
                return None;
            }
        };

        let result = parsed.results.into_iter().next()?;
        let city = result.component("locality");
        let region = result
            .component("administrative_area_level_1")
            .or_else(|| result.component("country"));

        Some(Location {
            latitude: result.geometry.location.lat,
            longitude: result.geometry.location.lng,
            city,
            region,
        })
    }

    /// Up to `limit` candidates from the keyless geocoder; empty on any
    /// kind of failure.
    async fn geo_search_candidates(&self, query: &str, limit: usize) -> Vec<Location> {
        debug!("querying the keyless geocoder for {query:?}");
        let count = limit.to_string();

        let url = format!("{}/v1/search", self.geo_search_base);
        let res = match self
            .http
            .get(&url)
            .query(&[
                ("name", query),
                ("count", count.as_str()),
                ("language", "en"),
                ("format", "json"),
            ])
            .send()
            .await
        {
            Ok(res) => res,
            Err(err) => {
                debug!("keyless geocoder request failed: {err}");
                return Vec::new();
            }
        };

        if !res.status().is_success() {
            debug!("keyless geocoder returned status {}", res.status());
            return Vec::new();
        }

        let parsed: GeoSearchResponse = match res.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                debug!("keyless geocoder response did not parse: {err}");
                return Vec::new();
            }
        };

        parsed
            .results
            .unwrap_or_default()
            .into_iter()
            .take(limit)
            .map(|result| Location {
                latitude: result.latitude,
                longitude: result.longitude,
                city: Some(result.name),
                region: result.admin1.or(result.country),
            })
            .collect()
    }
}

fn in_range(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

/// `"16.4634, 80.5067"`: signed decimal degrees, comma separated.
fn parse_literal_pair(text: &str) -> Option<Location> {
    let (lat_raw, lon_raw) = text.split_once(',')?;
    let latitude = parse_component(lat_raw, 2)?;
    let longitude = parse_component(lon_raw, 3)?;
    in_range(latitude, longitude).then(|| Location::new(latitude, longitude))
}

/// `"40.71°N, 74.01°W"`: unsigned decimal degrees with a cardinal suffix
/// deciding the sign. The degree sign is optional and case is ignored.
fn parse_cardinal_pair(text: &str) -> Option<Location> {
    let (lat_raw, lon_raw) = text.split_once(',')?;
    let latitude = parse_cardinal_component(lat_raw, 2, 'N', 'S')?;
    let longitude = parse_cardinal_component(lon_raw, 3, 'E', 'W')?;
    in_range(latitude, longitude).then(|| Location::new(latitude, longitude))
}

/// Strict decimal-degree parser: an optional leading minus, one to
/// `max_int_digits` integer digits, and an optional fraction. Anything
/// looser is left to the geocoders.
fn parse_component(raw: &str, max_int_digits: usize) -> Option<f64> {
    let raw = raw.trim();
    let unsigned = raw.strip_prefix('-').unwrap_or(raw);
    if unsigned.is_empty() {
        return None;
    }

    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (unsigned, None),
    };

    if int_part.is_empty()
        || int_part.len() > max_int_digits
        || !int_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    if let Some(frac) = frac_part {
        if frac.is_empty() || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }

    raw.parse().ok()
}

fn parse_cardinal_component(
    raw: &str,
    max_int_digits: usize,
    positive: char,
    negative: char,
) -> Option<f64> {
    let raw = raw.trim();
    let last = raw.chars().last()?;
    let sign = match last.to_ascii_uppercase() {
        c if c == positive => 1.0,
        c if c == negative => -1.0,
        _ => return None,
    };

    let body = raw[..raw.len() - last.len_utf8()].trim_end();
    let body = body.strip_suffix('°').unwrap_or(body).trim_end();
    // The cardinal form is unsigned; the suffix alone carries the sign.
    if body.starts_with('-') {
        return None;
    }

    Some(sign * parse_component(body, max_int_digits)?)
}

#[derive(Debug, Deserialize)]
struct GoogleGeocodeResponse {
    #[serde(default)]
    results: Vec<GoogleResult>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    geometry: GoogleGeometry,
    #[serde(default)]
    address_components: Vec<GoogleComponent>,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLatLng,
}

#[derive(Debug, Deserialize)]
struct GoogleLatLng {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct GoogleComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

impl GoogleResult {
    fn component(&self, kind: &str) -> Option<String> {
        self.address_components
            .iter()
            .find(|component| component.types.iter().any(|t| t == kind))
            .map(|component| component.long_name.clone())
    }
}

#[derive(Debug, Deserialize)]
struct GeoSearchResponse {
    results: Option<Vec<GeoSearchResult>>,
}

#[derive(Debug, Deserialize)]
struct GeoSearchResult {
    name: String,
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    admin1: Option<String>,
    #[serde(default)]
    country: Option<String>,
}
