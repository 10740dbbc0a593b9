//! Geocoding providers.
//!
//! Each provider turns a free-text query into at most one coordinate
//! candidate. Response shapes are provider-specific; everything funnels into
//! [`GeocodeHit`]. Base URLs are injectable so tests can point at a mock
//! server.

use serde::Deserialize;

use crate::error::ProviderError;

pub const NOMINATIM_URL: &str = "https://nominatim.openstreetmap.org";
pub const GEOAPIFY_URL: &str = "https://api.geoapify.com";
pub const POSITIONSTACK_URL: &str = "https://api.positionstack.com";
pub const GOOGLE_MAPS_URL: &str = "https://maps.googleapis.com";

/// One resolved candidate, before the orchestrator attaches provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeHit {
    pub lat: f64,
    pub lng: f64,
    pub display_name: String,
}

/// A configured provider tier. Order in the waterfall is decided by the
/// orchestrator; the free tier goes first and pays the rate gate.
#[derive(Debug, Clone)]
pub enum Provider {
    Nominatim { base_url: String },
    Geoapify { base_url: String, api_key: String },
    PositionStack { base_url: String, api_key: String },
    GoogleMaps { base_url: String, api_key: String },
}

impl Provider {
    pub fn nominatim() -> Self {
        Self::Nominatim {
            base_url: NOMINATIM_URL.into(),
        }
    }

    pub fn geoapify(api_key: String) -> Self {
        Self::Geoapify {
            base_url: GEOAPIFY_URL.into(),
            api_key,
        }
    }

    pub fn positionstack(api_key: String) -> Self {
        Self::PositionStack {
            base_url: POSITIONSTACK_URL.into(),
            api_key,
        }
    }

    pub fn google_maps(api_key: String) -> Self {
        Self::GoogleMaps {
            base_url: GOOGLE_MAPS_URL.into(),
            api_key,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Nominatim { .. } => "Nominatim",
            Self::Geoapify { .. } => "Geoapify",
            Self::PositionStack { .. } => "PositionStack",
            Self::GoogleMaps { .. } => "GoogleMaps",
        }
    }

    /// Whether this tier is the free one that must respect the shared gate.
    pub fn is_rate_gated(&self) -> bool {
        matches!(self, Self::Nominatim { .. })
    }

    pub fn resolve(
        &self,
        http: &reqwest::blocking::Client,
        query: &str,
    ) -> Result<GeocodeHit, ProviderError> {
        match self {
            Self::Nominatim { base_url } => resolve_nominatim(http, base_url, query),
            Self::Geoapify { base_url, api_key } => resolve_geoapify(http, base_url, api_key, query),
            Self::PositionStack { base_url, api_key } => {
                resolve_positionstack(http, base_url, api_key, query)
            }
            Self::GoogleMaps { base_url, api_key } => {
                resolve_google_maps(http, base_url, api_key, query)
            }
        }
    }
}

// ── Nominatim ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct NominatimResult {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
}

fn resolve_nominatim(
    http: &reqwest::blocking::Client,
    base_url: &str,
    query: &str,
) -> Result<GeocodeHit, ProviderError> {
    let url = format!("{base_url}/search");
    let resp = http
        .get(&url)
        .query(&[("q", query), ("format", "json"), ("limit", "1")])
        .send()
        .map_err(|e| ProviderError::Network(e.to_string()))?;

    let status = resp.status().as_u16();
    if status == 429 {
        return Err(ProviderError::RateLimited);
    }
    if status != 200 {
        return Err(ProviderError::Http(status));
    }

    let results: Vec<NominatimResult> = resp
        .json()
        .map_err(|e| ProviderError::Parse(e.to_string()))?;
    let first = results.into_iter().next().ok_or(ProviderError::NotFound)?;

    // Coordinates arrive as strings in this API.
    let lat = first
        .lat
        .parse::<f64>()
        .map_err(|_| ProviderError::Parse(format!("bad latitude '{}'", first.lat)))?;
    let lng = first
        .lon
        .parse::<f64>()
        .map_err(|_| ProviderError::Parse(format!("bad longitude '{}'", first.lon)))?;

    Ok(GeocodeHit {
        lat,
        lng,
        display_name: first.display_name,
    })
}

// ── Geoapify ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GeoapifyResponse {
    #[serde(default)]
    features: Vec<GeoapifyFeature>,
}

#[derive(Debug, Deserialize)]
struct GeoapifyFeature {
    properties: GeoapifyProperties,
}

#[derive(Debug, Deserialize)]
struct GeoapifyProperties {
    lat: f64,
    lon: f64,
    #[serde(default)]
    formatted: String,
}

fn resolve_geoapify(
    http: &reqwest::blocking::Client,
    base_url: &str,
    api_key: &str,
    query: &str,
) -> Result<GeocodeHit, ProviderError> {
    let url = format!("{base_url}/v1/geocode/search");
    let resp = http
        .get(&url)
        .query(&[("text", query), ("apiKey", api_key), ("limit", "1")])
        .send()
        .map_err(|e| ProviderError::Network(e.to_string()))?;

    let status = resp.status().as_u16();
    if status == 429 || status == 401 {
        return Err(ProviderError::RateLimited);
    }
    if status != 200 {
        return Err(ProviderError::Http(status));
    }

    let body: GeoapifyResponse = resp
        .json()
        .map_err(|e| ProviderError::Parse(e.to_string()))?;
    let feature = body.features.into_iter().next().ok_or(ProviderError::NotFound)?;

    Ok(GeocodeHit {
        lat: feature.properties.lat,
        lng: feature.properties.lon,
        display_name: feature.properties.formatted,
    })
}

// ── PositionStack ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PositionStackResponse {
    #[serde(default)]
    data: Vec<PositionStackResult>,
}

#[derive(Debug, Deserialize)]
struct PositionStackResult {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    label: String,
}

fn resolve_positionstack(
    http: &reqwest::blocking::Client,
    base_url: &str,
    api_key: &str,
    query: &str,
) -> Result<GeocodeHit, ProviderError> {
    let url = format!("{base_url}/v1/forward");
    let resp = http
        .get(&url)
        .query(&[("access_key", api_key), ("query", query), ("limit", "1")])
        .send()
        .map_err(|e| ProviderError::Network(e.to_string()))?;

    let status = resp.status().as_u16();
    if status == 429 || status == 401 || status == 403 {
        return Err(ProviderError::RateLimited);
    }
    if status != 200 {
        return Err(ProviderError::Http(status));
    }

    let body: PositionStackResponse = resp
        .json()
        .map_err(|e| ProviderError::Parse(e.to_string()))?;
    let first = body.data.into_iter().next().ok_or(ProviderError::NotFound)?;

    Ok(GeocodeHit {
        lat: first.latitude,
        lng: first.longitude,
        display_name: first.label,
    })
}

// ── Google Maps ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    status: String,
    #[serde(default)]
    results: Vec<GoogleResult>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    geometry: GoogleGeometry,
    #[serde(default)]
    formatted_address: String,
}

#[derive(Debug, Deserialize)]
struct GoogleGeometry {
    location: GoogleLocation,
}

#[derive(Debug, Deserialize)]
struct GoogleLocation {
    lat: f64,
    lng: f64,
}

fn resolve_google_maps(
    http: &reqwest::blocking::Client,
    base_url: &str,
    api_key: &str,
    query: &str,
) -> Result<GeocodeHit, ProviderError> {
    let url = format!("{base_url}/maps/api/geocode/json");
    let resp = http
        .get(&url)
        .query(&[("address", query), ("key", api_key)])
        .send()
        .map_err(|e| ProviderError::Network(e.to_string()))?;

    let status = resp.status().as_u16();
    if status != 200 {
        return Err(ProviderError::Http(status));
    }

    let body: GoogleResponse = resp
        .json()
        .map_err(|e| ProviderError::Parse(e.to_string()))?;

    // This API reports errors in-band through the status string.
    match body.status.as_str() {
        "OK" => {}
        "ZERO_RESULTS" => return Err(ProviderError::NotFound),
        "OVER_QUERY_LIMIT" | "REQUEST_DENIED" => return Err(ProviderError::RateLimited),
        other => return Err(ProviderError::Parse(format!("API status {other}"))),
    }

    let first = body.results.into_iter().next().ok_or(ProviderError::NotFound)?;

    Ok(GeocodeHit {
        lat: first.geometry.location.lat,
        lng: first.geometry.location.lng,
        display_name: first.formatted_address,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_names() {
        assert_eq!(Provider::nominatim().name(), "Nominatim");
        assert_eq!(Provider::geoapify("k".into()).name(), "Geoapify");
        assert_eq!(Provider::positionstack("k".into()).name(), "PositionStack");
        assert_eq!(Provider::google_maps("k".into()).name(), "GoogleMaps");
    }

    #[test]
    fn only_the_free_tier_is_gated() {
        assert!(Provider::nominatim().is_rate_gated());
        assert!(!Provider::geoapify("k".into()).is_rate_gated());
        assert!(!Provider::google_maps("k".into()).is_rate_gated());
    }

    #[test]
    fn nominatim_response_parses_string_coordinates() {
        let json = r#"[{"lat":"-6.2090","lon":"106.8455","display_name":"Jalan Jenderal Sudirman"}]"#;
        let results: Vec<NominatimResult> = serde_json::from_str(json).unwrap();
        assert_eq!(results[0].lat, "-6.2090");
        assert_eq!(results[0].display_name, "Jalan Jenderal Sudirman");
    }

    #[test]
    fn google_response_shape() {
        let json = r#"{
            "status": "OK",
            "results": [{
                "formatted_address": "Jl. Jend. Sudirman, Jakarta",
                "geometry": {"location": {"lat": -6.2090, "lng": 106.8455}}
            }]
        }"#;
        let body: GoogleResponse = serde_json::from_str(json).unwrap();
        assert_eq!(body.status, "OK");
        assert_eq!(body.results[0].geometry.location.lat, -6.2090);
    }
}
