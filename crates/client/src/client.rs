//! Comparison backend API client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use veriroute_engine::model::{AccuracyCategory, ComparisonResult, GeocodeStatus};

use crate::auth::{load_auth, AuthCredentials};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    /// No saved credentials.
    NotAuthenticated,
    /// Backend rejected the token (HTTP 401). A session problem, never a
    /// data error — callers hand this to the session layer and abandon the
    /// run.
    Unauthorized,
    /// Could not reach the backend at all. Fatal to the run as a whole.
    Network(String),
    /// Unexpected HTTP status.
    Http(u16, String),
    /// Response body did not parse.
    Parse(String),
    /// Backend-side validation failure (4xx with message).
    Validation(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "not authenticated — run `vroute login` first"),
            Self::Unauthorized => write!(f, "session expired — log in again"),
            Self::Network(msg) => write!(f, "cannot reach backend: {msg}"),
            Self::Http(code, msg) => write!(f, "HTTP {code}: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Validation(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

// ── Wire shapes ─────────────────────────────────────────────────────

/// One item of a `POST /api/compare` request.
#[derive(Debug, Clone, Serialize)]
pub struct CompareItem {
    pub id: String,
    pub system_address: String,
    pub field_lat: f64,
    pub field_lng: f64,
}

#[derive(Debug, Serialize)]
struct CompareRequest<'a> {
    items: &'a [CompareItem],
}

/// One backend comparison result. The backend reports distance in
/// kilometers; conversion to meters happens exactly once, in
/// [`CompareOutcome::to_comparison_result`].
#[derive(Debug, Clone, Deserialize)]
pub struct CompareOutcome {
    pub id: String,
    pub system_address: String,
    #[serde(default)]
    pub geo_lat: Option<f64>,
    #[serde(default)]
    pub geo_lng: Option<f64>,
    #[serde(default)]
    pub field_lat: Option<f64>,
    #[serde(default)]
    pub field_lng: Option<f64>,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub accuracy_level: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompareResponse {
    results: Vec<CompareOutcome>,
}

impl CompareOutcome {
    pub fn is_error(&self) -> bool {
        self.error.as_deref().map(|e| !e.is_empty()).unwrap_or(false)
    }

    pub fn to_comparison_result(&self, recipient_name: &str) -> ComparisonResult {
        if self.is_error() {
            return ComparisonResult {
                connote: self.id.clone(),
                recipient_name: recipient_name.to_string(),
                system_address: self.system_address.clone(),
                system_lat: None,
                system_lng: None,
                field_lat: self.field_lat,
                field_lng: self.field_lng,
                distance_meters: None,
                category: AccuracyCategory::Error,
                geocode_status: GeocodeStatus::Error,
                provider: None,
            };
        }

        let category = self
            .accuracy_level
            .as_deref()
            .and_then(AccuracyCategory::from_wire)
            .unwrap_or(AccuracyCategory::Error);

        ComparisonResult {
            connote: self.id.clone(),
            recipient_name: recipient_name.to_string(),
            system_address: self.system_address.clone(),
            system_lat: self.geo_lat,
            system_lng: self.geo_lng,
            field_lat: self.field_lat,
            field_lng: self.field_lng,
            distance_meters: self.distance_km.map(|km| km * 1000.0),
            category,
            geocode_status: GeocodeStatus::Done,
            provider: self.provider.clone(),
        }
    }
}

/// Server-side batch, the durable shape a run maps into.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// One record within a server-side batch, backend-canonical names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub connote: String,
    #[serde(default)]
    pub recipient_name: String,
    #[serde(default)]
    pub system_address: String,
    #[serde(default)]
    pub system_lat: Option<f64>,
    #[serde(default)]
    pub system_lng: Option<f64>,
    #[serde(default)]
    pub field_lat: Option<f64>,
    #[serde(default)]
    pub field_lng: Option<f64>,
    #[serde(default)]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub accuracy_level: Option<String>,
    #[serde(default)]
    pub geocode_status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BatchItem {
    pub fn to_comparison_result(&self) -> ComparisonResult {
        let failed = self.error.as_deref().map(|e| !e.is_empty()).unwrap_or(false);

        let category = if failed {
            AccuracyCategory::Error
        } else {
            self.accuracy_level
                .as_deref()
                .and_then(AccuracyCategory::from_wire)
                .unwrap_or(AccuracyCategory::Pending)
        };

        let geocode_status = match self.geocode_status.as_deref() {
            _ if failed => GeocodeStatus::Error,
            Some("completed") | Some("done") => GeocodeStatus::Done,
            Some("loading") => GeocodeStatus::Loading,
            Some("failed") | Some("error") => GeocodeStatus::Error,
            _ => GeocodeStatus::Pending,
        };

        ComparisonResult {
            connote: self.connote.clone(),
            recipient_name: self.recipient_name.clone(),
            system_address: self.system_address.clone(),
            system_lat: self.system_lat,
            system_lng: self.system_lng,
            field_lat: self.field_lat,
            field_lng: self.field_lng,
            distance_meters: self.distance_km.map(|km| km * 1000.0),
            category,
            geocode_status,
            provider: None,
        }
    }
}

/// System-side upload row for a batch.
#[derive(Debug, Clone, Serialize)]
pub struct SystemUpload {
    pub connote: String,
    pub recipient_name: String,
    pub system_address: String,
}

/// Field-side upload row for a batch.
#[derive(Debug, Clone, Serialize)]
pub struct FieldUpload {
    pub connote: String,
    pub field_lat: f64,
    pub field_lng: f64,
}

// ── Client ──────────────────────────────────────────────────────────

/// Comparison backend client (blocking).
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::blocking::Client,
    api_base: String,
    token: String,
}

impl ApiClient {
    /// Create a client from saved auth credentials.
    pub fn from_saved_auth() -> Result<Self, ApiError> {
        let creds = load_auth().ok_or(ApiError::NotAuthenticated)?;
        Ok(Self::new(creds))
    }

    pub fn new(creds: AuthCredentials) -> Self {
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("veriroute/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            api_base: creds.api_base,
            token: creds.token,
        }
    }

    /// One-shot comparison of matched items.
    pub fn compare(&self, items: &[CompareItem]) -> Result<Vec<CompareOutcome>, ApiError> {
        let url = format!("{}/api/compare", self.api_base);
        let body = serde_json::to_value(CompareRequest { items })
            .map_err(|e| ApiError::Parse(e.to_string()))?;
        let resp = self.post_json(&url, &body)?;
        let parsed: CompareResponse = resp.json().map_err(|e| ApiError::Parse(e.to_string()))?;
        Ok(parsed.results)
    }

    pub fn create_batch(&self, name: &str) -> Result<Batch, ApiError> {
        let url = format!("{}/api/batches", self.api_base);
        let resp = self.post_json(&url, &serde_json::json!({ "name": name }))?;
        resp.json().map_err(|e| ApiError::Parse(e.to_string()))
    }

    pub fn get_batch(&self, batch_id: &str) -> Result<Batch, ApiError> {
        let url = format!("{}/api/batches/{}", self.api_base, batch_id);
        let resp = self.get(&url)?;
        resp.json().map_err(|e| ApiError::Parse(e.to_string()))
    }

    pub fn upload_system_data(
        &self,
        batch_id: &str,
        records: &[SystemUpload],
    ) -> Result<(), ApiError> {
        let url = format!("{}/api/batches/{}/system-data", self.api_base, batch_id);
        let body = serde_json::json!({ "records": records });
        self.post_json(&url, &body)?;
        Ok(())
    }

    pub fn upload_field_data(
        &self,
        batch_id: &str,
        records: &[FieldUpload],
    ) -> Result<(), ApiError> {
        let url = format!("{}/api/batches/{}/field-data", self.api_base, batch_id);
        let body = serde_json::json!({ "records": records });
        self.post_json(&url, &body)?;
        Ok(())
    }

    /// Kick off server-side geocoding and classification.
    pub fn process_batch(&self, batch_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/api/batches/{}/process", self.api_base, batch_id);
        self.post_json(&url, &serde_json::json!({}))?;
        Ok(())
    }

    pub fn batch_results(&self, batch_id: &str) -> Result<Vec<BatchItem>, ApiError> {
        let url = format!("{}/api/batches/{}/results", self.api_base, batch_id);
        let resp = self.get(&url)?;
        resp.json().map_err(|e| ApiError::Parse(e.to_string()))
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, ApiError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::check_status(response)
    }

    fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::blocking::Response, ApiError> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Self::check_status(response)
    }

    fn check_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, ApiError> {
        let status = response.status().as_u16();
        if response.status().is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        match status {
            401 => Err(ApiError::Unauthorized),
            400 | 422 => Err(ApiError::Validation(body)),
            _ => Err(ApiError::Http(status, body)),
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(distance_km: f64, level: &str) -> CompareOutcome {
        CompareOutcome {
            id: "JKT-001".into(),
            system_address: "Jl. Sudirman No.1, Jakarta".into(),
            geo_lat: Some(-6.2090),
            geo_lng: Some(106.8455),
            field_lat: Some(-6.2087941),
            field_lng: Some(106.845598),
            distance_km: Some(distance_km),
            accuracy_level: Some(level.into()),
            provider: Some("Nominatim".into()),
            error: None,
        }
    }

    #[test]
    fn distance_km_converts_to_meters() {
        let result = outcome(0.025, "accurate").to_comparison_result("Budi");
        assert_eq!(result.distance_meters, Some(25.0));
        assert_eq!(result.category, AccuracyCategory::Accurate);
        assert_eq!(result.geocode_status, GeocodeStatus::Done);
        assert_eq!(result.provider.as_deref(), Some("Nominatim"));
    }

    #[test]
    fn accuracy_levels_map_onto_categories() {
        for (level, expected) in [
            ("accurate", AccuracyCategory::Accurate),
            ("fairly_accurate", AccuracyCategory::FairlyAccurate),
            ("inaccurate", AccuracyCategory::Inaccurate),
            ("error", AccuracyCategory::Error),
        ] {
            let result = outcome(0.1, level).to_comparison_result("");
            assert_eq!(result.category, expected, "level {level}");
        }
    }

    #[test]
    fn error_outcome_never_gets_a_distance() {
        let wire = CompareOutcome {
            error: Some("all configured geocoding providers failed".into()),
            ..outcome(0.5, "accurate")
        };
        let result = wire.to_comparison_result("Budi");
        assert_eq!(result.category, AccuracyCategory::Error);
        assert_eq!(result.geocode_status, GeocodeStatus::Error);
        assert!(result.distance_meters.is_none());
        assert!(result.system_lat.is_none());
    }

    #[test]
    fn batch_item_mapping() {
        let json = r#"{
            "connote": "JKT-001",
            "recipient_name": "Budi",
            "system_address": "Jl. Sudirman No.1",
            "system_lat": -6.2090,
            "system_lng": 106.8455,
            "field_lat": -6.2087941,
            "field_lng": 106.845598,
            "distance_km": 0.032,
            "accuracy_level": "accurate",
            "geocode_status": "completed",
            "error": ""
        }"#;
        let item: BatchItem = serde_json::from_str(json).unwrap();
        let result = item.to_comparison_result();
        assert_eq!(result.connote, "JKT-001");
        assert_eq!(result.distance_meters, Some(32.0));
        assert_eq!(result.category, AccuracyCategory::Accurate);
        assert_eq!(result.geocode_status, GeocodeStatus::Done);
    }

    #[test]
    fn batch_item_with_error_string() {
        let json = r#"{
            "connote": "JKT-002",
            "geocode_status": "failed",
            "error": "address not found"
        }"#;
        let item: BatchItem = serde_json::from_str(json).unwrap();
        let result = item.to_comparison_result();
        assert_eq!(result.category, AccuracyCategory::Error);
        assert_eq!(result.geocode_status, GeocodeStatus::Error);
    }

    #[test]
    fn compare_request_shape() {
        let items = vec![CompareItem {
            id: "JKT-001".into(),
            system_address: "Jl. Sudirman No.1".into(),
            field_lat: -6.2087941,
            field_lng: 106.845598,
        }];
        let json = serde_json::to_value(CompareRequest { items: &items }).unwrap();
        assert!(json["items"].is_array());
        assert_eq!(json["items"][0]["id"], "JKT-001");
        assert_eq!(json["items"][0]["system_address"], "Jl. Sudirman No.1");
        assert!(json["items"][0]["field_lat"].is_number());
    }
}
