use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Per-record geocoding lifecycle. Terminal states are `Done` and `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeocodeStatus {
    Pending,
    Loading,
    Done,
    Error,
}

impl GeocodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Loading => "loading",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "loading" => Some(Self::Loading),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for GeocodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One shipment as recorded in the operational system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemRecord {
    pub connote: String,
    pub recipient_name: String,
    pub address: String,
    pub city: String,
    pub province: String,
    pub geocode_status: GeocodeStatus,
}

/// The same shipment as reported from the field, with GPS coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldRecord {
    pub connote: String,
    pub lat: f64,
    pub lng: f64,
    pub reported_by: Option<String>,
    pub report_date: Option<String>,
}

/// Connote equality is the sole join key: uppercased and trimmed before any
/// comparison.
pub fn normalize_connote(raw: &str) -> String {
    raw.trim().to_uppercase()
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyCategory {
    Accurate,
    FairlyAccurate,
    Inaccurate,
    Pending,
    Error,
}

impl AccuracyCategory {
    /// Human label for exports and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Accurate => "Accurate",
            Self::FairlyAccurate => "Fairly accurate",
            Self::Inaccurate => "Inaccurate",
            Self::Pending => "Pending",
            Self::Error => "Error",
        }
    }

    /// Wire name, matching the backend's `accuracy_level` values.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accurate => "accurate",
            Self::FairlyAccurate => "fairly_accurate",
            Self::Inaccurate => "inaccurate",
            Self::Pending => "pending",
            Self::Error => "error",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "accurate" => Some(Self::Accurate),
            "fairly_accurate" => Some(Self::FairlyAccurate),
            "inaccurate" => Some(Self::Inaccurate),
            "pending" => Some(Self::Pending),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for AccuracyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One reconciled (or unreconciled) connote — the unit of output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub connote: String,
    pub recipient_name: String,
    pub system_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_lng: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_meters: Option<f64>,
    pub category: AccuracyCategory,
    pub geocode_status: GeocodeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ComparisonResult {
    /// Initial state for a matched record awaiting geocoding.
    pub fn pending(system: &SystemRecord, system_address: String, field: &FieldRecord) -> Self {
        Self {
            connote: system.connote.clone(),
            recipient_name: system.recipient_name.clone(),
            system_address,
            system_lat: None,
            system_lng: None,
            field_lat: Some(field.lat),
            field_lng: Some(field.lng),
            distance_meters: None,
            category: AccuracyCategory::Pending,
            geocode_status: GeocodeStatus::Pending,
            provider: None,
        }
    }

    /// A system record with no field counterpart. Never geocoded: there is
    /// nothing to compare against.
    pub fn unmatched(system: &SystemRecord, system_address: String) -> Self {
        Self {
            connote: system.connote.clone(),
            recipient_name: system.recipient_name.clone(),
            system_address,
            system_lat: None,
            system_lng: None,
            field_lat: None,
            field_lng: None,
            distance_meters: None,
            category: AccuracyCategory::Error,
            geocode_status: GeocodeStatus::Error,
            provider: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// Pure projection over a result set. Always satisfies
/// `total == accurate + fairly_accurate + inaccurate + pending + error`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub total: usize,
    pub accurate: usize,
    pub fairly_accurate: usize,
    pub inaccurate: usize,
    pub pending: usize,
    pub error: usize,
}

// ---------------------------------------------------------------------------
// Run report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

/// Full output of one reconciliation run, in system-input order.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub meta: RunMeta,
    pub stats: DashboardStats,
    pub results: Vec<ComparisonResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connote_normalization() {
        assert_eq!(normalize_connote(" jkt-001 "), "JKT-001");
        assert_eq!(normalize_connote("JKT-001"), "JKT-001");
        assert_eq!(normalize_connote("jkt-001"), "JKT-001");
    }

    #[test]
    fn category_wire_names() {
        assert_eq!(AccuracyCategory::FairlyAccurate.as_str(), "fairly_accurate");
        assert_eq!(
            AccuracyCategory::from_wire("fairly_accurate"),
            Some(AccuracyCategory::FairlyAccurate)
        );
        assert_eq!(AccuracyCategory::from_wire("bogus"), None);

        // serde uses the same snake_case names as the backend
        let json = serde_json::to_value(AccuracyCategory::FairlyAccurate).unwrap();
        assert_eq!(json, serde_json::json!("fairly_accurate"));
    }

    #[test]
    fn category_labels() {
        assert_eq!(AccuracyCategory::FairlyAccurate.label(), "Fairly accurate");
        assert_eq!(AccuracyCategory::Error.label(), "Error");
    }

    #[test]
    fn unmatched_result_is_terminal_error() {
        let sys = SystemRecord {
            connote: "JKT-001".into(),
            recipient_name: "Budi".into(),
            address: "Jl. Sudirman No.1".into(),
            city: "Jakarta".into(),
            province: "DKI Jakarta".into(),
            geocode_status: GeocodeStatus::Pending,
        };
        let r = ComparisonResult::unmatched(&sys, "Jl. Sudirman No.1, Jakarta, DKI Jakarta".into());
        assert_eq!(r.category, AccuracyCategory::Error);
        assert_eq!(r.geocode_status, GeocodeStatus::Error);
        assert!(r.field_lat.is_none());
        assert!(r.distance_meters.is_none());
    }
}
