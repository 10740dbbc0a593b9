//! TOML run configuration.

use serde::Deserialize;

use crate::error::EngineError;
use crate::mapping::{AddressMapping, FieldColumnMap, MappingSource};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    pub name: String,
    pub system: DatasetConfig,
    pub field: FieldDatasetConfig,
    #[serde(default)]
    pub address: Option<AddressConfig>,
    #[serde(default)]
    pub geocode: GeocodeConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Deserialize)]
pub struct DatasetConfig {
    pub file: String,
}

#[derive(Debug, Deserialize)]
pub struct FieldDatasetConfig {
    pub file: String,
    /// Explicit coordinate-column selection. Inferred from headers when
    /// omitted.
    #[serde(default)]
    pub columns: Option<FieldColumnMap>,
}

// ---------------------------------------------------------------------------
// Address mapping
// ---------------------------------------------------------------------------

/// The authoritative address mapping for this run — exactly one per source.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressConfig {
    #[serde(default = "default_source")]
    pub source: MappingSource,
    #[serde(default)]
    pub col1: String,
    #[serde(default)]
    pub col2: String,
    #[serde(default)]
    pub col3: String,
    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_source() -> MappingSource {
    MappingSource::System
}

fn default_separator() -> String {
    ", ".into()
}

impl AddressConfig {
    pub fn to_mapping(&self) -> AddressMapping {
        AddressMapping {
            id: "config".into(),
            label: String::new(),
            source: self.source,
            col1: self.col1.clone(),
            col2: self.col2.clone(),
            col3: self.col3.clone(),
            separator: self.separator.clone(),
            preview_result: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Geocoding
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct GeocodeConfig {
    /// Minimum spacing between requests to the free-tier provider.
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Appended to every query, e.g. "Indonesia".
    #[serde(default)]
    pub region_hint: Option<String>,
    #[serde(default)]
    pub geoapify_key: Option<String>,
    #[serde(default)]
    pub positionstack_key: Option<String>,
    #[serde(default)]
    pub google_maps_key: Option<String>,
}

fn default_min_interval_ms() -> u64 {
    1100
}

impl Default for GeocodeConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            region_hint: None,
            geoapify_key: None,
            positionstack_key: None,
            google_maps_key: None,
        }
    }
}

impl GeocodeConfig {
    /// Key resolution: config value, then environment variable.
    pub fn resolved_geoapify_key(&self) -> Option<String> {
        key_or_env(&self.geoapify_key, "GEOAPIFY_API_KEY")
    }

    pub fn resolved_positionstack_key(&self) -> Option<String> {
        key_or_env(&self.positionstack_key, "POSITIONSTACK_API_KEY")
    }

    pub fn resolved_google_maps_key(&self) -> Option<String> {
        key_or_env(&self.google_maps_key, "GOOGLE_MAPS_API_KEY")
    }
}

fn key_or_env(configured: &Option<String>, var: &str) -> Option<String> {
    if let Some(key) = configured {
        let trimmed = key.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    std::env::var(var)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub csv: Option<String>,
    #[serde(default)]
    pub json: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl RunConfig {
    pub fn from_toml(input: &str) -> Result<Self, EngineError> {
        let config: RunConfig =
            toml::from_str(input).map_err(|e| EngineError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.system.file.trim().is_empty() {
            return Err(EngineError::ConfigValidation(
                "system dataset needs a file path".into(),
            ));
        }
        if self.field.file.trim().is_empty() {
            return Err(EngineError::ConfigValidation(
                "field dataset needs a file path".into(),
            ));
        }

        if let Some(ref columns) = self.field.columns {
            if !columns.is_complete() {
                return Err(EngineError::ConfigValidation(
                    "field columns must select id, lat, and lng".into(),
                ));
            }
        }

        if let Some(ref address) = self.address {
            if address.col1.is_empty() && address.col2.is_empty() && address.col3.is_empty() {
                return Err(EngineError::ConfigValidation(
                    "address mapping selects no columns".into(),
                ));
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
name = "January deliveries"

[system]
file = "system.csv"

[field]
file = "field.csv"

[field.columns]
id  = "connote"
lat = "lat"
lng = "lng"

[address]
source = "system"
col1 = "address"
col2 = "city"
col3 = "province"
separator = ", "

[geocode]
min_interval_ms = 1100
region_hint = "Indonesia"

[output]
csv = "results.csv"
"#;

    #[test]
    fn parse_valid() {
        let config = RunConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "January deliveries");
        assert_eq!(config.system.file, "system.csv");
        let cols = config.field.columns.as_ref().unwrap();
        assert_eq!(cols.lat, "lat");
        assert_eq!(config.geocode.min_interval_ms, 1100);
        assert_eq!(config.geocode.region_hint.as_deref(), Some("Indonesia"));
        assert_eq!(config.output.csv.as_deref(), Some("results.csv"));
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let input = r#"
name = "Minimal"

[system]
file = "a.csv"

[field]
file = "b.csv"
"#;
        let config = RunConfig::from_toml(input).unwrap();
        assert!(config.address.is_none());
        assert!(config.field.columns.is_none());
        assert_eq!(config.geocode.min_interval_ms, 1100);
        assert!(config.output.csv.is_none());
    }

    #[test]
    fn address_defaults() {
        let input = r#"
name = "Addr"

[system]
file = "a.csv"

[field]
file = "b.csv"

[address]
col1 = "alamat"
"#;
        let config = RunConfig::from_toml(input).unwrap();
        let address = config.address.unwrap();
        assert_eq!(address.source, MappingSource::System);
        assert_eq!(address.separator, ", ");
        let mapping = address.to_mapping();
        assert_eq!(mapping.col1, "alamat");
        assert_eq!(mapping.col2, "");
    }

    #[test]
    fn reject_empty_file_path() {
        let input = r#"
name = "Bad"

[system]
file = ""

[field]
file = "b.csv"
"#;
        let err = RunConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("system dataset"));
    }

    #[test]
    fn reject_incomplete_field_columns() {
        let input = r#"
name = "Bad"

[system]
file = "a.csv"

[field]
file = "b.csv"

[field.columns]
id  = "connote"
lat = "lat"
lng = ""
"#;
        let err = RunConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("id, lat, and lng"));
    }

    #[test]
    fn reject_empty_address_mapping() {
        let input = r#"
name = "Bad"

[system]
file = "a.csv"

[field]
file = "b.csv"

[address]
separator = " - "
"#;
        let err = RunConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("no columns"));
    }

    #[test]
    fn reject_invalid_source() {
        let input = r#"
name = "Bad"

[system]
file = "a.csv"

[field]
file = "b.csv"

[address]
source = "sistem"
col1 = "alamat"
"#;
        assert!(RunConfig::from_toml(input).is_err());
    }

    #[test]
    fn key_resolution_prefers_config() {
        let config = GeocodeConfig {
            geoapify_key: Some("  cfg-key  ".into()),
            ..GeocodeConfig::default()
        };
        assert_eq!(config.resolved_geoapify_key().as_deref(), Some("cfg-key"));
    }
}
