//! Operator-declared address synthesis.
//!
//! An `AddressMapping` concatenates up to three source columns with a
//! separator to build the free-text geocoding query. When no mapping exists
//! the fallback is the naive `address, city, province` concatenation from
//! the normalized record.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::SystemRecord;

// ---------------------------------------------------------------------------
// Address mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingSource {
    System,
    Field,
}

impl std::fmt::Display for MappingSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Field => write!(f, "field"),
        }
    }
}

/// How to assemble one address string from raw columns. Multiple mappings
/// may exist in an editing session; only the first is authoritative for a
/// production run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddressMapping {
    pub id: String,
    pub label: String,
    pub source: MappingSource,
    pub col1: String,
    pub col2: String,
    pub col3: String,
    pub separator: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_result: Option<String>,
}

impl AddressMapping {
    /// A fresh mapping over the first three available columns.
    pub fn new(id: impl Into<String>, source: MappingSource, columns: &[String]) -> Self {
        Self {
            id: id.into(),
            label: String::new(),
            source,
            col1: columns.first().cloned().unwrap_or_default(),
            col2: columns.get(1).cloned().unwrap_or_default(),
            col3: columns.get(2).cloned().unwrap_or_default(),
            separator: ", ".into(),
            preview_result: None,
        }
    }

    /// Switch the mapping to a different source. Column selections that
    /// exist in the new source's column set survive; the rest fall back to
    /// positional defaults (first/second/third available, else empty).
    pub fn rebind_source(&mut self, source: MappingSource, columns: &[String]) {
        if source == self.source {
            return;
        }
        self.source = source;
        let keep = |col: &str, idx: usize| -> String {
            if !col.is_empty() && columns.iter().any(|c| c.as_str() == col) {
                col.to_string()
            } else {
                columns.get(idx).cloned().unwrap_or_default()
            }
        };
        self.col1 = keep(&self.col1.clone(), 0);
        self.col2 = keep(&self.col2.clone(), 1);
        self.col3 = keep(&self.col3.clone(), 2);
    }
}

/// Synthesize one address string. Never fails: unselected or missing
/// columns and blank parts simply contribute nothing.
pub fn build_address(mapping: &AddressMapping, row: &HashMap<String, String>) -> String {
    let part = |col: &str| -> &str {
        if col.is_empty() {
            ""
        } else {
            row.get(col).map(String::as_str).unwrap_or("")
        }
    };

    [part(&mapping.col1), part(&mapping.col2), part(&mapping.col3)]
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(&mapping.separator)
}

/// Synthesized strings for up to five sample rows (the first drives the
/// live preview).
pub fn preview(mapping: &AddressMapping, rows: &[HashMap<String, String>]) -> Vec<String> {
    rows.iter()
        .take(5)
        .map(|row| build_address(mapping, row))
        .collect()
}

/// Fallback when no mapping is configured.
pub fn fallback_address(record: &SystemRecord) -> String {
    format!("{}, {}, {}", record.address, record.city, record.province)
}

// ---------------------------------------------------------------------------
// Field coordinate columns
// ---------------------------------------------------------------------------

const ID_HINTS: &[&str] = &["connote", "id", "resi", "no"];

/// Which raw field-side columns carry the join key and coordinates. Must be
/// complete (all three selected) before a run may start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldColumnMap {
    pub id: String,
    pub lat: String,
    pub lng: String,
}

impl FieldColumnMap {
    /// Best-effort inference from headers; the operator can override any
    /// selection afterwards.
    pub fn infer(columns: &[String]) -> Self {
        let id = columns
            .iter()
            .find(|c| {
                let lower = c.to_lowercase();
                ID_HINTS.iter().any(|h| lower.contains(h))
            })
            .or_else(|| columns.first())
            .cloned()
            .unwrap_or_default();

        let lat = columns
            .iter()
            .find(|c| {
                let lower = c.to_lowercase();
                lower.contains("lat") || lower == "y"
            })
            .cloned()
            .unwrap_or_default();

        let lng = columns
            .iter()
            .find(|c| {
                let lower = c.to_lowercase();
                lower.contains("lng") || lower.contains("lon") || lower == "x"
            })
            .cloned()
            .unwrap_or_default();

        Self { id, lat, lng }
    }

    pub fn is_complete(&self) -> bool {
        !self.id.is_empty() && !self.lat.is_empty() && !self.lng.is_empty()
    }
}
