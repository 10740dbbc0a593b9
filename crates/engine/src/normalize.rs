//! Raw rows → typed records, with column-name inference.
//!
//! Column semantics resolve by first-match over a fixed candidate list per
//! semantic field. Resolution happens once per dataset (into a `HeaderMap`),
//! not per row.

use std::collections::HashMap;

use crate::model::{normalize_connote, FieldRecord, GeocodeStatus, SystemRecord};
use crate::rows::RowSet;

// ---------------------------------------------------------------------------
// Header resolution
// ---------------------------------------------------------------------------

/// Ordered alias candidates per semantic field, compared case-insensitively.
/// Earlier aliases win; mixed Indonesian/English reflects the datasets this
/// tool ingests.
const CONNOTE_ALIASES: &[&str] = &["connote", "resi", "no_resi", "awb"];
const RECIPIENT_ALIASES: &[&str] = &["recipient_name", "nama_penerima", "name"];
const ADDRESS_ALIASES: &[&str] = &["address", "alamat"];
const CITY_ALIASES: &[&str] = &["city", "kota"];
const PROVINCE_ALIASES: &[&str] = &["province", "provinsi"];
const LAT_ALIASES: &[&str] = &["lat", "latitude"];
const LNG_ALIASES: &[&str] = &["lng", "lon", "longitude"];
const REPORTED_BY_ALIASES: &[&str] = &["reported_by", "tim", "reporter"];
const REPORT_DATE_ALIASES: &[&str] = &["report_date", "tanggal", "date"];

/// The resolved column name for each semantic field of a dataset.
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    pub connote: Option<String>,
    pub recipient_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub province: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
    pub reported_by: Option<String>,
    pub report_date: Option<String>,
}

impl HeaderMap {
    pub fn resolve(headers: &[String]) -> Self {
        Self {
            connote: find_column(headers, CONNOTE_ALIASES),
            recipient_name: find_column(headers, RECIPIENT_ALIASES),
            address: find_column(headers, ADDRESS_ALIASES),
            city: find_column(headers, CITY_ALIASES),
            province: find_column(headers, PROVINCE_ALIASES),
            lat: find_column(headers, LAT_ALIASES),
            lng: find_column(headers, LNG_ALIASES),
            reported_by: find_column(headers, REPORTED_BY_ALIASES),
            report_date: find_column(headers, REPORT_DATE_ALIASES),
        }
    }
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<String> {
    for alias in aliases {
        if let Some(h) = headers.iter().find(|h| h.eq_ignore_ascii_case(alias)) {
            return Some(h.clone());
        }
    }
    None
}

fn get<'a>(row: &'a HashMap<String, String>, column: &Option<String>) -> &'a str {
    column
        .as_ref()
        .and_then(|c| row.get(c))
        .map(String::as_str)
        .unwrap_or("")
}

// ---------------------------------------------------------------------------
// Tolerant numeric parsing
// ---------------------------------------------------------------------------

/// Parse a float the way spreadsheet exports need: trims, then falls back to
/// the longest leading numeric prefix, then to `0.0`. Malformed numeric
/// input never aborts ingestion — it degrades to a sentinel that surfaces
/// later as a classification anomaly.
pub fn lenient_float(raw: &str) -> f64 {
    let s = raw.trim();
    if let Ok(v) = s.parse::<f64>() {
        return v;
    }

    let mut end = 0;
    for (i, c) in s.char_indices() {
        let ok = c.is_ascii_digit()
            || c == '.'
            || ((c == '-' || c == '+') && i == 0);
        if !ok {
            break;
        }
        end = i + c.len_utf8();
    }
    s[..end].parse::<f64>().unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Normalizers
// ---------------------------------------------------------------------------

/// Build `SystemRecord`s from raw rows. Rows without a connote are dropped.
pub fn normalize_system(set: &RowSet) -> Vec<SystemRecord> {
    let map = HeaderMap::resolve(&set.headers);
    let mut records = Vec::with_capacity(set.rows.len());
    let mut dropped = 0usize;

    for row in &set.rows {
        let connote = get(row, &map.connote);
        if connote.trim().is_empty() {
            dropped += 1;
            continue;
        }
        records.push(SystemRecord {
            connote: normalize_connote(connote),
            recipient_name: get(row, &map.recipient_name).to_string(),
            address: get(row, &map.address).to_string(),
            city: get(row, &map.city).to_string(),
            province: get(row, &map.province).to_string(),
            geocode_status: GeocodeStatus::Pending,
        });
    }

    if dropped > 0 {
        log::warn!("system dataset: dropped {dropped} row(s) without a connote");
    }
    records
}

/// Build `FieldRecord`s from raw rows. Rows need a connote and non-blank
/// lat/lng cells; the cell contents themselves parse leniently.
pub fn normalize_field(set: &RowSet) -> Vec<FieldRecord> {
    let map = HeaderMap::resolve(&set.headers);
    let mut records = Vec::with_capacity(set.rows.len());
    let mut dropped = 0usize;

    for row in &set.rows {
        let connote = get(row, &map.connote);
        let lat = get(row, &map.lat);
        let lng = get(row, &map.lng);
        if connote.trim().is_empty() || lat.trim().is_empty() || lng.trim().is_empty() {
            dropped += 1;
            continue;
        }

        let reported_by = get(row, &map.reported_by);
        let report_date = get(row, &map.report_date);
        records.push(FieldRecord {
            connote: normalize_connote(connote),
            lat: lenient_float(lat),
            lng: lenient_float(lng),
            reported_by: (!reported_by.is_empty()).then(|| reported_by.to_string()),
            report_date: (!report_date.is_empty()).then(|| report_date.to_string()),
        });
    }

    if dropped > 0 {
        log::warn!("field dataset: dropped {dropped} row(s) missing connote or coordinates");
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rows::load_rows;

    #[test]
    fn header_resolution_is_case_insensitive() {
        let headers = vec!["CONNOTE".to_string(), "Alamat".to_string(), "Lon".to_string()];
        let map = HeaderMap::resolve(&headers);
        assert_eq!(map.connote.as_deref(), Some("CONNOTE"));
        assert_eq!(map.address.as_deref(), Some("Alamat"));
        assert_eq!(map.lng.as_deref(), Some("Lon"));
        assert!(map.lat.is_none());
    }

    #[test]
    fn alias_order_wins() {
        // Both "lng" and "lon" present: "lng" is the earlier candidate.
        let headers = vec!["lon".to_string(), "lng".to_string()];
        let map = HeaderMap::resolve(&headers);
        assert_eq!(map.lng.as_deref(), Some("lng"));
    }

    #[test]
    fn lenient_float_parsing() {
        assert_eq!(lenient_float("-6.2087941"), -6.2087941);
        assert_eq!(lenient_float("  106.845598  "), 106.845598);
        assert_eq!(lenient_float("-6.2087941xyz"), -6.2087941);
        assert_eq!(lenient_float("abc"), 0.0);
        assert_eq!(lenient_float(""), 0.0);
        assert_eq!(lenient_float("-"), 0.0);
    }

    #[test]
    fn system_rows_without_connote_are_dropped() {
        let csv = "\
connote,recipient_name,address,city,province
JKT-001,Budi,Jl. Sudirman No.1,Jakarta,DKI Jakarta
,Siti,Jl. Thamrin No.5,Jakarta,DKI Jakarta
jkt-002 ,Andi,Jl. Gatot Subroto,Bandung,Jawa Barat
";
        let set = load_rows(csv).unwrap();
        let records = normalize_system(&set);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].connote, "JKT-001");
        assert_eq!(records[1].connote, "JKT-002");
        assert_eq!(records[1].city, "Bandung");
        assert_eq!(records[0].geocode_status, GeocodeStatus::Pending);
    }

    #[test]
    fn field_rows_require_coordinates() {
        let csv = "\
connote,lat,lng,reported_by
JKT-001,-6.2087941,106.845598,kurir-a
JKT-002,,106.8,kurir-b
JKT-003,-6.1,106.8,
";
        let set = load_rows(csv).unwrap();
        let records = normalize_field(&set);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].connote, "JKT-001");
        assert_eq!(records[0].lat, -6.2087941);
        assert_eq!(records[0].reported_by.as_deref(), Some("kurir-a"));
        assert!(records[1].reported_by.is_none());
    }

    #[test]
    fn indonesian_aliases_resolve() {
        let csv = "\
resi,nama_penerima,alamat,kota,provinsi
JKT-001,Budi,Jl. Sudirman No.1,Jakarta,DKI Jakarta
";
        let set = load_rows(csv).unwrap();
        let records = normalize_system(&set);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].recipient_name, "Budi");
        assert_eq!(records[0].province, "DKI Jakarta");
    }

    #[test]
    fn malformed_coordinate_degrades_to_sentinel() {
        let csv = "connote,lat,lng\nJKT-001,not-a-number,106.8\n";
        let set = load_rows(csv).unwrap();
        let records = normalize_field(&set);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].lat, 0.0);
        assert_eq!(records[0].lng, 106.8);
    }
}
