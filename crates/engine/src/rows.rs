//! Delimited-text ingestion: CSV bytes in, string-keyed rows out.
//!
//! The rest of the engine never touches file formats — it operates on a
//! `RowSet`, which any ingestion collaborator can produce.

use std::collections::HashMap;

use crate::error::EngineError;

/// Raw tabular data: ordered headers plus one string map per row.
#[derive(Debug, Clone, Default)]
pub struct RowSet {
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

impl RowSet {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Up to the first five rows, for mapping previews.
    pub fn sample(&self) -> &[HashMap<String, String>] {
        &self.rows[..self.rows.len().min(5)]
    }
}

/// Parse CSV text into a `RowSet`. Malformed rows are skipped with a
/// warning, never fatal: ingestion anomalies degrade, they don't abort.
pub fn load_rows(csv_data: &str) -> Result<RowSet, EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(csv_data.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EngineError::Io(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    let mut skipped = 0usize;

    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                log::warn!("skipping malformed row: {e}");
                skipped += 1;
                continue;
            }
        };

        let mut row = HashMap::with_capacity(headers.len());
        for (i, header) in headers.iter().enumerate() {
            row.insert(header.clone(), record.get(i).unwrap_or("").to_string());
        }
        rows.push(row);
    }

    if skipped > 0 {
        log::warn!("ingestion skipped {skipped} malformed row(s)");
    }

    Ok(RowSet { headers, rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_basic() {
        let csv = "\
connote,address,city
JKT-001,Jl. Sudirman No.1,Jakarta
JKT-002,Jl. Thamrin No.5,Jakarta
";
        let set = load_rows(csv).unwrap();
        assert_eq!(set.headers, vec!["connote", "address", "city"]);
        assert_eq!(set.rows.len(), 2);
        assert_eq!(set.rows[0]["connote"], "JKT-001");
        assert_eq!(set.rows[1]["address"], "Jl. Thamrin No.5");
    }

    #[test]
    fn values_are_trimmed() {
        let csv = "connote,city\n  JKT-001 ,  Jakarta \n";
        let set = load_rows(csv).unwrap();
        assert_eq!(set.rows[0]["connote"], "JKT-001");
        assert_eq!(set.rows[0]["city"], "Jakarta");
    }

    #[test]
    fn short_rows_fill_empty() {
        let csv = "connote,address,city\nJKT-001,Jl. A\n";
        let set = load_rows(csv).unwrap();
        assert_eq!(set.rows[0]["city"], "");
    }

    #[test]
    fn quoted_fields_with_commas() {
        let csv = "connote,address\nJKT-001,\"Jl. Sudirman No.1, Blok B\"\n";
        let set = load_rows(csv).unwrap();
        assert_eq!(set.rows[0]["address"], "Jl. Sudirman No.1, Blok B");
    }

    #[test]
    fn sample_caps_at_five() {
        let mut csv = String::from("connote\n");
        for i in 0..8 {
            csv.push_str(&format!("C-{i}\n"));
        }
        let set = load_rows(&csv).unwrap();
        assert_eq!(set.sample().len(), 5);
    }
}
