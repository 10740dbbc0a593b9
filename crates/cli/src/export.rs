//! Tabular export of comparison results.

use std::io::Write;
use std::path::Path;

use veriroute_engine::model::ComparisonResult;

use crate::CliError;

const HEADER: [&str; 9] = [
    "connote",
    "recipient_name",
    "system_address",
    "system_lat",
    "system_lng",
    "field_lat",
    "field_lng",
    "distance_meters",
    "category",
];

/// Write results as CSV. Header always written, even with zero rows;
/// category rendered as its human label.
pub fn write_results<W: Write>(results: &[ComparisonResult], writer: W) -> Result<(), CliError> {
    let mut csv_writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(writer);

    csv_writer
        .write_record(HEADER)
        .map_err(|e| CliError::runtime(format!("CSV write error: {e}")))?;

    for result in results {
        let coord = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();
        let system_lat = coord(result.system_lat);
        let system_lng = coord(result.system_lng);
        let field_lat = coord(result.field_lat);
        let field_lng = coord(result.field_lng);
        let distance = result
            .distance_meters
            .map(|m| format!("{m:.1}"))
            .unwrap_or_default();

        csv_writer
            .write_record([
                result.connote.as_str(),
                result.recipient_name.as_str(),
                result.system_address.as_str(),
                system_lat.as_str(),
                system_lng.as_str(),
                field_lat.as_str(),
                field_lng.as_str(),
                distance.as_str(),
                result.category.label(),
            ])
            .map_err(|e| CliError::runtime(format!("CSV write error: {e}")))?;
    }

    csv_writer
        .flush()
        .map_err(|e| CliError::runtime(format!("CSV flush error: {e}")))?;
    Ok(())
}

pub fn write_csv_file(results: &[ComparisonResult], path: &Path) -> Result<(), CliError> {
    let file = std::fs::File::create(path)
        .map_err(|e| CliError::runtime(format!("cannot create {}: {e}", path.display())))?;
    write_results(results, std::io::BufWriter::new(file))
}

pub fn write_csv_stdout(results: &[ComparisonResult]) -> Result<(), CliError> {
    let stdout = std::io::stdout();
    write_results(results, stdout.lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use veriroute_engine::model::{AccuracyCategory, GeocodeStatus};

    fn result() -> ComparisonResult {
        ComparisonResult {
            connote: "JKT-001".into(),
            recipient_name: "Budi Santoso".into(),
            system_address: "Jl. Sudirman No.1, Jakarta, DKI Jakarta".into(),
            system_lat: Some(-6.209),
            system_lng: Some(106.8455),
            field_lat: Some(-6.2087941),
            field_lng: Some(106.845598),
            distance_meters: Some(28.347),
            category: AccuracyCategory::Accurate,
            geocode_status: GeocodeStatus::Done,
            provider: Some("Nominatim".into()),
        }
    }

    #[test]
    fn golden_csv_output() {
        let error_row = ComparisonResult {
            connote: "JKT-002".into(),
            recipient_name: "Siti Rahma".into(),
            system_address: "Jl. Thamrin No.5, Jakarta, DKI Jakarta".into(),
            system_lat: None,
            system_lng: None,
            field_lat: None,
            field_lng: None,
            distance_meters: None,
            category: AccuracyCategory::Error,
            geocode_status: GeocodeStatus::Error,
            provider: None,
        };

        let mut buf = Vec::new();
        write_results(&[result(), error_row], &mut buf).unwrap();
        let output = String::from_utf8(buf).unwrap();

        let expected = "\
connote,recipient_name,system_address,system_lat,system_lng,field_lat,field_lng,distance_meters,category
JKT-001,Budi Santoso,\"Jl. Sudirman No.1, Jakarta, DKI Jakarta\",-6.209,106.8455,-6.2087941,106.845598,28.3,Accurate
JKT-002,Siti Rahma,\"Jl. Thamrin No.5, Jakarta, DKI Jakarta\",,,,,,Error
";
        assert_eq!(output, expected);
    }

    #[test]
    fn header_written_for_empty_results() {
        let mut buf = Vec::new();
        write_results(&[], &mut buf).unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert_eq!(
            output,
            "connote,recipient_name,system_address,system_lat,system_lng,field_lat,field_lng,distance_meters,category\n"
        );
    }

    #[test]
    fn fairly_accurate_renders_human_label() {
        let mut row = result();
        row.category = AccuracyCategory::FairlyAccurate;
        let mut buf = Vec::new();
        write_results(&[row], &mut buf).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains("Fairly accurate"));
    }
}
