//! Great-circle distance and accuracy bucketing.

use crate::model::AccuracyCategory;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two coordinates, in meters.
pub fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Bucket a distance in meters. Both boundaries are inclusive on the lower
/// bucket: exactly 50 m is accurate, exactly 100 m is fairly accurate.
pub fn categorize_distance(meters: f64) -> AccuracyCategory {
    if meters <= 50.0 {
        AccuracyCategory::Accurate
    } else if meters <= 100.0 {
        AccuracyCategory::FairlyAccurate
    } else {
        AccuracyCategory::Inaccurate
    }
}

/// Classify a record from its resolved and reported coordinates. Partial
/// data never produces a distance-based category: any absent side is an
/// error.
pub fn classify(
    system: Option<(f64, f64)>,
    field: Option<(f64, f64)>,
) -> (Option<f64>, AccuracyCategory) {
    match (system, field) {
        (Some((slat, slng)), Some((flat, flng))) => {
            let d = haversine_meters(slat, slng, flat, flng);
            (Some(d), categorize_distance(d))
        }
        _ => (None, AccuracyCategory::Error),
    }
}
