use crate::model::{AccuracyCategory, ComparisonResult, DashboardStats};

/// Recompute the aggregate from scratch. Stats are a projection over the
/// result set, never mutated independently.
pub fn compute_stats(results: &[ComparisonResult]) -> DashboardStats {
    let mut stats = DashboardStats {
        total: results.len(),
        ..DashboardStats::default()
    };

    for r in results {
        match r.category {
            AccuracyCategory::Accurate => stats.accurate += 1,
            AccuracyCategory::FairlyAccurate => stats.fairly_accurate += 1,
            AccuracyCategory::Inaccurate => stats.inaccurate += 1,
            AccuracyCategory::Pending => stats.pending += 1,
            AccuracyCategory::Error => stats.error += 1,
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GeocodeStatus;

    fn result(category: AccuracyCategory) -> ComparisonResult {
        ComparisonResult {
            connote: "C".into(),
            recipient_name: String::new(),
            system_address: String::new(),
            system_lat: None,
            system_lng: None,
            field_lat: None,
            field_lng: None,
            distance_meters: None,
            category,
            geocode_status: GeocodeStatus::Pending,
            provider: None,
        }
    }

    #[test]
    fn counts_partition_the_total() {
        let results = vec![
            result(AccuracyCategory::Accurate),
            result(AccuracyCategory::Accurate),
            result(AccuracyCategory::FairlyAccurate),
            result(AccuracyCategory::Inaccurate),
            result(AccuracyCategory::Pending),
            result(AccuracyCategory::Error),
            result(AccuracyCategory::Error),
        ];
        let stats = compute_stats(&results);
        assert_eq!(stats.total, 7);
        assert_eq!(stats.accurate, 2);
        assert_eq!(stats.fairly_accurate, 1);
        assert_eq!(stats.inaccurate, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.error, 2);
        assert_eq!(
            stats.total,
            stats.accurate + stats.fairly_accurate + stats.inaccurate + stats.pending + stats.error
        );
    }

    #[test]
    fn empty_result_set() {
        let stats = compute_stats(&[]);
        assert_eq!(stats, DashboardStats::default());
    }
}
