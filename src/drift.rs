//! Inter-series drift
//!
//! Compares two metric sets key by key. Used to show how intensity and
//! recovery metrics move from the first series to the later ones.

use crate::types::{DriftRecord, MetricSet, SeriesDrift, SeriesSummary};

/// Per-metric drift from `first` to `second`.
///
/// Metrics are reported in `first`'s order; a metric missing from either set
/// is skipped. A zero baseline value yields a 0 percent drift.
pub fn drift(first: &MetricSet, second: &MetricSet) -> Vec<DriftRecord> {
    let records: Vec<DriftRecord> = first
        .values
        .iter()
        .filter_map(|m| {
            let value2 = second.get(&m.metric)?;
            Some(drift_record(&m.metric, m.value, value2))
        })
        .collect();

    if records.len() != first.len() || records.len() != second.len() {
        tracing::warn!(
            first = %first.name,
            second = %second.name,
            compared = records.len(),
            "metric sets have different keys; comparing the shared ones"
        );
    }

    records
}

fn drift_record(metric: &str, value1: f64, value2: f64) -> DriftRecord {
    let absolute_drift = value2 - value1;
    let percent_drift = if value1 != 0.0 {
        absolute_drift / value1 * 100.0
    } else {
        0.0
    };

    DriftRecord {
        metric: metric.to_string(),
        value1,
        value2,
        absolute_drift,
        percent_drift,
    }
}

/// Drift of every later series against the first one
pub fn series_drift(summaries: &[SeriesSummary]) -> Vec<SeriesDrift> {
    let Some((baseline, rest)) = summaries.split_first() else {
        return Vec::new();
    };

    rest.iter()
        .map(|compared| SeriesDrift {
            baseline_series: baseline.series,
            compared_series: compared.series,
            records: drift(&baseline.metrics, &compared.metrics),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(name: &str, values: &[(&str, f64)]) -> MetricSet {
        values
            .iter()
            .fold(MetricSet::new(name), |acc, (k, v)| acc.with(*k, *v))
    }

    #[test]
    fn test_drift_values() {
        let a = set("series 1", &[("avg_speed_kmh", 18.0), ("max_heart_rate_bpm", 170.0)]);
        let b = set("series 2", &[("avg_speed_kmh", 18.9), ("max_heart_rate_bpm", 178.5)]);

        let records = drift(&a, &b);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].metric, "avg_speed_kmh");
        assert!((records[0].absolute_drift - 0.9).abs() < 1e-9);
        assert!((records[0].percent_drift - 5.0).abs() < 1e-9);
        assert!((records[1].percent_drift - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_baseline() {
        let a = set("a", &[("avg_cadence", 0.0)]);
        let b = set("b", &[("avg_cadence", 182.0)]);

        let records = drift(&a, &b);
        assert_eq!(records[0].absolute_drift, 182.0);
        assert_eq!(records[0].percent_drift, 0.0);
    }

    #[test]
    fn test_symmetry() {
        let a = set("a", &[("x", 3.5), ("y", -2.0), ("z", 0.0)]);
        let b = set("b", &[("z", 4.0), ("x", 1.25), ("y", 7.0)]);

        let forward = drift(&a, &b);
        let backward = drift(&b, &a);
        for record in &forward {
            let reverse = backward
                .iter()
                .find(|r| r.metric == record.metric)
                .unwrap();
            assert_eq!(record.absolute_drift, -reverse.absolute_drift);
        }
    }

    #[test]
    fn test_mismatched_keys_compare_shared_only() {
        let a = set("a", &[("x", 1.0), ("only_a", 2.0)]);
        let b = set("b", &[("x", 2.0), ("only_b", 3.0)]);

        let records = drift(&a, &b);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].metric, "x");
    }

    #[test]
    fn test_series_drift() {
        let summary = |series, speed| SeriesSummary {
            series,
            lap_count: 8,
            metrics: set("s", &[("avg_speed_kmh", speed)]),
        };

        assert!(series_drift(&[]).is_empty());
        assert!(series_drift(&[summary(1, 18.0)]).is_empty());

        let drifts = series_drift(&[summary(1, 18.0), summary(2, 18.5), summary(3, 17.0)]);
        assert_eq!(drifts.len(), 2);
        assert_eq!(drifts[1].baseline_series, 1);
        assert_eq!(drifts[1].compared_series, 3);
        assert!(drifts[0].records[0].percent_drift > 0.0);
        assert!(drifts[1].records[0].percent_drift < 0.0);
    }
}
