//! Correlations between intensity-lap metrics

use crate::aggregate::LapField;
use crate::pacing::pacing_delta_percent;
use crate::types::{Correlate, CorrelationReport, LapSummary, SeriesAssignment};

/// Number of correlates reported per target metric
pub const TOP_CORRELATES: usize = 5;

const PACING_DELTA_KEY: &str = "pacing_delta_percent";

const LAP_METRICS: [LapField; 7] = [
    LapField::Duration,
    LapField::AvgSpeed,
    LapField::MaxSpeed,
    LapField::MaxHeartRate,
    LapField::AvgCadence,
    LapField::AvgVerticalRatio,
    LapField::AvgStanceTimePercent,
];

/// Pearson correlation coefficient; `None` for fewer than two pairs or when
/// either side has no variance
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return None;
    }

    let mean_x = xs[..n].iter().sum::<f64>() / n as f64;
    let mean_y = ys[..n].iter().sum::<f64>() / n as f64;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in xs[..n].iter().zip(&ys[..n]) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    // Spread below rounding noise of the values themselves counts as constant
    let flat = |var: f64, mean: f64| {
        var <= f64::EPSILON * n as f64 * (mean * mean).max(f64::MIN_POSITIVE)
    };
    if flat(var_x, mean_x) || flat(var_y, mean_y) {
        return None;
    }

    let r = cov / (var_x.sqrt() * var_y.sqrt());
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}

fn metric_columns(laps: &[&LapSummary]) -> Vec<(String, Vec<f64>)> {
    let mut columns: Vec<(String, Vec<f64>)> = LAP_METRICS
        .iter()
        .map(|field| {
            let values = laps.iter().map(|lap| field.get(lap)).collect();
            (field.key().to_string(), values)
        })
        .collect();

    columns.push((
        PACING_DELTA_KEY.to_string(),
        laps.iter()
            .map(|lap| pacing_delta_percent(lap.avg_speed_kmh, lap.max_speed_kmh))
            .collect(),
    ));

    columns
}

/// Correlation matrix over the intensity laps and the key correlates of
/// duration, average speed and maximum heart rate.
///
/// `None` when fewer than two laps are available.
pub fn correlate_laps(intensity: &[SeriesAssignment]) -> Option<CorrelationReport> {
    if intensity.len() < 2 {
        return None;
    }

    let laps: Vec<&LapSummary> = intensity.iter().map(|a| &a.lap).collect();
    let columns = metric_columns(&laps);

    let matrix: Vec<Vec<Option<f64>>> = columns
        .iter()
        .map(|(_, xs)| columns.iter().map(|(_, ys)| pearson(xs, ys)).collect())
        .collect();
    let metrics: Vec<String> = columns.into_iter().map(|(name, _)| name).collect();

    let correlates_of = |target: &str, most_negative: bool| {
        let Some(row) = metrics.iter().position(|m| m == target) else {
            return Vec::new();
        };
        let mut found: Vec<Correlate> = metrics
            .iter()
            .zip(&matrix[row])
            .enumerate()
            .filter(|(col, _)| *col != row)
            .filter_map(|(_, (metric, coefficient))| {
                coefficient.map(|coefficient| Correlate {
                    metric: metric.clone(),
                    coefficient,
                })
            })
            .collect();
        if most_negative {
            found.sort_by(|a, b| a.coefficient.total_cmp(&b.coefficient));
        } else {
            found.sort_by(|a, b| b.coefficient.total_cmp(&a.coefficient));
        }
        found.truncate(TOP_CORRELATES);
        found
    };

    let duration_predictors = correlates_of(LapField::Duration.key(), true);
    let speed_predictors = correlates_of(LapField::AvgSpeed.key(), false);
    let max_hr_correlates = correlates_of(LapField::MaxHeartRate.key(), false);

    Some(CorrelationReport {
        metrics,
        matrix,
        duration_predictors,
        speed_predictors,
        max_hr_correlates,
    })
}
