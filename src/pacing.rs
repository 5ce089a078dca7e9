//! Pacing classification
//!
//! An intensity lap is `Unsteady` when its peak speed exceeds its average by
//! at least the threshold percentage.

use crate::aggregate::mean;
use crate::config::PacingThreshold;
use crate::types::{
    PacingClassification, PacingGroup, PacingStyle, PacingSummary, SeriesAssignment,
};

/// Tolerance applied at the threshold boundary so that a delta printed as the
/// threshold value classifies as reaching it
const BOUNDARY_EPSILON: f64 = 1e-9;

/// `(max - avg) / avg * 100`; 0 when the average speed is not positive
pub fn pacing_delta_percent(avg_speed_kmh: f64, max_speed_kmh: f64) -> f64 {
    if avg_speed_kmh > 0.0 && avg_speed_kmh.is_finite() && max_speed_kmh.is_finite() {
        (max_speed_kmh - avg_speed_kmh) / avg_speed_kmh * 100.0
    } else {
        0.0
    }
}

/// Median of the finite values, 0 for an empty set
pub fn median<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Classifier holding the threshold in effect for one derivation pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacingClassifier {
    threshold_percent: f64,
}

impl PacingClassifier {
    pub fn new(threshold_percent: f64) -> Self {
        Self { threshold_percent }
    }

    /// Resolve the threshold mode against the laps about to be classified.
    ///
    /// The median mode uses the deltas of laps with a known average speed.
    pub fn for_laps(mode: &PacingThreshold, laps: &[SeriesAssignment]) -> Self {
        let threshold_percent = match mode {
            PacingThreshold::Fixed { percent } => *percent,
            PacingThreshold::Median => {
                let threshold = median(
                    laps.iter()
                        .filter(|a| a.lap.avg_speed_kmh > 0.0)
                        .map(|a| pacing_delta_percent(a.lap.avg_speed_kmh, a.lap.max_speed_kmh)),
                );
                tracing::debug!(threshold, laps = laps.len(), "computed median pacing threshold");
                threshold
            }
        };
        Self::new(threshold_percent)
    }

    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }

    pub fn classify_speeds(&self, avg_speed_kmh: f64, max_speed_kmh: f64) -> (f64, PacingStyle) {
        let delta = pacing_delta_percent(avg_speed_kmh, max_speed_kmh);
        let style = if avg_speed_kmh > 0.0 && delta >= self.threshold_percent - BOUNDARY_EPSILON {
            PacingStyle::Unsteady
        } else {
            PacingStyle::Steady
        };
        (delta, style)
    }

    /// Classify intensity laps in their ordinal order
    pub fn classify(&self, laps: &[SeriesAssignment]) -> Vec<PacingClassification> {
        laps.iter()
            .map(|a| {
                let lap = &a.lap;
                let (pacing_delta_percent, classification) =
                    self.classify_speeds(lap.avg_speed_kmh, lap.max_speed_kmh);
                PacingClassification {
                    lap_number: lap.lap_number,
                    lap_ordinal: a.index_in_category as u32 + 1,
                    series: a.series,
                    duration_seconds: lap.duration_seconds,
                    avg_speed_kmh: lap.avg_speed_kmh,
                    max_speed_kmh: lap.max_speed_kmh,
                    max_heart_rate_bpm: lap.max_heart_rate_bpm,
                    avg_vertical_ratio: lap.avg_vertical_ratio,
                    pacing_delta_percent,
                    classification,
                }
            })
            .collect()
    }

    /// Group classified laps by style; styles with no lap are left out
    pub fn summarize(&self, classified: &[PacingClassification]) -> PacingSummary {
        let groups = [PacingStyle::Steady, PacingStyle::Unsteady]
            .into_iter()
            .filter_map(|style| {
                let members: Vec<&PacingClassification> =
                    classified.iter().filter(|c| c.classification == style).collect();
                if members.is_empty() {
                    return None;
                }
                Some(PacingGroup {
                    classification: style,
                    lap_count: members.len(),
                    avg_duration_seconds: positive_mean(members.iter().map(|c| c.duration_seconds)),
                    avg_max_heart_rate_bpm: positive_mean(
                        members.iter().map(|c| c.max_heart_rate_bpm),
                    ),
                    avg_vertical_ratio: positive_mean(members.iter().map(|c| c.avg_vertical_ratio)),
                })
            })
            .collect();

        PacingSummary {
            threshold_percent: self.threshold_percent,
            groups,
        }
    }
}

fn positive_mean<I: Iterator<Item = f64>>(values: I) -> f64 {
    mean(values.filter(|v| *v > 0.0))
}
