//! Recovery-quality analysis
//!
//! For each recovery lap, measures how far and how fast the heart rate falls
//! after the preceding effort. Missing data never raises: a lap without a
//! usable peak heart rate or duration is simply not reported.

use crate::aggregate::{mean, SampleField};
use crate::classifier::CategoryPredicate;
use crate::types::{HrEndSource, LapSummary, MetricSet, RecoveryMetric, Sample, SeriesSummary};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

type Window = (DateTime<Utc>, DateTime<Utc>);

/// Recovery metrics for every recovery lap with enough data, in lap order.
///
/// Ordinals and series count only the reported laps.
pub fn analyze_recovery(
    samples: &[Sample],
    laps: &[LapSummary],
    predicate: &CategoryPredicate,
    group_size: usize,
) -> Vec<RecoveryMetric> {
    let group_size = group_size.max(1);

    let mut recovery_laps: Vec<&LapSummary> = laps
        .iter()
        .filter(|lap| predicate.matches(&lap.lap_nature))
        .collect();
    recovery_laps.sort_by_key(|lap| lap.lap_number);

    let mut metrics = Vec::with_capacity(recovery_laps.len());
    for lap in recovery_laps {
        let Some(metric) = measure_lap(samples, lap) else {
            continue;
        };
        let idx = metrics.len();
        metrics.push(RecoveryMetric {
            recovery_lap_ordinal: idx as u32 + 1,
            series: (idx / group_size) as u32 + 1,
            ..metric
        });
    }

    metrics
}

/// Measure one recovery lap; `None` when the peak heart rate or the duration
/// is not positive.
fn measure_lap(samples: &[Sample], lap: &LapSummary) -> Option<RecoveryMetric> {
    let lap_samples: Vec<&Sample> = samples
        .iter()
        .filter(|s| s.lap_number == Some(lap.lap_number))
        .collect();

    let duration_seconds = lap_duration(lap);
    let hr_start = hr_start(&lap_samples);

    if hr_start <= 0.0 || !(duration_seconds.is_finite() && duration_seconds > 0.0) {
        tracing::debug!(
            lap = lap.lap_number,
            hr_start,
            duration_seconds,
            "skipping recovery lap with insufficient data"
        );
        return None;
    }

    let window = lap_window(lap, &lap_samples);
    let (hr_end, hr_end_source) = hr_end(samples, &lap_samples, window);
    tracing::debug!(lap = lap.lap_number, source = ?hr_end_source, hr_end, "resolved recovery end heart rate");

    let hr_drop = if hr_end > 0.0 {
        (hr_start - hr_end).max(0.0)
    } else {
        0.0
    };

    Some(RecoveryMetric {
        lap_number: lap.lap_number,
        recovery_lap_ordinal: 0,
        series: 0,
        duration_seconds,
        hr_start,
        hr_end,
        hr_end_source,
        hr_drop,
        recovery_rate: hr_drop / duration_seconds,
    })
}

/// Lap duration, falling back to the span between its start and end times
pub fn lap_duration(lap: &LapSummary) -> f64 {
    if lap.duration_seconds > 0.0 {
        return lap.duration_seconds;
    }
    match (lap.start_time, lap.end_time) {
        (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
        _ => 0.0,
    }
}

/// Peak heart rate among the lap's own samples, 0 when none is known
pub fn hr_start(lap_samples: &[&Sample]) -> f64 {
    positive_hr(lap_samples.iter().copied()).fold(0.0, f64::max)
}

/// Time window of a lap.
///
/// Uses the lap's own start and end when both are known, then either bound
/// with the lap duration, then the lap's first sample with the duration (or
/// up to its last sample). A duration that overflows the calendar is treated
/// as unknown.
pub fn lap_window(lap: &LapSummary, lap_samples: &[&Sample]) -> Option<Window> {
    let duration = seconds(lap_duration(lap));

    if let (Some(start), Some(end)) = (lap.start_time, lap.end_time) {
        if end >= start {
            return Some((start, end));
        }
    }

    let bounded = match (lap.start_time, lap.end_time, duration) {
        (Some(start), _, Some(d)) => start.checked_add_signed(d).map(|end| (start, end)),
        (None, Some(end), Some(d)) => end.checked_sub_signed(d).map(|start| (start, end)),
        _ => None,
    };
    if bounded.is_some() {
        return bounded;
    }

    let first = lap_samples.iter().map(|s| s.timestamp).min()?;
    let last = lap_samples.iter().map(|s| s.timestamp).max()?;
    let end = duration
        .and_then(|d| first.checked_add_signed(d))
        .unwrap_or(last);
    Some((first, end))
}

/// End-of-recovery heart rate and the tier that produced it
pub fn hr_end(
    samples: &[Sample],
    lap_samples: &[&Sample],
    window: Option<Window>,
) -> (f64, HrEndSource) {
    if let Some(hr) = window.and_then(|w| hr_end_in_window(samples, w)) {
        return (hr, HrEndSource::TimeWindow);
    }
    if let Some(hr) = hr_end_lap_minimum(lap_samples) {
        return (hr, HrEndSource::LapMinimum);
    }
    if let Some(hr) = hr_end_last_sample(lap_samples) {
        return (hr, HrEndSource::LastSample);
    }
    (0.0, HrEndSource::Unavailable)
}

/// Lowest heart rate of any sample timestamped inside the window (inclusive)
pub fn hr_end_in_window(samples: &[Sample], (start, end): Window) -> Option<f64> {
    positive_hr(samples.iter().filter(|s| s.timestamp >= start && s.timestamp <= end))
        .reduce(f64::min)
}

/// Lowest heart rate among the lap's own samples
pub fn hr_end_lap_minimum(lap_samples: &[&Sample]) -> Option<f64> {
    positive_hr(lap_samples.iter().copied()).reduce(f64::min)
}

/// Heart rate reported by the chronologically last sample of the lap
pub fn hr_end_last_sample(lap_samples: &[&Sample]) -> Option<f64> {
    lap_samples
        .iter()
        .filter(|s| s.heart_rate_bpm.is_some())
        .max_by_key(|s| s.timestamp)
        .and_then(|s| s.heart_rate_bpm)
        .filter(|hr| hr.is_finite())
}

fn positive_hr<'a, I>(samples: I) -> impl Iterator<Item = f64> + 'a
where
    I: Iterator<Item = &'a Sample> + 'a,
{
    samples
        .filter_map(|s| SampleField::HeartRate.get(s))
        .filter(|hr| hr.is_finite() && *hr > 0.0)
}

fn seconds(value: f64) -> Option<Duration> {
    if value > 0.0 && value.is_finite() {
        Duration::try_milliseconds((value * 1000.0).round() as i64)
    } else {
        None
    }
}

/// Per-series means of the recovery metrics
pub fn recovery_series_summaries(metrics: &[RecoveryMetric]) -> Vec<SeriesSummary> {
    let mut by_series: BTreeMap<u32, Vec<&RecoveryMetric>> = BTreeMap::new();
    for m in metrics {
        by_series.entry(m.series).or_default().push(m);
    }

    by_series
        .into_iter()
        .map(|(series, group)| SeriesSummary {
            series,
            lap_count: group.len(),
            metrics: MetricSet::new(format!("series {series}"))
                .with("hr_start", mean(group.iter().map(|m| m.hr_start)))
                .with("hr_end", mean(group.iter().map(|m| m.hr_end)))
                .with("hr_drop", mean(group.iter().map(|m| m.hr_drop)))
                .with("recovery_rate", mean(group.iter().map(|m| m.recovery_rate))),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(sec: f64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 4, 10, 0, 0).unwrap()
            + Duration::milliseconds((sec * 1000.0) as i64)
    }

    fn hr_sample(sec: f64, lap: u32, hr: Option<f64>) -> Sample {
        let mut s = Sample::at(t(sec));
        s.lap_number = Some(lap);
        s.heart_rate_bpm = hr;
        s
    }

    fn recovery_lap(number: u32, start: f64, duration: f64) -> LapSummary {
        let mut lap = LapSummary::new(number, "Recovery");
        lap.duration_seconds = duration;
        lap.start_time = Some(t(start));
        lap.end_time = Some(t(start + duration));
        lap
    }

    fn predicate() -> CategoryPredicate {
        CategoryPredicate::new(["recovery"])
    }

    #[test]
    fn test_recovery_reference_case() {
        let laps = vec![
            LapSummary::new(1, "Intensity"),
            recovery_lap(2, 100.0, 14.2),
        ];
        let samples = vec![
            hr_sample(95.0, 1, Some(181.0)),
            hr_sample(100.0, 2, Some(175.0)),
            hr_sample(104.0, 2, Some(160.0)),
            hr_sample(109.0, 2, Some(142.0)),
            hr_sample(114.0, 2, Some(138.0)),
        ];

        let metrics = analyze_recovery(&samples, &laps, &predicate(), 8);
        assert_eq!(metrics.len(), 1);

        let m = &metrics[0];
        assert_eq!(m.lap_number, 2);
        assert_eq!(m.recovery_lap_ordinal, 1);
        assert_eq!(m.series, 1);
        assert_eq!(m.hr_start, 175.0);
        assert_eq!(m.hr_end, 138.0);
        assert_eq!(m.hr_end_source, HrEndSource::TimeWindow);
        assert_eq!(m.hr_drop, 37.0);
        assert!((m.recovery_rate - 2.6056).abs() < 1e-3);
    }

    #[test]
    fn test_insufficient_laps_discarded() {
        let laps = vec![
            recovery_lap(2, 0.0, 20.0),
            recovery_lap(4, 100.0, 0.0),
            recovery_lap(6, 200.0, 20.0),
        ];
        let samples = vec![
            hr_sample(5.0, 2, None),
            hr_sample(105.0, 4, Some(170.0)),
            hr_sample(205.0, 6, Some(168.0)),
            hr_sample(215.0, 6, Some(140.0)),
        ];

        let metrics = analyze_recovery(&samples, &laps, &predicate(), 8);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].lap_number, 6);
        assert_eq!(metrics[0].recovery_lap_ordinal, 1);
        for m in &metrics {
            assert!(m.hr_start > 0.0 && m.duration_seconds > 0.0);
            assert!(m.hr_drop >= 0.0);
        }
    }

    #[test]
    fn test_empty_inputs() {
        assert!(analyze_recovery(&[], &[], &predicate(), 8).is_empty());
        assert!(analyze_recovery(&[], &[recovery_lap(2, 0.0, 10.0)], &predicate(), 8).is_empty());
    }

    #[test]
    fn test_series_over_surviving_laps() {
        let mut laps = Vec::new();
        let mut samples = Vec::new();
        for i in 0..5u32 {
            let start = i as f64 * 100.0;
            laps.push(recovery_lap(i + 1, start, 30.0));
            samples.push(hr_sample(start + 1.0, i + 1, Some(170.0)));
            samples.push(hr_sample(start + 29.0, i + 1, Some(130.0)));
        }

        let metrics = analyze_recovery(&samples, &laps, &predicate(), 2);
        let series: Vec<u32> = metrics.iter().map(|m| m.series).collect();
        assert_eq!(series, vec![1, 1, 2, 2, 3]);
    }

    #[test]
    fn test_hr_end_window_tier() {
        let samples = vec![hr_sample(0.0, 1, Some(120.0)), hr_sample(5.0, 2, Some(150.0))];
        assert_eq!(hr_end_in_window(&samples, (t(4.0), t(6.0))), Some(150.0));
        assert_eq!(hr_end_in_window(&samples, (t(10.0), t(20.0))), None);
    }

    #[test]
    fn test_hr_end_lap_minimum_tier() {
        let samples = vec![
            hr_sample(0.0, 3, Some(160.0)),
            hr_sample(1.0, 3, Some(0.0)),
            hr_sample(2.0, 3, Some(145.0)),
        ];
        let lap_samples: Vec<&Sample> = samples.iter().collect();

        assert_eq!(hr_end_lap_minimum(&lap_samples), Some(145.0));
        let (hr, source) = hr_end(&samples, &lap_samples, Some((t(50.0), t(60.0))));
        assert_eq!((hr, source), (145.0, HrEndSource::LapMinimum));
    }

    #[test]
    fn test_hr_end_last_sample_tier() {
        let samples = vec![hr_sample(2.0, 3, Some(0.0)), hr_sample(0.0, 3, Some(-1.0))];
        let lap_samples: Vec<&Sample> = samples.iter().collect();

        assert_eq!(hr_end_lap_minimum(&lap_samples), None);
        assert_eq!(hr_end_last_sample(&lap_samples), Some(0.0));
        assert_eq!(hr_end(&samples, &lap_samples, None).1, HrEndSource::LastSample);
    }

    #[test]
    fn test_hr_end_unavailable() {
        let samples = vec![hr_sample(0.0, 3, None)];
        let lap_samples: Vec<&Sample> = samples.iter().collect();
        assert_eq!(hr_end(&samples, &lap_samples, None), (0.0, HrEndSource::Unavailable));
    }

    #[test]
    fn test_window_fallbacks() {
        let samples = vec![hr_sample(40.0, 5, Some(150.0)), hr_sample(55.0, 5, Some(140.0))];
        let lap_samples: Vec<&Sample> = samples.iter().collect();

        let mut lap = LapSummary::new(5, "Recovery");
        assert_eq!(lap_window(&lap, &lap_samples), Some((t(40.0), t(55.0))));

        lap.duration_seconds = 10.0;
        assert_eq!(lap_window(&lap, &lap_samples), Some((t(40.0), t(50.0))));

        lap.end_time = Some(t(60.0));
        assert_eq!(lap_window(&lap, &lap_samples), Some((t(50.0), t(60.0))));

        lap.start_time = Some(t(30.0));
        assert_eq!(lap_window(&lap, &lap_samples), Some((t(30.0), t(60.0))));

        assert_eq!(lap_window(&LapSummary::new(6, "Recovery"), &[]), None);
    }

    #[test]
    fn test_window_survives_out_of_range_durations() {
        let samples = vec![hr_sample(40.0, 5, Some(150.0)), hr_sample(55.0, 5, Some(140.0))];
        let lap_samples: Vec<&Sample> = samples.iter().collect();
        let sample_bounds = Some((t(40.0), t(55.0)));

        let mut lap = LapSummary::new(5, "Recovery");
        lap.duration_seconds = 1e13;
        assert_eq!(lap_window(&lap, &lap_samples), sample_bounds);

        lap.start_time = Some(t(0.0));
        assert_eq!(lap_window(&lap, &lap_samples), sample_bounds);

        lap.start_time = None;
        lap.end_time = Some(t(60.0));
        assert_eq!(lap_window(&lap, &lap_samples), sample_bounds);

        for duration in [f64::NAN, f64::INFINITY, 1e300] {
            let mut lap = LapSummary::new(5, "Recovery");
            lap.duration_seconds = duration;
            assert_eq!(lap_window(&lap, &lap_samples), sample_bounds, "{duration}");
        }
    }

    #[test]
    fn test_non_finite_duration_discarded() {
        let samples = vec![hr_sample(1.0, 2, Some(170.0)), hr_sample(9.0, 2, Some(140.0))];
        for duration in [f64::NAN, f64::INFINITY] {
            let mut lap = LapSummary::new(2, "Recovery");
            lap.duration_seconds = duration;
            assert!(analyze_recovery(&samples, &[lap], &predicate(), 8).is_empty());
        }
    }

    #[test]
    fn test_recovery_with_oversized_duration() {
        let mut lap = LapSummary::new(2, "Recovery");
        lap.duration_seconds = 1e13;
        lap.start_time = Some(t(100.0));
        let samples = vec![hr_sample(101.0, 2, Some(172.0)), hr_sample(110.0, 2, Some(141.0))];

        let metrics = analyze_recovery(&samples, &[lap], &predicate(), 8);
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].hr_start, 172.0);
        assert_eq!(metrics[0].hr_end, 141.0);
        assert_eq!(metrics[0].hr_end_source, HrEndSource::TimeWindow);
        assert_eq!(metrics[0].hr_drop, 31.0);
    }

    #[test]
    fn test_duration_from_times() {
        let mut lap = LapSummary::new(1, "Recovery");
        lap.start_time = Some(t(0.0));
        lap.end_time = Some(t(12.5));
        assert_eq!(lap_duration(&lap), 12.5);
    }

    #[test]
    fn test_recovery_series_summaries() {
        let metric = |series, hr_drop| RecoveryMetric {
            lap_number: 1,
            recovery_lap_ordinal: 1,
            series,
            duration_seconds: 10.0,
            hr_start: 170.0,
            hr_end: 170.0 - hr_drop,
            hr_end_source: HrEndSource::TimeWindow,
            hr_drop,
            recovery_rate: hr_drop / 10.0,
        };
        let summaries =
            recovery_series_summaries(&[metric(1, 30.0), metric(1, 20.0), metric(2, 10.0)]);

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].metrics.get("hr_drop"), Some(25.0));
        assert_eq!(summaries[0].metrics.get("recovery_rate"), Some(2.5));
        assert_eq!(summaries[1].lap_count, 1);
    }
}
