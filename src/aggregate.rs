//! Metric aggregation
//!
//! Total reductions over samples and lap summaries: every function here is
//! defined for empty input and returns a finite number.

use crate::types::{
    LapBounds, LapSummary, MetricSet, Sample, SeriesAssignment, SeriesSummary, SessionStats,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Numeric per-sample fields that can be reduced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleField {
    ElapsedTimeInSession,
    ElapsedTimeInLap,
    Distance,
    Speed,
    HeartRate,
    Cadence,
    StanceTime,
    StanceTimePercent,
    StepLength,
    VerticalOscillation,
    VerticalRatio,
    Altitude,
    Temperature,
}

impl SampleField {
    pub fn key(&self) -> &'static str {
        match self {
            SampleField::ElapsedTimeInSession => "elapsed_time_in_session_seconds",
            SampleField::ElapsedTimeInLap => "elapsed_time_in_lap_seconds",
            SampleField::Distance => "distance_meters",
            SampleField::Speed => "speed_kmh",
            SampleField::HeartRate => "heart_rate_bpm",
            SampleField::Cadence => "cadence_steps_per_min",
            SampleField::StanceTime => "stance_time_ms",
            SampleField::StanceTimePercent => "stance_time_percent",
            SampleField::StepLength => "step_length_mm",
            SampleField::VerticalOscillation => "vertical_oscillation_mm",
            SampleField::VerticalRatio => "vertical_ratio",
            SampleField::Altitude => "altitude_meters",
            SampleField::Temperature => "temperature_celsius",
        }
    }

    pub fn get(&self, sample: &Sample) -> Option<f64> {
        match self {
            SampleField::ElapsedTimeInSession => sample.elapsed_time_in_session_seconds,
            SampleField::ElapsedTimeInLap => sample.elapsed_time_in_lap_seconds,
            SampleField::Distance => sample.distance_meters,
            SampleField::Speed => sample.speed_kmh,
            SampleField::HeartRate => sample.heart_rate_bpm,
            SampleField::Cadence => sample.cadence_steps_per_min,
            SampleField::StanceTime => sample.stance_time_ms,
            SampleField::StanceTimePercent => sample.stance_time_percent,
            SampleField::StepLength => sample.step_length_mm,
            SampleField::VerticalOscillation => sample.vertical_oscillation_mm,
            SampleField::VerticalRatio => sample.vertical_ratio,
            SampleField::Altitude => sample.altitude_meters,
            SampleField::Temperature => sample.temperature_celsius,
        }
    }

    /// Whether a zero or negative reading means "no signal" for this field
    pub fn requires_positive(&self) -> bool {
        !matches!(
            self,
            SampleField::ElapsedTimeInSession
                | SampleField::ElapsedTimeInLap
                | SampleField::Distance
                | SampleField::Altitude
                | SampleField::Temperature
        )
    }
}

/// Numeric lap-summary fields averaged per series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LapField {
    Duration,
    AvgSpeed,
    MaxSpeed,
    AvgHeartRate,
    MaxHeartRate,
    AvgCadence,
    AvgStepLength,
    AvgStanceTime,
    AvgStanceTimePercent,
    AvgVerticalOscillation,
    AvgVerticalRatio,
}

impl LapField {
    pub const ALL: [LapField; 11] = [
        LapField::Duration,
        LapField::AvgSpeed,
        LapField::MaxSpeed,
        LapField::AvgHeartRate,
        LapField::MaxHeartRate,
        LapField::AvgCadence,
        LapField::AvgStepLength,
        LapField::AvgStanceTime,
        LapField::AvgStanceTimePercent,
        LapField::AvgVerticalOscillation,
        LapField::AvgVerticalRatio,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            LapField::Duration => "duration_seconds",
            LapField::AvgSpeed => "avg_speed_kmh",
            LapField::MaxSpeed => "max_speed_kmh",
            LapField::AvgHeartRate => "avg_heart_rate_bpm",
            LapField::MaxHeartRate => "max_heart_rate_bpm",
            LapField::AvgCadence => "avg_cadence",
            LapField::AvgStepLength => "avg_step_length_mm",
            LapField::AvgStanceTime => "avg_stance_time_ms",
            LapField::AvgStanceTimePercent => "avg_stance_time_percent",
            LapField::AvgVerticalOscillation => "avg_vertical_oscillation_mm",
            LapField::AvgVerticalRatio => "avg_vertical_ratio",
        }
    }

    pub fn get(&self, lap: &LapSummary) -> f64 {
        match self {
            LapField::Duration => lap.duration_seconds,
            LapField::AvgSpeed => lap.avg_speed_kmh,
            LapField::MaxSpeed => lap.max_speed_kmh,
            LapField::AvgHeartRate => lap.avg_heart_rate_bpm,
            LapField::MaxHeartRate => lap.max_heart_rate_bpm,
            LapField::AvgCadence => lap.avg_cadence,
            LapField::AvgStepLength => lap.avg_step_length_mm,
            LapField::AvgStanceTime => lap.avg_stance_time_ms,
            LapField::AvgStanceTimePercent => lap.avg_stance_time_percent,
            LapField::AvgVerticalOscillation => lap.avg_vertical_oscillation_mm,
            LapField::AvgVerticalRatio => lap.avg_vertical_ratio,
        }
    }
}

/// Arithmetic mean of the finite values, 0 for an empty set
pub fn mean<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    let (sum, count) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Largest finite value, 0 for an empty set
pub fn max<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        .unwrap_or(0.0)
}

/// Smallest finite value, 0 for an empty set
pub fn min<I: IntoIterator<Item = f64>>(values: I) -> f64 {
    values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
        .unwrap_or(0.0)
}

/// Present values of `field`, skipping non-positive readings where they mean "no signal"
pub fn sample_values<'a, I>(samples: I, field: SampleField) -> Vec<f64>
where
    I: IntoIterator<Item = &'a Sample>,
{
    samples
        .into_iter()
        .filter_map(|s| field.get(s))
        .filter(|v| !field.requires_positive() || *v > 0.0)
        .collect()
}

pub fn sample_mean<'a, I>(samples: I, field: SampleField) -> f64
where
    I: IntoIterator<Item = &'a Sample>,
{
    mean(sample_values(samples, field))
}

pub fn sample_max<'a, I>(samples: I, field: SampleField) -> f64
where
    I: IntoIterator<Item = &'a Sample>,
{
    max(sample_values(samples, field))
}

pub fn sample_min<'a, I>(samples: I, field: SampleField) -> f64
where
    I: IntoIterator<Item = &'a Sample>,
{
    min(sample_values(samples, field))
}

/// Mean of a lap field over laps where it is known (> 0)
pub fn lap_mean<'a, I>(laps: I, field: LapField) -> f64
where
    I: IntoIterator<Item = &'a LapSummary>,
{
    mean(laps.into_iter().map(|l| field.get(l)).filter(|v| *v > 0.0))
}

/// Sum of positive altitude differences between chronologically adjacent
/// readings.
///
/// Samples without altitude are skipped rather than treated as 0, and
/// out-of-order samples are put back in time order first.
pub fn elevation_gain<'a, I>(samples: I) -> f64
where
    I: IntoIterator<Item = &'a Sample>,
{
    let mut readings: Vec<_> = samples
        .into_iter()
        .filter_map(|s| s.altitude_meters.map(|alt| (s.timestamp, alt)))
        .filter(|(_, alt)| alt.is_finite())
        .collect();
    readings.sort_by_key(|(ts, _)| *ts);

    readings
        .windows(2)
        .map(|pair| pair[1].1 - pair[0].1)
        .filter(|diff| *diff > 0.0)
        .sum()
}

/// Session statistics over a selection of samples.
///
/// Duration and distance are first-to-last deltas of the cumulative counters.
/// When `intensity_laps` is given, speed and heart-rate statistics only use
/// samples tagged with one of those laps (and are 0 when none are).
pub fn session_stats(samples: &[&Sample], intensity_laps: Option<&HashSet<u32>>) -> SessionStats {
    if samples.is_empty() {
        return SessionStats::default();
    }

    let effort: Vec<&Sample> = match intensity_laps {
        Some(laps) => samples
            .iter()
            .copied()
            .filter(|s| s.lap_number.is_some_and(|n| laps.contains(&n)))
            .collect(),
        None => samples.to_vec(),
    };

    SessionStats {
        sample_count: samples.len(),
        duration_seconds: session_duration(samples),
        distance_meters: counter_delta(samples, SampleField::Distance),
        elevation_gain_meters: elevation_gain(samples.iter().copied()),
        avg_speed_kmh: sample_mean(effort.iter().copied(), SampleField::Speed),
        max_speed_kmh: sample_max(effort.iter().copied(), SampleField::Speed),
        avg_heart_rate_bpm: sample_mean(effort.iter().copied(), SampleField::HeartRate),
        max_heart_rate_bpm: sample_max(effort.iter().copied(), SampleField::HeartRate),
    }
}

fn counter_delta(samples: &[&Sample], field: SampleField) -> f64 {
    let mut present = samples
        .iter()
        .filter_map(|s| field.get(s))
        .filter(|v| v.is_finite());
    match present.next() {
        Some(first) => present.last().map_or(0.0, |last| last - first),
        None => 0.0,
    }
}

fn session_duration(samples: &[&Sample]) -> f64 {
    let elapsed: Vec<f64> = samples
        .iter()
        .filter_map(|s| s.elapsed_time_in_session_seconds)
        .filter(|v| v.is_finite())
        .collect();
    if elapsed.len() >= 2 {
        return elapsed[elapsed.len() - 1] - elapsed[0];
    }

    match (samples.first(), samples.last()) {
        (Some(first), Some(last)) => {
            (last.timestamp - first.timestamp).num_milliseconds() as f64 / 1000.0
        }
        _ => 0.0,
    }
}

/// Lap boundaries observed in the sample stream, in first-appearance order
pub fn detect_laps(samples: &[Sample]) -> Vec<LapBounds> {
    let mut bounds: Vec<LapBounds> = Vec::new();

    for sample in samples {
        let Some(lap_number) = sample.lap_number else {
            continue;
        };
        match bounds.iter_mut().find(|b| b.lap_number == lap_number) {
            Some(existing) => {
                existing.end_time = sample.timestamp;
                existing.sample_count += 1;
            }
            None => bounds.push(LapBounds {
                lap_number,
                start_time: sample.timestamp,
                end_time: sample.timestamp,
                sample_count: 1,
            }),
        }
    }

    bounds
}

/// Lap restriction of a sample selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapFilter {
    #[default]
    All,
    Lap(u32),
}

/// Immutable view over the sample stream: one lap or all, then a fractional
/// time range of what remains
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleSelection {
    pub lap: LapFilter,
    /// Start and end of the kept range as fractions of the filtered samples
    pub range: (f64, f64),
}

impl Default for SampleSelection {
    fn default() -> Self {
        Self {
            lap: LapFilter::All,
            range: (0.0, 1.0),
        }
    }
}

impl SampleSelection {
    pub fn lap(lap_number: u32) -> Self {
        Self {
            lap: LapFilter::Lap(lap_number),
            ..Self::default()
        }
    }

    pub fn with_range(mut self, start: f64, end: f64) -> Self {
        self.range = (start, end);
        self
    }

    /// Range fractions clamped to [0, 1] and ordered
    pub fn normalized_range(&self) -> (f64, f64) {
        let clamp = |v: f64, fallback: f64| if v.is_finite() { v.clamp(0.0, 1.0) } else { fallback };
        let start = clamp(self.range.0, 0.0);
        let end = clamp(self.range.1, 1.0);
        if start <= end {
            (start, end)
        } else {
            (end, start)
        }
    }

    pub fn apply<'a>(&self, samples: &'a [Sample]) -> Vec<&'a Sample> {
        let filtered: Vec<&Sample> = match self.lap {
            LapFilter::All => samples.iter().collect(),
            LapFilter::Lap(n) => samples.iter().filter(|s| s.lap_number == Some(n)).collect(),
        };

        let (start, end) = self.normalized_range();
        let len = filtered.len();
        let from = ((start * len as f64).floor() as usize).min(len);
        let to = ((end * len as f64).floor() as usize).clamp(from, len);

        filtered[from..to].to_vec()
    }
}

/// Average every lap field over a set of laps
pub fn summarize_laps<'a, I>(name: impl Into<String>, laps: I) -> MetricSet
where
    I: IntoIterator<Item = &'a LapSummary> + Clone,
{
    let mut metrics = MetricSet::new(name);
    for field in LapField::ALL {
        metrics.insert(field.key(), lap_mean(laps.clone(), field));
    }
    metrics
}

/// Per-series lap averages, in ascending series order
pub fn series_summaries(assignments: &[SeriesAssignment]) -> Vec<SeriesSummary> {
    let mut by_series: BTreeMap<u32, Vec<&LapSummary>> = BTreeMap::new();
    for a in assignments {
        by_series.entry(a.series).or_default().push(&a.lap);
    }

    by_series
        .into_iter()
        .map(|(series, laps)| SeriesSummary {
            series,
            lap_count: laps.len(),
            metrics: summarize_laps(format!("series {series}"), laps.iter().copied()),
        })
        .collect()
}
