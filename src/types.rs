//! Core types for the Lapflux pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: parsed samples and lap summaries, series assignments, and the
//! derived recovery, pacing and drift datasets.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One telemetry reading from the per-sample table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Absolute time of the reading (UTC)
    pub timestamp: DateTime<Utc>,
    /// Cumulative elapsed time since session start (seconds)
    pub elapsed_time_in_session_seconds: Option<f64>,
    /// Elapsed time since the start of the current lap (seconds)
    pub elapsed_time_in_lap_seconds: Option<f64>,
    /// Cumulative distance (meters)
    pub distance_meters: Option<f64>,
    /// Instantaneous speed (km/h)
    pub speed_kmh: Option<f64>,
    /// Heart rate (bpm)
    pub heart_rate_bpm: Option<f64>,
    /// Running cadence (steps per minute)
    pub cadence_steps_per_min: Option<f64>,
    /// Ground contact time (ms)
    pub stance_time_ms: Option<f64>,
    /// Ground contact time as a share of the stride (%)
    pub stance_time_percent: Option<f64>,
    /// Step length (mm)
    pub step_length_mm: Option<f64>,
    /// Vertical oscillation (mm)
    pub vertical_oscillation_mm: Option<f64>,
    /// Vertical oscillation over step length (%)
    pub vertical_ratio: Option<f64>,
    /// Altitude (meters)
    pub altitude_meters: Option<f64>,
    /// Ambient temperature (celsius)
    pub temperature_celsius: Option<f64>,
    /// Lap this sample belongs to (matches `LapSummary::lap_number`)
    pub lap_number: Option<u32>,
}

impl Sample {
    /// A sample with only a timestamp; every sensor field absent
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            elapsed_time_in_session_seconds: None,
            elapsed_time_in_lap_seconds: None,
            distance_meters: None,
            speed_kmh: None,
            heart_rate_bpm: None,
            cadence_steps_per_min: None,
            stance_time_ms: None,
            stance_time_percent: None,
            step_length_mm: None,
            vertical_oscillation_mm: None,
            vertical_ratio: None,
            altitude_meters: None,
            temperature_celsius: None,
            lap_number: None,
        }
    }
}

/// One lap's aggregate from the per-lap table.
///
/// Numeric columns missing from the source table are 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapSummary {
    pub lap_number: u32,
    /// Free-text category label as exported ("Intensity", "Récupération", ...)
    pub lap_nature: String,
    pub duration_seconds: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub avg_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub avg_heart_rate_bpm: f64,
    pub max_heart_rate_bpm: f64,
    pub avg_cadence: f64,
    pub avg_step_length_mm: f64,
    pub avg_stance_time_ms: f64,
    pub avg_stance_time_percent: f64,
    pub avg_vertical_oscillation_mm: f64,
    pub avg_vertical_ratio: f64,
}

impl LapSummary {
    /// An empty lap with the given number and nature
    pub fn new(lap_number: u32, lap_nature: impl Into<String>) -> Self {
        Self {
            lap_number,
            lap_nature: lap_nature.into(),
            duration_seconds: 0.0,
            start_time: None,
            end_time: None,
            avg_speed_kmh: 0.0,
            max_speed_kmh: 0.0,
            avg_heart_rate_bpm: 0.0,
            max_heart_rate_bpm: 0.0,
            avg_cadence: 0.0,
            avg_step_length_mm: 0.0,
            avg_stance_time_ms: 0.0,
            avg_stance_time_percent: 0.0,
            avg_vertical_oscillation_mm: 0.0,
            avg_vertical_ratio: 0.0,
        }
    }
}

/// Semantic category of a lap after label matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LapCategory {
    Intensity,
    Recovery,
    Other,
}

impl LapCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LapCategory::Intensity => "intensity",
            LapCategory::Recovery => "recovery",
            LapCategory::Other => "other",
        }
    }
}

/// A lap assigned to an ordinal training series within its category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesAssignment {
    /// 1-based series number
    pub series: u32,
    /// 0-based position among laps of the same category
    pub index_in_category: usize,
    pub lap: LapSummary,
}

/// Which fallback tier produced `RecoveryMetric::hr_end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HrEndSource {
    /// Minimum heart rate inside the lap's time window
    TimeWindow,
    /// Minimum heart rate among samples tagged with the lap number
    LapMinimum,
    /// Heart rate of the chronologically last sample of the lap
    LastSample,
    /// No heart rate could be found
    Unavailable,
}

/// Heart-rate recovery quality for one recovery lap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryMetric {
    pub lap_number: u32,
    /// 1-based position among the reported recovery laps
    pub recovery_lap_ordinal: u32,
    pub series: u32,
    pub duration_seconds: f64,
    /// Peak heart rate carried into the recovery (bpm)
    pub hr_start: f64,
    /// Lowest heart rate reached during the recovery (bpm)
    pub hr_end: f64,
    pub hr_end_source: HrEndSource,
    /// `hr_start - hr_end`, never negative
    pub hr_drop: f64,
    /// Heart-rate drop per second (bpm/s)
    pub recovery_rate: f64,
}

/// Pacing consistency of an intensity lap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingStyle {
    Steady,
    Unsteady,
}

impl PacingStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            PacingStyle::Steady => "steady",
            PacingStyle::Unsteady => "unsteady",
        }
    }
}

/// Pacing classification for one intensity lap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingClassification {
    pub lap_number: u32,
    /// 1-based position among intensity laps
    pub lap_ordinal: u32,
    pub series: u32,
    pub duration_seconds: f64,
    pub avg_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub max_heart_rate_bpm: f64,
    pub avg_vertical_ratio: f64,
    /// `(max - avg) / avg * 100`, 0 when the average speed is unknown
    pub pacing_delta_percent: f64,
    pub classification: PacingStyle,
}

/// One named metric value inside a `MetricSet`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub metric: String,
    pub value: f64,
}

/// A named, ordered set of scalar metrics (e.g. the averages of one series)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    pub name: String,
    pub values: Vec<MetricValue>,
}

impl MetricSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// Append a metric, replacing any existing value with the same name
    pub fn insert(&mut self, metric: impl Into<String>, value: f64) {
        let metric = metric.into();
        match self.values.iter_mut().find(|v| v.metric == metric) {
            Some(existing) => existing.value = value,
            None => self.values.push(MetricValue { metric, value }),
        }
    }

    pub fn with(mut self, metric: impl Into<String>, value: f64) -> Self {
        self.insert(metric, value);
        self
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|v| v.metric == metric)
            .map(|v| v.value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Per-metric difference between two metric sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftRecord {
    pub metric: String,
    pub value1: f64,
    pub value2: f64,
    /// `value2 - value1`
    pub absolute_drift: f64,
    /// `absolute_drift / value1 * 100`, 0 when `value1` is 0
    pub percent_drift: f64,
}

/// Drift of one series against a baseline series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDrift {
    pub baseline_series: u32,
    pub compared_series: u32,
    pub records: Vec<DriftRecord>,
}

/// Per-series averages for one lap category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSummary {
    pub series: u32,
    pub lap_count: usize,
    pub metrics: MetricSet,
}

/// Summary statistics over a selection of samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub sample_count: usize,
    pub duration_seconds: f64,
    pub distance_meters: f64,
    pub elevation_gain_meters: f64,
    pub avg_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub avg_heart_rate_bpm: f64,
    pub max_heart_rate_bpm: f64,
}

/// Lap boundaries detected from the sample stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LapBounds {
    pub lap_number: u32,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub sample_count: usize,
}

/// Per-style aggregate of classified intensity laps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingGroup {
    pub classification: PacingStyle,
    pub lap_count: usize,
    pub avg_duration_seconds: f64,
    pub avg_max_heart_rate_bpm: f64,
    pub avg_vertical_ratio: f64,
}

/// Pacing classification results grouped by style
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacingSummary {
    /// Threshold actually applied (fixed or computed median)
    pub threshold_percent: f64,
    pub groups: Vec<PacingGroup>,
}

/// One correlate of a target metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlate {
    pub metric: String,
    pub coefficient: f64,
}

/// Pearson correlations between intensity-lap metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationReport {
    pub metrics: Vec<String>,
    /// Row-major coefficient matrix; `None` where a metric has no variance
    pub matrix: Vec<Vec<Option<f64>>>,
    /// Most negative correlates of lap duration
    pub duration_predictors: Vec<Correlate>,
    /// Most positive correlates of average speed
    pub speed_predictors: Vec<Correlate>,
    /// Most positive correlates of maximum heart rate
    pub max_hr_correlates: Vec<Correlate>,
}

/// Source table kind, used to attribute parse failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    Samples,
    Laps,
}

/// A parse failure local to one source table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableError {
    pub table: TableKind,
    pub message: String,
}

/// Every derived dataset for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub sample_count: usize,
    pub lap_count: usize,
    pub detected_laps: Vec<LapBounds>,
    pub session_stats: Option<SessionStats>,
    pub intensity_series: Vec<SeriesAssignment>,
    pub intensity_summaries: Vec<SeriesSummary>,
    pub intensity_drift: Vec<SeriesDrift>,
    pub recovery: Vec<RecoveryMetric>,
    pub recovery_summaries: Vec<SeriesSummary>,
    pub recovery_drift: Vec<SeriesDrift>,
    pub pacing: Vec<PacingClassification>,
    pub pacing_summary: Option<PacingSummary>,
    pub correlations: Option<CorrelationReport>,
    pub table_errors: Vec<TableError>,
}

/// Producer metadata attached to encoded reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Encoded session report envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportPayload {
    pub producer: ReportProducer,
    pub computed_at_utc: String,
    pub config: crate::config::AnalysisConfig,
    pub report: SessionReport,
}
