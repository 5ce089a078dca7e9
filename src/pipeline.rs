//! Pipeline orchestration
//!
//! This module provides the public API for Lapflux. It runs the full
//! derivation from the two exported text tables to a `SessionReport`.

use crate::aggregate::{detect_laps, series_summaries, session_stats, SampleSelection};
use crate::classifier::LapClassifier;
use crate::config::AnalysisConfig;
use crate::correlation::correlate_laps;
use crate::drift::series_drift;
use crate::encoder::ReportEncoder;
use crate::error::ComputeError;
use crate::pacing::PacingClassifier;
use crate::parser::{LapTableParser, SampleTableParser, TableParser};
use crate::recovery::{analyze_recovery, recovery_series_summaries};
use crate::types::{
    LapCategory, LapSummary, Sample, SessionReport, SessionStats, TableError, TableKind,
};
use std::collections::HashSet;

/// Analyze one session from its raw sample and lap tables.
///
/// Either table may be absent. A table that fails to parse is reported in
/// `table_errors` and treated as empty; the other table is still derived.
///
/// # Example
/// ```ignore
/// let report = analyze_session(Some(samples_csv), Some(laps_csv), &AnalysisConfig::default());
/// for m in &report.recovery {
///     println!("lap {} dropped {} bpm", m.lap_number, m.hr_drop);
/// }
/// ```
pub fn analyze_session(
    samples_csv: Option<&str>,
    laps_csv: Option<&str>,
    config: &AnalysisConfig,
) -> SessionReport {
    SessionAnalyzer::from_config(config.clone()).analyze(samples_csv, laps_csv)
}

/// Analyze one session and encode the report as pretty JSON
pub fn session_to_report_json(
    samples_csv: Option<&str>,
    laps_csv: Option<&str>,
    config: &AnalysisConfig,
) -> Result<String, ComputeError> {
    SessionAnalyzer::new(config.clone())?.analyze_to_json(samples_csv, laps_csv)
}

/// Run every derivation over already-parsed records.
///
/// Pipeline stages:
/// 1. LapClassifier - Intensity and recovery series
/// 2. Aggregator - Session stats, lap bounds, per-series averages
/// 3. Recovery analyzer - Heart-rate recovery per recovery lap
/// 4. PacingClassifier - Steady/unsteady intensity laps
/// 5. Drift - Later series against the first
/// 6. Correlations - Relationships between intensity-lap metrics
pub fn derive(samples: &[Sample], laps: &[LapSummary], config: &AnalysisConfig) -> SessionReport {
    let classifier = LapClassifier::from_config(config);

    // Stage 1: Classify laps into series
    let intensity_series = classifier.intensity_series(laps);
    let recovery_series = classifier.recovery_series(laps);

    // Stage 2: Aggregate
    let all_samples: Vec<&Sample> = samples.iter().collect();
    let intensity_laps = intensity_lap_numbers(&classifier, laps);
    let session_stats = (!samples.is_empty())
        .then(|| session_stats(&all_samples, intensity_laps.as_ref()));
    let intensity_summaries = series_summaries(&intensity_series);

    // Stage 3: Recovery quality
    let recovery = analyze_recovery(
        samples,
        laps,
        classifier.recovery_predicate(),
        classifier.group_size(),
    );
    let recovery_summaries = recovery_series_summaries(&recovery);

    // Stage 4: Pacing
    let pacing_classifier = PacingClassifier::for_laps(&config.pacing_threshold, &intensity_series);
    let pacing = pacing_classifier.classify(&intensity_series);
    let pacing_summary = (!pacing.is_empty()).then(|| pacing_classifier.summarize(&pacing));

    // Stage 5: Drift
    let intensity_drift = series_drift(&intensity_summaries);
    let recovery_drift = series_drift(&recovery_summaries);

    // Stage 6: Correlations
    let correlations = correlate_laps(&intensity_series);

    tracing::debug!(
        samples = samples.len(),
        laps = laps.len(),
        intensity = intensity_series.len(),
        recovery_laps = recovery_series.len(),
        recovery_reported = recovery.len(),
        "derived session report"
    );

    SessionReport {
        sample_count: samples.len(),
        lap_count: laps.len(),
        detected_laps: detect_laps(samples),
        session_stats,
        intensity_series,
        intensity_summaries,
        intensity_drift,
        recovery,
        recovery_summaries,
        recovery_drift,
        pacing,
        pacing_summary,
        correlations,
        table_errors: Vec::new(),
    }
}

/// Lap numbers of intensity laps; `None` without a lap table
fn intensity_lap_numbers(classifier: &LapClassifier, laps: &[LapSummary]) -> Option<HashSet<u32>> {
    if laps.is_empty() {
        return None;
    }
    Some(
        laps.iter()
            .filter(|lap| classifier.category_of(lap) == LapCategory::Intensity)
            .map(|lap| lap.lap_number)
            .collect(),
    )
}

/// Reusable analyzer holding a validated configuration and its parsers.
///
/// Use this when several sessions are analyzed with the same settings.
pub struct SessionAnalyzer {
    config: AnalysisConfig,
    classifier: LapClassifier,
    sample_parser: SampleTableParser,
    lap_parser: LapTableParser,
    encoder: ReportEncoder,
}

impl Default for SessionAnalyzer {
    fn default() -> Self {
        Self::from_config(AnalysisConfig::default())
    }
}

impl SessionAnalyzer {
    /// Create an analyzer, rejecting an invalid configuration
    pub fn new(config: AnalysisConfig) -> Result<Self, ComputeError> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: AnalysisConfig) -> Self {
        Self {
            classifier: LapClassifier::from_config(&config),
            sample_parser: SampleTableParser::with_extra_aliases(&config.sample_field_aliases),
            lap_parser: LapTableParser::with_extra_aliases(&config.lap_field_aliases),
            encoder: ReportEncoder::new(),
            config,
        }
    }

    /// Use a specific encoder (e.g. with a fixed instance id)
    pub fn with_encoder(mut self, encoder: ReportEncoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Parse a sample table with this analyzer's aliases
    pub fn parse_samples(&self, text: &str) -> Result<Vec<Sample>, ComputeError> {
        Ok(self.sample_parser.parse(text)?.records)
    }

    /// Parse a lap table with this analyzer's aliases
    pub fn parse_laps(&self, text: &str) -> Result<Vec<LapSummary>, ComputeError> {
        Ok(self.lap_parser.parse(text)?.records)
    }

    pub fn analyze(&self, samples_csv: Option<&str>, laps_csv: Option<&str>) -> SessionReport {
        let mut table_errors = Vec::new();

        let samples = load_table(samples_csv, TableKind::Samples, &mut table_errors, |text| {
            self.parse_samples(text)
        });
        let laps = load_table(laps_csv, TableKind::Laps, &mut table_errors, |text| {
            self.parse_laps(text)
        });

        let mut report = derive(&samples, &laps, &self.config);
        report.table_errors = table_errors;
        report
    }

    pub fn analyze_to_json(
        &self,
        samples_csv: Option<&str>,
        laps_csv: Option<&str>,
    ) -> Result<String, ComputeError> {
        let report = self.analyze(samples_csv, laps_csv);
        self.encoder.encode_to_json(&report, &self.config)
    }

    /// Session statistics over a selection of the samples.
    ///
    /// With a lap table, speed and heart rate only use intensity laps.
    pub fn selection_stats(
        &self,
        samples: &[Sample],
        laps: Option<&[LapSummary]>,
        selection: &SampleSelection,
    ) -> SessionStats {
        let selected = selection.apply(samples);
        let intensity = laps.and_then(|laps| intensity_lap_numbers(&self.classifier, laps));
        session_stats(&selected, intensity.as_ref())
    }
}

fn load_table<T, F>(
    text: Option<&str>,
    table: TableKind,
    errors: &mut Vec<TableError>,
    parse: F,
) -> Vec<T>
where
    F: FnOnce(&str) -> Result<Vec<T>, ComputeError>,
{
    let Some(text) = text else {
        return Vec::new();
    };

    match parse(text) {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!(table = ?table, error = %e, "table could not be parsed; continuing without it");
            errors.push(TableError {
                table,
                message: e.to_string(),
            });
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PacingThreshold;
    use crate::types::{HrEndSource, PacingStyle};

    const INTENSITY_SPEEDS_FIRST: f64 = 17.37;
    const INTENSITY_SPEEDS_LAST: f64 = 18.76;

    fn intensity_speeds() -> Vec<f64> {
        let step = (INTENSITY_SPEEDS_LAST - INTENSITY_SPEEDS_FIRST) / 15.0;
        (0..16)
            .map(|i| INTENSITY_SPEEDS_FIRST + step * i as f64)
            .collect()
    }

    /// 16 intensity laps of 35 s, each followed by a 15 s recovery lap
    fn session_laps_csv() -> String {
        let mut csv = String::from(
            "lap_number,lap_nature,lap_duration,start_time,end_time,avg_speed_kmh,max_speed_kmh,avg_heart_rate,max_heart_rate,avg_vertical_ratio\n",
        );
        for (i, speed) in intensity_speeds().iter().enumerate() {
            let start = i as u32 * 50;
            let max_speed = speed * if i % 2 == 0 { 1.05 } else { 1.12 };
            csv.push_str(&format!(
                "{},Intensity,35,{},{},{speed},{max_speed},165,{},7.9\n",
                i * 2 + 1,
                timestamp(start),
                timestamp(start + 35),
                170 + i,
            ));
            csv.push_str(&format!(
                "{},Récupération,15,{},{},8.0,10.0,160,175,8.4\n",
                i * 2 + 2,
                timestamp(start + 35),
                timestamp(start + 50),
            ));
        }
        csv
    }

    /// One sample per 5 s; heart rate peaks at 175 and falls through each recovery
    fn session_samples_csv() -> String {
        let mut csv = String::from("timestamp,distance,speed_kmh,heart_rate,altitude,lap_number \n");
        let mut distance = 0.0;
        for i in 0..16u32 {
            let start = i * 50;
            for k in 0..7 {
                distance += 25.0;
                csv.push_str(&format!(
                    "{},{distance},18.0,{},12.0,{}\n",
                    timestamp(start + k * 5),
                    160 + k * 2,
                    i * 2 + 1
                ));
            }
            for (k, hr) in [175, 160, 142].iter().enumerate() {
                distance += 10.0;
                csv.push_str(&format!(
                    "{},{distance},8.0,{hr},12.5,{}\n",
                    timestamp(start + 35 + k as u32 * 5),
                    i * 2 + 2
                ));
            }
        }
        csv
    }

    fn timestamp(offset_seconds: u32) -> String {
        let minutes = offset_seconds / 60;
        let seconds = offset_seconds % 60;
        format!("2024-05-04 10:{minutes:02}:{seconds:02}")
    }

    #[test]
    fn test_end_to_end_session() {
        let report = analyze_session(
            Some(session_samples_csv().as_str()),
            Some(session_laps_csv().as_str()),
            &AnalysisConfig::default(),
        );

        assert!(report.table_errors.is_empty());
        assert_eq!(report.lap_count, 32);
        assert_eq!(report.intensity_series.len(), 16);
        assert_eq!(report.detected_laps.len(), 32);

        let speeds = intensity_speeds();
        let s1 = speeds[..8].iter().sum::<f64>() / 8.0;
        let s2 = speeds[8..].iter().sum::<f64>() / 8.0;

        assert_eq!(report.intensity_summaries.len(), 2);
        let avg1 = report.intensity_summaries[0].metrics.get("avg_speed_kmh").unwrap();
        let avg2 = report.intensity_summaries[1].metrics.get("avg_speed_kmh").unwrap();
        assert!((avg1 - s1).abs() < 1e-9);
        assert!((avg2 - s2).abs() < 1e-9);

        assert_eq!(report.intensity_drift.len(), 1);
        let speed_drift = report.intensity_drift[0]
            .records
            .iter()
            .find(|r| r.metric == "avg_speed_kmh")
            .unwrap();
        assert!(speed_drift.percent_drift > 0.0);
        assert!((speed_drift.absolute_drift - (s2 - s1)).abs() < 1e-9);
    }

    #[test]
    fn test_end_to_end_recovery_and_pacing() {
        let report = analyze_session(
            Some(session_samples_csv().as_str()),
            Some(session_laps_csv().as_str()),
            &AnalysisConfig::default(),
        );

        assert_eq!(report.recovery.len(), 16);
        let first = &report.recovery[0];
        assert_eq!(first.lap_number, 2);
        assert_eq!(first.hr_start, 175.0);
        assert_eq!(first.hr_end, 142.0);
        assert_eq!(first.hr_end_source, HrEndSource::TimeWindow);
        assert_eq!(first.hr_drop, 33.0);
        assert!((first.recovery_rate - 2.2).abs() < 1e-9);
        assert_eq!(report.recovery[15].series, 2);
        assert_eq!(report.recovery_summaries.len(), 2);
        assert_eq!(report.recovery_drift.len(), 1);

        assert_eq!(report.pacing.len(), 16);
        assert_eq!(report.pacing[0].classification, PacingStyle::Steady);
        assert_eq!(report.pacing[1].classification, PacingStyle::Unsteady);
        let summary = report.pacing_summary.as_ref().unwrap();
        assert_eq!(summary.threshold_percent, 9.15);
        assert_eq!(summary.groups.len(), 2);

        assert!(report.correlations.is_some());
    }

    #[test]
    fn test_session_stats_use_intensity_laps() {
        let report = analyze_session(
            Some(session_samples_csv().as_str()),
            Some(session_laps_csv().as_str()),
            &AnalysisConfig::default(),
        );

        let stats = report.session_stats.unwrap();
        assert_eq!(stats.sample_count, 160);
        assert_eq!(stats.avg_speed_kmh, 18.0);
        assert_eq!(stats.max_heart_rate_bpm, 172.0);
        assert_eq!(stats.elevation_gain_meters, 8.0);
        assert_eq!(stats.distance_meters, 16.0 * 205.0 - 25.0);
    }

    #[test]
    fn test_table_errors_are_local() {
        let report = analyze_session(Some(""), Some(session_laps_csv().as_str()), &AnalysisConfig::default());

        assert_eq!(report.table_errors.len(), 1);
        assert_eq!(report.table_errors[0].table, TableKind::Samples);
        assert_eq!(report.sample_count, 0);
        assert!(report.session_stats.is_none());
        assert_eq!(report.intensity_series.len(), 16);
        assert_eq!(report.pacing.len(), 16);
        assert!(report.recovery.is_empty());
    }

    #[test]
    fn test_oversized_lap_duration_degrades_to_sample_window() {
        let samples = "timestamp,heart_rate,lap_number\n\
                       2024-05-04 10:00:01,170,2\n\
                       2024-05-04 10:00:05,150,2\n\
                       2024-05-04 10:00:10,140,2\n";

        for bound in ["start_time", "end_time"] {
            let laps = format!("lap_number,lap_nature,lap_duration,{bound}\n2,Recovery,1e13,2024-05-04 10:00:00\n");
            let report = analyze_session(Some(samples), Some(laps.as_str()), &AnalysisConfig::default());

            assert!(report.table_errors.is_empty(), "{bound}");
            assert_eq!(report.recovery.len(), 1, "{bound}");
            let m = &report.recovery[0];
            assert_eq!(m.hr_start, 170.0);
            assert_eq!(m.hr_end, 140.0);
            assert_eq!(m.hr_end_source, HrEndSource::TimeWindow);
            assert_eq!(m.duration_seconds, 1e13);
            assert!(m.recovery_rate.is_finite());
        }
    }

    #[test]
    fn test_no_tables() {
        let report = analyze_session(None, None, &AnalysisConfig::default());
        assert_eq!(report, SessionReport::default());
    }

    #[test]
    fn test_group_size_and_median_threshold() {
        let config = AnalysisConfig::default()
            .with_group_size(4)
            .with_pacing_threshold(PacingThreshold::Median);
        let report = analyze_session(None, Some(session_laps_csv().as_str()), &config);

        assert_eq!(report.intensity_summaries.len(), 4);
        assert_eq!(report.intensity_drift.len(), 3);
        let threshold = report.pacing_summary.unwrap().threshold_percent;
        assert!(threshold > 5.0 && threshold < 12.0);
    }

    #[test]
    fn test_analyzer_rejects_invalid_config() {
        let config = AnalysisConfig {
            series_group_size: 0,
            ..AnalysisConfig::default()
        };
        assert!(SessionAnalyzer::new(config).is_err());
    }

    #[test]
    fn test_selection_stats() {
        let analyzer = SessionAnalyzer::default();
        let samples = analyzer.parse_samples(&session_samples_csv()).unwrap();
        let laps = analyzer.parse_laps(&session_laps_csv()).unwrap();

        let lap_two = analyzer.selection_stats(&samples, Some(&laps), &SampleSelection::lap(2));
        assert_eq!(lap_two.sample_count, 3);
        assert_eq!(lap_two.avg_speed_kmh, 0.0);

        let lap_two_raw = analyzer.selection_stats(&samples, None, &SampleSelection::lap(2));
        assert_eq!(lap_two_raw.max_heart_rate_bpm, 175.0);
        assert_eq!(lap_two_raw.duration_seconds, 10.0);
    }

    #[test]
    fn test_report_json() {
        let json = session_to_report_json(
            Some(session_samples_csv().as_str()),
            Some(session_laps_csv().as_str()),
            &AnalysisConfig::default(),
        )
        .unwrap();

        let payload: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(payload["producer"]["name"], "lapflux");
        assert_eq!(payload["config"]["series_group_size"], 8);
        assert_eq!(payload["report"]["intensity_series"].as_array().unwrap().len(), 16);
    }
}
