//! Serialization of parsed records back to delimited text
//!
//! Output uses canonical column names, so it re-parses to the same records.

use super::laps::LapColumn;
use super::samples::SampleColumn;
use crate::error::ComputeError;
use crate::types::{LapSummary, Sample};
use chrono::{DateTime, SecondsFormat, Utc};
use csv::Writer;

/// Write samples as a CSV table with canonical headers
pub fn write_samples(samples: &[Sample]) -> Result<String, ComputeError> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(SampleColumn::ALL.iter().map(|c| c.canonical()))?;

    for s in samples {
        writer.write_record([
            format_time(Some(s.timestamp)),
            format_opt(s.elapsed_time_in_session_seconds),
            format_opt(s.elapsed_time_in_lap_seconds),
            format_opt(s.distance_meters),
            format_opt(s.speed_kmh),
            format_opt(s.heart_rate_bpm),
            format_opt(s.cadence_steps_per_min),
            format_opt(s.stance_time_ms),
            format_opt(s.stance_time_percent),
            format_opt(s.step_length_mm),
            format_opt(s.vertical_oscillation_mm),
            format_opt(s.vertical_ratio),
            format_opt(s.altitude_meters),
            format_opt(s.temperature_celsius),
            s.lap_number.map(|n| n.to_string()).unwrap_or_default(),
        ])?;
    }

    finish(writer)
}

/// Write lap summaries as a CSV table with canonical headers
pub fn write_laps(laps: &[LapSummary]) -> Result<String, ComputeError> {
    let mut writer = Writer::from_writer(Vec::new());
    writer.write_record(LapColumn::ALL.iter().map(|c| c.canonical()))?;

    for lap in laps {
        writer.write_record([
            lap.lap_number.to_string(),
            lap.lap_nature.clone(),
            lap.duration_seconds.to_string(),
            format_time(lap.start_time),
            format_time(lap.end_time),
            lap.avg_speed_kmh.to_string(),
            lap.max_speed_kmh.to_string(),
            lap.avg_heart_rate_bpm.to_string(),
            lap.max_heart_rate_bpm.to_string(),
            lap.avg_cadence.to_string(),
            lap.avg_step_length_mm.to_string(),
            lap.avg_stance_time_ms.to_string(),
            lap.avg_stance_time_percent.to_string(),
            lap.avg_vertical_oscillation_mm.to_string(),
            lap.avg_vertical_ratio.to_string(),
        ])?;
    }

    finish(writer)
}

fn format_opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn format_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_default()
}

fn finish(writer: Writer<Vec<u8>>) -> Result<String, ComputeError> {
    let bytes = writer
        .into_inner()
        .map_err(|e| ComputeError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ComputeError::ParseError(e.to_string()))
}
