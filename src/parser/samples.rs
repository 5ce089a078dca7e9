//! Per-sample telemetry table parser

use super::columns::{AliasTable, ResolvedColumns};
use super::value::CellValue;
use super::{read_rows, ParsedTable, TableParser};
use crate::error::ComputeError;
use crate::types::Sample;
use csv::StringRecord;
use std::collections::HashMap;

/// Canonical sample-table columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleColumn {
    Timestamp,
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
    LapNumber,
}

impl SampleColumn {
    pub const ALL: [SampleColumn; 15] = [
        SampleColumn::Timestamp,
        SampleColumn::ElapsedTimeInSession,
        SampleColumn::ElapsedTimeInLap,
        SampleColumn::Distance,
        SampleColumn::Speed,
        SampleColumn::HeartRate,
        SampleColumn::Cadence,
        SampleColumn::StanceTime,
        SampleColumn::StanceTimePercent,
        SampleColumn::StepLength,
        SampleColumn::VerticalOscillation,
        SampleColumn::VerticalRatio,
        SampleColumn::Altitude,
        SampleColumn::Temperature,
        SampleColumn::LapNumber,
    ];

    /// Canonical external column name
    pub fn canonical(&self) -> &'static str {
        match self {
            SampleColumn::Timestamp => "timestamp",
            SampleColumn::ElapsedTimeInSession => "elapsed_time_s",
            SampleColumn::ElapsedTimeInLap => "elapsed_time_in_lap",
            SampleColumn::Distance => "distance",
            SampleColumn::Speed => "speed_kmh",
            SampleColumn::HeartRate => "heart_rate",
            SampleColumn::Cadence => "cadence_step_per_min",
            SampleColumn::StanceTime => "stance_time",
            SampleColumn::StanceTimePercent => "stance_time_percent",
            SampleColumn::StepLength => "step_length",
            SampleColumn::VerticalOscillation => "vertical_oscillation",
            SampleColumn::VerticalRatio => "vertical_ratio",
            SampleColumn::Altitude => "altitude",
            SampleColumn::Temperature => "temperature",
            SampleColumn::LapNumber => "lap_number",
        }
    }

    pub fn from_canonical(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.canonical() == name)
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            SampleColumn::Timestamp => &["timestamp", "time", "date"],
            SampleColumn::ElapsedTimeInSession => &[
                "elapsed_time_s",
                "elapsed_time",
                "elapsed_time_in_session",
                "elapsed_time_in_session_seconds",
            ],
            SampleColumn::ElapsedTimeInLap => &[
                "elapsed_time_in_lap",
                "lap_elapsed_time_s",
                "elapsed_time_in_lap_seconds",
            ],
            SampleColumn::Distance => &["distance", "distance_m", "distance_meters"],
            SampleColumn::Speed => &["speed_kmh", "speed"],
            SampleColumn::HeartRate => &["heart_rate", "hr", "heartrate", "heart_rate_bpm"],
            SampleColumn::Cadence => &[
                "cadence_step_per_min",
                "cadence",
                "running_cadence",
                "cadence_steps_per_min",
            ],
            SampleColumn::StanceTime => &["stance_time", "stance_time_ms"],
            SampleColumn::StanceTimePercent => &["stance_time_percent", "stance_time_pct"],
            SampleColumn::StepLength => &["step_length", "step_length_mm"],
            SampleColumn::VerticalOscillation => {
                &["vertical_oscillation", "vertical_oscillation_mm"]
            }
            SampleColumn::VerticalRatio => &["vertical_ratio"],
            SampleColumn::Altitude => &["altitude", "enhanced_altitude", "altitude_m", "altitude_meters"],
            SampleColumn::Temperature => &["temperature", "temperature_c", "temperature_celsius"],
            SampleColumn::LapNumber => &["lap_number", "lapnumber", "lap"],
        }
    }
}

/// Parser for the per-sample telemetry table
#[derive(Debug, Clone)]
pub struct SampleTableParser {
    aliases: AliasTable<SampleColumn>,
}

impl Default for SampleTableParser {
    fn default() -> Self {
        let entries: Vec<(SampleColumn, &[&str])> =
            SampleColumn::ALL.iter().map(|c| (*c, c.aliases())).collect();
        Self {
            aliases: AliasTable::new(&entries),
        }
    }
}

impl SampleTableParser {
    /// Parser with extra header spellings keyed by canonical column name.
    ///
    /// Unknown canonical names are ignored.
    pub fn with_extra_aliases(extra: &HashMap<String, Vec<String>>) -> Self {
        let mut parser = Self::default();
        for (name, aliases) in extra {
            match SampleColumn::from_canonical(name) {
                Some(column) => parser.aliases.extend(column, aliases),
                None => tracing::warn!(column = %name, "ignoring aliases for unknown sample column"),
            }
        }
        parser
    }
}

impl TableParser for SampleTableParser {
    type Record = Sample;

    fn parse(&self, text: &str) -> Result<ParsedTable<Sample>, ComputeError> {
        let (headers, rows) = read_rows(text)?;
        let resolved = self.aliases.resolve(&headers);

        let mut records = Vec::with_capacity(rows.len());
        let mut dropped_rows = 0;

        for (idx, row) in rows.iter().enumerate() {
            match convert_row(&resolved, row) {
                Some(sample) => records.push(sample),
                None => {
                    tracing::debug!(row = idx + 1, "dropping sample row without usable timestamp");
                    dropped_rows += 1;
                }
            }
        }

        let recognized_columns = self
            .aliases
            .fields()
            .filter(|f| resolved.contains(*f))
            .map(|f| f.canonical())
            .collect();

        Ok(ParsedTable {
            records,
            dropped_rows,
            recognized_columns,
            unrecognized_columns: resolved.unclaimed_headers(&headers),
        })
    }
}

fn convert_row(columns: &ResolvedColumns<SampleColumn>, row: &StringRecord) -> Option<Sample> {
    let cell = |column| {
        columns
            .cell(row, column)
            .map(CellValue::parse)
            .unwrap_or(CellValue::Empty)
    };
    let number = |column| cell(column).as_f64();

    let timestamp = cell(SampleColumn::Timestamp).as_datetime()?;

    Some(Sample {
        timestamp,
        elapsed_time_in_session_seconds: number(SampleColumn::ElapsedTimeInSession),
        elapsed_time_in_lap_seconds: number(SampleColumn::ElapsedTimeInLap),
        distance_meters: number(SampleColumn::Distance),
        speed_kmh: number(SampleColumn::Speed),
        heart_rate_bpm: number(SampleColumn::HeartRate),
        cadence_steps_per_min: number(SampleColumn::Cadence),
        stance_time_ms: number(SampleColumn::StanceTime),
        stance_time_percent: number(SampleColumn::StanceTimePercent),
        step_length_mm: number(SampleColumn::StepLength),
        vertical_oscillation_mm: number(SampleColumn::VerticalOscillation),
        vertical_ratio: number(SampleColumn::VerticalRatio),
        altitude_meters: number(SampleColumn::Altitude),
        temperature_celsius: number(SampleColumn::Temperature),
        lap_number: cell(SampleColumn::LapNumber).as_u32(),
    })
}
