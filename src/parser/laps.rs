//! Per-lap summary table parser

use super::columns::{AliasTable, ResolvedColumns};
use super::value::CellValue;
use super::{read_rows, ParsedTable, TableParser};
use crate::error::ComputeError;
use crate::types::LapSummary;
use csv::StringRecord;
use std::collections::HashMap;

/// Canonical lap-table columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LapColumn {
    LapNumber,
    LapNature,
    Duration,
    StartTime,
    EndTime,
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

impl LapColumn {
    pub const ALL: [LapColumn; 15] = [
        LapColumn::LapNumber,
        LapColumn::LapNature,
        LapColumn::Duration,
        LapColumn::StartTime,
        LapColumn::EndTime,
        LapColumn::AvgSpeed,
        LapColumn::MaxSpeed,
        LapColumn::AvgHeartRate,
        LapColumn::MaxHeartRate,
        LapColumn::AvgCadence,
        LapColumn::AvgStepLength,
        LapColumn::AvgStanceTime,
        LapColumn::AvgStanceTimePercent,
        LapColumn::AvgVerticalOscillation,
        LapColumn::AvgVerticalRatio,
    ];

    /// Canonical external column name
    pub fn canonical(&self) -> &'static str {
        match self {
            LapColumn::LapNumber => "lap_number",
            LapColumn::LapNature => "lap_nature",
            LapColumn::Duration => "lap_duration",
            LapColumn::StartTime => "start_time",
            LapColumn::EndTime => "end_time",
            LapColumn::AvgSpeed => "avg_speed_kmh",
            LapColumn::MaxSpeed => "max_speed_kmh",
            LapColumn::AvgHeartRate => "avg_heart_rate",
            LapColumn::MaxHeartRate => "max_heart_rate",
            LapColumn::AvgCadence => "avg_running_cadence_step_per_min",
            LapColumn::AvgStepLength => "avg_step_length",
            LapColumn::AvgStanceTime => "avg_stance_time",
            LapColumn::AvgStanceTimePercent => "avg_stance_time_percent",
            LapColumn::AvgVerticalOscillation => "avg_vertical_oscillation",
            LapColumn::AvgVerticalRatio => "avg_vertical_ratio",
        }
    }

    pub fn from_canonical(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.canonical() == name)
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            LapColumn::LapNumber => &["lap_number", "lapnumber", "lap"],
            LapColumn::LapNature => &["lap_nature", "lapnature", "lap_type", "type"],
            LapColumn::Duration => &[
                "lap_duration",
                "duration",
                "duration_s",
                "total_elapsed_time",
                "duration_seconds",
            ],
            LapColumn::StartTime => &["start_time", "starttime", "start"],
            LapColumn::EndTime => &["end_time", "timestamp", "endtime", "end"],
            LapColumn::AvgSpeed => &["avg_speed_kmh", "avg_speed", "avgspeed"],
            LapColumn::MaxSpeed => &["max_speed_kmh", "max_speed", "maxspeed"],
            LapColumn::AvgHeartRate => &["avg_heart_rate", "avg_hr", "avgheartrate"],
            LapColumn::MaxHeartRate => &["max_heart_rate", "max_hr", "maxheartrate", "max"],
            LapColumn::AvgCadence => &[
                "avg_running_cadence_step_per_min",
                "avg_cadence",
                "avgcadence",
            ],
            LapColumn::AvgStepLength => &["avg_step_length", "avg_step_length_mm"],
            LapColumn::AvgStanceTime => &["avg_stance_time", "avg_stance_time_ms"],
            LapColumn::AvgStanceTimePercent => &["avg_stance_time_percent", "avg_stp"],
            LapColumn::AvgVerticalOscillation => {
                &["avg_vertical_oscillation", "avg_vertical_oscillation_mm"]
            }
            LapColumn::AvgVerticalRatio => &["avg_vertical_ratio", "avg_vr"],
        }
    }
}

/// Parser for the per-lap summary table
#[derive(Debug, Clone)]
pub struct LapTableParser {
    aliases: AliasTable<LapColumn>,
}

impl Default for LapTableParser {
    fn default() -> Self {
        let entries: Vec<(LapColumn, &[&str])> =
            LapColumn::ALL.iter().map(|c| (*c, c.aliases())).collect();
        Self {
            aliases: AliasTable::new(&entries),
        }
    }
}

impl LapTableParser {
    /// Parser with extra header spellings keyed by canonical column name.
    ///
    /// Unknown canonical names are ignored.
    pub fn with_extra_aliases(extra: &HashMap<String, Vec<String>>) -> Self {
        let mut parser = Self::default();
        for (name, aliases) in extra {
            match LapColumn::from_canonical(name) {
                Some(column) => parser.aliases.extend(column, aliases),
                None => tracing::warn!(column = %name, "ignoring aliases for unknown lap column"),
            }
        }
        parser
    }
}

impl TableParser for LapTableParser {
    type Record = LapSummary;

    fn parse(&self, text: &str) -> Result<ParsedTable<LapSummary>, ComputeError> {
        let (headers, rows) = read_rows(text)?;
        let resolved = self.aliases.resolve(&headers);

        let mut records = Vec::with_capacity(rows.len());
        let mut dropped_rows = 0;

        for (idx, row) in rows.iter().enumerate() {
            match convert_row(&resolved, row) {
                Some(lap) => records.push(lap),
                None => {
                    tracing::debug!(row = idx + 1, "skipping lap row without lap number or nature");
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

fn convert_row(columns: &ResolvedColumns<LapColumn>, row: &StringRecord) -> Option<LapSummary> {
    let cell = |column| {
        columns
            .cell(row, column)
            .map(CellValue::parse)
            .unwrap_or(CellValue::Empty)
    };
    let number = |column| cell(column).as_f64().unwrap_or(0.0);

    let lap_number = cell(LapColumn::LapNumber).as_u32();
    let lap_nature = cell(LapColumn::LapNature).as_label();
    if lap_number.is_none() && lap_nature.is_none() {
        return None;
    }

    let start_time = cell(LapColumn::StartTime).as_datetime();
    let end_time = cell(LapColumn::EndTime).as_datetime();

    let mut duration_seconds = number(LapColumn::Duration);
    if duration_seconds <= 0.0 {
        if let (Some(start), Some(end)) = (start_time, end_time) {
            duration_seconds = (end - start).num_milliseconds() as f64 / 1000.0;
        }
    }

    Some(LapSummary {
        lap_number: lap_number.unwrap_or(0),
        lap_nature: lap_nature.unwrap_or_default(),
        duration_seconds,
        start_time,
        end_time,
        avg_speed_kmh: number(LapColumn::AvgSpeed),
        max_speed_kmh: number(LapColumn::MaxSpeed),
        avg_heart_rate_bpm: number(LapColumn::AvgHeartRate),
        max_heart_rate_bpm: number(LapColumn::MaxHeartRate),
        avg_cadence: number(LapColumn::AvgCadence),
        avg_step_length_mm: number(LapColumn::AvgStepLength),
        avg_stance_time_ms: number(LapColumn::AvgStanceTime),
        avg_stance_time_percent: number(LapColumn::AvgStanceTimePercent),
        avg_vertical_oscillation_mm: number(LapColumn::AvgVerticalOscillation),
        avg_vertical_ratio: number(LapColumn::AvgVerticalRatio),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_lap_table() {
        let csv = "lap_number,lap_nature,lap_duration,avg_speed_kmh,max_speed_kmh,avg_heart_rate,max_heart_rate,avg_vertical_ratio\n\
1,Warm-up,600,10.2,12.0,130,145,8.4\n\
2,Intensity,35.2,20.4,21.8,150,158,7.95\n\
3,Recovery,14.2,9.0,12.1,160,175,\n";

        let parsed = LapTableParser::default().parse(csv).unwrap();
        assert_eq!(parsed.records.len(), 3);
        assert_eq!(parsed.dropped_rows, 0);

        let lap = &parsed.records[1];
        assert_eq!(lap.lap_number, 2);
        assert_eq!(lap.lap_nature, "Intensity");
        assert_eq!(lap.duration_seconds, 35.2);
        assert_eq!(lap.max_speed_kmh, 21.8);
        assert_eq!(lap.avg_cadence, 0.0);

        assert_eq!(parsed.records[2].avg_vertical_ratio, 0.0);
    }

    #[test]
    fn test_max_hr_aliases() {
        for header in ["max_hr", "max_heart_rate", "maxHeartRate"] {
            let csv = format!("lap_number,lap_nature,{header}\n1,Intensity,181\n");
            let laps = crate::parser::parse_laps(&csv).unwrap();
            assert_eq!(laps[0].max_heart_rate_bpm, 181.0, "alias {header}");
        }
    }

    #[test]
    fn test_alternate_spellings() {
        let csv = "lap,type,duration,start,end\n\
4,Récupération,,2024-05-04 10:05:00,2024-05-04 10:05:15\n";
        let laps = crate::parser::parse_laps(csv).unwrap();
        assert_eq!(laps[0].lap_number, 4);
        assert_eq!(laps[0].lap_nature, "Récupération");
        assert_eq!(laps[0].duration_seconds, 15.0);
    }

    #[test]
    fn test_timestamp_column_is_lap_end() {
        let csv = "lap_number,lap_nature,start_time,timestamp\n\
1,Recovery,2024-05-04 10:05:00,2024-05-04 10:05:14\n";
        let laps = crate::parser::parse_laps(csv).unwrap();
        assert!(laps[0].end_time.is_some());
        assert_eq!(laps[0].duration_seconds, 14.0);
    }

    #[test]
    fn test_rows_without_identity_skipped() {
        let csv = "lap_number,lap_nature,avg_speed_kmh\n,,12.0\n2,Intensity,20.0\n";
        let parsed = LapTableParser::default().parse(csv).unwrap();
        assert_eq!(parsed.records.len(), 1);
        assert_eq!(parsed.dropped_rows, 1);
    }

    #[test]
    fn test_missing_optional_columns_default_to_zero() {
        let laps = crate::parser::parse_laps("lap_number,lap_nature\n1,Intensity\n").unwrap();
        assert_eq!(laps[0], LapSummary::new(1, "Intensity"));
    }

    #[test]
    fn test_empty_lap_table_is_parse_error() {
        assert!(crate::parser::parse_laps("").is_err());
    }
}
