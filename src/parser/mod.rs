//! Delimited-table parsers
//!
//! This module turns the two exported text tables (per-sample telemetry and
//! per-lap summary) into typed records. Header spellings are resolved through
//! ordered alias tables; cells are typed dynamically.

pub mod columns;
mod laps;
mod samples;
pub mod value;
pub mod writer;

pub use laps::{LapColumn, LapTableParser};
pub use samples::{SampleColumn, SampleTableParser};

use crate::error::ComputeError;
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;

/// Trait for table parsers
pub trait TableParser {
    type Record;

    /// Parse raw delimited text into typed records
    fn parse(&self, text: &str) -> Result<ParsedTable<Self::Record>, ComputeError>;
}

/// Parsed records plus bookkeeping about what was kept
#[derive(Debug, Clone, Serialize)]
pub struct ParsedTable<R> {
    pub records: Vec<R>,
    /// Non-empty rows that were dropped (no usable timestamp, no lap identity)
    pub dropped_rows: usize,
    /// Canonical names of the columns found in the header
    pub recognized_columns: Vec<&'static str>,
    /// Header cells that matched no known column
    pub unrecognized_columns: Vec<String>,
}

/// Parse a sample table with the built-in aliases
pub fn parse_samples(text: &str) -> Result<Vec<crate::types::Sample>, ComputeError> {
    Ok(SampleTableParser::default().parse(text)?.records)
}

/// Parse a lap table with the built-in aliases
pub fn parse_laps(text: &str) -> Result<Vec<crate::types::LapSummary>, ComputeError> {
    Ok(LapTableParser::default().parse(text)?.records)
}

/// Split text into its header row and non-blank data rows
pub(crate) fn read_rows(text: &str) -> Result<(StringRecord, Vec<StringRecord>), ComputeError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        tracing::warn!("table has no header row");
        return Err(ComputeError::ParseError("missing or empty header row".to_string()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }
        rows.push(record);
    }

    Ok((headers, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_header_is_parse_error() {
        assert!(matches!(
            read_rows(""),
            Err(ComputeError::ParseError(_))
        ));
        assert!(matches!(
            read_rows(" , ,\n1,2,3"),
            Err(ComputeError::ParseError(_))
        ));
    }

    #[test]
    fn test_blank_rows_skipped() {
        let (headers, rows) = read_rows("a,b\n1,2\n\n , \n3,4\n").unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(rows.len(), 2);
    }
}
