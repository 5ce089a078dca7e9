//! Lapflux - Interval-session analysis engine
//!
//! Lapflux turns the two tables exported from a running-watch recording (one
//! row per sample, one row per lap) into the derived datasets of an interval
//! session through a deterministic pipeline: table parsing → lap
//! classification → aggregation → recovery quality → pacing → drift.
//!
//! ## Modules
//!
//! - **Parsing**: Alias-tolerant CSV parsers for sample and lap tables
//! - **Derivation**: Series assignment, recovery, pacing, drift and correlations
//! - **Reporting**: Session report encoding and upload storage

pub mod aggregate;
pub mod classifier;
pub mod config;
pub mod correlation;
pub mod drift;
pub mod encoder;
pub mod error;
pub mod pacing;
pub mod parser;
pub mod pipeline;
pub mod recovery;
pub mod types;
pub mod upload;

pub use aggregate::{LapFilter, SampleSelection};
pub use classifier::{CategoryPredicate, LapClassifier};
pub use config::{AnalysisConfig, PacingThreshold};
pub use encoder::ReportEncoder;
pub use error::ComputeError;
pub use pipeline::{analyze_session, derive, session_to_report_json, SessionAnalyzer};
pub use upload::{UploadReceipt, UploadStore};

/// Lapflux version embedded in all report payloads
pub const LAPFLUX_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for report payloads
pub const PRODUCER_NAME: &str = "lapflux";
