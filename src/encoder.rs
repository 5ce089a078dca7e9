//! Report encoding
//!
//! This module wraps a `SessionReport` with producer metadata and the
//! configuration it was derived with, and encodes it as JSON.

use crate::config::AnalysisConfig;
use crate::error::ComputeError;
use crate::types::{ReportPayload, ReportProducer, SessionReport};
use crate::{LAPFLUX_VERSION, PRODUCER_NAME};
use chrono::{SecondsFormat, Utc};
use uuid::Uuid;

/// Encoder for session report payloads
#[derive(Debug, Clone)]
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Wrap a report in its payload envelope
    pub fn encode(&self, report: &SessionReport, config: &AnalysisConfig) -> ReportPayload {
        ReportPayload {
            producer: ReportProducer {
                name: PRODUCER_NAME.to_string(),
                version: LAPFLUX_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            config: config.clone(),
            report: report.clone(),
        }
    }

    /// Encode to pretty JSON string
    pub fn encode_to_json(
        &self,
        report: &SessionReport,
        config: &AnalysisConfig,
    ) -> Result<String, ComputeError> {
        let payload = self.encode(report, config);
        serde_json::to_string_pretty(&payload).map_err(ComputeError::JsonError)
    }

    /// Encode to compact JSON string
    pub fn encode_to_compact_json(
        &self,
        report: &SessionReport,
        config: &AnalysisConfig,
    ) -> Result<String, ComputeError> {
        let payload = self.encode(report, config);
        serde_json::to_string(&payload).map_err(ComputeError::JsonError)
    }
}
