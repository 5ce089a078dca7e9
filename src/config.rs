//! Analysis configuration
//!
//! All core tunables live in one immutable `AnalysisConfig` passed into the
//! derivation calls: series group size, pacing threshold, the category labels
//! recognized as intensity/recovery, and extra column aliases.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default number of same-category laps per training series
pub const DEFAULT_SERIES_GROUP_SIZE: usize = 8;

/// Default pacing threshold (% spread between max and average lap speed)
pub const DEFAULT_PACING_THRESHOLD_PERCENT: f64 = 9.15;

/// How the pacing threshold is chosen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum PacingThreshold {
    /// Use a fixed percentage
    Fixed { percent: f64 },
    /// Use the median pacing delta of the session's own intensity laps
    Median,
}

impl Default for PacingThreshold {
    fn default() -> Self {
        PacingThreshold::Fixed {
            percent: DEFAULT_PACING_THRESHOLD_PERCENT,
        }
    }
}

/// Immutable configuration for a derivation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Laps per series (laps 1..=n are series 1, and so on)
    pub series_group_size: usize,
    pub pacing_threshold: PacingThreshold,
    /// Lap-nature labels treated as intensity (case and accent insensitive)
    pub intensity_labels: Vec<String>,
    /// Lap-nature labels treated as recovery (case and accent insensitive)
    pub recovery_labels: Vec<String>,
    /// Extra header spellings per canonical lap column, tried after the built-ins
    pub lap_field_aliases: HashMap<String, Vec<String>>,
    /// Extra header spellings per canonical sample column, tried after the built-ins
    pub sample_field_aliases: HashMap<String, Vec<String>>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            series_group_size: DEFAULT_SERIES_GROUP_SIZE,
            pacing_threshold: PacingThreshold::default(),
            intensity_labels: vec!["intensity".to_string(), "intensité".to_string()],
            recovery_labels: vec![
                "recovery".to_string(),
                "récupération".to_string(),
                "recuperation".to_string(),
            ],
            lap_field_aliases: HashMap::new(),
            sample_field_aliases: HashMap::new(),
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from JSON; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to pretty JSON
    pub fn to_json(&self) -> Result<String, ComputeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_group_size(mut self, series_group_size: usize) -> Self {
        self.series_group_size = series_group_size;
        self
    }

    pub fn with_pacing_threshold(mut self, pacing_threshold: PacingThreshold) -> Self {
        self.pacing_threshold = pacing_threshold;
        self
    }

    /// Check the configuration for values no derivation can use
    pub fn validate(&self) -> Result<(), ComputeError> {
        if self.series_group_size == 0 {
            return Err(ComputeError::InvalidConfig(
                "series_group_size must be at least 1".to_string(),
            ));
        }

        if let PacingThreshold::Fixed { percent } = self.pacing_threshold {
            if !percent.is_finite() || percent < 0.0 {
                return Err(ComputeError::InvalidConfig(format!(
                    "pacing threshold must be a non-negative number, got {percent}"
                )));
            }
        }

        if self.intensity_labels.iter().all(|l| l.trim().is_empty()) {
            return Err(ComputeError::InvalidConfig(
                "intensity_labels must contain at least one label".to_string(),
            ));
        }

        if self.recovery_labels.iter().all(|l| l.trim().is_empty()) {
            return Err(ComputeError::InvalidConfig(
                "recovery_labels must contain at least one label".to_string(),
            ));
        }

        Ok(())
    }
}
