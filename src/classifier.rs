//! Lap classification
//!
//! Laps are matched to a category through a label predicate (case and accent
//! insensitive) and assigned to ordinal training series in fixed-size blocks.

use crate::config::AnalysisConfig;
use crate::types::{LapCategory, LapSummary, SeriesAssignment};

/// Case- and accent-insensitive lap-nature predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryPredicate {
    labels: Vec<String>,
}

impl CategoryPredicate {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut folded: Vec<String> = Vec::new();
        for label in labels {
            let f = fold_label(label.as_ref());
            if !f.is_empty() && !folded.contains(&f) {
                folded.push(f);
            }
        }
        Self { labels: folded }
    }

    pub fn matches(&self, lap_nature: &str) -> bool {
        let folded = fold_label(lap_nature);
        self.labels.iter().any(|l| *l == folded)
    }
}

/// Lowercase, trim and strip Latin diacritics: `" Intensité "` → `"intensite"`
pub fn fold_label(label: &str) -> String {
    label
        .trim()
        .to_lowercase()
        .chars()
        .map(strip_accent)
        .collect()
}

fn strip_accent(c: char) -> char {
    match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
        'ç' => 'c',
        'è' | 'é' | 'ê' | 'ë' => 'e',
        'ì' | 'í' | 'î' | 'ï' => 'i',
        'ñ' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
        'ù' | 'ú' | 'û' | 'ü' => 'u',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Assign laps matching `predicate` to series of `group_size` laps.
///
/// Ordinal positions count only matching laps, in source order; lap `i`
/// (0-based) lands in series `i / group_size + 1`. A group size of 0 is
/// treated as 1.
pub fn assign_series(
    laps: &[LapSummary],
    predicate: &CategoryPredicate,
    group_size: usize,
) -> Vec<SeriesAssignment> {
    let group_size = group_size.max(1);

    laps.iter()
        .filter(|lap| predicate.matches(&lap.lap_nature))
        .enumerate()
        .map(|(idx, lap)| SeriesAssignment {
            series: (idx / group_size) as u32 + 1,
            index_in_category: idx,
            lap: lap.clone(),
        })
        .collect()
}

/// Classifier bundling the intensity and recovery predicates with a group size
#[derive(Debug, Clone)]
pub struct LapClassifier {
    intensity: CategoryPredicate,
    recovery: CategoryPredicate,
    group_size: usize,
}

impl Default for LapClassifier {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

impl LapClassifier {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            intensity: CategoryPredicate::new(&config.intensity_labels),
            recovery: CategoryPredicate::new(&config.recovery_labels),
            group_size: config.series_group_size.max(1),
        }
    }

    pub fn group_size(&self) -> usize {
        self.group_size
    }

    pub fn intensity_predicate(&self) -> &CategoryPredicate {
        &self.intensity
    }

    pub fn recovery_predicate(&self) -> &CategoryPredicate {
        &self.recovery
    }

    pub fn category_of(&self, lap: &LapSummary) -> LapCategory {
        if self.intensity.matches(&lap.lap_nature) {
            LapCategory::Intensity
        } else if self.recovery.matches(&lap.lap_nature) {
            LapCategory::Recovery
        } else {
            LapCategory::Other
        }
    }

    /// Intensity laps with their series
    pub fn intensity_series(&self, laps: &[LapSummary]) -> Vec<SeriesAssignment> {
        assign_series(laps, &self.intensity, self.group_size)
    }

    /// Recovery laps with their series
    pub fn recovery_series(&self, laps: &[LapSummary]) -> Vec<SeriesAssignment> {
        assign_series(laps, &self.recovery, self.group_size)
    }
}
