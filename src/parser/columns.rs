//! Column alias resolution
//!
//! Each canonical field owns an ordered list of accepted header spellings.
//! Headers are normalized once and resolved to column indices before any row
//! is read, so a row lookup is a plain index access.

use csv::StringRecord;
use std::collections::HashMap;
use std::hash::Hash;

/// Normalized forms of a header: snake form and separator-free form.
///
/// `" Lap_Number "` → `("lap_number", "lapnumber")`, `"maxHeartRate"` →
/// `("maxheartrate", "maxheartrate")`.
pub fn normalize_header(raw: &str) -> (String, String) {
    let lowered = raw.trim_start_matches('\u{feff}').trim().to_lowercase();

    let mut snake = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        let c = if c == ' ' || c == '-' { '_' } else { c };
        if c == '_' && snake.ends_with('_') {
            continue;
        }
        snake.push(c);
    }
    let snake = snake.trim_matches('_').to_string();
    let compact = snake.replace('_', "");

    (snake, compact)
}

/// Ordered alias lists keyed by a canonical field
#[derive(Debug, Clone)]
pub struct AliasTable<F> {
    entries: Vec<(F, Vec<String>)>,
}

impl<F: Copy + Eq + Hash> AliasTable<F> {
    pub fn new(entries: &[(F, &[&str])]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(field, aliases)| (*field, aliases.iter().map(|a| a.to_string()).collect()))
                .collect(),
        }
    }

    /// Append extra spellings for a field after its built-in aliases
    pub fn extend(&mut self, field: F, aliases: &[String]) {
        if let Some((_, list)) = self.entries.iter_mut().find(|(f, _)| *f == field) {
            for alias in aliases {
                if !list.contains(alias) {
                    list.push(alias.clone());
                }
            }
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = F> + '_ {
        self.entries.iter().map(|(f, _)| *f)
    }

    /// Resolve a header row into candidate column indices per field.
    ///
    /// Candidates keep alias priority order; a column is claimed by the first
    /// field whose alias list names it.
    pub fn resolve(&self, headers: &StringRecord) -> ResolvedColumns<F> {
        let normalized: Vec<(String, String)> = headers.iter().map(normalize_header).collect();
        let mut claimed = vec![false; normalized.len()];
        let mut columns = HashMap::new();

        for (field, aliases) in &self.entries {
            let mut candidates = Vec::new();
            for alias in aliases {
                let (alias_snake, alias_compact) = normalize_header(alias);
                for (idx, (snake, compact)) in normalized.iter().enumerate() {
                    if claimed[idx] || candidates.contains(&idx) {
                        continue;
                    }
                    if *snake == alias_snake || *compact == alias_compact {
                        candidates.push(idx);
                    }
                }
            }
            for idx in &candidates {
                claimed[*idx] = true;
            }
            if !candidates.is_empty() {
                columns.insert(*field, candidates);
            }
        }

        let unclaimed = claimed
            .iter()
            .enumerate()
            .filter(|(idx, taken)| !**taken && !normalized[*idx].0.is_empty())
            .map(|(idx, _)| idx)
            .collect();

        ResolvedColumns { columns, unclaimed }
    }
}

/// Column indices resolved for one header row
#[derive(Debug, Clone)]
pub struct ResolvedColumns<F> {
    columns: HashMap<F, Vec<usize>>,
    unclaimed: Vec<usize>,
}

impl<F: Copy + Eq + Hash> ResolvedColumns<F> {
    pub fn contains(&self, field: F) -> bool {
        self.columns.contains_key(&field)
    }

    /// Non-blank header cells that matched no field
    pub fn unclaimed_headers(&self, headers: &StringRecord) -> Vec<String> {
        self.unclaimed
            .iter()
            .filter_map(|idx| headers.get(*idx))
            .map(|h| h.trim().to_string())
            .collect()
    }

    /// First non-empty cell among the field's candidate columns
    pub fn cell<'r>(&self, record: &'r StringRecord, field: F) -> Option<&'r str> {
        self.columns.get(&field)?.iter().find_map(|idx| {
            record
                .get(*idx)
                .map(str::trim)
                .filter(|value| !value.is_empty())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Field {
        Lap,
        MaxHr,
        Altitude,
    }

    fn table() -> AliasTable<Field> {
        AliasTable::new(&[
            (Field::Lap, &["lap_number", "lap"]),
            (Field::MaxHr, &["max_heart_rate", "max_hr", "maxHeartRate"]),
            (Field::Altitude, &["altitude", "enhanced_altitude"]),
        ])
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(
            normalize_header("lap_number "),
            ("lap_number".to_string(), "lapnumber".to_string())
        );
        assert_eq!(normalize_header("Max HR").0, "max_hr");
        assert_eq!(normalize_header("\u{feff}timestamp").0, "timestamp");
        assert_eq!(normalize_header("maxHeartRate").1, "maxheartrate");
    }

    #[test]
    fn test_trailing_space_and_case() {
        let headers = StringRecord::from(vec!["timestamp", "LAP_NUMBER "]);
        let resolved = table().resolve(&headers);
        let row = StringRecord::from(vec!["x", "4"]);
        assert_eq!(resolved.cell(&row, Field::Lap), Some("4"));
    }

    #[test]
    fn test_alias_variants() {
        for header in ["max_hr", "max_heart_rate", "maxHeartRate"] {
            let headers = StringRecord::from(vec![header]);
            let resolved = table().resolve(&headers);
            assert!(resolved.contains(Field::MaxHr), "{header} not resolved");
        }
    }

    #[test]
    fn test_first_non_empty_candidate_wins() {
        let headers = StringRecord::from(vec!["enhanced_altitude", "altitude"]);
        let resolved = table().resolve(&headers);

        let both = StringRecord::from(vec!["12", "10"]);
        assert_eq!(resolved.cell(&both, Field::Altitude), Some("10"));

        let only_enhanced = StringRecord::from(vec!["12", ""]);
        assert_eq!(resolved.cell(&only_enhanced, Field::Altitude), Some("12"));
    }

    #[test]
    fn test_extra_aliases() {
        let mut table = table();
        table.extend(Field::MaxHr, &["fc_max".to_string()]);
        let resolved = table.resolve(&StringRecord::from(vec!["FC max"]));
        assert!(resolved.contains(Field::MaxHr));
    }
}
