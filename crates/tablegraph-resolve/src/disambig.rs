//! Label disambiguation
//!
//! A label like "Paris" matches many entities. Instead of guessing per
//! row, the whole label set votes: each row contributes the union of
//! instance-of types over its candidates, counted once per row so a type
//! repeated across duplicate candidates in one row cannot inflate its
//! score. The dominant type(s) are offered to the user as a filter;
//! ambiguity itself is not an error.

use std::collections::{HashMap, HashSet};
use tablegraph_model::{LabelQueryResult, RowMatch};

/// Share of candidate-bearing rows whose candidates expose a type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeScore {
    pub label: String,
    pub percent: u8,
    pub rows: usize,
}

/// The candidate landscape for one label set.
#[derive(Debug, Clone)]
pub struct Disambiguation {
    /// Candidates per normalized label, for the user-facing filter.
    pub candidates: HashMap<String, LabelQueryResult>,
    /// All types seen, highest share first.
    pub type_scores: Vec<TypeScore>,
    /// Every type tied for the top share; ties are kept, not broken.
    pub primary_types: Vec<String>,
}

fn percent(part: usize, whole: usize) -> u8 {
    (100.0 * part as f64 / whole as f64).round() as u8
}

/// Score instance-of types across the row set.
///
/// `row_labels` is one normalized label per table row, in row order —
/// duplicate labels mean duplicate rows and are counted per row.
pub fn disambiguate(
    row_labels: &[String],
    results: &HashMap<String, LabelQueryResult>,
) -> Disambiguation {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut rows_with_candidates = 0usize;

    for label in row_labels {
        let Some(result) = results.get(label) else {
            continue;
        };
        if result.is_negative() {
            continue;
        }
        rows_with_candidates += 1;
        let row_types: HashSet<&str> = result
            .matches
            .iter()
            .flat_map(|m| m.instance_of.iter().map(String::as_str))
            .collect();
        for ty in row_types {
            *counts.entry(ty).or_default() += 1;
        }
    }

    let mut type_scores: Vec<TypeScore> = counts
        .into_iter()
        .map(|(label, rows)| TypeScore {
            label: label.to_string(),
            percent: percent(rows, rows_with_candidates),
            rows,
        })
        .collect();
    type_scores.sort_by(|a, b| b.percent.cmp(&a.percent).then_with(|| a.label.cmp(&b.label)));

    let top = type_scores.first().map(|t| t.percent);
    let primary_types = type_scores
        .iter()
        .take_while(|t| Some(t.percent) == top)
        .map(|t| t.label.clone())
        .collect();

    Disambiguation {
        candidates: results.clone(),
        type_scores,
        primary_types,
    }
}

/// Map each row to a candidate.
///
/// With no filter the first-encountered candidate wins. With a selected
/// type set, the first candidate (insertion order) whose instance-of set
/// intersects the selection wins, else the row stays unresolved. For a
/// fixed selection the outcome is deterministic, so re-running a filter
/// is idempotent.
pub fn resolve_rows(
    row_labels: &[String],
    results: &HashMap<String, LabelQueryResult>,
    filter: Option<&HashSet<String>>,
) -> Vec<RowMatch> {
    row_labels
        .iter()
        .enumerate()
        .map(|(row, label)| {
            let Some(result) = results.get(label) else {
                return RowMatch::unresolved(row);
            };
            let chosen = match filter {
                None => result.matches.first(),
                Some(selected) => result
                    .matches
                    .iter()
                    .find(|m| m.instance_of.iter().any(|ty| selected.contains(ty))),
            };
            match chosen {
                Some(candidate) => RowMatch {
                    row,
                    entity: Some(candidate.id.clone()),
                    display_label: Some(candidate.display_label.clone()),
                },
                None => RowMatch::unresolved(row),
            }
        })
        .collect()
}
