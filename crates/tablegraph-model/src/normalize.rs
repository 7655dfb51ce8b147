//! Label normalization
//!
//! Table cell text arrives with list numbering ("12. Paris") and footnote
//! markers ("Paris‡", "London[3]") that the graph knows nothing about.
//! Normalization strips both and trims, and is idempotent: stripping runs
//! to a fixpoint, so re-normalizing cached keys is always safe.

use regex::Regex;
use std::sync::OnceLock;

fn leading_ordinal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+[.)]\s+").expect("static regex"))
}

fn trailing_footnote() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:\[[0-9A-Za-z]{1,4}\]|[*†‡§¹²³⁴⁵⁶⁷⁸⁹⁰])+$").expect("static regex")
    })
}

/// Normalize a raw cell label for querying and cache keying.
pub fn normalize_label(raw: &str) -> String {
    let mut current = raw.trim().to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_once(label: &str) -> String {
    let stripped = leading_ordinal().replace(label, "");
    let stripped = trailing_footnote().replace(&stripped, "");
    stripped.trim().to_string()
}

/// Case-folded key used to match query-service results back to input
/// labels. Result matching is case-insensitive; cache keys keep the
/// normalized casing.
pub fn match_key(raw: &str) -> String {
    normalize_label(raw).to_lowercase()
}
