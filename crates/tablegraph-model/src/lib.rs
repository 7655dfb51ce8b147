//! Tablegraph core model
//!
//! Record types shared by every other crate in the workspace: graph
//! identifiers, cached entity/property/claim records, label-query results,
//! and the per-row resolution output handed to the column-injection side.
//!
//! Identifiers are graph-assigned (`Q…` for entities, `P…` for properties)
//! and never minted locally. Every persisted record carries a `cached_at`
//! timestamp; freshness policy lives in `tablegraph-cache`, the shapes live
//! here so both the client and the cache agree on them.

pub mod normalize;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Identifiers
// ============================================================================

/// Error for a string that is not a well-formed graph identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a valid {expected} id: {input:?}")]
pub struct IdError {
    pub expected: &'static str,
    pub input: String,
}

fn check_id(input: &str, prefix: char, expected: &'static str) -> Result<(), IdError> {
    let mut chars = input.chars();
    let ok = chars.next() == Some(prefix)
        && !input[1..].is_empty()
        && input[1..].bytes().all(|b| b.is_ascii_digit());
    if ok {
        Ok(())
    } else {
        Err(IdError {
            expected,
            input: input.to_string(),
        })
    }
}

/// Stable identifier of a knowledge-graph entity, e.g. `Q90`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extract an entity id from a graph URI such as
    /// `http://www.wikidata.org/entity/Q90`.
    pub fn from_uri(uri: &str) -> Option<Self> {
        uri.rsplit('/').next().and_then(|tail| tail.parse().ok())
    }
}

impl FromStr for EntityId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        check_id(s, 'Q', "entity")?;
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of a knowledge-graph property, e.g. `P31`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyId(String);

impl PropertyId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PropertyId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        check_id(s, 'P', "property")?;
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Claim values
// ============================================================================

/// One typed value of a claim, already rendered for display.
///
/// Only `EntityRef` carries a referenced id; every other variant is a plain
/// display string. Value types the parser does not recognize are preserved
/// verbatim in `Unknown` so no data is dropped silently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "kebab-case")]
pub enum ClaimValue {
    /// Reference to another entity in the graph.
    EntityRef { id: EntityId, display: String },
    /// Plain or monolingual text.
    Text(String),
    /// Point in time, formatted by precision ("1969", "20 July 1969", …).
    Time(String),
    /// Numeric amount, unit discarded.
    Quantity(String),
    /// Globe coordinate, `"48.8566N, 2.3522E"` form.
    Coordinate(String),
    /// Unrecognized value type, serialized form kept as-is.
    Unknown(String),
}

impl ClaimValue {
    /// The user-facing rendering of this value.
    pub fn display(&self) -> &str {
        match self {
            ClaimValue::EntityRef { display, .. } => display,
            ClaimValue::Text(s)
            | ClaimValue::Time(s)
            | ClaimValue::Quantity(s)
            | ClaimValue::Coordinate(s)
            | ClaimValue::Unknown(s) => s,
        }
    }

    /// The referenced entity, for `EntityRef` values only.
    pub fn referenced(&self) -> Option<&EntityId> {
        match self {
            ClaimValue::EntityRef { id, .. } => Some(id),
            _ => None,
        }
    }
}

// ============================================================================
// Cached records
// ============================================================================

/// A graph entity as cached locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub label: String,
    pub description: Option<String>,
    pub cached_at: DateTime<Utc>,
}

/// A graph property as cached locally.
///
/// `global_usage` is cumulative process-wide state: it counts distinct
/// "add this property as a column" actions across all tables, and must
/// survive re-fetches of the label/description text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub label: String,
    pub description: String,
    pub global_usage: u64,
    pub visible: bool,
    pub cached_at: DateTime<Utc>,
}

impl Property {
    /// A minimal record for a property only known by id.
    pub fn placeholder(id: PropertyId, now: DateTime<Utc>) -> Self {
        let label = id.to_string();
        Self {
            id,
            label,
            description: String::new(),
            global_usage: 0,
            visible: true,
            cached_at: now,
        }
    }
}

/// All values one entity has for one property. Multi-valued properties keep
/// every value; a claim with no values is never constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub entity: EntityId,
    pub property: PropertyId,
    pub values: Vec<ClaimValue>,
    pub cached_at: DateTime<Utc>,
}

// ============================================================================
// Label matching
// ============================================================================

/// One candidate entity for a label, with its accumulated instance-of types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMatch {
    pub id: EntityId,
    pub display_label: String,
    /// Deduplicated, in first-seen order.
    pub instance_of: Vec<String>,
}

/// Cached result of a label query: every candidate entity whose label
/// matched, keyed by entity id in first-seen order. An empty match list is
/// a cached negative result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelQueryResult {
    /// The normalized label this row is keyed by.
    pub label: String,
    pub matches: Vec<LabelMatch>,
    pub cached_at: DateTime<Utc>,
}

impl LabelQueryResult {
    pub fn empty(label: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            label: label.into(),
            matches: Vec::new(),
            cached_at: now,
        }
    }

    /// Merge a candidate in. A repeated entity id does not create a second
    /// match; its instance-of types are folded into the existing one.
    pub fn add_match(&mut self, id: EntityId, display_label: String, instance_of: Option<String>) {
        if let Some(existing) = self.matches.iter_mut().find(|m| m.id == id) {
            if let Some(ty) = instance_of {
                if !existing.instance_of.contains(&ty) {
                    existing.instance_of.push(ty);
                }
            }
            return;
        }
        self.matches.push(LabelMatch {
            id,
            display_label,
            instance_of: instance_of.into_iter().collect(),
        });
    }

    pub fn get(&self, id: &EntityId) -> Option<&LabelMatch> {
        self.matches.iter().find(|m| &m.id == id)
    }

    pub fn is_negative(&self) -> bool {
        self.matches.is_empty()
    }
}

// ============================================================================
// Resolution output
// ============================================================================

/// Per-row resolution outcome. Ephemeral, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowMatch {
    pub row: usize,
    /// `None` means no match was found for this row's label.
    pub entity: Option<EntityId>,
    pub display_label: Option<String>,
}

impl RowMatch {
    pub fn unresolved(row: usize) -> Self {
        Self {
            row,
            entity: None,
            display_label: None,
        }
    }
}

/// A ranked candidate property, as handed to the column picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyStat {
    pub id: PropertyId,
    pub label: String,
    pub description: String,
    /// Share of resolved rows exposing this property, rounded percent.
    pub coverage_percent: u8,
    pub global_usage: u64,
    pub visible: bool,
}
