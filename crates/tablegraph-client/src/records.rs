//! Entity-data API response shapes
//!
//! The entity-data endpoint (`wbgetentities`) returns a map from id to a
//! record of labels, descriptions, and claims. Ids the graph does not
//! recognize come back flagged `missing` instead of erroring. Claim values
//! are kept as raw tagged JSON here; the typed conversion lives in
//! [`crate::claims`].

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub(crate) struct EntityDataResponse {
    #[serde(default)]
    pub entities: BTreeMap<String, EntityRecord>,
}

/// One raw entity record as served by the graph.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityRecord {
    pub id: String,
    #[serde(default)]
    pub labels: BTreeMap<String, LangValue>,
    #[serde(default)]
    pub descriptions: BTreeMap<String, LangValue>,
    #[serde(default)]
    pub claims: BTreeMap<String, Vec<RawClaim>>,
    #[serde(default)]
    missing: Option<Value>,
}

impl EntityRecord {
    /// The graph marks unknown ids with a `missing` flag rather than
    /// omitting them from `wbgetentities` responses.
    pub fn is_missing(&self) -> bool {
        self.missing.is_some()
    }

    /// Label in the given language, falling back to the first available
    /// language (records are language-sorted, so the fallback is stable).
    pub fn label_in(&self, language: &str) -> Option<&str> {
        self.labels
            .get(language)
            .or_else(|| self.labels.values().next())
            .map(|v| v.value.as_str())
    }

    pub fn description_in(&self, language: &str) -> Option<&str> {
        self.descriptions
            .get(language)
            .or_else(|| self.descriptions.values().next())
            .map(|v| v.value.as_str())
    }
}

/// A language-tagged string.
#[derive(Debug, Clone, Deserialize)]
pub struct LangValue {
    pub language: String,
    pub value: String,
}

/// One statement on an entity.
#[derive(Debug, Clone, Deserialize)]
pub struct RawClaim {
    pub mainsnak: Snak,
}

/// The property-value cell inside a claim. `datavalue` is absent for
/// "no value" / "unknown value" snaks.
#[derive(Debug, Clone, Deserialize)]
pub struct Snak {
    #[serde(default)]
    pub snaktype: String,
    #[serde(default)]
    pub datavalue: Option<RawDataValue>,
}

/// A claim value before typed conversion: the graph's `type` tag plus the
/// untouched payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RawDataValue {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: Value,
}
