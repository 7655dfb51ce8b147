//! SPARQL label lookup
//!
//! The query service answers "which entities carry one of these labels"
//! with flat bindings — one row per (entity, matched label, instance-of
//! type) combination — and leaves the grouping to us. This module builds
//! the `VALUES`-templated query and regroups the bindings into
//! [`LabelQueryResult`]s keyed by the requested labels.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use tablegraph_model::{EntityId, LabelQueryResult};
use tracing::debug;

/// Build the label-lookup query for one batch of normalized labels.
pub fn build_label_query(labels: &[String], language: &str) -> String {
    let values = labels
        .iter()
        .map(|label| format!("\"{}\"@{}", escape_literal(label), language))
        .collect::<Vec<_>>()
        .join(" ");

    format!(
        r#"SELECT ?item ?itemLabel ?matched ?typeLabel WHERE {{
  VALUES ?matched {{ {values} }}
  ?item rdfs:label ?matched .
  OPTIONAL {{
    ?item wdt:P31 ?type .
    ?type rdfs:label ?typeLabel .
    FILTER(LANG(?typeLabel) = "{language}")
  }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "{language}". }}
}}"#
    )
}

fn escape_literal(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

#[derive(Debug, Deserialize)]
pub(crate) struct SparqlResponse {
    pub results: SparqlResults,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SparqlResults {
    pub bindings: Vec<SparqlBinding>,
}

/// One flat row from the query service.
#[derive(Debug, Clone, Deserialize)]
pub struct SparqlBinding {
    pub item: SparqlValue,
    #[serde(rename = "itemLabel")]
    pub item_label: Option<SparqlValue>,
    pub matched: SparqlValue,
    #[serde(rename = "typeLabel")]
    pub type_label: Option<SparqlValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SparqlValue {
    pub value: String,
}

/// Regroup flat bindings by requested label, case-insensitively.
///
/// Every requested label gets an entry; one the service returned no rows
/// for ends up with an empty match list, which is exactly the negative
/// result the label cache stores.
pub fn group_bindings(
    requested: &[String],
    bindings: Vec<SparqlBinding>,
    now: DateTime<Utc>,
) -> HashMap<String, LabelQueryResult> {
    let mut out: HashMap<String, LabelQueryResult> = requested
        .iter()
        .map(|label| (label.clone(), LabelQueryResult::empty(label.clone(), now)))
        .collect();
    let by_key: HashMap<String, &String> = requested
        .iter()
        .map(|label| (label.to_lowercase(), label))
        .collect();

    for binding in bindings {
        let Some(id) = EntityId::from_uri(&binding.item.value) else {
            debug!(uri = %binding.item.value, "binding without an entity id, skipped");
            continue;
        };
        let Some(label) = by_key.get(&binding.matched.value.to_lowercase()) else {
            debug!(matched = %binding.matched.value, "binding for a label nobody asked about");
            continue;
        };
        let display = binding
            .item_label
            .map(|v| v.value)
            .unwrap_or_else(|| binding.matched.value.clone());
        if let Some(result) = out.get_mut(label.as_str()) {
            result.add_match(id, display, binding.type_label.map(|v| v.value));
        }
    }

    out
}
