//! Production client for the graph endpoints
//!
//! Wraps a `reqwest::Client` pre-configured with the project user agent
//! and request timeout. Input is deduplicated, chunked to the upstream
//! batch limits, and issued sequentially; a failed batch is logged and
//! yields nothing, so one bad request never sinks the whole lookup.

use crate::records::{EntityDataResponse, EntityRecord};
use crate::sparql::{build_label_query, group_bindings, SparqlBinding, SparqlResponse};
use crate::{ClientConfig, ClientError, GraphSource};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::str::FromStr;
use tablegraph_model::{EntityId, LabelQueryResult, PropertyId};
use tracing::warn;

fn http_err(surface: &'static str) -> impl Fn(reqwest::Error) -> ClientError {
    move |source| ClientError::Http { surface, source }
}

#[derive(Debug, Clone)]
pub struct WikidataClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl WikidataClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .build()
            .map_err(http_err("client-init"))?;
        Ok(Self { http, config })
    }

    pub fn with_defaults() -> Result<Self, ClientError> {
        Self::new(ClientConfig::default())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn fetch_record_batch(&self, ids: &[String]) -> Result<EntityDataResponse, ClientError> {
        let response = self
            .http
            .get(&self.config.api_endpoint)
            .query(&[
                ("action", "wbgetentities"),
                ("format", "json"),
                ("ids", ids.join("|").as_str()),
                ("props", "labels|descriptions|claims"),
                ("languages", self.config.language.as_str()),
                ("languagefallback", "1"),
            ])
            .send()
            .await
            .map_err(http_err("entity-data"))?
            .error_for_status()
            .map_err(http_err("entity-data"))?;

        response.json().await.map_err(http_err("entity-data"))
    }

    async fn run_sparql(&self, query: &str) -> Result<Vec<SparqlBinding>, ClientError> {
        let response = self
            .http
            .get(&self.config.sparql_endpoint)
            .query(&[("query", query), ("format", "json")])
            .send()
            .await
            .map_err(http_err("sparql"))?
            .error_for_status()
            .map_err(http_err("sparql"))?;

        let body: SparqlResponse = response.json().await.map_err(http_err("sparql"))?;
        Ok(body.results.bindings)
    }

    /// Shared fetch loop for entity and property records; the two id
    /// spaces only differ in the key type the caller wants back.
    async fn records_by_id<K>(&self, ids: Vec<String>) -> HashMap<K, EntityRecord>
    where
        K: FromStr + Eq + Hash,
    {
        let mut seen = HashSet::new();
        let distinct: Vec<String> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();

        let mut out = HashMap::new();
        for batch in distinct.chunks(self.config.id_batch_size()) {
            match self.fetch_record_batch(batch).await {
                Ok(response) => {
                    for (_, record) in response.entities {
                        if record.is_missing() {
                            continue;
                        }
                        if let Ok(key) = record.id.parse::<K>() {
                            out.insert(key, record);
                        }
                    }
                }
                Err(error) => {
                    warn!(surface = "entity-data", batch = batch.len(), %error,
                        "record batch failed, treated as empty");
                }
            }
        }
        out
    }
}

#[async_trait]
impl GraphSource for WikidataClient {
    async fn entities_by_id(
        &self,
        ids: &[EntityId],
    ) -> Result<HashMap<EntityId, EntityRecord>, ClientError> {
        let raw = ids.iter().map(ToString::to_string).collect();
        Ok(self.records_by_id(raw).await)
    }

    async fn properties_by_id(
        &self,
        ids: &[PropertyId],
    ) -> Result<HashMap<PropertyId, EntityRecord>, ClientError> {
        let raw = ids.iter().map(ToString::to_string).collect();
        Ok(self.records_by_id(raw).await)
    }

    async fn entities_by_label(
        &self,
        labels: &[String],
    ) -> Result<HashMap<String, LabelQueryResult>, ClientError> {
        let mut seen = HashSet::new();
        let distinct: Vec<String> = labels
            .iter()
            .filter(|l| seen.insert((*l).clone()))
            .cloned()
            .collect();

        let mut out = HashMap::new();
        for batch in distinct.chunks(self.config.label_batch_size()) {
            let query = build_label_query(batch, &self.config.language);
            match self.run_sparql(&query).await {
                Ok(bindings) => out.extend(group_bindings(batch, bindings, Utc::now())),
                Err(error) => {
                    // Labels from a failed batch stay absent: absence means
                    // "unknown", not "no match", so nothing gets cached as
                    // a false negative.
                    warn!(surface = "sparql", batch = batch.len(), %error,
                        "label batch failed, treated as empty");
                }
            }
        }
        Ok(out)
    }
}
