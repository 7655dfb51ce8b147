//! Tablegraph graph client
//!
//! Talks to the two external surfaces of the knowledge graph — the
//! entity-data API (records by id) and the SPARQL query service (entities
//! by label) — in bounded-size batches, and parses the loosely-typed JSON
//! they return into the workspace's typed model at the network boundary.
//!
//! The [`GraphSource`] trait is the seam the resolution pipeline depends
//! on; [`WikidataClient`] is the production implementation. Batches are
//! issued sequentially and a failed batch is logged and contributes zero
//! results rather than aborting the rest — a partially resolved table
//! beats a hard failure.

pub mod claims;
pub mod client;
pub mod records;
pub mod sparql;

pub use client::WikidataClient;
pub use records::EntityRecord;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tablegraph_model::{EntityId, LabelQueryResult, PropertyId};

/// Failures at the network boundary. These are recovered per batch inside
/// the client; callers of [`GraphSource`] see best-effort maps.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("transport failure on {surface}: {source}")]
    Http {
        surface: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected response shape from {surface}: {message}")]
    Shape {
        surface: &'static str,
        message: String,
    },
}

/// Read access to the knowledge graph.
///
/// Both lookups return maps keyed by input identity; identifiers or labels
/// the graph does not know are simply absent (for labels: absent means the
/// batch failed — a *successful* query for an unknown label yields an
/// entry with an empty match list, which callers may cache as a negative
/// result).
#[async_trait]
pub trait GraphSource: Send + Sync {
    async fn entities_by_id(
        &self,
        ids: &[EntityId],
    ) -> Result<HashMap<EntityId, EntityRecord>, ClientError>;

    async fn properties_by_id(
        &self,
        ids: &[PropertyId],
    ) -> Result<HashMap<PropertyId, EntityRecord>, ClientError>;

    /// Labels must already be normalized; result keys echo the input
    /// labels, matched case-insensitively against the query service's
    /// bindings.
    async fn entities_by_label(
        &self,
        labels: &[String],
    ) -> Result<HashMap<String, LabelQueryResult>, ClientError>;
}

/// Upstream request-size limits.
pub const MAX_ID_BATCH: usize = 50;
pub const MAX_LABEL_BATCH: usize = 100;

/// Endpoints, language, and batching knobs for [`WikidataClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub api_endpoint: String,
    pub sparql_endpoint: String,
    /// Language code used for labels, descriptions, and SPARQL literals.
    pub language: String,
    /// Ids per entity-data request, capped at [`MAX_ID_BATCH`].
    pub id_batch: usize,
    /// Labels per SPARQL `VALUES` clause, capped at [`MAX_LABEL_BATCH`].
    pub label_batch: usize,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "https://www.wikidata.org/w/api.php".to_string(),
            sparql_endpoint: "https://query.wikidata.org/sparql".to_string(),
            language: "en".to_string(),
            id_batch: MAX_ID_BATCH,
            label_batch: MAX_LABEL_BATCH,
            timeout: Duration::from_secs(30),
            user_agent: concat!(
                "tablegraph/",
                env!("CARGO_PKG_VERSION"),
                " (+https://github.com/tablegraph/tablegraph)"
            )
            .to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_api_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.api_endpoint = endpoint.into();
        self
    }

    pub fn with_sparql_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.sparql_endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Batch sizes clamped to the upstream limits.
    pub(crate) fn id_batch_size(&self) -> usize {
        self.id_batch.clamp(1, MAX_ID_BATCH)
    }

    pub(crate) fn label_batch_size(&self) -> usize {
        self.label_batch.clamp(1, MAX_LABEL_BATCH)
    }
}
