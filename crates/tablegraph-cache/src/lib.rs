//! Tablegraph TTL cache layer
//!
//! Four independent stores — entities, properties, claims, label-query
//! results — over a key-value backend supplied by the surrounding
//! persistence layer. Each record carries a creation timestamp; a record is
//! fresh iff `now − cached_at < TTL` (default 24h, boundary exclusive).
//!
//! The contract per store is a *freshness partition*: `get_fresh` splits an
//! input key set into already-valid values and stale/missing keys without
//! ever touching the network, and `save` write-through upserts with a
//! refreshed timestamp. Staleness is classified lazily at read time; there
//! are no eviction sweeps, only an explicit [`CacheService::clear_all`].
//!
//! The service is a plain value handed into the resolution pipeline — no
//! process-wide singleton. An absent or undeserializable backend row is
//! treated identically to a cache miss.

pub mod backend;
pub mod stores;

pub use backend::{KeyValueBackend, MemoryBackend, Table};
pub use stores::{ClaimStore, EntityStore, Freshness, LabelStore, PropertyStore, WritePolicy};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Freshness bound for every store.
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::hours(24),
        }
    }
}

impl CacheConfig {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// `true` iff the record is still within the freshness bound. The boundary
/// is exclusive: a record aged exactly `ttl` is stale.
pub(crate) fn is_fresh(cached_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    now.signed_duration_since(cached_at) < ttl
}

/// Row counts per store, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entities: usize,
    pub properties: usize,
    pub claims: usize,
    pub labels: usize,
}

/// The four stores bundled for injection into the resolution pipeline.
#[derive(Clone)]
pub struct CacheService {
    backend: Arc<dyn KeyValueBackend>,
    pub entities: EntityStore,
    pub properties: PropertyStore,
    pub claims: ClaimStore,
    pub labels: LabelStore,
}

impl CacheService {
    pub fn new(backend: Arc<dyn KeyValueBackend>, config: CacheConfig) -> Self {
        Self {
            entities: EntityStore::new(Arc::clone(&backend), config.ttl),
            properties: PropertyStore::new(Arc::clone(&backend), config.ttl),
            claims: ClaimStore::new(Arc::clone(&backend), config.ttl),
            labels: LabelStore::new(Arc::clone(&backend), config.ttl),
            backend,
        }
    }

    /// In-memory service with default TTL, for tests and the CLI.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::default()), CacheConfig::default())
    }

    /// Drop every row in every store. The only way records are ever
    /// actively deleted.
    pub fn clear_all(&self) {
        for table in Table::ALL {
            self.backend.clear(table);
        }
        tracing::debug!("cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entities: self.backend.len(Table::Entities),
            properties: self.backend.len(Table::Properties),
            claims: self.backend.len(Table::Claims),
            labels: self.backend.len(Table::Labels),
        }
    }
}
