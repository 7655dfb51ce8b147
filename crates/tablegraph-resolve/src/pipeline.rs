//! The resolution service
//!
//! [`Resolver`] owns an injected [`GraphSource`] and [`CacheService`] and
//! exposes the three operations the column-injection collaborator needs:
//! row resolution, claim retrieval, and property ranking. Every read goes
//! through a freshness partition first, every fetch is written back
//! through the cache, and upstream failures degrade to smaller results
//! rather than errors.
//!
//! Concurrent resolutions over the same labels may race and fetch twice;
//! the cache writes are idempotent (last write wins with equivalent
//! data), so no coordination is attempted. Cancellation is dropping the
//! future — a batch's cache write only happens after that batch's
//! response is fully parsed, so nothing is left half-persisted.

use crate::disambig::{self, Disambiguation};
use crate::rank;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tablegraph_cache::{CacheService, WritePolicy};
use tablegraph_client::claims::parse_claims;
use tablegraph_client::GraphSource;
use tablegraph_model::normalize::normalize_label;
use tablegraph_model::{
    Claim, Entity, EntityId, LabelQueryResult, Property, PropertyId, PropertyStat, RowMatch,
};
use tracing::{debug, warn};

pub struct Resolver {
    source: Arc<dyn GraphSource>,
    cache: CacheService,
    language: String,
}

impl Resolver {
    pub fn new(source: Arc<dyn GraphSource>, cache: CacheService) -> Self {
        Self {
            source,
            cache,
            language: "en".to_string(),
        }
    }

    /// Language used when picking labels/descriptions off fetched records.
    /// Should match the client's query language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn cache(&self) -> &CacheService {
        &self.cache
    }

    // ========================================================================
    // Labels
    // ========================================================================

    /// Cache-checked label lookup. Only stale/missing labels reach the
    /// network; successful query results — negative ones included — are
    /// written back. Labels from a failed batch are absent from the
    /// result and stay uncached.
    async fn lookup_labels(&self, normalized: &[String]) -> HashMap<String, LabelQueryResult> {
        let mut seen = HashSet::new();
        let distinct: Vec<String> = normalized
            .iter()
            .filter(|label| !label.is_empty() && seen.insert((*label).clone()))
            .cloned()
            .collect();

        let parts = self.cache.labels.get_fresh(&distinct);
        debug!(
            fresh = parts.fresh.len(),
            stale = parts.stale.len(),
            "label partition"
        );
        let mut merged = parts.fresh;
        if parts.stale.is_empty() {
            return merged;
        }

        let fetched = match self.source.entities_by_label(&parts.stale).await {
            Ok(results) => results,
            Err(error) => {
                warn!(%error, "label lookup failed, continuing with cached results");
                HashMap::new()
            }
        };
        self.cache.labels.save(fetched.values().cloned().collect());
        merged.extend(fetched);
        merged
    }

    /// Resolve one table column's cells to entities, one match per row.
    ///
    /// `filter` restricts candidates to those exposing a selected
    /// instance-of type; rows with no acceptable candidate come back
    /// unresolved rather than failing the rest.
    pub async fn resolve_rows(
        &self,
        labels: &[String],
        filter: Option<&HashSet<String>>,
    ) -> Vec<RowMatch> {
        let normalized: Vec<String> = labels.iter().map(|l| normalize_label(l)).collect();
        let results = self.lookup_labels(&normalized).await;
        disambig::resolve_rows(&normalized, &results, filter)
    }

    /// The candidate landscape for a label set: per-label candidates plus
    /// scored instance-of types, for the user-facing type filter.
    pub async fn disambiguation(&self, labels: &[String]) -> Disambiguation {
        let normalized: Vec<String> = labels.iter().map(|l| normalize_label(l)).collect();
        let results = self.lookup_labels(&normalized).await;
        disambig::disambiguate(&normalized, &results)
    }

    // ========================================================================
    // Claims
    // ========================================================================

    /// Claims per entity, cache-checked. An entity whose cached claim set
    /// is partially stale is re-fetched whole; an entity the fetch did
    /// not return is absent from the result.
    pub async fn get_claims(&self, ids: &[EntityId]) -> HashMap<EntityId, Vec<Claim>> {
        let parts = self.cache.claims.get_fresh(ids);
        debug!(
            fresh = parts.fresh.len(),
            stale = parts.stale.len(),
            "claim partition"
        );
        let mut merged = parts.fresh;
        if parts.stale.is_empty() {
            return merged;
        }

        let records = match self.source.entities_by_id(&parts.stale).await {
            Ok(records) => records,
            Err(error) => {
                warn!(%error, "entity fetch failed, continuing with cached claims");
                HashMap::new()
            }
        };

        let now = Utc::now();
        let mut entities = Vec::with_capacity(records.len());
        for (id, record) in &records {
            let claims = parse_claims(id, record, now);
            self.cache.claims.save_for_entity_at(id, claims.clone(), now);
            entities.push(Entity {
                id: id.clone(),
                label: record
                    .label_in(&self.language)
                    .unwrap_or(id.as_str())
                    .to_string(),
                description: record.description_in(&self.language).map(String::from),
                cached_at: now,
            });
            merged.insert(id.clone(), claims);
        }
        self.cache.entities.save_at(entities, now);
        merged
    }

    // ========================================================================
    // Property ranking
    // ========================================================================

    /// Rank candidate columns for a set of resolved entities: coverage
    /// over the current rows, ordered by cross-table usage first.
    pub async fn rank_properties(&self, ids: &[EntityId]) -> Vec<PropertyStat> {
        let mut seen = HashSet::new();
        let resolved: Vec<EntityId> = ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .cloned()
            .collect();

        let claims = self.get_claims(&resolved).await;
        let coverage = rank::property_coverage(&resolved, &claims);
        if coverage.is_empty() {
            return Vec::new();
        }

        let property_ids: Vec<PropertyId> = coverage.iter().map(|(id, _)| id.clone()).collect();
        self.ensure_property_records(&property_ids).await;

        let mut stats: Vec<PropertyStat> = coverage
            .into_iter()
            .map(|(id, coverage_percent)| {
                let record = self
                    .cache
                    .properties
                    .get_any(&id)
                    .unwrap_or_else(|| Property::placeholder(id.clone(), Utc::now()));
                PropertyStat {
                    id,
                    label: record.label,
                    description: record.description,
                    coverage_percent,
                    global_usage: record.global_usage,
                    visible: record.visible,
                }
            })
            .collect();
        rank::rank_stats(&mut stats);
        stats
    }

    /// Make sure every ranked property has a record: stale ones are
    /// re-fetched and written with the refresh policy (user-adjusted
    /// visibility and the usage counter survive), and anything the fetch
    /// did not return gets an insert-if-absent placeholder so the join
    /// never drops a property.
    async fn ensure_property_records(&self, ids: &[PropertyId]) {
        let parts = self.cache.properties.get_fresh(ids);
        if parts.stale.is_empty() {
            return;
        }

        let records = match self.source.properties_by_id(&parts.stale).await {
            Ok(records) => records,
            Err(error) => {
                warn!(%error, "property fetch failed, falling back to placeholders");
                HashMap::new()
            }
        };

        let now = Utc::now();
        let fetched: Vec<Property> = records
            .iter()
            .map(|(id, record)| Property {
                id: id.clone(),
                label: record
                    .label_in(&self.language)
                    .unwrap_or(id.as_str())
                    .to_string(),
                description: record
                    .description_in(&self.language)
                    .unwrap_or_default()
                    .to_string(),
                global_usage: 0,
                visible: true,
                cached_at: now,
            })
            .collect();
        self.cache
            .properties
            .save_at(WritePolicy::Refresh, fetched, now);

        let placeholders: Vec<Property> = parts
            .stale
            .iter()
            .filter(|id| !records.contains_key(*id))
            .map(|id| Property::placeholder(id.clone(), now))
            .collect();
        self.cache
            .properties
            .save_at(WritePolicy::InsertIfAbsent, placeholders, now);
    }

    // ========================================================================
    // Usage bookkeeping
    // ========================================================================

    /// Record that the user added this property as a column. Feeds the
    /// primary ranking signal; call once per distinct add action.
    pub fn mark_property_added(&self, id: &PropertyId) -> u64 {
        self.cache.properties.record_usage(id)
    }

    /// Persist a visibility toggle from the property picker.
    pub fn set_property_visible(&self, id: &PropertyId, visible: bool) {
        self.cache.properties.set_visible(id, visible);
    }
}
