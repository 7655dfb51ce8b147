//! Typed stores over the key-value backend
//!
//! One store per cache table. All of them share the same freshness
//! partition shape; the claim store adds the per-entity atomicity rule and
//! the property store carries the two named write policies plus the
//! cumulative usage counter.

use crate::backend::{KeyValueBackend, Table};
use crate::is_fresh;
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tablegraph_model::{Claim, Entity, EntityId, LabelQueryResult, Property, PropertyId};
use tracing::warn;

/// Result of a freshness partition: every input key lands in exactly one
/// side. `stale` covers both missing and expired records.
#[derive(Debug, Clone)]
pub struct Freshness<K, V> {
    pub fresh: HashMap<K, V>,
    pub stale: Vec<K>,
}

impl<K, V> Default for Freshness<K, V> {
    fn default() -> Self {
        Self {
            fresh: HashMap::new(),
            stale: Vec::new(),
        }
    }
}

/// How a property write treats an existing record.
///
/// `Refresh` is the re-fetch path: label and description are replaced and
/// the timestamp renewed, but user-adjusted state (`visible`) and the
/// cumulative `global_usage` counter are preserved. `InsertIfAbsent` is the
/// dedup path: an existing record is left entirely untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    Refresh,
    InsertIfAbsent,
}

fn decode<T: DeserializeOwned>(table: Table, key: &str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(record) => Some(record),
        Err(error) => {
            warn!(table = table.name(), key, %error, "undeserializable cache row treated as miss");
            None
        }
    }
}

fn encode<T: serde::Serialize>(record: &T) -> Value {
    serde_json::to_value(record).expect("cache records serialize to JSON")
}

/// Composite key for a claim row.
pub fn claim_key(entity: &EntityId, property: &PropertyId) -> String {
    format!("{entity}|{property}")
}

fn entity_prefix(entity: &EntityId) -> String {
    format!("{entity}|")
}

// ============================================================================
// Entities
// ============================================================================

#[derive(Clone)]
pub struct EntityStore {
    backend: Arc<dyn KeyValueBackend>,
    ttl: Duration,
}

impl EntityStore {
    pub(crate) fn new(backend: Arc<dyn KeyValueBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn get_fresh(&self, ids: &[EntityId]) -> Freshness<EntityId, Entity> {
        self.get_fresh_at(ids, Utc::now())
    }

    pub fn get_fresh_at(&self, ids: &[EntityId], now: DateTime<Utc>) -> Freshness<EntityId, Entity> {
        let mut seen = HashSet::new();
        let distinct: Vec<&EntityId> = ids.iter().filter(|id| seen.insert(*id)).collect();
        let keys: Vec<String> = distinct.iter().map(ToString::to_string).collect();
        let mut rows = self.backend.get_many(Table::Entities, &keys);

        let mut out = Freshness::default();
        for id in distinct {
            let record = rows
                .remove(id.as_str())
                .and_then(|row| decode::<Entity>(Table::Entities, id.as_str(), row))
                .filter(|e| is_fresh(e.cached_at, now, self.ttl));
            match record {
                Some(entity) => {
                    out.fresh.insert(id.clone(), entity);
                }
                None => out.stale.push(id.clone()),
            }
        }
        out
    }

    pub fn save(&self, entities: Vec<Entity>) {
        self.save_at(entities, Utc::now());
    }

    pub fn save_at(&self, entities: Vec<Entity>, now: DateTime<Utc>) {
        let rows = entities
            .into_iter()
            .map(|mut entity| {
                entity.cached_at = now;
                (entity.id.to_string(), encode(&entity))
            })
            .collect();
        self.backend.put_many(Table::Entities, rows);
    }
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Clone)]
pub struct PropertyStore {
    backend: Arc<dyn KeyValueBackend>,
    ttl: Duration,
}

impl PropertyStore {
    pub(crate) fn new(backend: Arc<dyn KeyValueBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn get_fresh(&self, ids: &[PropertyId]) -> Freshness<PropertyId, Property> {
        self.get_fresh_at(ids, Utc::now())
    }

    pub fn get_fresh_at(
        &self,
        ids: &[PropertyId],
        now: DateTime<Utc>,
    ) -> Freshness<PropertyId, Property> {
        let mut seen = HashSet::new();
        let distinct: Vec<&PropertyId> = ids.iter().filter(|id| seen.insert(*id)).collect();
        let keys: Vec<String> = distinct.iter().map(ToString::to_string).collect();
        let mut rows = self.backend.get_many(Table::Properties, &keys);

        let mut out = Freshness::default();
        for id in distinct {
            let record = rows
                .remove(id.as_str())
                .and_then(|row| decode::<Property>(Table::Properties, id.as_str(), row))
                .filter(|p| is_fresh(p.cached_at, now, self.ttl));
            match record {
                Some(property) => {
                    out.fresh.insert(id.clone(), property);
                }
                None => out.stale.push(id.clone()),
            }
        }
        out
    }

    /// Read a record regardless of freshness. Ranking joins usage and
    /// visibility state through this; stale label text is still label text.
    pub fn get_any(&self, id: &PropertyId) -> Option<Property> {
        let row = self.backend.get(Table::Properties, id.as_str())?;
        decode(Table::Properties, id.as_str(), row)
    }

    pub fn save(&self, policy: WritePolicy, properties: Vec<Property>) {
        self.save_at(policy, properties, Utc::now());
    }

    pub fn save_at(&self, policy: WritePolicy, properties: Vec<Property>, now: DateTime<Utc>) {
        let mut rows = Vec::with_capacity(properties.len());
        for mut incoming in properties {
            let existing = self.get_any(&incoming.id);
            match (policy, existing) {
                (WritePolicy::InsertIfAbsent, Some(_)) => continue,
                (WritePolicy::Refresh, Some(current)) => {
                    incoming.global_usage = current.global_usage;
                    incoming.visible = current.visible;
                }
                (_, None) => {}
            }
            incoming.cached_at = now;
            rows.push((incoming.id.to_string(), encode(&incoming)));
        }
        if !rows.is_empty() {
            self.backend.put_many(Table::Properties, rows);
        }
    }

    /// Count one "add this property as a column" action. Returns the new
    /// total. The timestamp is left alone: usage is local state, not
    /// fetched data, so bumping it must not make a stale record look
    /// fresh.
    pub fn record_usage(&self, id: &PropertyId) -> u64 {
        self.record_usage_at(id, Utc::now())
    }

    pub fn record_usage_at(&self, id: &PropertyId, now: DateTime<Utc>) -> u64 {
        let mut record = self
            .get_any(id)
            .unwrap_or_else(|| Property::placeholder(id.clone(), now));
        record.global_usage += 1;
        let usage = record.global_usage;
        self.backend
            .put_many(Table::Properties, vec![(id.to_string(), encode(&record))]);
        usage
    }

    /// Persist a user visibility toggle. Survives later `Refresh` writes.
    pub fn set_visible(&self, id: &PropertyId, visible: bool) {
        if let Some(mut record) = self.get_any(id) {
            record.visible = visible;
            self.backend
                .put_many(Table::Properties, vec![(id.to_string(), encode(&record))]);
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

#[derive(Clone)]
pub struct ClaimStore {
    backend: Arc<dyn KeyValueBackend>,
    ttl: Duration,
}

impl ClaimStore {
    pub(crate) fn new(backend: Arc<dyn KeyValueBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn get_fresh(&self, entities: &[EntityId]) -> Freshness<EntityId, Vec<Claim>> {
        self.get_fresh_at(entities, Utc::now())
    }

    /// Partition by entity. An entity's claim set is fresh only when at
    /// least one claim exists and every claim in the set is fresh: claims
    /// are fetched and replaced atomically per entity, and serving a mix
    /// of old and new facts is worse than re-fetching.
    pub fn get_fresh_at(
        &self,
        entities: &[EntityId],
        now: DateTime<Utc>,
    ) -> Freshness<EntityId, Vec<Claim>> {
        let mut out = Freshness::default();
        let mut seen = HashSet::new();

        for entity in entities {
            if !seen.insert(entity.clone()) {
                continue;
            }
            let rows = self.backend.scan_prefix(Table::Claims, &entity_prefix(entity));
            let mut claims = Vec::with_capacity(rows.len());
            let mut valid = !rows.is_empty();
            for (key, row) in rows {
                match decode::<Claim>(Table::Claims, &key, row) {
                    Some(claim) if is_fresh(claim.cached_at, now, self.ttl) => claims.push(claim),
                    // One stale or corrupt row invalidates the whole set.
                    _ => {
                        valid = false;
                        break;
                    }
                }
            }
            if valid {
                claims.sort_by(|a, b| a.property.cmp(&b.property));
                out.fresh.insert(entity.clone(), claims);
            } else {
                out.stale.push(entity.clone());
            }
        }
        out
    }

    pub fn save_for_entity(&self, entity: &EntityId, claims: Vec<Claim>) {
        self.save_for_entity_at(entity, claims, Utc::now());
    }

    /// Replace the entity's entire claim set: rows for properties no
    /// longer present are removed, everything incoming is stamped with one
    /// timestamp.
    pub fn save_for_entity_at(&self, entity: &EntityId, claims: Vec<Claim>, now: DateTime<Utc>) {
        let mut rows = Vec::with_capacity(claims.len());
        let mut kept = HashSet::new();
        for mut claim in claims {
            claim.entity = entity.clone();
            claim.cached_at = now;
            let key = claim_key(entity, &claim.property);
            kept.insert(key.clone());
            rows.push((key, encode(&claim)));
        }

        let dropped: Vec<String> = self
            .backend
            .scan_prefix(Table::Claims, &entity_prefix(entity))
            .into_iter()
            .map(|(key, _)| key)
            .filter(|key| !kept.contains(key))
            .collect();
        if !dropped.is_empty() {
            self.backend.remove_many(Table::Claims, &dropped);
        }
        self.backend.put_many(Table::Claims, rows);
    }
}

// ============================================================================
// Label query results
// ============================================================================

#[derive(Clone)]
pub struct LabelStore {
    backend: Arc<dyn KeyValueBackend>,
    ttl: Duration,
}

impl LabelStore {
    pub(crate) fn new(backend: Arc<dyn KeyValueBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn get_fresh(&self, labels: &[String]) -> Freshness<String, LabelQueryResult> {
        self.get_fresh_at(labels, Utc::now())
    }

    pub fn get_fresh_at(
        &self,
        labels: &[String],
        now: DateTime<Utc>,
    ) -> Freshness<String, LabelQueryResult> {
        let mut seen = HashSet::new();
        let keys: Vec<String> = labels
            .iter()
            .filter(|l| seen.insert(l.as_str()))
            .cloned()
            .collect();
        let mut rows = self.backend.get_many(Table::Labels, &keys);

        let mut out = Freshness::default();
        for label in keys {
            let record = rows
                .remove(&label)
                .and_then(|row| decode::<LabelQueryResult>(Table::Labels, &label, row))
                .filter(|r| is_fresh(r.cached_at, now, self.ttl));
            match record {
                Some(result) => {
                    out.fresh.insert(label, result);
                }
                None => out.stale.push(label),
            }
        }
        out
    }

    /// Write-through for query results, negative ones included: an empty
    /// match list keeps an unmatched label from re-hitting the network
    /// until the TTL lapses.
    pub fn save(&self, results: Vec<LabelQueryResult>) {
        self.save_at(results, Utc::now());
    }

    pub fn save_at(&self, results: Vec<LabelQueryResult>, now: DateTime<Utc>) {
        let rows = results
            .into_iter()
            .map(|mut result| {
                result.cached_at = now;
                (result.label.clone(), encode(&result))
            })
            .collect();
        self.backend.put_many(Table::Labels, rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CacheConfig, CacheService, MemoryBackend};
    use proptest::prelude::*;
    use serde_json::json;
    use tablegraph_model::ClaimValue;

    fn service() -> CacheService {
        CacheService::new(Arc::new(MemoryBackend::default()), CacheConfig::default())
    }

    fn qid(s: &str) -> EntityId {
        s.parse().unwrap()
    }

    fn pid(s: &str) -> PropertyId {
        s.parse().unwrap()
    }

    fn entity(id: &str, label: &str, cached_at: DateTime<Utc>) -> Entity {
        Entity {
            id: qid(id),
            label: label.to_string(),
            description: None,
            cached_at,
        }
    }

    fn property(id: &str, label: &str, now: DateTime<Utc>) -> Property {
        Property {
            id: pid(id),
            label: label.to_string(),
            description: format!("{label} description"),
            global_usage: 0,
            visible: true,
            cached_at: now,
        }
    }

    fn claim(entity: &str, property: &str, now: DateTime<Utc>) -> Claim {
        Claim {
            entity: qid(entity),
            property: pid(property),
            values: vec![ClaimValue::Text("v".into())],
            cached_at: now,
        }
    }

    #[test]
    fn partition_covers_every_key_exactly_once() {
        let cache = service();
        let now = Utc::now();

        cache.entities.save_at(vec![entity("Q1", "one", now)], now);
        cache
            .entities
            .save_at(vec![entity("Q2", "two", now)], now - Duration::hours(30));

        let ids = vec![qid("Q1"), qid("Q2"), qid("Q3")];
        let parts = cache.entities.get_fresh_at(&ids, now);

        assert!(parts.fresh.contains_key(&qid("Q1")));
        assert_eq!(parts.fresh.len() + parts.stale.len(), ids.len());
        for id in &ids {
            let in_fresh = parts.fresh.contains_key(id);
            let in_stale = parts.stale.contains(id);
            assert!(in_fresh ^ in_stale, "{id} must land on exactly one side");
        }
    }

    #[test]
    fn record_aged_exactly_ttl_is_stale() {
        let cache = service();
        let now = Utc::now();
        let ttl = CacheConfig::default().ttl;

        cache.entities.save_at(vec![entity("Q1", "one", now)], now - ttl);
        let parts = cache.entities.get_fresh_at(&[qid("Q1")], now);
        assert_eq!(parts.stale, vec![qid("Q1")]);

        cache
            .entities
            .save_at(vec![entity("Q1", "one", now)], now - ttl + Duration::seconds(1));
        let parts = cache.entities.get_fresh_at(&[qid("Q1")], now);
        assert!(parts.fresh.contains_key(&qid("Q1")));
    }

    #[test]
    fn malformed_row_is_a_miss() {
        let cache = service();
        cache
            .entities
            .backend
            .put_many(Table::Entities, vec![("Q1".into(), json!("not a record"))]);

        let parts = cache.entities.get_fresh_at(&[qid("Q1")], Utc::now());
        assert_eq!(parts.stale, vec![qid("Q1")]);
    }

    #[test]
    fn duplicate_input_keys_partition_once() {
        let cache = service();
        let now = Utc::now();
        cache.entities.save_at(vec![entity("Q1", "one", now)], now);

        let parts = cache
            .entities
            .get_fresh_at(&[qid("Q1"), qid("Q1"), qid("Q9")], now);
        assert_eq!(parts.fresh.len(), 1);
        assert_eq!(parts.stale, vec![qid("Q9")]);
    }

    #[test]
    fn refresh_preserves_usage_and_visibility() {
        let cache = service();
        let now = Utc::now();

        cache
            .properties
            .save_at(WritePolicy::Refresh, vec![property("P31", "instance of", now)], now);
        cache.properties.record_usage_at(&pid("P31"), now);
        cache.properties.record_usage_at(&pid("P31"), now);
        cache.properties.set_visible(&pid("P31"), false);

        let mut refreshed = property("P31", "instance of (renamed)", now);
        refreshed.global_usage = 999; // must be ignored
        refreshed.visible = true; // must be ignored
        cache
            .properties
            .save_at(WritePolicy::Refresh, vec![refreshed], now);

        let stored = cache.properties.get_any(&pid("P31")).unwrap();
        assert_eq!(stored.label, "instance of (renamed)");
        assert_eq!(stored.global_usage, 2);
        assert!(!stored.visible);
    }

    #[test]
    fn insert_if_absent_never_overwrites() {
        let cache = service();
        let now = Utc::now();

        cache
            .properties
            .save_at(WritePolicy::Refresh, vec![property("P17", "country", now)], now);
        cache.properties.save_at(
            WritePolicy::InsertIfAbsent,
            vec![property("P17", "overwritten", now), property("P36", "capital", now)],
            now,
        );

        assert_eq!(cache.properties.get_any(&pid("P17")).unwrap().label, "country");
        assert_eq!(cache.properties.get_any(&pid("P36")).unwrap().label, "capital");
    }

    #[test]
    fn record_usage_counts_from_nothing() {
        let cache = service();
        assert_eq!(cache.properties.record_usage(&pid("P569")), 1);
        assert_eq!(cache.properties.record_usage(&pid("P569")), 2);
        let stored = cache.properties.get_any(&pid("P569")).unwrap();
        assert_eq!(stored.global_usage, 2);
        assert_eq!(stored.label, "P569");
    }

    #[test]
    fn usage_bump_does_not_renew_freshness() {
        let cache = service();
        let now = Utc::now();
        let old = now - Duration::hours(30);

        cache
            .properties
            .save_at(WritePolicy::Refresh, vec![property("P31", "instance of", old)], old);
        cache.properties.record_usage_at(&pid("P31"), now);

        let parts = cache.properties.get_fresh_at(&[pid("P31")], now);
        assert_eq!(parts.stale, vec![pid("P31")]);
    }

    #[test]
    fn entity_with_no_claims_is_stale() {
        let cache = service();
        let parts = cache.claims.get_fresh_at(&[qid("Q90")], Utc::now());
        assert_eq!(parts.stale, vec![qid("Q90")]);
    }

    #[test]
    fn one_stale_claim_invalidates_the_whole_entity() {
        let cache = service();
        let now = Utc::now();

        // Simulate a partially aged set by writing rows directly.
        let fresh_claim = claim("Q90", "P31", now);
        let stale_claim = claim("Q90", "P17", now - Duration::hours(30));
        cache.claims.backend.put_many(
            Table::Claims,
            vec![
                (claim_key(&qid("Q90"), &pid("P31")), encode(&fresh_claim)),
                (claim_key(&qid("Q90"), &pid("P17")), encode(&stale_claim)),
            ],
        );

        let parts = cache.claims.get_fresh_at(&[qid("Q90")], now);
        assert!(parts.fresh.is_empty());
        assert_eq!(parts.stale, vec![qid("Q90")]);
    }

    #[test]
    fn save_for_entity_replaces_the_full_set() {
        let cache = service();
        let now = Utc::now();

        cache.claims.save_for_entity_at(
            &qid("Q90"),
            vec![claim("Q90", "P31", now), claim("Q90", "P17", now)],
            now,
        );
        cache
            .claims
            .save_for_entity_at(&qid("Q90"), vec![claim("Q90", "P31", now)], now);

        let parts = cache.claims.get_fresh_at(&[qid("Q90")], now);
        let claims = parts.fresh.get(&qid("Q90")).unwrap();
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].property, pid("P31"));
    }

    #[test]
    fn claims_for_other_entities_are_untouched() {
        let cache = service();
        let now = Utc::now();

        cache
            .claims
            .save_for_entity_at(&qid("Q90"), vec![claim("Q90", "P31", now)], now);
        cache
            .claims
            .save_for_entity_at(&qid("Q84"), vec![claim("Q84", "P31", now)], now);
        cache.claims.save_for_entity_at(&qid("Q90"), vec![], now);

        let parts = cache.claims.get_fresh_at(&[qid("Q84")], now);
        assert!(parts.fresh.contains_key(&qid("Q84")));
    }

    #[test]
    fn negative_label_results_are_served_fresh() {
        let cache = service();
        let now = Utc::now();

        cache
            .labels
            .save_at(vec![LabelQueryResult::empty("Nonexistentville", now)], now);

        let parts = cache
            .labels
            .get_fresh_at(&["Nonexistentville".to_string()], now);
        let result = parts.fresh.get("Nonexistentville").unwrap();
        assert!(result.is_negative());
        assert!(parts.stale.is_empty());
    }

    proptest! {
        #[test]
        fn partition_is_exact_for_arbitrary_ages(ages in proptest::collection::vec(0i64..72, 1..20)) {
            let cache = service();
            let now = Utc::now();
            let ttl = CacheConfig::default().ttl;

            let ids: Vec<EntityId> = (0..ages.len())
                .map(|i| format!("Q{}", i + 1).parse().unwrap())
                .collect();
            for (id, hours) in ids.iter().zip(&ages) {
                cache.entities.save_at(
                    vec![entity(id.as_str(), "e", now)],
                    now - Duration::hours(*hours),
                );
            }

            let parts = cache.entities.get_fresh_at(&ids, now);
            prop_assert_eq!(parts.fresh.len() + parts.stale.len(), ids.len());
            for (id, hours) in ids.iter().zip(&ages) {
                let expect_fresh = Duration::hours(*hours) < ttl;
                prop_assert_eq!(parts.fresh.contains_key(id), expect_fresh);
                prop_assert_eq!(parts.stale.contains(id), !expect_fresh);
            }
        }
    }
}
