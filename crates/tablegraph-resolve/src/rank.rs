//! Property usage aggregation
//!
//! Candidate columns are ranked by cross-table popularity first (the
//! cumulative usage counter reflects what users actually added across
//! sessions) and by current-table row coverage as the tiebreak. Coverage
//! counts entities, not values: a multi-valued property on one entity is
//! still one covered row.

use std::collections::{HashMap, HashSet};
use tablegraph_model::{Claim, EntityId, PropertyId, PropertyStat};

/// Per-property share of resolved entities exposing it, as rounded
/// percents. `resolved` must already be deduplicated; it is the
/// denominator even for entities with no cached claims.
pub fn property_coverage(
    resolved: &[EntityId],
    claims: &HashMap<EntityId, Vec<Claim>>,
) -> Vec<(PropertyId, u8)> {
    if resolved.is_empty() {
        return Vec::new();
    }

    let mut counts: HashMap<&PropertyId, usize> = HashMap::new();
    for entity in resolved {
        let Some(entity_claims) = claims.get(entity) else {
            continue;
        };
        let distinct: HashSet<&PropertyId> = entity_claims.iter().map(|c| &c.property).collect();
        for property in distinct {
            *counts.entry(property).or_default() += 1;
        }
    }

    let total = resolved.len();
    let mut coverage: Vec<(PropertyId, u8)> = counts
        .into_iter()
        .map(|(property, count)| {
            let percent = (100.0 * count as f64 / total as f64).round() as u8;
            (property.clone(), percent)
        })
        .collect();
    coverage.sort_by(|a, b| a.0.cmp(&b.0));
    coverage
}

/// Order stats for presentation: global usage descending, row coverage
/// descending on ties, property id as the stable final key.
pub fn rank_stats(stats: &mut [PropertyStat]) {
    stats.sort_by(|a, b| {
        b.global_usage
            .cmp(&a.global_usage)
            .then_with(|| b.coverage_percent.cmp(&a.coverage_percent))
            .then_with(|| a.id.cmp(&b.id))
    });
}
