//! Key-value backend interface
//!
//! The cache does not own its persistence: the surrounding layer (in the
//! browser deployment, an extension-local store) implements
//! [`KeyValueBackend`] and hands it in. Rows are JSON values in four
//! independently keyed tables. [`MemoryBackend`] is the in-process
//! implementation used by tests and the CLI.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// The four cache tables. Entities and properties are keyed by id, claims
/// by the composite `"<entity>|<property>"`, label results by normalized
/// label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Entities,
    Properties,
    Claims,
    Labels,
}

impl Table {
    pub const ALL: [Table; 4] = [
        Table::Entities,
        Table::Properties,
        Table::Claims,
        Table::Labels,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Table::Entities => "entities",
            Table::Properties => "properties",
            Table::Claims => "claims",
            Table::Labels => "labels",
        }
    }
}

/// Storage interface consumed by the typed stores.
///
/// Implementations must tolerate unknown keys (return nothing) and may be
/// called from multiple threads. A row's bytes are opaque JSON; schema
/// validation happens in the stores, which treat malformed rows as misses.
pub trait KeyValueBackend: Send + Sync {
    fn get(&self, table: Table, key: &str) -> Option<Value>;

    fn get_many(&self, table: Table, keys: &[String]) -> HashMap<String, Value> {
        keys.iter()
            .filter_map(|k| self.get(table, k).map(|v| (k.clone(), v)))
            .collect()
    }

    fn put_many(&self, table: Table, rows: Vec<(String, Value)>);

    fn remove_many(&self, table: Table, keys: &[String]);

    /// All rows whose key starts with `prefix`, in unspecified order.
    fn scan_prefix(&self, table: Table, prefix: &str) -> Vec<(String, Value)>;

    fn len(&self, table: Table) -> usize;

    fn clear(&self, table: Table);
}

/// Heap-backed implementation for tests and the CLI.
#[derive(Default)]
pub struct MemoryBackend {
    tables: RwLock<HashMap<Table, HashMap<String, Value>>>,
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, table: Table, key: &str) -> Option<Value> {
        self.tables.read().get(&table)?.get(key).cloned()
    }

    fn put_many(&self, table: Table, rows: Vec<(String, Value)>) {
        let mut tables = self.tables.write();
        let target = tables.entry(table).or_default();
        for (key, value) in rows {
            target.insert(key, value);
        }
    }

    fn remove_many(&self, table: Table, keys: &[String]) {
        let mut tables = self.tables.write();
        if let Some(target) = tables.get_mut(&table) {
            for key in keys {
                target.remove(key);
            }
        }
    }

    fn scan_prefix(&self, table: Table, prefix: &str) -> Vec<(String, Value)> {
        self.tables
            .read()
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|(k, _)| k.starts_with(prefix))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn len(&self, table: Table) -> usize {
        self.tables.read().get(&table).map_or(0, HashMap::len)
    }

    fn clear(&self, table: Table) {
        self.tables.write().remove(&table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tables_are_independent() {
        let backend = MemoryBackend::default();
        backend.put_many(Table::Entities, vec![("Q90".into(), json!({"a": 1}))]);
        backend.put_many(Table::Labels, vec![("paris".into(), json!({"b": 2}))]);

        assert!(backend.get(Table::Entities, "Q90").is_some());
        assert!(backend.get(Table::Labels, "Q90").is_none());
        assert_eq!(backend.len(Table::Entities), 1);

        backend.clear(Table::Entities);
        assert_eq!(backend.len(Table::Entities), 0);
        assert_eq!(backend.len(Table::Labels), 1);
    }

    #[test]
    fn scan_prefix_selects_composite_keys() {
        let backend = MemoryBackend::default();
        backend.put_many(
            Table::Claims,
            vec![
                ("Q90|P31".into(), json!(1)),
                ("Q90|P17".into(), json!(2)),
                ("Q84|P31".into(), json!(3)),
            ],
        );

        let rows = backend.scan_prefix(Table::Claims, "Q90|");
        assert_eq!(rows.len(), 2);

        backend.remove_many(Table::Claims, &["Q90|P31".to_string()]);
        assert_eq!(backend.scan_prefix(Table::Claims, "Q90|").len(), 1);
    }
}
