//! JSON-file cache backend
//!
//! Stand-in for the extension-side persistent store: one JSON file, four
//! top-level tables, rewritten after every mutation. Good enough for a
//! CLI session; a corrupt or unreadable file degrades to an empty cache
//! rather than an error, matching how the stores treat malformed rows.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tablegraph_cache::{KeyValueBackend, Table};
use tracing::warn;

type Tables = HashMap<String, HashMap<String, Value>>;

pub struct FileBackend {
    path: PathBuf,
    tables: RwLock<Tables>,
}

impl FileBackend {
    pub fn open(path: &Path) -> Result<Self> {
        let tables = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read cache file {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(tables) => tables,
                Err(error) => {
                    warn!(%error, path = %path.display(), "corrupt cache file, starting empty");
                    Tables::default()
                }
            }
        } else {
            Tables::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            tables: RwLock::new(tables),
        })
    }

    fn persist(&self) {
        let tables = self.tables.read();
        match serde_json::to_string_pretty(&*tables) {
            Ok(json) => {
                if let Err(error) = std::fs::write(&self.path, json) {
                    warn!(%error, path = %self.path.display(), "failed to persist cache file");
                }
            }
            Err(error) => warn!(%error, "failed to serialize cache file"),
        }
    }
}

impl KeyValueBackend for FileBackend {
    fn get(&self, table: Table, key: &str) -> Option<Value> {
        self.tables.read().get(table.name())?.get(key).cloned()
    }

    fn put_many(&self, table: Table, rows: Vec<(String, Value)>) {
        {
            let mut tables = self.tables.write();
            let target = tables.entry(table.name().to_string()).or_default();
            for (key, value) in rows {
                target.insert(key, value);
            }
        }
        self.persist();
    }

    fn remove_many(&self, table: Table, keys: &[String]) {
        {
            let mut tables = self.tables.write();
            if let Some(target) = tables.get_mut(table.name()) {
                for key in keys {
                    target.remove(key);
                }
            }
        }
        self.persist();
    }

    fn scan_prefix(&self, table: Table, prefix: &str) -> Vec<(String, Value)> {
        self.tables
            .read()
            .get(table.name())
            .map(|rows| {
                rows.iter()
                    .filter(|(k, _)| k.starts_with(prefix))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn len(&self, table: Table) -> usize {
        self.tables
            .read()
            .get(table.name())
            .map_or(0, HashMap::len)
    }

    fn clear(&self, table: Table) {
        self.tables.write().remove(table.name());
        self.persist();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rows_survive_a_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        {
            let backend = FileBackend::open(&path).unwrap();
            backend.put_many(Table::Entities, vec![("Q90".into(), json!({"label": "Paris"}))]);
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(
            backend.get(Table::Entities, "Q90"),
            Some(json!({"label": "Paris"}))
        );
        assert_eq!(backend.len(Table::Entities), 1);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.len(Table::Entities), 0);
    }

    #[test]
    fn clear_drops_one_table_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let backend = FileBackend::open(&path).unwrap();
        backend.put_many(Table::Entities, vec![("Q90".into(), json!(1))]);
        backend.put_many(Table::Labels, vec![("paris".into(), json!(2))]);
        backend.clear(Table::Entities);

        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.len(Table::Entities), 0);
        assert_eq!(reopened.len(Table::Labels), 1);
    }
}
