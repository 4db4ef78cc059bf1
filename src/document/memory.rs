//! In-memory document store implementation using `DashMap`.
//!
//! This is the default backend - data is lost on process restart.

use super::{CasOutcome, Collection, DocumentStore, StoredDocument};
use crate::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxBuildHasher;
use serde_json::Value;

#[derive(Debug)]
struct Slot {
    version: u64,
    body: Value,
}

type Table = DashMap<String, Slot, FxBuildHasher>;

/// In-memory document store backed by one lock-sharded map per collection.
///
/// Each operation touches exactly one shard lock, which gives per-document
/// atomicity for inserts and compare-and-swap. Scans (`find_by_field`) are
/// not snapshots: documents written concurrently may or may not be seen.
///
/// # Example
///
/// ```rust
/// use moea_tracker::document::{Collection, DocumentStore, MemoryDocumentStore};
///
/// # async fn example() -> moea_tracker::Result<()> {
/// let store = MemoryDocumentStore::new();
/// store.insert(Collection::Results, "r-1", serde_json::json!({})).await?;
/// assert!(store.get(Collection::Results, "r-1").await?.is_some());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryDocumentStore {
    experiments: Table,
    results: Table,
    run_keys: Table,
}

impl MemoryDocumentStore {
    /// Create a new in-memory document store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create with pre-allocated capacity per collection.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            experiments: DashMap::with_capacity_and_hasher(capacity, FxBuildHasher),
            results: DashMap::with_capacity_and_hasher(capacity, FxBuildHasher),
            run_keys: DashMap::with_capacity_and_hasher(capacity, FxBuildHasher),
        }
    }

    /// Number of documents in a collection.
    #[must_use]
    pub fn len(&self, collection: Collection) -> usize {
        self.table(collection).len()
    }

    /// Check if every collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty() && self.results.is_empty() && self.run_keys.is_empty()
    }

    /// Remove every document from every collection.
    pub fn clear(&self) {
        self.experiments.clear();
        self.results.clear();
        self.run_keys.clear();
    }

    const fn table(&self, collection: Collection) -> &Table {
        match collection {
            Collection::Experiments => &self.experiments,
            Collection::Results => &self.results,
            Collection::RunKeys => &self.run_keys,
        }
    }

    fn insert_slot(&self, collection: Collection, id: &str, body: Value) -> bool {
        match self.table(collection).entry(id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(vacant) => {
                vacant.insert(Slot { version: 1, body });
                true
            }
        }
    }

    fn read_slot(&self, collection: Collection, id: &str) -> Option<StoredDocument> {
        self.table(collection).get(id).map(|slot| StoredDocument {
            id: id.to_string(),
            version: slot.version,
            body: slot.body.clone(),
        })
    }

    fn scan(&self, collection: Collection, field: &str, value: &Value) -> Vec<StoredDocument> {
        let mut matches: Vec<StoredDocument> = self
            .table(collection)
            .iter()
            .filter(|entry| entry.value().body.get(field) == Some(value))
            .map(|entry| StoredDocument {
                id: entry.key().clone(),
                version: entry.value().version,
                body: entry.value().body.clone(),
            })
            .collect();
        matches.sort_by(|a, b| a.id.cmp(&b.id));
        matches
    }

    fn swap_slot(
        &self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        body: Value,
    ) -> CasOutcome {
        let Some(mut slot) = self.table(collection).get_mut(id) else {
            return CasOutcome::Missing;
        };
        if slot.version != expected_version {
            return CasOutcome::VersionMismatch {
                current: slot.version,
            };
        }
        slot.version += 1;
        slot.body = body;
        CasOutcome::Applied {
            version: slot.version,
        }
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryDocumentStore {
    async fn insert(&self, collection: Collection, id: &str, body: Value) -> Result<bool> {
        Ok(self.insert_slot(collection, id, body))
    }

    async fn get(&self, collection: Collection, id: &str) -> Result<Option<StoredDocument>> {
        Ok(self.read_slot(collection, id))
    }

    async fn find_by_field(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<StoredDocument>> {
        Ok(self.scan(collection, field, value))
    }

    async fn compare_and_swap(
        &self,
        collection: Collection,
        id: &str,
        expected_version: u64,
        body: Value,
    ) -> Result<CasOutcome> {
        Ok(self.swap_slot(collection, id, expected_version, body))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
        Ok(self.table(collection).remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_memory_store_default() {
        let store = MemoryDocumentStore::default();
        assert!(store.is_empty());
        assert_eq!(store.len(Collection::Experiments), 0);
    }

    #[tokio::test]
    async fn test_memory_store_clear() {
        let store = MemoryDocumentStore::with_capacity(16);
        store
            .insert(Collection::Experiments, "e-1", json!({}))
            .await
            .unwrap();
        store
            .insert(Collection::RunKeys, "k-1", json!({}))
            .await
            .unwrap();
        assert!(!store.is_empty());

        store.clear();
        assert!(store.is_empty());
        assert!(store.get(Collection::Experiments, "e-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_delete_nonexistent() {
        let store = MemoryDocumentStore::new();
        assert!(!store.delete(Collection::Results, "nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_memory_store_concurrent_cas_single_winner() {
        let store = Arc::new(MemoryDocumentStore::new());
        store
            .insert(Collection::Experiments, "e-1", json!({"owner": null}))
            .await
            .unwrap();

        let mut handles = vec![];
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .compare_and_swap(Collection::Experiments, "e-1", 1, json!({"owner": i}))
                    .await
                    .unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), CasOutcome::Applied { .. }) {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);

        let doc = store.get(Collection::Experiments, "e-1").await.unwrap().unwrap();
        assert_eq!(doc.version, 2);
    }

    #[tokio::test]
    async fn test_memory_store_concurrent_insert_single_winner() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut handles = vec![];
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .insert(Collection::RunKeys, "key", json!({"claimant": i}))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }
}
