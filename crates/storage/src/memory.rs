// Path: crates/storage/src/memory.rs
//! A volatile [`DocumentStore`] used by tests and by `backend = "memory"`.

use fleet_api::store::{query, Document, DocumentStore, Filter, FindOptions, UpsertOutcome};
use fleet_types::error::StoreError;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Collections held in process memory, in insertion order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStore {
    fn upsert(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Document,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut guard = self.collections.write();
        let docs = guard.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| query::matches(d, filter)) {
            Some(existing) => {
                *existing = doc;
                Ok(UpsertOutcome::Replaced)
            }
            None => {
                docs.push(doc);
                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    fn insert(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(())
    }

    fn insert_absent(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Document,
    ) -> Result<bool, StoreError> {
        let mut guard = self.collections.write();
        let docs = guard.entry(collection.to_string()).or_default();
        if docs.iter().any(|d| query::matches(d, filter)) {
            return Ok(false);
        }
        docs.push(doc);
        Ok(true)
    }

    fn update(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
    ) -> Result<usize, StoreError> {
        let mut guard = self.collections.write();
        let Some(docs) = guard.get_mut(collection) else {
            return Ok(0);
        };
        let mut touched = 0;
        for doc in docs.iter_mut().filter(|d| query::matches(d, filter)) {
            for (k, v) in &fields {
                doc.insert(k.clone(), v.clone());
            }
            touched += 1;
        }
        Ok(touched)
    }

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &[&str],
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let guard = self.collections.read();
        let matched = guard
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|d| query::matches(d, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(query::finish(matched, projection, options))
    }

    fn delete(&self, collection: &str, filter: &Filter) -> Result<usize, StoreError> {
        let mut guard = self.collections.write();
        let Some(docs) = guard.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !query::matches(d, filter));
        Ok(before - docs.len())
    }

    fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        self.collections.write().remove(collection);
        Ok(())
    }
}
