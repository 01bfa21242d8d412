// Path: crates/storage/src/redb_store.rs
//! A persistent [`DocumentStore`] on top of `redb`.
//!
//! Each collection is its own table keyed by a monotonically increasing
//! `u64`, so iteration follows insertion order. Documents are stored as
//! compact JSON.

use fleet_api::store::{query, Document, DocumentStore, Filter, FindOptions, UpsertOutcome};
use fleet_types::error::StoreError;
use redb::{Database, ReadableTable, Table, TableDefinition, TableError};
use std::path::Path;
use std::sync::Arc;

fn table(name: &str) -> TableDefinition<'_, u64, &'static str> {
    TableDefinition::new(name)
}

fn backend<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn encode(doc: &Document) -> Result<String, StoreError> {
    serde_json::to_string(doc).map_err(|e| StoreError::Encode(e.to_string()))
}

fn decode(raw: &str) -> Result<Document, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::Decode(e.to_string()))
}

/// Collections persisted in a single `redb` file.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Opens or creates the store file at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = Database::create(path.as_ref()).map_err(backend)?;
        tracing::info!(target: "storage", path = %path.as_ref().display(), "opened redb document store");
        Ok(Self { db: Arc::new(db) })
    }

    /// Every `(key, document)` of a collection; empty if it was never written.
    fn scan(&self, collection: &str) -> Result<Vec<(u64, Document)>, StoreError> {
        let read = self.db.begin_read().map_err(backend)?;
        let tbl = match read.open_table(table(collection)) {
            Ok(t) => t,
            Err(TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(e) => return Err(backend(e)),
        };
        let mut out = Vec::new();
        for entry in tbl.iter().map_err(backend)? {
            let (k, v) = entry.map_err(backend)?;
            out.push((k.value(), decode(v.value())?));
        }
        Ok(out)
    }

    /// Runs `f` inside a write transaction on one collection and commits.
    fn write<R>(
        &self,
        collection: &str,
        f: impl FnOnce(&mut Table<'_, '_, u64, &'static str>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let txn = self.db.begin_write().map_err(backend)?;
        let out = {
            let mut tbl = txn.open_table(table(collection)).map_err(backend)?;
            f(&mut tbl)?
        };
        txn.commit().map_err(backend)?;
        Ok(out)
    }
}

fn next_key(tbl: &Table<'_, '_, u64, &'static str>) -> Result<u64, StoreError> {
    Ok(tbl
        .last()
        .map_err(backend)?
        .map_or(0, |(k, _)| k.value() + 1))
}

fn matching_keys(
    tbl: &Table<'_, '_, u64, &'static str>,
    filter: &Filter,
) -> Result<Vec<(u64, Document)>, StoreError> {
    let mut out = Vec::new();
    for entry in tbl.iter().map_err(backend)? {
        let (k, v) = entry.map_err(backend)?;
        let doc = decode(v.value())?;
        if query::matches(&doc, filter) {
            out.push((k.value(), doc));
        }
    }
    Ok(out)
}

impl DocumentStore for RedbStore {
    fn upsert(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Document,
    ) -> Result<UpsertOutcome, StoreError> {
        let raw = encode(&doc)?;
        self.write(collection, |tbl| {
            let existing = matching_keys(tbl, filter)?.into_iter().next();
            match existing {
                Some((key, _)) => {
                    tbl.insert(key, raw.as_str()).map_err(backend)?;
                    Ok(UpsertOutcome::Replaced)
                }
                None => {
                    let key = next_key(tbl)?;
                    tbl.insert(key, raw.as_str()).map_err(backend)?;
                    Ok(UpsertOutcome::Inserted)
                }
            }
        })
    }

    fn insert(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        let raw = encode(&doc)?;
        self.write(collection, |tbl| {
            let key = next_key(tbl)?;
            tbl.insert(key, raw.as_str()).map_err(backend)?;
            Ok(())
        })
    }

    fn insert_absent(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Document,
    ) -> Result<bool, StoreError> {
        let raw = encode(&doc)?;
        self.write(collection, |tbl| {
            if !matching_keys(tbl, filter)?.is_empty() {
                return Ok(false);
            }
            let key = next_key(tbl)?;
            tbl.insert(key, raw.as_str()).map_err(backend)?;
            Ok(true)
        })
    }

    fn update(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
    ) -> Result<usize, StoreError> {
        self.write(collection, |tbl| {
            let hits = matching_keys(tbl, filter)?;
            let touched = hits.len();
            for (key, mut doc) in hits {
                for (k, v) in &fields {
                    doc.insert(k.clone(), v.clone());
                }
                let raw = encode(&doc)?;
                tbl.insert(key, raw.as_str()).map_err(backend)?;
            }
            Ok(touched)
        })
    }

    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &[&str],
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError> {
        let matched = self
            .scan(collection)?
            .into_iter()
            .map(|(_, d)| d)
            .filter(|d| query::matches(d, filter))
            .collect();
        Ok(query::finish(matched, projection, options))
    }

    fn delete(&self, collection: &str, filter: &Filter) -> Result<usize, StoreError> {
        self.write(collection, |tbl| {
            let hits = matching_keys(tbl, filter)?;
            for (key, _) in &hits {
                tbl.remove(*key).map_err(backend)?;
            }
            Ok(hits.len())
        })
    }

    fn drop_collection(&self, collection: &str) -> Result<(), StoreError> {
        let txn = self.db.begin_write().map_err(backend)?;
        txn.delete_table(table(collection)).map_err(backend)?;
        txn.commit().map_err(backend)?;
        Ok(())
    }
}
