// Path: crates/api/src/store/mod.rs

//! An abstract document store: named collections of JSON documents queried
//! by field filters, with optional projection, sort and limit.
//!
//! The contract is deliberately engine-agnostic. Both backends in
//! `fleet-storage` evaluate filters with [`query::matches`] so that they agree
//! on semantics.

use fleet_types::error::StoreError;
use serde_json::{Map, Value};

/// Filter evaluation, projection and ordering shared by every backend.
pub mod query;

/// A stored document.
pub type Document = Map<String, Value>;

/// A comparison applied to one field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Equal. A `Null` operand also matches a missing field.
    Eq(Value),
    /// Not equal. Matches a missing field.
    Ne(Value),
    /// Less than.
    Lt(Value),
    /// Less than or equal.
    Lte(Value),
    /// Greater than.
    Gt(Value),
    /// Greater than or equal.
    Gte(Value),
    /// Equal to any operand.
    In(Vec<Value>),
    /// Field presence.
    Exists(bool),
}

/// A conjunction of field conditions. The empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Condition)>,
}

impl Filter {
    /// Matches every document.
    pub fn all() -> Self {
        Self::default()
    }

    /// Adds a clause.
    pub fn with(mut self, field: &str, condition: Condition) -> Self {
        self.clauses.push((field.to_string(), condition));
        self
    }

    /// `field == value`.
    pub fn eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Eq(value.into()))
    }

    /// `field != value`.
    pub fn ne(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Ne(value.into()))
    }

    /// `field < value`.
    pub fn lt(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Lt(value.into()))
    }

    /// `field <= value`.
    pub fn lte(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Lte(value.into()))
    }

    /// `field > value`.
    pub fn gt(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Gt(value.into()))
    }

    /// `field >= value`.
    pub fn gte(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(field, Condition::Gte(value.into()))
    }

    /// `field` is one of `values`.
    pub fn any_of<V: Into<Value>>(self, field: &str, values: impl IntoIterator<Item = V>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.with(field, Condition::In(values))
    }

    /// The clauses of this filter.
    pub fn clauses(&self) -> &[(String, Condition)] {
        &self.clauses
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// Ordering and limit for [`DocumentStore::find`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    /// Sort keys, most significant first.
    pub sort: Vec<(String, SortOrder)>,
    /// Maximum number of documents returned.
    pub limit: Option<usize>,
}

impl FindOptions {
    /// Sorts ascending by `field`.
    pub fn ascending(field: &str) -> Self {
        Self {
            sort: vec![(field.to_string(), SortOrder::Ascending)],
            limit: None,
        }
    }

    /// Sorts descending by `field`.
    pub fn descending(field: &str) -> Self {
        Self {
            sort: vec![(field.to_string(), SortOrder::Descending)],
            limit: None,
        }
    }

    /// Adds a secondary sort key.
    pub fn then(mut self, field: &str, order: SortOrder) -> Self {
        self.sort.push((field.to_string(), order));
        self
    }

    /// Caps the number of results.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new document was inserted.
    Inserted,
    /// An existing document was replaced.
    Replaced,
}

/// A collection-oriented document store.
pub trait DocumentStore: Send + Sync {
    /// Replaces the first document matching `filter` with `doc`, or inserts
    /// `doc` if none matches.
    fn upsert(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Document,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Inserts `doc` without checking for duplicates.
    fn insert(&self, collection: &str, doc: Document) -> Result<(), StoreError>;

    /// Inserts `doc` unless a document matches `filter`, as one atomic step.
    /// Returns true if it inserted.
    fn insert_absent(
        &self,
        collection: &str,
        filter: &Filter,
        doc: Document,
    ) -> Result<bool, StoreError>;

    /// Merges `fields` into every document matching `filter`.
    fn update(&self, collection: &str, filter: &Filter, fields: Document)
        -> Result<usize, StoreError>;

    /// Documents matching `filter`, reduced to `projection` (empty keeps every
    /// field), ordered and limited by `options`.
    fn find(
        &self,
        collection: &str,
        filter: &Filter,
        projection: &[&str],
        options: &FindOptions,
    ) -> Result<Vec<Document>, StoreError>;

    /// The first document matching `filter`.
    fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let options = FindOptions {
            sort: Vec::new(),
            limit: Some(1),
        };
        Ok(self.find(collection, filter, &[], &options)?.into_iter().next())
    }

    /// Deletes every document matching `filter`.
    fn delete(&self, collection: &str, filter: &Filter) -> Result<usize, StoreError>;

    /// Counts documents matching `filter`.
    fn count(&self, collection: &str, filter: &Filter) -> Result<usize, StoreError> {
        Ok(self.find(collection, filter, &[], &FindOptions::default())?.len())
    }

    /// Removes a whole collection.
    fn drop_collection(&self, collection: &str) -> Result<(), StoreError>;
}
