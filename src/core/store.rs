//! Document store contract
//!
//! The factory never talks to a database directly. It goes through
//! [`DocumentStore`], which stores JSON documents in named collections and
//! evaluates [`FilterPredicate`]s and aggregation [`Stage`]s. Every backend
//! in `crate::storage` implements this trait.

use crate::core::document::CREATED_AT;
use crate::core::filter::FilterPredicate;
use crate::core::pipeline::Stage;
use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors reported by storage backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("duplicate value '{value}' for '{field}' in {collection}")]
    DuplicateKey {
        collection: String,
        field: String,
        value: String,
    },

    #[error("store lock poisoned: {0}")]
    Poisoned(String),

    #[error("malformed document in {collection}: {message}")]
    Malformed { collection: String, message: String },

    #[error("backend error: {0}")]
    Backend(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Sort on a single field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub field: String,
    pub descending: bool,
}

impl SortSpec {
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Most recently created documents first
    pub fn newest_first() -> Self {
        Self::descending(CREATED_AT)
    }
}

/// Options for [`DocumentStore::find`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: Option<SortSpec>,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl FindOptions {
    /// One page, newest first
    pub fn page(skip: usize, limit: usize) -> Self {
        Self {
            sort: Some(SortSpec::newest_first()),
            skip,
            limit: Some(limit),
        }
    }
}

/// One page of an aggregation plus the size of the whole result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatePage {
    pub documents: Vec<Value>,
    pub total: usize,
}

/// Storage backend for JSON documents
///
/// Documents are JSON objects whose `_id` is a string. Each write touches a
/// single document atomically; nothing spans documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Insert a new document, failing on duplicate `_id` or unique field
    async fn insert(&self, collection: &str, document: Value) -> StoreResult<Value>;

    async fn find(
        &self,
        collection: &str,
        filter: &FilterPredicate,
        options: &FindOptions,
    ) -> StoreResult<Vec<Value>>;

    async fn count(&self, collection: &str, filter: &FilterPredicate) -> StoreResult<usize>;

    async fn find_one(
        &self,
        collection: &str,
        filter: &FilterPredicate,
    ) -> StoreResult<Option<Value>>;

    /// Update the first document matching `filter` in a single write
    ///
    /// Fields in `set` are written and fields in `unset` removed; every other
    /// field keeps its stored value. The filter is evaluated as part of the
    /// write. Returns the updated document, or `None` when nothing matches.
    async fn update_fields(
        &self,
        collection: &str,
        filter: &FilterPredicate,
        set: Map<String, Value>,
        unset: &[String],
    ) -> StoreResult<Option<Value>>;

    /// Set top-level fields on every matching document
    ///
    /// Returns the number of documents matched.
    async fn set_fields(
        &self,
        collection: &str,
        filter: &FilterPredicate,
        fields: Map<String, Value>,
    ) -> StoreResult<usize>;

    /// Remove the first matching document and return it
    async fn delete_one(
        &self,
        collection: &str,
        filter: &FilterPredicate,
    ) -> StoreResult<Option<Value>>;

    /// Run the stages, then return one page of the result and its full size
    async fn aggregate_page(
        &self,
        collection: &str,
        stages: &[Stage],
        skip: usize,
        limit: usize,
    ) -> StoreResult<AggregatePage>;

    /// Declare a field whose values must be unique within the collection
    async fn ensure_unique(&self, collection: &str, field: &str) -> StoreResult<()>;
}
