//! MongoDB storage backend using the official MongoDB async driver.
//!
//! Provides `MongoDocumentStore`, a [`DocumentStore`] backed by a
//! `mongodb::Database`.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! m3allem-rs = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Storage model
//!
//! One collection per resource type. Documents are stored as they come from
//! the factory (JSON converted to BSON), `_id` included, so no renaming
//! happens in either direction.
//!
//! Filter predicates translate to query documents, aggregation stages to
//! the matching pipeline stages, and aggregate pagination runs as a single
//! `$facet` stage returning the page and the total together.

use crate::core::filter::{FilterPredicate, Scalar};
use crate::core::pipeline::{Projection, Stage};
use crate::core::store::{AggregatePage, DocumentStore, FindOptions, StoreError, StoreResult};
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Database, IndexModel};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

/// Mongo's error code for unique index violations
const DUPLICATE_KEY_CODE: i32 = 11000;

static DUP_KEY_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"dup key: \{ ?([^:\s]+)\s*:\s*(.*?) ?\}").expect("duplicate key pattern compiles")
});

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

/// Convert a serde_json::Value (expected to be an Object) into a BSON Document.
fn json_to_document(collection: &str, json: &Value) -> StoreResult<Document> {
    let bson = mongodb::bson::to_bson(json).map_err(|e| StoreError::Malformed {
        collection: collection.to_string(),
        message: format!("Failed to convert JSON to BSON: {}", e),
    })?;

    match bson {
        Bson::Document(d) => Ok(d),
        _ => Err(StoreError::Malformed {
            collection: collection.to_string(),
            message: "Expected BSON document, got non-object".to_string(),
        }),
    }
}

/// Convert a BSON Document back into a serde_json::Value.
fn document_to_json(doc: Document) -> Value {
    Bson::Document(doc).into_relaxed_extjson()
}

/// Clamp a skip or limit to the driver's unsigned range
fn to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

/// Clamp a skip or limit to the driver's signed range
///
/// Mongo reads a negative limit as "single batch", so values past `i64::MAX`
/// must saturate instead of wrapping.
fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn json_to_bson(value: &Value) -> StoreResult<Bson> {
    mongodb::bson::to_bson(value).map_err(|e| StoreError::Backend(e.to_string()))
}

fn candidates(value: &Scalar) -> StoreResult<Vec<Bson>> {
    value.candidates().iter().map(json_to_bson).collect()
}

/// Translate a predicate into a query document
fn filter_to_document(filter: &FilterPredicate) -> StoreResult<Document> {
    Ok(match filter {
        FilterPredicate::All => doc! {},

        FilterPredicate::Eq { field, value } => {
            let mut values = candidates(value)?;
            if values.len() == 1 {
                doc! { field.as_str(): values.remove(0) }
            } else {
                doc! { field.as_str(): { "$in": values } }
            }
        }

        FilterPredicate::AnyOf { field, values } => {
            let mut all = Vec::new();
            for value in values {
                all.extend(candidates(value)?);
            }
            doc! { field.as_str(): { "$in": all } }
        }

        FilterPredicate::Contains { field, needle } => doc! {
            field.as_str(): { "$regex": regex::escape(needle), "$options": "i" }
        },

        FilterPredicate::And(parts) if parts.is_empty() => doc! {},
        FilterPredicate::And(parts) => doc! { "$and": parts_to_array(parts)? },

        // an empty disjunction matches nothing
        FilterPredicate::Or(parts) if parts.is_empty() => doc! { "$expr": false },
        FilterPredicate::Or(parts) => doc! { "$or": parts_to_array(parts)? },
    })
}

fn parts_to_array(parts: &[FilterPredicate]) -> StoreResult<Vec<Document>> {
    parts.iter().map(filter_to_document).collect()
}

fn projection_to_document(projection: &Projection) -> Document {
    let mut out = doc! { "_id": 0 };
    for (output, source) in projection.fields() {
        out.insert(output.as_str(), format!("${}", source));
    }
    out
}

/// Translate stages into a pipeline
fn stages_to_pipeline(stages: &[Stage]) -> StoreResult<Vec<Document>> {
    stages
        .iter()
        .map(|stage| {
            Ok(match stage {
                Stage::Match(filter) => doc! { "$match": filter_to_document(filter)? },
                Stage::Lookup {
                    from,
                    local_field,
                    foreign_field,
                    as_field,
                } => doc! {
                    "$lookup": {
                        "from": from.as_str(),
                        "localField": local_field.as_str(),
                        "foreignField": foreign_field.as_str(),
                        "as": as_field.as_str(),
                    }
                },
                Stage::Unwind {
                    path,
                    preserve_empty,
                } => doc! {
                    "$unwind": {
                        "path": format!("${}", path),
                        "preserveNullAndEmptyArrays": *preserve_empty,
                    }
                },
                Stage::Sort(sort) => doc! {
                    "$sort": { sort.field.as_str(): if sort.descending { -1 } else { 1 } }
                },
                Stage::Project(projection) => doc! { "$project": projection_to_document(projection) },
            })
        })
        .collect()
}

/// Map a driver error, recognizing unique index violations
fn map_error(collection: &str, err: mongodb::error::Error) -> StoreError {
    if let ErrorKind::Write(WriteFailure::WriteError(write)) = err.kind.as_ref()
        && write.code == DUPLICATE_KEY_CODE
    {
        let (field, value) = DUP_KEY_FIELD
            .captures(&write.message)
            .map(|caps| {
                (
                    caps[1].to_string(),
                    caps[2].trim_matches('"').to_string(),
                )
            })
            .unwrap_or_else(|| ("unknown".to_string(), String::new()));

        return StoreError::DuplicateKey {
            collection: collection.to_string(),
            field,
            value,
        };
    }

    StoreError::Backend(err.to_string())
}

fn count_of(doc: &Document) -> usize {
    match doc.get("count") {
        Some(Bson::Int32(n)) => usize::try_from(*n).unwrap_or(0),
        Some(Bson::Int64(n)) => usize::try_from(*n).unwrap_or(0),
        Some(Bson::Double(n)) => *n as usize,
        _ => 0,
    }
}

// ---------------------------------------------------------------------------
// MongoDocumentStore
// ---------------------------------------------------------------------------

/// Document store backed by MongoDB.
///
/// # Example
///
/// ```rust,ignore
/// use m3allem::storage::MongoDocumentStore;
///
/// let store = MongoDocumentStore::connect("mongodb://localhost:27017", "m3allem").await?;
/// ```
#[derive(Clone, Debug)]
pub struct MongoDocumentStore {
    database: Database,
}

impl MongoDocumentStore {
    /// Create a new `MongoDocumentStore` with the given database handle.
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    /// Connect to a server and use the named database
    pub async fn connect(uri: &str, database: &str) -> StoreResult<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| StoreError::Backend(format!("Failed to connect to MongoDB: {}", e)))?;
        Ok(Self::new(client.database(database)))
    }

    /// Get a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.database.collection(name)
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    fn backend_name(&self) -> &'static str {
        "mongodb"
    }

    async fn insert(&self, collection: &str, document: Value) -> StoreResult<Value> {
        let doc = json_to_document(collection, &document)?;

        self.collection(collection)
            .insert_one(doc)
            .await
            .map_err(|e| map_error(collection, e))?;

        Ok(document)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &FilterPredicate,
        options: &FindOptions,
    ) -> StoreResult<Vec<Value>> {
        let mut find = self
            .collection(collection)
            .find(filter_to_document(filter)?)
            .skip(to_u64(options.skip));

        if let Some(sort) = &options.sort {
            let direction = if sort.descending { -1 } else { 1 };
            // _id breaks ties so pages never overlap
            find = find.sort(doc! { sort.field.as_str(): direction, "_id": direction });
        }
        if let Some(limit) = options.limit {
            find = find.limit(to_i64(limit));
        }

        let cursor = find.await.map_err(|e| map_error(collection, e))?;
        let docs: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| map_error(collection, e))?;

        Ok(docs.into_iter().map(document_to_json).collect())
    }

    async fn count(&self, collection: &str, filter: &FilterPredicate) -> StoreResult<usize> {
        let count = self
            .collection(collection)
            .count_documents(filter_to_document(filter)?)
            .await
            .map_err(|e| map_error(collection, e))?;

        Ok(usize::try_from(count).unwrap_or(usize::MAX))
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &FilterPredicate,
    ) -> StoreResult<Option<Value>> {
        let doc = self
            .collection(collection)
            .find_one(filter_to_document(filter)?)
            .await
            .map_err(|e| map_error(collection, e))?;

        Ok(doc.map(document_to_json))
    }

    async fn update_fields(
        &self,
        collection: &str,
        filter: &FilterPredicate,
        set: Map<String, Value>,
        unset: &[String],
    ) -> StoreResult<Option<Value>> {
        let mut update = Document::new();
        if !set.is_empty() {
            update.insert("$set", json_to_document(collection, &Value::Object(set))?);
        }
        if !unset.is_empty() {
            let fields: Document = unset.iter().map(|key| (key.clone(), Bson::String(String::new()))).collect();
            update.insert("$unset", fields);
        }
        if update.is_empty() {
            return self.find_one(collection, filter).await;
        }

        let doc = self
            .collection(collection)
            .find_one_and_update(filter_to_document(filter)?, update)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| map_error(collection, e))?;

        Ok(doc.map(document_to_json))
    }

    async fn set_fields(
        &self,
        collection: &str,
        filter: &FilterPredicate,
        fields: Map<String, Value>,
    ) -> StoreResult<usize> {
        let update = json_to_document(collection, &Value::Object(fields))?;

        let result = self
            .collection(collection)
            .update_many(filter_to_document(filter)?, doc! { "$set": update })
            .await
            .map_err(|e| map_error(collection, e))?;

        Ok(usize::try_from(result.matched_count).unwrap_or(usize::MAX))
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: &FilterPredicate,
    ) -> StoreResult<Option<Value>> {
        let doc = self
            .collection(collection)
            .find_one_and_delete(filter_to_document(filter)?)
            .await
            .map_err(|e| map_error(collection, e))?;

        Ok(doc.map(document_to_json))
    }

    async fn aggregate_page(
        &self,
        collection: &str,
        stages: &[Stage],
        skip: usize,
        limit: usize,
    ) -> StoreResult<AggregatePage> {
        let mut pipeline = stages_to_pipeline(stages)?;
        pipeline.push(doc! {
            "$facet": {
                "documents": [ { "$skip": to_i64(skip) }, { "$limit": to_i64(limit.max(1)) } ],
                "total": [ { "$count": "count" } ],
            }
        });

        let cursor = self
            .collection(collection)
            .aggregate(pipeline)
            .await
            .map_err(|e| map_error(collection, e))?;
        let mut results: Vec<Document> = cursor
            .try_collect()
            .await
            .map_err(|e| map_error(collection, e))?;

        let Some(facet) = results.pop() else {
            return Ok(AggregatePage::default());
        };

        let documents = match facet.get("documents") {
            Some(Bson::Array(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Bson::Document(d) => Some(document_to_json(d.clone())),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        let total = match facet.get("total") {
            Some(Bson::Array(items)) => items
                .first()
                .and_then(Bson::as_document)
                .map(count_of)
                .unwrap_or(0),
            _ => 0,
        };

        Ok(AggregatePage { documents, total })
    }

    async fn ensure_unique(&self, collection: &str, field: &str) -> StoreResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { field: 1 })
            .options(IndexOptions::builder().unique(true).sparse(true).build())
            .build();

        self.collection(collection)
            .create_index(index)
            .await
            .map_err(|e| map_error(collection, e))?;

        Ok(())
    }
}
