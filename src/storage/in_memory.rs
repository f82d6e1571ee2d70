//! In-memory implementation of DocumentStore for testing and development

use crate::core::document::{ID_KEY, compare_values, document_id, get_path, json_eq};
use crate::core::filter::FilterPredicate;
use crate::core::pipeline::{Stage, evaluate};
use crate::core::store::{AggregatePage, DocumentStore, FindOptions, StoreError, StoreResult};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

type Collection = IndexMap<String, Value>;

/// In-memory document store
///
/// Collections keep insertion order, which breaks ties when sorting, so
/// documents created within the same millisecond still list newest first.
/// Uses RwLock for thread-safe access.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
    unique_fields: Arc<RwLock<HashMap<String, Vec<String>>>>,
}

impl InMemoryDocumentStore {
    /// Create a new in-memory document store
    pub fn new() -> Self {
        Self::default()
    }

    /// Documents of a collection, most recently inserted first
    fn snapshot(&self, collection: &str) -> StoreResult<Vec<Value>> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::Poisoned(format!("Failed to acquire read lock: {}", e)))?;

        Ok(collections
            .get(collection)
            .map(|docs| docs.values().rev().cloned().collect())
            .unwrap_or_default())
    }

    fn unique_fields_of(&self, collection: &str) -> StoreResult<Vec<String>> {
        let unique = self
            .unique_fields
            .read()
            .map_err(|e| StoreError::Poisoned(format!("Failed to acquire read lock: {}", e)))?;

        Ok(unique.get(collection).cloned().unwrap_or_default())
    }

    fn matching(&self, collection: &str, filter: &FilterPredicate) -> StoreResult<Vec<Value>> {
        Ok(self
            .snapshot(collection)?
            .into_iter()
            .filter(|doc| filter.matches(doc))
            .collect())
    }
}

/// Fail when another document already holds one of the unique values
fn check_unique(
    collection_name: &str,
    collection: &Collection,
    fields: &[String],
    document: &Value,
    own_id: &str,
) -> StoreResult<()> {
    for field in fields {
        let Some(value) = get_path(document, field).filter(|v| !v.is_null()) else {
            continue;
        };

        let taken = collection.iter().any(|(id, other)| {
            id != own_id && get_path(other, field).is_some_and(|o| json_eq(o, value))
        });

        if taken {
            return Err(StoreError::DuplicateKey {
                collection: collection_name.to_string(),
                field: field.clone(),
                value: value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()),
            });
        }
    }
    Ok(())
}

fn require_id<'a>(collection: &str, document: &'a Value) -> StoreResult<&'a str> {
    if !document.is_object() {
        return Err(StoreError::Malformed {
            collection: collection.to_string(),
            message: "document is not an object".to_string(),
        });
    }
    document_id(document).ok_or_else(|| StoreError::Malformed {
        collection: collection.to_string(),
        message: format!("missing string '{}'", ID_KEY),
    })
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn backend_name(&self) -> &'static str {
        "in_memory"
    }

    async fn insert(&self, collection: &str, document: Value) -> StoreResult<Value> {
        let id = require_id(collection, &document)?.to_string();
        let unique = self.unique_fields_of(collection)?;

        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Poisoned(format!("Failed to acquire write lock: {}", e)))?;
        let docs = collections.entry(collection.to_string()).or_default();

        if docs.contains_key(&id) {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                field: ID_KEY.to_string(),
                value: id,
            });
        }
        check_unique(collection, docs, &unique, &document, &id)?;

        docs.insert(id, document.clone());
        Ok(document)
    }

    async fn find(
        &self,
        collection: &str,
        filter: &FilterPredicate,
        options: &FindOptions,
    ) -> StoreResult<Vec<Value>> {
        let mut docs = self.matching(collection, filter)?;

        if let Some(sort) = &options.sort {
            if !sort.descending {
                // ties keep insertion order when ascending
                docs.reverse();
            }
            docs.sort_by(|a, b| {
                let ordering = compare_values(get_path(a, &sort.field), get_path(b, &sort.field));
                if sort.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }

        let docs = docs.into_iter().skip(options.skip);
        Ok(match options.limit {
            Some(limit) => docs.take(limit).collect(),
            None => docs.collect(),
        })
    }

    async fn count(&self, collection: &str, filter: &FilterPredicate) -> StoreResult<usize> {
        Ok(self.matching(collection, filter)?.len())
    }

    async fn find_one(
        &self,
        collection: &str,
        filter: &FilterPredicate,
    ) -> StoreResult<Option<Value>> {
        Ok(self
            .snapshot(collection)?
            .into_iter()
            .rev()
            .find(|doc| filter.matches(doc)))
    }

    async fn update_fields(
        &self,
        collection: &str,
        filter: &FilterPredicate,
        set: Map<String, Value>,
        unset: &[String],
    ) -> StoreResult<Option<Value>> {
        let unique = self.unique_fields_of(collection)?;

        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Poisoned(format!("Failed to acquire write lock: {}", e)))?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(None);
        };

        // oldest match first, like find_one
        let Some((id, current)) = docs.iter().find(|(_, doc)| filter.matches(doc)) else {
            return Ok(None);
        };
        let id = id.clone();

        let mut updated = current.clone();
        if let Value::Object(map) = &mut updated {
            for key in unset {
                map.remove(key);
            }
            map.extend(set);
        }
        check_unique(collection, docs, &unique, &updated, &id)?;

        docs.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn set_fields(
        &self,
        collection: &str,
        filter: &FilterPredicate,
        fields: Map<String, Value>,
    ) -> StoreResult<usize> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Poisoned(format!("Failed to acquire write lock: {}", e)))?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(0);
        };

        let mut matched = 0;
        for doc in docs.values_mut().filter(|doc| filter.matches(doc)) {
            if let Value::Object(map) = doc {
                for (key, value) in &fields {
                    map.insert(key.clone(), value.clone());
                }
                matched += 1;
            }
        }
        Ok(matched)
    }

    async fn delete_one(
        &self,
        collection: &str,
        filter: &FilterPredicate,
    ) -> StoreResult<Option<Value>> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Poisoned(format!("Failed to acquire write lock: {}", e)))?;
        let Some(docs) = collections.get_mut(collection) else {
            return Ok(None);
        };

        let key = docs
            .iter()
            .find(|(_, doc)| filter.matches(doc))
            .map(|(key, _)| key.clone());

        Ok(key.and_then(|key| docs.shift_remove(&key)))
    }

    async fn aggregate_page(
        &self,
        collection: &str,
        stages: &[Stage],
        skip: usize,
        limit: usize,
    ) -> StoreResult<AggregatePage> {
        let results = {
            let collections = self
                .collections
                .read()
                .map_err(|e| StoreError::Poisoned(format!("Failed to acquire read lock: {}", e)))?;

            let documents_of = |name: &str| -> Vec<Value> {
                collections
                    .get(name)
                    .map(|docs| docs.values().cloned().collect())
                    .unwrap_or_default()
            };

            evaluate(stages, documents_of(collection), documents_of)
        };

        Ok(AggregatePage {
            total: results.len(),
            documents: results.into_iter().skip(skip).take(limit).collect(),
        })
    }

    async fn ensure_unique(&self, collection: &str, field: &str) -> StoreResult<()> {
        let mut unique = self
            .unique_fields
            .write()
            .map_err(|e| StoreError::Poisoned(format!("Failed to acquire write lock: {}", e)))?;

        let fields = unique.entry(collection.to_string()).or_default();
        if !fields.iter().any(|f| f == field) {
            fields.push(field.to_string());
        }
        Ok(())
    }
}
