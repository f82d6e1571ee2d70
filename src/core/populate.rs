//! Eager joins of related documents
//!
//! Population replaces references with the documents they point to before a
//! document is projected. It runs through [`DocumentStore`] so every backend
//! gets it for free.

use crate::core::document::{ID_KEY, document_id};
use crate::core::filter::{FilterPredicate, Scalar};
use crate::core::store::{DocumentStore, FindOptions, StoreResult};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::{Map, Value};

/// How the related documents are found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Join {
    /// The field holds the id (or ids) of the related documents
    Ref,

    /// Related documents point back at this one through `foreign_field`
    Reverse {
        foreign_field: String,
        just_one: bool,
    },
}

/// One relation to populate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulateSpec {
    /// Field of the document that receives the related document(s)
    pub path: String,
    /// Collection holding the related documents
    pub from: String,
    pub join: Join,
    /// Fields kept on related documents (`_id` is always kept)
    pub select: Option<Vec<String>>,
    /// Relations to populate on the related documents
    pub nested: Vec<PopulateSpec>,
}

impl PopulateSpec {
    /// Follow the id stored in `path`
    pub fn reference(path: &str, from: &str) -> Self {
        Self {
            path: path.to_string(),
            from: from.to_string(),
            join: Join::Ref,
            select: None,
            nested: Vec::new(),
        }
    }

    /// Attach documents of `from` whose `foreign_field` is this document's id
    pub fn reverse(path: &str, from: &str, foreign_field: &str, just_one: bool) -> Self {
        Self {
            path: path.to_string(),
            from: from.to_string(),
            join: Join::Reverse {
                foreign_field: foreign_field.to_string(),
                just_one,
            },
            select: None,
            nested: Vec::new(),
        }
    }

    pub fn select(mut self, fields: &[&str]) -> Self {
        self.select = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn nested(mut self, spec: PopulateSpec) -> Self {
        self.nested.push(spec);
        self
    }

    fn shape(&self, document: Value) -> Value {
        match (&self.select, document) {
            (Some(fields), Value::Object(mut map)) => {
                let mut out = Map::new();
                if let Some(id) = map.remove(ID_KEY) {
                    out.insert(ID_KEY.to_string(), id);
                }
                for field in fields {
                    if let Some(value) = map.remove(field) {
                        out.insert(field.clone(), value);
                    }
                }
                Value::Object(out)
            }
            (_, document) => document,
        }
    }
}

/// Populate every spec on a batch of documents
pub async fn populate_all(
    store: &dyn DocumentStore,
    documents: Vec<Value>,
    specs: &[PopulateSpec],
) -> StoreResult<Vec<Value>> {
    if specs.is_empty() {
        return Ok(documents);
    }

    let mut out = Vec::with_capacity(documents.len());
    for document in documents {
        out.push(populate(store, document, specs).await?);
    }
    Ok(out)
}

/// Populate every spec on one document
pub fn populate<'a>(
    store: &'a dyn DocumentStore,
    document: Value,
    specs: &'a [PopulateSpec],
) -> BoxFuture<'a, StoreResult<Value>> {
    async move {
        let mut document = document;
        for spec in specs {
            document = populate_one(store, document, spec).await?;
        }
        Ok(document)
    }
    .boxed()
}

async fn populate_one(
    store: &dyn DocumentStore,
    mut document: Value,
    spec: &PopulateSpec,
) -> StoreResult<Value> {
    let joined = match &spec.join {
        Join::Ref => {
            let Some(current) = document.get(&spec.path).cloned() else {
                return Ok(document);
            };
            match current {
                Value::String(id) => {
                    let found = store
                        .find_one(&spec.from, &FilterPredicate::id(id))
                        .await?;
                    match found {
                        Some(related) => populate(store, spec.shape(related), &spec.nested).await?,
                        None => Value::Null,
                    }
                }
                Value::Array(refs) => {
                    let ids: Vec<String> = refs
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect();
                    let filter = FilterPredicate::AnyOf {
                        field: ID_KEY.to_string(),
                        values: ids.iter().cloned().map(Scalar::from).collect(),
                    };
                    let found = store
                        .find(&spec.from, &filter, &FindOptions::default())
                        .await?;

                    // keep the order of the stored references
                    let mut ordered = Vec::with_capacity(ids.len());
                    for id in &ids {
                        if let Some(related) = found.iter().find(|f| document_id(f) == Some(id.as_str())) {
                            let shaped = spec.shape(related.clone());
                            ordered.push(populate(store, shaped, &spec.nested).await?);
                        }
                    }
                    Value::Array(ordered)
                }
                other => other,
            }
        }

        Join::Reverse {
            foreign_field,
            just_one,
        } => {
            let Some(id) = document_id(&document).map(str::to_string) else {
                return Ok(document);
            };
            let filter = FilterPredicate::eq(foreign_field.clone(), id);
            if *just_one {
                match store.find_one(&spec.from, &filter).await? {
                    Some(related) => populate(store, spec.shape(related), &spec.nested).await?,
                    None => Value::Null,
                }
            } else {
                let found = store
                    .find(&spec.from, &filter, &FindOptions::default())
                    .await?;
                let mut related = Vec::with_capacity(found.len());
                for item in found {
                    related.push(populate(store, spec.shape(item), &spec.nested).await?);
                }
                Value::Array(related)
            }
        }
    };

    if let Value::Object(map) = &mut document {
        map.insert(spec.path.clone(), joined);
    }
    Ok(document)
}
