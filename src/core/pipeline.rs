//! Aggregation stages
//!
//! A small, fixed set of document-store aggregation stages used by list
//! endpoints that need joins and reshaping beyond population. Backends that
//! have a native pipeline translate the stages; the rest run [`evaluate`].

use crate::core::document::{compare_values, get_path, json_eq, remove_path, set_path, values_at};
use crate::core::filter::FilterPredicate;
use crate::core::locale::Language;
use crate::core::store::SortSpec;
use serde_json::{Map, Value};

/// One aggregation stage
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    /// Keep documents matching the predicate
    Match(FilterPredicate),

    /// Join documents of another collection into an array field
    Lookup {
        from: String,
        local_field: String,
        foreign_field: String,
        as_field: String,
    },

    /// One output document per element of an array field
    Unwind { path: String, preserve_empty: bool },

    Sort(SortSpec),

    /// Reshape each document
    Project(Projection),
}

impl Stage {
    pub fn lookup(from: &str, local_field: &str, foreign_field: &str, as_field: &str) -> Self {
        Stage::Lookup {
            from: from.to_string(),
            local_field: local_field.to_string(),
            foreign_field: foreign_field.to_string(),
            as_field: as_field.to_string(),
        }
    }

    pub fn unwind(path: &str) -> Self {
        Stage::Unwind {
            path: path.to_string(),
            preserve_empty: false,
        }
    }
}

/// Output fields computed from source paths
///
/// A source path that crosses an array yields an array of the values found
/// in its elements, so `workIn.name.fr` over a joined city list becomes a
/// list of French city names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Projection {
    fields: Vec<(String, String)>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `output` taken from `source` (builder style)
    pub fn field(mut self, output: &str, source: &str) -> Self {
        self.fields.push((output.to_string(), source.to_string()));
        self
    }

    /// Add `output` taken from the localized text at `source`
    ///
    /// Both variants are kept when no language is chosen.
    pub fn localized(self, output: &str, source: &str, language: Option<Language>) -> Self {
        match language {
            Some(language) => self.field(output, &format!("{}.{}", source, language.code())),
            None => self.field(output, source),
        }
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn apply(&self, document: &Value) -> Value {
        let mut out = Map::new();
        for (output, source) in &self.fields {
            if let Some(value) = project_path(document, source) {
                set_path(&mut out, output, value);
            }
        }
        Value::Object(out)
    }
}

fn project_path(value: &Value, path: &str) -> Option<Value> {
    let (head, rest) = match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    };

    match value {
        Value::Object(map) => {
            let child = map.get(head)?;
            match rest {
                Some(rest) => project_path(child, rest),
                None => Some(child.clone()),
            }
        }
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| project_path(item, path))
                .collect(),
        )),
        _ => None,
    }
}

/// Run stages over in-memory documents
///
/// `collection` supplies the documents of joined collections.
pub fn evaluate<F>(stages: &[Stage], input: Vec<Value>, collection: F) -> Vec<Value>
where
    F: Fn(&str) -> Vec<Value>,
{
    stages.iter().fold(input, |documents, stage| match stage {
        Stage::Match(predicate) => documents
            .into_iter()
            .filter(|d| predicate.matches(d))
            .collect(),

        Stage::Lookup {
            from,
            local_field,
            foreign_field,
            as_field,
        } => {
            let foreign = collection(from);
            documents
                .into_iter()
                .map(|mut document| {
                    let joined: Vec<Value> = {
                        let locals = values_at(&document, local_field);
                        foreign
                            .iter()
                            .filter(|f| {
                                values_at(f, foreign_field)
                                    .iter()
                                    .any(|fv| locals.iter().any(|lv| json_eq(lv, fv)))
                            })
                            .cloned()
                            .collect()
                    };
                    if let Value::Object(map) = &mut document {
                        set_path(map, as_field, Value::Array(joined));
                    }
                    document
                })
                .collect()
        }

        Stage::Unwind {
            path,
            preserve_empty,
        } => documents
            .into_iter()
            .flat_map(|document| unwind(document, path, *preserve_empty))
            .collect(),

        Stage::Sort(spec) => {
            let mut documents = documents;
            documents.sort_by(|a, b| {
                let ordering = compare_values(get_path(a, &spec.field), get_path(b, &spec.field));
                if spec.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
            documents
        }

        Stage::Project(projection) => documents.iter().map(|d| projection.apply(d)).collect(),
    })
}

fn unwind(document: Value, path: &str, preserve_empty: bool) -> Vec<Value> {
    match get_path(&document, path) {
        Some(Value::Array(items)) if !items.is_empty() => {
            let items = items.clone();
            items
                .into_iter()
                .map(|item| {
                    let mut copy = document.clone();
                    if let Value::Object(map) = &mut copy {
                        set_path(map, path, item);
                    }
                    copy
                })
                .collect()
        }
        Some(Value::Array(_)) | Some(Value::Null) | None => {
            if preserve_empty {
                let mut copy = document;
                remove_path(&mut copy, path);
                vec![copy]
            } else {
                Vec::new()
            }
        }
        Some(_) => vec![document],
    }
}
