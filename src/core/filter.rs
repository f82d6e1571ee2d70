//! Search/filter compiler
//!
//! Turns a list request into a [`FilterPredicate`]: a free-text term becomes
//! a disjunction of case-insensitive substring matches over the resource's
//! search fields, and every non-reserved query parameter becomes an equality
//! constraint (several values for one key mean "any of these").
//!
//! Field names are not checked against the resource. An unknown field simply
//! matches nothing.

use crate::core::document::{json_eq, values_at};
use crate::core::query::QueryParams;
use indexmap::IndexMap;
use serde_json::Value;

/// A value a field is compared against
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Raw text, typically from a query string
    Text(String),
    Bool(bool),
    Number(f64),
    Null,
}

impl Scalar {
    /// JSON values this scalar is considered equal to
    ///
    /// Text coming from a query string also matches the boolean or number it
    /// spells, so `?isActive=true` finds documents storing `true`.
    pub fn candidates(&self) -> Vec<Value> {
        match self {
            Scalar::Text(text) => {
                let mut out = vec![Value::String(text.clone())];
                match text.as_str() {
                    "true" => out.push(Value::Bool(true)),
                    "false" => out.push(Value::Bool(false)),
                    _ => {}
                }
                if let Ok(n) = text.parse::<i64>() {
                    out.push(Value::from(n));
                } else if let Ok(n) = text.parse::<f64>()
                    && n.is_finite()
                {
                    out.push(Value::from(n));
                }
                out
            }
            Scalar::Bool(b) => vec![Value::Bool(*b)],
            Scalar::Number(n) => vec![Value::from(*n)],
            Scalar::Null => vec![Value::Null],
        }
    }

    fn matches(&self, value: &Value) -> bool {
        self.candidates().iter().any(|c| json_eq(c, value))
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

/// Structured filter over documents of one collection
#[derive(Debug, Clone, PartialEq)]
pub enum FilterPredicate {
    /// Matches every document
    All,

    /// Field equals the value
    Eq { field: String, value: Scalar },

    /// Field equals any of the values
    AnyOf { field: String, values: Vec<Scalar> },

    /// Field contains the text, case-insensitively
    Contains { field: String, needle: String },

    And(Vec<FilterPredicate>),

    Or(Vec<FilterPredicate>),
}

impl FilterPredicate {
    pub fn eq(field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        FilterPredicate::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Equality on the storage id
    pub fn id(id: impl Into<String>) -> Self {
        FilterPredicate::eq(crate::core::document::ID_KEY, Scalar::Text(id.into()))
    }

    /// Conjunction, flattening `All`
    pub fn and(self, other: FilterPredicate) -> Self {
        match (self, other) {
            (FilterPredicate::All, p) | (p, FilterPredicate::All) => p,
            (FilterPredicate::And(mut a), FilterPredicate::And(b)) => {
                a.extend(b);
                FilterPredicate::And(a)
            }
            (FilterPredicate::And(mut a), p) => {
                a.push(p);
                FilterPredicate::And(a)
            }
            (p, q) => FilterPredicate::And(vec![p, q]),
        }
    }

    /// Evaluate against a document with document-store semantics
    ///
    /// Dotted paths descend into objects and arrays; a field matches when
    /// any value reachable through its path matches.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            FilterPredicate::All => true,
            FilterPredicate::Eq { field, value } => field_matches(document, field, value),
            FilterPredicate::AnyOf { field, values } => values
                .iter()
                .any(|value| field_matches(document, field, value)),
            FilterPredicate::Contains { field, needle } => {
                let needle = needle.to_lowercase();
                values_at(document, field).into_iter().any(|v| {
                    v.as_str()
                        .is_some_and(|s| s.to_lowercase().contains(&needle))
                })
            }
            FilterPredicate::And(parts) => parts.iter().all(|p| p.matches(document)),
            FilterPredicate::Or(parts) => parts.iter().any(|p| p.matches(document)),
        }
    }
}

fn field_matches(document: &Value, field: &str, value: &Scalar) -> bool {
    let found = values_at(document, field);
    if found.is_empty() {
        // a missing field only equals null
        return matches!(value, Scalar::Null);
    }
    found.into_iter().any(|v| value.matches(v))
}

/// Result of compiling a list request, before it is reduced to a predicate
///
/// Constraints stay keyed by field so that implicit filters can replace the
/// caller's own constraint on the same field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompiledFilter {
    search: Option<FilterPredicate>,
    constraints: IndexMap<String, Vec<Scalar>>,
}

/// Compile query parameters against a resource's search fields
///
/// ```
/// use m3allem::core::filter::{compile, FilterPredicate};
/// use m3allem::core::query::QueryParams;
/// use m3allem::config::PaginationConfig;
///
/// let params = QueryParams::new(&PaginationConfig::default()).with_filter("status", "accepted");
/// let predicate = compile(&params, &["address"]).into_predicate();
/// assert_eq!(predicate, FilterPredicate::eq("status", "accepted"));
/// ```
pub fn compile(params: &QueryParams, search_fields: &[&str]) -> CompiledFilter {
    let search = match &params.search {
        Some(term) if !search_fields.is_empty() => Some(FilterPredicate::Or(
            search_fields
                .iter()
                .map(|field| FilterPredicate::Contains {
                    field: field.to_string(),
                    needle: term.clone(),
                })
                .collect(),
        )),
        _ => None,
    };

    let mut constraints: IndexMap<String, Vec<Scalar>> = IndexMap::new();
    for (key, value) in &params.filters {
        constraints
            .entry(key.clone())
            .or_default()
            .push(Scalar::Text(value.clone()));
    }

    CompiledFilter {
        search,
        constraints,
    }
}

impl CompiledFilter {
    /// Set a constraint, replacing whatever the caller asked for that field
    pub fn constrain(mut self, field: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.constraints.insert(field.into(), vec![value.into()]);
        self
    }

    /// Apply a list of implicit filters with [`CompiledFilter::constrain`]
    pub fn with_user_filters(self, filters: &[(String, Scalar)]) -> Self {
        filters
            .iter()
            .fold(self, |acc, (field, value)| acc.constrain(field.clone(), value.clone()))
    }

    pub fn into_predicate(self) -> FilterPredicate {
        let mut parts: Vec<FilterPredicate> = self.search.into_iter().collect();

        for (field, mut values) in self.constraints {
            let part = if values.len() == 1 {
                FilterPredicate::Eq {
                    field,
                    value: values.remove(0),
                }
            } else {
                FilterPredicate::AnyOf { field, values }
            };
            parts.push(part);
        }

        match parts.len() {
            0 => FilterPredicate::All,
            1 => parts.remove(0),
            _ => FilterPredicate::And(parts),
        }
    }
}
