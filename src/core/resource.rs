//! Resource types and their descriptors
//!
//! A [`Resource`] is a typed, validated document kind (city, appointment,
//! review, ...). A [`ResourceDescriptor`] is the configuration the factory is
//! parameterized with: write policy, search fields, population, user filters,
//! projector and hooks.

use crate::core::document::SYSTEM_KEYS;
use crate::core::filter::Scalar;
use crate::core::hooks::{Cleanup, SideEffect};
use crate::core::populate::PopulateSpec;
use crate::core::projection::{SharedProjector, StandardView};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// Closed set of writable fields of a resource
///
/// Implemented by the enums generated with `resource_fields!`.
pub trait ResourceField: Copy + Eq + Hash + fmt::Debug + Send + Sync + 'static {
    /// Every field, in declaration order
    const ALL: &'static [Self];

    /// Name of the field in stored documents and request bodies
    fn as_str(&self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.as_str() == name)
    }
}

/// Which write is being prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePhase {
    Create,
    Update,
}

/// A document kind served by the factory
pub trait Resource: Serialize + DeserializeOwned + Validate + Send + Sync + 'static {
    type Field: ResourceField;

    /// Singular name, used in logs and errors
    const NAME: &'static str;

    /// Collection the documents live in
    const COLLECTION: &'static str;

    /// Storage id of a new document
    fn new_id(&self) -> String {
        Uuid::new_v4().to_string()
    }

    /// Compute derived fields before the document is stored
    fn prepare(&mut self, _phase: WritePhase) {}
}

/// Which body fields a non-admin write may set
///
/// System keys (`_id`, `createdAt`, `updatedAt`) are never writable, not even
/// by administrators. Non-admin bodies are also stripped of every key that is
/// not a field of the resource.
///
/// ```
/// use m3allem::core::resource::{ResourceField, WritePolicy};
/// use serde_json::json;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum Field { Address, Status }
///
/// impl ResourceField for Field {
///     const ALL: &'static [Self] = &[Field::Address, Field::Status];
///     fn as_str(&self) -> &'static str {
///         match self { Field::Address => "address", Field::Status => "status" }
///     }
/// }
///
/// let policy = WritePolicy::deny(&[Field::Status]);
/// let body = json!({"address": "12 rue Atlas", "status": "accepted", "_id": "x"});
/// let kept = policy.filter(body.as_object().cloned().unwrap_or_default(), false);
///
/// assert_eq!(serde_json::Value::Object(kept), json!({"address": "12 rue Atlas"}));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritePolicy<F: ResourceField> {
    /// Every field is writable
    Unrestricted,

    /// Only these fields are writable
    Allow(HashSet<F>),

    /// Every field but these is writable
    Deny(HashSet<F>),
}

impl<F: ResourceField> WritePolicy<F> {
    pub fn allow(fields: &[F]) -> Self {
        WritePolicy::Allow(fields.iter().copied().collect())
    }

    pub fn deny(fields: &[F]) -> Self {
        WritePolicy::Deny(fields.iter().copied().collect())
    }

    /// Whether a non-admin may write this field
    pub fn permits(&self, field: F) -> bool {
        match self {
            WritePolicy::Unrestricted => true,
            WritePolicy::Allow(fields) => fields.contains(&field),
            WritePolicy::Deny(fields) => !fields.contains(&field),
        }
    }

    /// Drop the keys the caller may not write
    ///
    /// Used identically by create and update. Never fails: rejected keys are
    /// silently removed.
    pub fn filter(&self, body: Map<String, Value>, is_admin: bool) -> Map<String, Value> {
        body.into_iter()
            .filter(|(key, _)| !SYSTEM_KEYS.contains(&key.as_str()))
            .filter(|(key, _)| {
                is_admin || F::from_name(key).is_some_and(|field| self.permits(field))
            })
            .collect()
    }
}

impl<F: ResourceField> Default for WritePolicy<F> {
    fn default() -> Self {
        WritePolicy::Unrestricted
    }
}

/// URL-friendly form of a French or Arabic text
///
/// Lowercases, folds French accents, keeps ASCII letters, digits and Arabic
/// letters, and joins the remaining words with `separator`.
pub fn slugify(text: &str, separator: char) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending = false;

    for c in text.trim().to_lowercase().chars() {
        let kept = Some(fold_accent(c)).filter(|s| {
            s.chars()
                .all(|c| c.is_ascii_alphanumeric() || is_arabic_letter(c))
        });

        match kept {
            Some(part) => {
                if pending && !out.is_empty() {
                    out.push(separator);
                }
                pending = false;
                out.push_str(&part);
            }
            None => pending = true,
        }
    }

    out
}

fn fold_accent(c: char) -> String {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => "a",
        'æ' => "ae",
        'ç' => "c",
        'è' | 'é' | 'ê' | 'ë' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ñ' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' => "o",
        'œ' => "oe",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'ÿ' => "y",
        'ß' => "ss",
        _ => return c.to_string(),
    };
    folded.to_string()
}

fn is_arabic_letter(c: char) -> bool {
    matches!(c, '\u{0621}'..='\u{064A}')
}

/// Everything the factory needs to serve one resource type
pub struct ResourceDescriptor<R: Resource> {
    pub write_policy: WritePolicy<R::Field>,
    /// Fields searched by the free-text `search` parameter
    pub search_fields: Vec<&'static str>,
    pub populate: Vec<PopulateSpec>,
    /// Constraints applied to non-admin reads
    pub user_filters: Vec<(String, Scalar)>,
    pub projector: SharedProjector,
    pub after_create: Vec<Arc<dyn SideEffect>>,
    pub after_update: Vec<Arc<dyn SideEffect>>,
    pub on_delete: Vec<Arc<dyn Cleanup>>,
    /// Fields whose values must be unique in the collection
    pub unique_fields: Vec<&'static str>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> Clone for ResourceDescriptor<R> {
    fn clone(&self) -> Self {
        Self {
            write_policy: self.write_policy.clone(),
            search_fields: self.search_fields.clone(),
            populate: self.populate.clone(),
            user_filters: self.user_filters.clone(),
            projector: self.projector.clone(),
            after_create: self.after_create.clone(),
            after_update: self.after_update.clone(),
            on_delete: self.on_delete.clone(),
            unique_fields: self.unique_fields.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> Default for ResourceDescriptor<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> ResourceDescriptor<R> {
    /// Unrestricted writes, no search, ids exposed and nothing else
    pub fn new() -> Self {
        Self {
            write_policy: WritePolicy::Unrestricted,
            search_fields: Vec::new(),
            populate: Vec::new(),
            user_filters: Vec::new(),
            projector: StandardView::new().shared(),
            after_create: Vec::new(),
            after_update: Vec::new(),
            on_delete: Vec::new(),
            unique_fields: Vec::new(),
            _resource: PhantomData,
        }
    }

    pub fn write_policy(mut self, policy: WritePolicy<R::Field>) -> Self {
        self.write_policy = policy;
        self
    }

    pub fn search(mut self, fields: &[&'static str]) -> Self {
        self.search_fields = fields.to_vec();
        self
    }

    pub fn populate(mut self, spec: PopulateSpec) -> Self {
        self.populate.push(spec);
        self
    }

    pub fn user_filter(mut self, field: &str, value: impl Into<Scalar>) -> Self {
        self.user_filters.push((field.to_string(), value.into()));
        self
    }

    pub fn projector(mut self, projector: SharedProjector) -> Self {
        self.projector = projector;
        self
    }

    pub fn after_create(mut self, hook: Arc<dyn SideEffect>) -> Self {
        self.after_create.push(hook);
        self
    }

    pub fn after_update(mut self, hook: Arc<dyn SideEffect>) -> Self {
        self.after_update.push(hook);
        self
    }

    /// Register the hook for both creates and updates
    pub fn after_write(self, hook: Arc<dyn SideEffect>) -> Self {
        self.after_create(hook.clone()).after_update(hook)
    }

    pub fn on_delete(mut self, hook: Arc<dyn Cleanup>) -> Self {
        self.on_delete.push(hook);
        self
    }

    pub fn unique(mut self, field: &'static str) -> Self {
        self.unique_fields.push(field);
        self
    }
}
