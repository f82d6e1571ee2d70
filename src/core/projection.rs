//! View projection: stored document to client representation
//!
//! A [`ViewProjector`] is a pure function of a document snapshot and a
//! [`View`] (who is asking, in which language). Projectors never touch the
//! store; population happens before projection.
//!
//! Every projector output satisfies the same contract:
//! - storage ids (`_id`) are exposed as `id`, at every nesting level
//! - with a language chosen, bilingual `{fr, ar}` values collapse to one string
//! - non-admins only see the fields the resource type makes public

use crate::core::document::{ID_KEY, remove_path, update_path};
use crate::core::locale::Language;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Who a representation is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct View {
    pub is_admin: bool,
    /// `None` keeps both language variants (admins without a preference)
    pub language: Option<Language>,
}

impl View {
    pub fn admin(language: Option<Language>) -> Self {
        Self {
            is_admin: true,
            language,
        }
    }

    pub fn public(language: Language) -> Self {
        Self {
            is_admin: false,
            language: Some(language),
        }
    }
}

/// Per-resource shaping of documents for clients
pub trait ViewProjector: Send + Sync {
    fn project(&self, document: &Value, view: &View) -> Value;
}

impl<F> ViewProjector for F
where
    F: Fn(&Value, &View) -> Value + Send + Sync,
{
    fn project(&self, document: &Value, view: &View) -> Value {
        self(document, view)
    }
}

pub type SharedProjector = Arc<dyn ViewProjector>;

/// Rename `_id` to `id` in every object of the tree
pub fn expose_ids(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if let Some(id) = map.remove(ID_KEY) {
                map.entry("id".to_string()).or_insert(id);
            }
            for child in map.values_mut() {
                expose_ids(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(expose_ids),
        _ => {}
    }
}

/// Replace the bilingual value at `path` by its text in `language`
///
/// Values that are not `{fr, ar}` objects are left alone, so collapsing is
/// safe to repeat and safe on unpopulated references.
pub fn collapse(document: &mut Value, path: &str, language: Language) {
    update_path(document, path, &mut |value| {
        let text = value
            .as_object()
            .and_then(|map| map.get(language.code()))
            .filter(|text| text.is_string())
            .cloned();
        if let Some(text) = text {
            *value = text;
        }
    });
}

/// Replace the populated document(s) at `path` by their name in `language`
///
/// A populated city `{"_id": "rabat", "name": {"fr": "Rabat", ...}}` becomes
/// `"Rabat"`; arrays are handled element by element. Unpopulated references
/// are left alone.
pub fn flatten_name(document: &mut Value, path: &str, language: Language) {
    update_path(document, path, &mut |value| name_in(value, language));
}

fn name_in(value: &mut Value, language: Language) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(|item| name_in(item, language)),
        Value::Object(map) => {
            let name = map
                .get("name")
                .and_then(|name| name.get(language.code()))
                .filter(|name| name.is_string())
                .cloned();
            if let Some(name) = name {
                *value = name;
            }
        }
        _ => {}
    }
}

/// Keep only the listed top-level keys
pub fn pick(document: Value, keys: &[&str]) -> Value {
    match document {
        Value::Object(mut map) => {
            let mut out = Map::new();
            for key in keys {
                if let Some(value) = map.remove(*key) {
                    out.insert(key.to_string(), value);
                }
            }
            Value::Object(out)
        }
        other => other,
    }
}

/// Remove the listed (possibly dotted) paths
pub fn omit(mut document: Value, paths: &[&str]) -> Value {
    for path in paths {
        remove_path(&mut document, path);
    }
    document
}

/// Configurable projector covering the common resource shapes
///
/// Paths refer to the projected document, where ids are already named `id`.
///
/// ```
/// use m3allem::core::locale::Language;
/// use m3allem::core::projection::{StandardView, View, ViewProjector};
/// use serde_json::json;
///
/// let projector = StandardView::new().localized("name").public_fields(&["id", "name"]);
/// let city = json!({"_id": "rabat", "name": {"fr": "Rabat", "ar": "الرباط"}, "isActive": true});
///
/// assert_eq!(
///     projector.project(&city, &View::public(Language::Fr)),
///     json!({"id": "rabat", "name": "Rabat"})
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct StandardView {
    localized: Vec<&'static str>,
    names: Vec<&'static str>,
    public_fields: Option<Vec<&'static str>>,
    hidden: Vec<&'static str>,
}

impl StandardView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a bilingual path (may cross populated relations)
    pub fn localized(mut self, path: &'static str) -> Self {
        self.localized.push(path);
        self
    }

    /// Declare a populated relation shown as its localized name
    pub fn name_of(mut self, path: &'static str) -> Self {
        self.names.push(path);
        self
    }

    /// Restrict non-admin output to these top-level keys
    pub fn public_fields(mut self, keys: &[&'static str]) -> Self {
        self.public_fields = Some(keys.to_vec());
        self
    }

    /// Hide these paths from non-admins
    pub fn hidden(mut self, paths: &[&'static str]) -> Self {
        self.hidden.extend_from_slice(paths);
        self
    }

    pub fn shared(self) -> SharedProjector {
        Arc::new(self)
    }
}

impl ViewProjector for StandardView {
    fn project(&self, document: &Value, view: &View) -> Value {
        let mut out = document.clone();

        if let Some(language) = view.language {
            for path in &self.localized {
                collapse(&mut out, path, language);
            }
            for path in &self.names {
                flatten_name(&mut out, path, language);
            }
        }

        expose_ids(&mut out);

        if !view.is_admin {
            if let Some(keys) = &self.public_fields {
                out = pick(out, keys);
            }
            out = omit(out, &self.hidden);
        }

        out
    }
}
