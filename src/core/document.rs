//! Helpers for JSON documents addressed by dotted paths
//!
//! Paths follow document-store conventions: `name.fr` reads a nested field
//! and a path crossing an array applies to every element of that array.

use serde_json::{Map, Value};

/// Storage identifier key
pub const ID_KEY: &str = "_id";
pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Keys owned by the system, never writable through a request body
pub const SYSTEM_KEYS: [&str; 3] = [ID_KEY, CREATED_AT, UPDATED_AT];

/// All values reachable through `path`
///
/// Arrays met along the way are flattened; an array at the end of the path
/// contributes both itself and its elements, so `{"tags": ["a"]}` yields
/// `["a"]` and `"a"` for `tags`.
pub fn values_at<'a>(document: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![document];

    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            collect_segment(value, segment, &mut next);
        }
        if next.is_empty() {
            return next;
        }
        current = next;
    }

    let mut out = Vec::with_capacity(current.len());
    for value in current {
        out.push(value);
        if let Value::Array(items) = value {
            out.extend(items.iter());
        }
    }
    out
}

fn collect_segment<'a>(value: &'a Value, segment: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            if let Some(child) = map.get(segment) {
                out.push(child);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_segment(item, segment, out);
            }
        }
        _ => {}
    }
}

/// First value at `path`, without array flattening
pub fn get_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |value, segment| value.as_object()?.get(segment))
}

/// Apply `f` to the value at `path`, descending into arrays
pub fn update_path(document: &mut Value, path: &str, f: &mut dyn FnMut(&mut Value)) {
    match path.split_once('.') {
        None => match document {
            Value::Object(map) => {
                if let Some(value) = map.get_mut(path) {
                    f(value);
                }
            }
            Value::Array(items) => {
                for item in items {
                    update_path(item, path, f);
                }
            }
            _ => {}
        },
        Some((head, rest)) => match document {
            Value::Object(map) => {
                if let Some(child) = map.get_mut(head) {
                    update_path(child, rest, f);
                }
            }
            Value::Array(items) => {
                for item in items {
                    update_path(item, path, f);
                }
            }
            _ => {}
        },
    }
}

/// Insert `value` at `path`, creating intermediate objects
pub fn set_path(document: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            document.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = document
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !child.is_object() {
                *child = Value::Object(Map::new());
            }
            if let Value::Object(inner) = child {
                set_path(inner, rest, value);
            }
        }
    }
}

/// Remove the value at `path`, descending into arrays
pub fn remove_path(document: &mut Value, path: &str) {
    match document {
        Value::Object(map) => match path.split_once('.') {
            None => {
                map.remove(path);
            }
            Some((head, rest)) => {
                if let Some(child) = map.get_mut(head) {
                    remove_path(child, rest);
                }
            }
        },
        Value::Array(items) => {
            for item in items {
                remove_path(item, path);
            }
        }
        _ => {}
    }
}

/// Storage id of a document, when it is a string
pub fn document_id(document: &Value) -> Option<&str> {
    document.get(ID_KEY).and_then(Value::as_str)
}

/// Compare two JSON values, treating numbers by their numeric value
pub fn json_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Total order used for sorting documents by a field
///
/// Missing values sort first, then numbers, strings, booleans, in that order.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;

    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None | Some(Value::Null) => 0,
            Some(Value::Number(_)) => 1,
            Some(Value::String(_)) => 2,
            Some(Value::Bool(_)) => 3,
            Some(Value::Array(_)) => 4,
            Some(Value::Object(_)) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
