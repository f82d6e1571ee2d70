//! Shared test harness for document store backends
//!
//! Provides marketplace-shaped fixtures and the `document_store_tests!`
//! macro, which checks any `DocumentStore` against the full contract.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! #[macro_use]
//! mod storage_harness;
//! use storage_harness::*;
//!
//! document_store_tests!(InMemoryDocumentStore::new());
//! ```

#![allow(dead_code)]

#[macro_use]
pub mod document_store_tests;

use serde_json::{Value, json};

/// A city document with a fixed creation time
pub fn city(id: &str, fr: &str, ar: &str, created_at: &str) -> Value {
    json!({
        "_id": id,
        "key": {"fr": id, "ar": ar},
        "name": {"fr": fr, "ar": ar},
        "isActive": true,
        "createdAt": created_at,
        "updatedAt": created_at
    })
}

/// A user account document
pub fn account(id: &str, name: &str, status: &str, city: &str) -> Value {
    json!({
        "_id": id,
        "name": name,
        "username": format!("e-{}-0001", name.to_lowercase()),
        "phone": format!("06{:0>8}", id.len()),
        "city": city,
        "type": "employee",
        "avgRating": 4.5,
        "ratingQty": 2,
        "status": status,
        "createdAt": format!("2024-01-0{}T00:00:00.000Z", id.len() % 9 + 1)
    })
}

/// An employee profile pointing at an account
pub fn profile(id: &str, user: &str, work_in: &[&str]) -> Value {
    json!({
        "_id": id,
        "user": user,
        "service": "plombier",
        "isAvailable": true,
        "workIn": work_in
    })
}

/// Ids of a list of documents, in order
pub fn ids(documents: &[Value]) -> Vec<String> {
    documents
        .iter()
        .filter_map(|d| d.get("_id").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}
