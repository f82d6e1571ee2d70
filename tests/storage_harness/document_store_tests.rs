//! Macro-generated test suite for `DocumentStore` contract validation.
//!
//! # Generated Tests
//!
//! ## Writes
//! - `test_insert_and_find_one`: stored document comes back unchanged
//! - `test_duplicate_id_is_rejected`
//! - `test_update_fields`: only named fields change, no match gives `None`
//! - `test_update_fields_respects_filter`: the whole filter gates the write
//! - `test_set_fields`: every match updated, count returned
//! - `test_delete_one`: removed document returned once
//! - `test_unique_field`: inserts and updates respect unique fields
//!
//! ## Reads
//! - `test_filters`: nested paths, arrays, `AnyOf`, `Contains`, `Or`
//! - `test_text_matches_numbers_and_booleans`
//! - `test_null_matches_missing_or_null_only`
//! - `test_sort_skip_limit` and `test_count`
//!
//! ## Aggregation
//! - `test_aggregate_page`: lookup, unwind, match, sort, project, page
//! - `test_aggregate_preserve_empty`
//!
//! ## Concurrency
//! - `test_concurrent_inserts`

/// Generate a full `DocumentStore` conformance test suite.
///
/// `$factory` must evaluate to a value implementing `DocumentStore`. It is
/// re-evaluated for each test so every test starts from an empty store.
#[macro_export]
macro_rules! document_store_tests {
    ($factory:expr) => {
        mod document_store_contract_tests {
            use super::*;
            use m3allem::core::filter::{FilterPredicate, Scalar};
            use m3allem::core::pipeline::{Projection, Stage};
            use m3allem::core::store::{DocumentStore, FindOptions, SortSpec, StoreError};
            use serde_json::{Map, Value, json};
            use std::sync::Arc;

            async fn seeded() -> Arc<dyn DocumentStore> {
                let store: Arc<dyn DocumentStore> = Arc::new($factory);
                for document in [
                    city("rabat", "Rabat", "الرباط", "2024-01-01T00:00:00.000Z"),
                    city("fes", "Fès", "فاس", "2024-01-02T00:00:00.000Z"),
                    city("tanger", "Tanger", "طنجة", "2024-01-03T00:00:00.000Z"),
                ] {
                    store.insert("cities", document).await.unwrap();
                }
                store
            }

            // ==================================================================
            // Writes
            // ==================================================================

            #[tokio::test]
            async fn test_insert_and_find_one() {
                let store = seeded().await;

                let found = store
                    .find_one("cities", &FilterPredicate::id("fes"))
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(found, city("fes", "Fès", "فاس", "2024-01-02T00:00:00.000Z"));

                let missing = store
                    .find_one("cities", &FilterPredicate::id("agadir"))
                    .await
                    .unwrap();
                assert!(missing.is_none());
            }

            #[tokio::test]
            async fn test_duplicate_id_is_rejected() {
                let store = seeded().await;
                let result = store
                    .insert("cities", city("rabat", "Rabat bis", "x", "2024-02-01T00:00:00.000Z"))
                    .await;
                assert!(result.is_err(), "Inserting an existing _id should fail");
            }

            #[tokio::test]
            async fn test_update_fields() {
                let store = seeded().await;
                let mut set = Map::new();
                set.insert("isActive".to_string(), json!(false));
                set.insert("updatedAt".to_string(), json!("2024-03-01T00:00:00.000Z"));

                let stored = store
                    .update_fields("cities", &FilterPredicate::id("rabat"), set, &["createdAt".to_string()])
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(stored["isActive"], false);
                assert_eq!(stored["name"]["fr"], "Rabat");
                assert!(stored.get("createdAt").is_none());

                let found = store
                    .find_one("cities", &FilterPredicate::id("rabat"))
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(found, stored);

                let missing = store
                    .update_fields("cities", &FilterPredicate::id("agadir"), Map::new(), &[])
                    .await
                    .unwrap();
                assert!(missing.is_none());
                assert_eq!(store.count("cities", &FilterPredicate::All).await.unwrap(), 3);
            }

            #[tokio::test]
            async fn test_update_fields_respects_filter() {
                let store = seeded().await;
                let mut set = Map::new();
                set.insert("isActive".to_string(), json!(false));

                let target = FilterPredicate::id("tanger").and(FilterPredicate::eq("isActive", false));
                let missed = store
                    .update_fields("cities", &target, set.clone(), &[])
                    .await
                    .unwrap();
                assert!(missed.is_none());

                // two writes to different fields both stick
                let target = FilterPredicate::id("tanger");
                store.update_fields("cities", &target, set, &[]).await.unwrap();
                let mut other = Map::new();
                other.insert("population".to_string(), json!(950_000));
                store.update_fields("cities", &target, other, &[]).await.unwrap();

                let found = store.find_one("cities", &target).await.unwrap().unwrap();
                assert_eq!(found["isActive"], false);
                assert_eq!(found["population"], 950_000);
            }

            #[tokio::test]
            async fn test_set_fields() {
                let store = seeded().await;
                let mut fields = Map::new();
                fields.insert("isActive".to_string(), json!(false));

                let filter = FilterPredicate::AnyOf {
                    field: "_id".to_string(),
                    values: vec![Scalar::from("rabat"), Scalar::from("fes")],
                };
                let matched = store.set_fields("cities", &filter, fields).await.unwrap();
                assert_eq!(matched, 2);

                let inactive = store
                    .count("cities", &FilterPredicate::eq("isActive", false))
                    .await
                    .unwrap();
                assert_eq!(inactive, 2);

                let untouched = store
                    .find_one("cities", &FilterPredicate::id("tanger"))
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(untouched["isActive"], true);
                assert_eq!(untouched["name"]["fr"], "Tanger");
            }

            #[tokio::test]
            async fn test_delete_one() {
                let store = seeded().await;

                let removed = store
                    .delete_one("cities", &FilterPredicate::id("fes"))
                    .await
                    .unwrap();
                assert_eq!(removed.and_then(|d| d["name"]["fr"].as_str().map(str::to_string)), Some("Fès".to_string()));

                let again = store
                    .delete_one("cities", &FilterPredicate::id("fes"))
                    .await
                    .unwrap();
                assert!(again.is_none());
                assert_eq!(store.count("cities", &FilterPredicate::All).await.unwrap(), 2);
            }

            #[tokio::test]
            async fn test_unique_field() {
                let store = seeded().await;
                store.ensure_unique("cities", "name.ar").await.unwrap();

                let result = store
                    .insert("cities", city("rabat_2", "Rabat 2", "الرباط", "2024-02-01T00:00:00.000Z"))
                    .await;
                assert!(
                    matches!(result, Err(StoreError::DuplicateKey { .. })),
                    "Expected a duplicate key error, got {:?}",
                    result
                );

                let name = |fr: &str, ar: &str| {
                    let mut set = Map::new();
                    set.insert("name".to_string(), json!({"fr": fr, "ar": ar}));
                    set
                };

                let clash = store
                    .update_fields("cities", &FilterPredicate::id("fes"), name("Fès", "طنجة"), &[])
                    .await;
                assert!(matches!(clash, Err(StoreError::DuplicateKey { .. })));

                // a document may keep its own unique value
                let same = store
                    .update_fields("cities", &FilterPredicate::id("fes"), name("Fez", "فاس"), &[])
                    .await
                    .unwrap();
                assert!(same.is_some());
            }

            // ==================================================================
            // Reads
            // ==================================================================

            #[tokio::test]
            async fn test_filters() {
                let store: Arc<dyn DocumentStore> = Arc::new($factory);
                store.insert("employees", profile("e1", "u1", &["rabat", "fes"])).await.unwrap();
                store.insert("employees", profile("e2", "u2", &["tanger"])).await.unwrap();
                store.insert("users", account("u1", "Hamza", "active", "rabat")).await.unwrap();
                store.insert("users", account("u22", "Salma (pro)", "blocked", "fes")).await.unwrap();

                let sorted = FindOptions {
                    sort: Some(SortSpec::ascending("_id")),
                    ..FindOptions::default()
                };

                // array element match
                let found = store
                    .find("employees", &FilterPredicate::eq("workIn", "fes"), &sorted)
                    .await
                    .unwrap();
                assert_eq!(ids(&found), vec!["e1"]);

                // literal, case-insensitive substring
                let found = store
                    .find(
                        "users",
                        &FilterPredicate::Contains {
                            field: "name".to_string(),
                            needle: "(PRO)".to_string(),
                        },
                        &sorted,
                    )
                    .await
                    .unwrap();
                assert_eq!(ids(&found), vec!["u22"]);

                let either = FilterPredicate::Or(vec![
                    FilterPredicate::eq("status", "active"),
                    FilterPredicate::eq("city", "fes"),
                ]);
                let found = store.find("users", &either, &sorted).await.unwrap();
                assert_eq!(ids(&found), vec!["u1", "u22"]);

                let both = FilterPredicate::eq("status", "active").and(FilterPredicate::eq("city", "fes"));
                assert!(store.find("users", &both, &sorted).await.unwrap().is_empty());
            }

            #[tokio::test]
            async fn test_text_matches_numbers_and_booleans() {
                let store: Arc<dyn DocumentStore> = Arc::new($factory);
                store.insert("users", account("u1", "Hamza", "active", "rabat")).await.unwrap();

                for (field, text) in [("avgRating", "4.5"), ("ratingQty", "2")] {
                    let count = store
                        .count("users", &FilterPredicate::eq(field, text))
                        .await
                        .unwrap();
                    assert_eq!(count, 1, "{} should match {}", field, text);
                }

                let store = seeded().await;
                let active = store
                    .count("cities", &FilterPredicate::eq("isActive", "true"))
                    .await
                    .unwrap();
                assert_eq!(active, 3);
            }

            #[tokio::test]
            async fn test_null_matches_missing_or_null_only() {
                let store: Arc<dyn DocumentStore> = Arc::new($factory);
                store
                    .insert("notifications", json!({"_id": "n1", "notifiable": "u1", "readAt": null}))
                    .await
                    .unwrap();
                store
                    .insert("notifications", json!({"_id": "n2", "notifiable": "u1", "readAt": "2024-01-01T00:00:00.000Z"}))
                    .await
                    .unwrap();

                let unread = store
                    .find("notifications", &FilterPredicate::eq("readAt", Scalar::Null), &FindOptions::default())
                    .await
                    .unwrap();
                assert_eq!(ids(&unread), vec!["n1"]);
            }

            #[tokio::test]
            async fn test_sort_skip_limit() {
                let store = seeded().await;

                let newest = store
                    .find("cities", &FilterPredicate::All, &FindOptions::page(0, 2))
                    .await
                    .unwrap();
                assert_eq!(ids(&newest), vec!["tanger", "fes"]);

                let rest = store
                    .find("cities", &FilterPredicate::All, &FindOptions::page(2, 2))
                    .await
                    .unwrap();
                assert_eq!(ids(&rest), vec!["rabat"]);

                let by_name = FindOptions {
                    sort: Some(SortSpec::ascending("name.fr")),
                    ..FindOptions::default()
                };
                let sorted = store.find("cities", &FilterPredicate::All, &by_name).await.unwrap();
                assert_eq!(ids(&sorted), vec!["fes", "rabat", "tanger"]);
            }

            #[tokio::test]
            async fn test_count() {
                let store = seeded().await;
                assert_eq!(store.count("cities", &FilterPredicate::All).await.unwrap(), 3);
                assert_eq!(store.count("missing", &FilterPredicate::All).await.unwrap(), 0);
                assert_eq!(
                    store.count("cities", &FilterPredicate::eq("name.ar", "فاس")).await.unwrap(),
                    1
                );
            }

            // ==================================================================
            // Aggregation
            // ==================================================================

            #[tokio::test]
            async fn test_aggregate_page() {
                let store = seeded().await;
                for (user, status) in [("u1", "active"), ("u22", "blocked"), ("u333", "active")] {
                    store.insert("users", account(user, user, status, "rabat")).await.unwrap();
                }
                store.insert("employees", profile("e1", "u1", &["rabat", "fes"])).await.unwrap();
                store.insert("employees", profile("e2", "u22", &["tanger"])).await.unwrap();
                store.insert("employees", profile("e3", "u333", &["tanger"])).await.unwrap();

                let stages = vec![
                    Stage::lookup("users", "user", "_id", "user"),
                    Stage::unwind("user"),
                    Stage::Match(FilterPredicate::eq("user.status", "active")),
                    Stage::lookup("cities", "workIn", "_id", "workIn"),
                    Stage::Sort(SortSpec::descending("user.createdAt")),
                    Stage::Project(
                        Projection::new()
                            .field("id", "user._id")
                            .field("workIn", "workIn.name.fr")
                            .field("rating", "user.avgRating"),
                    ),
                ];

                let page = store.aggregate_page("employees", &stages, 0, 1).await.unwrap();
                assert_eq!(page.total, 2);
                assert_eq!(page.documents, vec![json!({"id": "u333", "workIn": ["Tanger"], "rating": 4.5})]);

                let page = store.aggregate_page("employees", &stages, 1, 1).await.unwrap();
                assert_eq!(page.total, 2);
                assert_eq!(page.documents[0]["id"], "u1");
                let mut names: Vec<&str> = page.documents[0]["workIn"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .filter_map(Value::as_str)
                    .collect();
                names.sort_unstable();
                assert_eq!(names, vec!["Fès", "Rabat"]);

                let beyond = store.aggregate_page("employees", &stages, 5, 1).await.unwrap();
                assert_eq!(beyond.total, 2);
                assert!(beyond.documents.is_empty());
            }

            #[tokio::test]
            async fn test_aggregate_preserve_empty() {
                let store = seeded().await;
                store.insert("users", json!({"_id": "u1", "city": "rabat"})).await.unwrap();
                store.insert("users", json!({"_id": "u2", "city": "atlantis"})).await.unwrap();

                let stages = |preserve_empty| {
                    vec![
                        Stage::lookup("cities", "city", "_id", "city"),
                        Stage::Unwind {
                            path: "city".to_string(),
                            preserve_empty,
                        },
                    ]
                };

                let dropped = store.aggregate_page("users", &stages(false), 0, 10).await.unwrap();
                assert_eq!(dropped.total, 1);

                let kept = store.aggregate_page("users", &stages(true), 0, 10).await.unwrap();
                assert_eq!(kept.total, 2);
            }

            // ==================================================================
            // Concurrency
            // ==================================================================

            #[tokio::test]
            async fn test_concurrent_inserts() {
                let store: Arc<dyn DocumentStore> = Arc::new($factory);

                let mut handles = Vec::new();
                for i in 0..10 {
                    let store = store.clone();
                    handles.push(tokio::spawn(async move {
                        store
                            .insert("notifications", json!({"_id": format!("n{}", i), "notifiable": "u1"}))
                            .await
                    }));
                }
                for handle in handles {
                    handle.await.unwrap().unwrap();
                }

                let total = store
                    .count("notifications", &FilterPredicate::eq("notifiable", "u1"))
                    .await
                    .unwrap();
                assert_eq!(total, 10);
            }
        }
    };
}
