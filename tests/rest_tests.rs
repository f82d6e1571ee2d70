//! End-to-end tests of the assembled marketplace router
//!
//! Every test builds the full server over a seeded in-memory store and talks
//! to it through `axum_test::TestServer` with static bearer tokens.

use axum::http::StatusCode;
use axum_test::TestServer;
use m3allem::core::filter::{FilterPredicate, Scalar};
use m3allem::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;

const ADMIN: &str = "admin-token";
const EMPLOYEE: &str = "employee-token";
const CLIENT: &str = "client-token";

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

fn provider() -> StaticTokenProvider {
    StaticTokenProvider::new()
        .with_token(
            ADMIN,
            AuthContext::Admin {
                admin_id: "a-1".to_string(),
                role: AdminRole::SuperAdmin,
            },
        )
        .with_token(
            EMPLOYEE,
            AuthContext::User {
                user_id: "u-emp".to_string(),
                kind: UserKind::Employee,
            },
        )
        .with_token(
            CLIENT,
            AuthContext::User {
                user_id: "u-cli".to_string(),
                kind: UserKind::Client,
            },
        )
}

async fn seed(store: &Arc<dyn DocumentStore>) {
    let documents = [
        (
            "cities",
            json!({"_id": "rabat", "key": {"fr": "rabat", "ar": "الرباط"}, "name": {"fr": "Rabat", "ar": "الرباط"}, "isActive": true}),
        ),
        (
            "services",
            json!({"_id": "plombier", "key": {"fr": "plombier", "ar": "سباك"}, "name": {"fr": "Plombier", "ar": "سباك"}, "isActive": true}),
        ),
        (
            "users",
            json!({
                "_id": "u-emp", "name": "Hamza", "username": "e-hamza-0001", "phone": "0611111111",
                "city": "rabat", "type": "employee", "image": "hamza.png", "avgRating": 0, "ratingQty": 0,
                "status": "active", "createdAt": "2024-01-01T00:00:00.000Z"
            }),
        ),
        (
            "users",
            json!({
                "_id": "u-cli", "name": "Salma", "username": "c-salma-0002", "phone": "0622222222",
                "city": "rabat", "type": "client", "image": "salma.png", "avgRating": 0, "ratingQty": 0,
                "status": "active", "createdAt": "2024-01-02T00:00:00.000Z"
            }),
        ),
        (
            "employees",
            json!({"_id": "emp-1", "user": "u-emp", "service": "plombier", "isAvailable": true, "workIn": ["rabat"]}),
        ),
        ("clients", json!({"_id": "cli-1", "user": "u-cli"})),
    ];

    for (collection, document) in documents {
        store.insert(collection, document).await.unwrap();
    }
}

async fn make_server() -> (TestServer, Arc<dyn DocumentStore>) {
    let store: Arc<dyn DocumentStore> = Arc::new(InMemoryDocumentStore::new());
    seed(&store).await;

    let router = ServerBuilder::new(AppConfig::default())
        .with_store(store.clone())
        .with_auth_provider(Arc::new(provider()))
        .register_marketplace()
        .build()
        .await
        .unwrap();

    (TestServer::new(router), store)
}

// =============================================================================
// Server surface
// =============================================================================

#[tokio::test]
async fn test_health() {
    let (server, _) = make_server().await;

    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_unknown_route_is_localized() {
    let (server, _) = make_server().await;

    let response = server
        .get("/api/nope")
        .add_header("Accept-Language", "ar-MA,fr;q=0.5")
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body: Value = response.json();
    assert_eq!(body["status"], "fail");
    assert_eq!(body["code"], "ROUTE_NOT_FOUND");
    assert_eq!(body["message"], "غير موجود على هذا الخادم /api/nope!");
}

#[tokio::test]
async fn test_guards() {
    let (server, _) = make_server().await;

    server
        .get("/api/users")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
    server
        .get("/api/users")
        .add_header("Authorization", bearer(CLIENT))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    server
        .get("/api/users")
        .add_header("Authorization", bearer(ADMIN))
        .await
        .assert_status_ok();

    // unknown tokens are anonymous
    server
        .get("/api/users/me")
        .add_header("Authorization", bearer("forged"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Public listings
// =============================================================================

#[tokio::test]
async fn test_public_cities_are_localized() {
    let (server, _) = make_server().await;

    let response = server
        .get("/api/cities")
        .add_header("Accept-Language", "ar")
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"][0]["name"], "الرباط");
    assert_eq!(body["data"][0]["id"], "rabat");
}

#[tokio::test]
async fn test_employee_listing() {
    let (server, _) = make_server().await;

    let response = server.get("/api/employees").await;
    response.assert_status_ok();

    let body: Value = response.json();
    let listing = body["data"].as_array().unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0]["username"], "e-hamza-0001");
    assert_eq!(listing[0]["name"], "Hamza");
}

#[tokio::test]
async fn test_user_by_username() {
    let (server, store) = make_server().await;

    let response = server.get("/api/users/by-username/e-hamza-0001").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["name"], "Hamza");
    assert!(body["data"].get("status").is_none());

    let mut fields = serde_json::Map::new();
    fields.insert("status".to_string(), json!("blocked"));
    store
        .set_fields("users", &FilterPredicate::id("u-emp"), fields)
        .await
        .unwrap();

    server
        .get("/api/users/by-username/e-hamza-0001")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

// =============================================================================
// Own account
// =============================================================================

#[tokio::test]
async fn test_me_merges_profile() {
    let (server, _) = make_server().await;

    let response = server
        .get("/api/users/me")
        .add_header("Authorization", bearer(EMPLOYEE))
        .await;
    response.assert_status_ok();

    let me: Value = response.json::<Value>()["data"].clone();
    assert_eq!(me["name"], "Hamza");
    assert_eq!(me["city"], "Rabat");
    assert_eq!(me["isAvailable"], true);
    assert!(me.get("status").is_none());
}

#[tokio::test]
async fn test_update_me_cannot_escalate() {
    let (server, store) = make_server().await;

    let response = server
        .patch("/api/users/me")
        .add_header("Authorization", bearer(CLIENT))
        .json(&json!({"image": "new.png", "status": "active", "avgRating": 5}))
        .await;
    response.assert_status_ok();

    let stored = store
        .find_one("users", &FilterPredicate::id("u-cli"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored["image"], "new.png");
    assert_eq!(stored["avgRating"].as_f64(), Some(0.0));
    assert_eq!(stored["status"], "active");
}

// =============================================================================
// Appointment flow
// =============================================================================

#[tokio::test]
async fn test_appointment_flow() {
    let (server, store) = make_server().await;

    // only clients request appointments
    server
        .post("/api/appointments")
        .add_header("Authorization", bearer(EMPLOYEE))
        .json(&json!({"username": "c-salma-0002", "address": "12 rue Atlas, Rabat"}))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let response = server
        .post("/api/appointments")
        .add_header("Authorization", bearer(CLIENT))
        .json(&json!({
            "username": "e-hamza-0001",
            "address": "12 rue Atlas, Rabat",
            "description": "Fuite sous l'évier"
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let appointments = store
        .find(
            "appointments",
            &FilterPredicate::eq("employee", "u-emp"),
            &Default::default(),
        )
        .await
        .unwrap();
    assert_eq!(appointments.len(), 1);
    assert_eq!(appointments[0]["client"], "u-cli");
    assert_eq!(appointments[0]["status"], "in_revision");

    // the employee sees the request and its notification
    let response = server
        .get("/api/appointments/my-appointments")
        .add_header("Authorization", bearer(EMPLOYEE))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let response = server
        .get("/api/notifications/mine")
        .add_header("Authorization", bearer(EMPLOYEE))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let notifications = body["data"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(
        notifications[0]["data"]["message"],
        "Vous avez reçu une nouvelle demande de service de Salma"
    );
    assert_eq!(notifications[0]["read"], false);

    server
        .patch("/api/notifications/read")
        .add_header("Authorization", bearer(EMPLOYEE))
        .await
        .assert_status_ok();

    let unread = store
        .count(
            "notifications",
            &FilterPredicate::eq("notifiable", "u-emp").and(FilterPredicate::eq("readAt", Scalar::Null)),
        )
        .await
        .unwrap();
    assert_eq!(unread, 0);
}

#[tokio::test]
async fn test_appointment_to_self_or_unknown_user() {
    let (server, _) = make_server().await;

    server
        .post("/api/appointments")
        .add_header("Authorization", bearer(CLIENT))
        .json(&json!({"username": "c-salma-0002", "address": "12 rue Atlas, Rabat"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/api/appointments")
        .add_header("Authorization", bearer(CLIENT))
        .json(&json!({"username": "e-nobody-9999", "address": "12 rue Atlas, Rabat"}))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .post("/api/appointments")
        .add_header("Authorization", bearer(CLIENT))
        .json(&json!({"address": "12 rue Atlas, Rabat"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// =============================================================================
// Site content
// =============================================================================

#[tokio::test]
async fn test_pages_by_slug() {
    let (server, _) = make_server().await;

    server
        .post("/api/pages")
        .json(&json!({"title": {"fr": "À propos", "ar": "من نحن"}, "body": {"fr": "Bienvenue", "ar": "مرحبا"}}))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);

    server
        .post("/api/pages")
        .add_header("Authorization", bearer(ADMIN))
        .json(&json!({"title": {"fr": "À propos", "ar": "من نحن"}, "body": {"fr": "Bienvenue", "ar": "مرحبا"}}))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server
        .get("/api/pages/slug/a-propos")
        .add_header("Accept-Language", "ar")
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["title"], "من نحن");
    assert_eq!(body["data"]["body"], "مرحبا");
}

#[tokio::test]
async fn test_reports_and_contacts_are_write_only_for_visitors() {
    let (server, store) = make_server().await;

    server
        .post("/api/reports")
        .json(&json!({"email": "visiteur@example.ma", "type": "scam"}))
        .await
        .assert_status(StatusCode::CREATED);
    server
        .post("/api/contacts")
        .json(&json!({"name": "Nadia", "subject": "Question", "message": "Bonjour", "email": "nadia@example.ma"}))
        .await
        .assert_status(StatusCode::CREATED);

    for path in ["/api/reports", "/api/contacts"] {
        server
            .get(path)
            .add_header("Authorization", bearer(CLIENT))
            .await
            .assert_status(StatusCode::FORBIDDEN);
        let response = server.get(path).add_header("Authorization", bearer(ADMIN)).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["data"].as_array().map(Vec::len), Some(1));
    }

    assert_eq!(store.count("reports", &FilterPredicate::All).await.unwrap(), 1);
}

#[tokio::test]
async fn test_settings_singleton() {
    let (server, _) = make_server().await;

    server.get("/api/settings").await.assert_status(StatusCode::NOT_FOUND);

    server
        .post("/api/settings")
        .add_header("Authorization", bearer(ADMIN))
        .json(&json!({"title": {"fr": "AlloM3allem", "ar": "الومعلم"}, "phone": "0522000000"}))
        .await
        .assert_status(StatusCode::CREATED);

    server
        .patch("/api/settings")
        .add_header("Authorization", bearer(EMPLOYEE))
        .json(&json!({"maintenance_mode": true}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    server
        .patch("/api/settings")
        .add_header("Authorization", bearer(ADMIN))
        .json(&json!({"maintenance_mode": true}))
        .await
        .assert_status_ok();

    let response = server.get("/api/settings").add_header("Accept-Language", "fr").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["id"], "settings");
    assert_eq!(body["data"]["title"], "AlloM3allem");
    assert_eq!(body["data"]["maintenance_mode"], true);
}
