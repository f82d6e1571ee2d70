//! Appointments: a client's request for an employee's service
//!
//! Clients create appointments addressed to an employee's username; the
//! employee is notified. Both sides list their own appointments, with the
//! contract and the other party populated.

use super::contract::Contract;
use super::notification::{NotificationKind, notify};
use super::user::{User, UsernameResolver};
use super::{clients, end_users};
use crate::core::auth::AuthPolicy;
use crate::core::context::CallerBinding;
use crate::core::error::HookError;
use crate::core::filter::FilterPredicate;
use crate::core::hooks::SideEffect;
use crate::core::populate::PopulateSpec;
use crate::core::projection::StandardView;
use crate::core::resource::{Resource, ResourceDescriptor, WritePolicy};
use crate::core::store::DocumentStore;
use crate::resource_fields;
use crate::server::{AppState, ResourceRoutes, guarded};
use async_trait::async_trait;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;
use validator::Validate;

resource_fields! {
    pub enum AppointmentField {
        Client => "client",
        Employee => "employee",
        Address => "address",
        Description => "description",
        Status => "status",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Accepted,
    Canceled,
    #[default]
    InRevision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Appointment {
    /// Requesting client (user id)
    #[validate(length(min = 1, message = "client is required"))]
    pub client: String,

    /// Requested employee (user id)
    #[validate(length(min = 1, message = "employee is required"))]
    pub employee: String,

    #[validate(length(min = 6, message = "address must be at least 6 characters"))]
    pub address: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub status: AppointmentStatus,
}

impl Resource for Appointment {
    type Field = AppointmentField;

    const NAME: &'static str = "appointment";
    const COLLECTION: &'static str = "appointments";
}

/// Tells the employee a client asked for them
struct NotifyEmployee {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl SideEffect for NotifyEmployee {
    fn name(&self) -> &'static str {
        "notify_requested_employee"
    }

    async fn run(&self, document: &Value) -> Result<(), HookError> {
        let (Some(employee), Some(client)) = (
            document.get("employee").and_then(Value::as_str),
            document.get("client").and_then(Value::as_str),
        ) else {
            return Ok(());
        };

        let client = self
            .store
            .find_one(User::COLLECTION, &FilterPredicate::id(client))
            .await?
            .unwrap_or(Value::Null);
        let name = client.get("name").and_then(Value::as_str).unwrap_or_default();

        let data = json!({
            "image": client.get("image").cloned().unwrap_or(Value::Null),
            "message": {
                "fr": format!("Vous avez reçu une nouvelle demande de service de {}", name),
                "ar": format!("لقد تلقيت طلب خدمة جديدًا من {}", name),
            }
        });
        notify(&self.store, NotificationKind::Appointment, employee, data)
            .await
            .map(|_| ())
            .map_err(|e| HookError::Failed {
                hook: self.name().to_string(),
                message: e.to_string(),
            })
    }
}

pub fn descriptor(store: Arc<dyn DocumentStore>) -> ResourceDescriptor<Appointment> {
    ResourceDescriptor::new()
        .write_policy(WritePolicy::deny(&[AppointmentField::Status]))
        .search(&["address", "description"])
        .after_create(Arc::new(NotifyEmployee { store }))
}

/// Appointments as their parties see them
pub fn own_appointments() -> ResourceDescriptor<Appointment> {
    let party = |path: &str| {
        PopulateSpec::reference(path, User::COLLECTION).select(&["name", "username", "phone"])
    };

    ResourceDescriptor::new()
        .populate(PopulateSpec::reverse("contract", Contract::COLLECTION, "appointment", true))
        .populate(party("employee"))
        .populate(party("client"))
        .projector(StandardView::new().shared())
}

pub struct AppointmentRoutes;

#[async_trait]
impl ResourceRoutes for AppointmentRoutes {
    fn resource_name(&self) -> &str {
        Appointment::NAME
    }

    fn plural(&self) -> &str {
        Appointment::COLLECTION
    }

    fn build_routes(&self, state: &AppState) -> Router {
        let handlers = state.handlers(descriptor(state.store.clone()));

        let request = handlers
            .bound(CallerBinding::BodyByKind)
            .resolving(Arc::new(UsernameResolver::new(state.store.clone(), "employee")))
            .create_one();

        let mine = state
            .handlers(own_appointments())
            .bound(CallerBinding::QueryByKind)
            .get_all();

        let admin = Router::new()
            .route("/", handlers.get_all())
            .route(
                "/{id}",
                handlers
                    .get_one()
                    .merge(handlers.update_one())
                    .merge(handlers.delete_one()),
            );

        Router::new()
            .merge(guarded(Router::new().route("/my-appointments", mine), end_users()))
            .merge(guarded(Router::new().route("/", request), clients()))
            .merge(guarded(admin, AuthPolicy::AdminOnly))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PaginationConfig;
    use crate::core::auth::UserKind;
    use crate::core::context::Scope;
    use crate::core::factory::ResourceFactory;
    use crate::core::locale::Language;
    use crate::core::query::QueryParams;
    use crate::core::store::FindOptions;
    use crate::entities::testing::{body, store, user};

    async fn seed(store: &Arc<dyn DocumentStore>) {
        for document in [
            json!({"_id": "u-emp", "name": "Hamza", "username": "e-hamza-0001", "phone": "0611111111"}),
            json!({"_id": "u-cli", "name": "Salma", "username": "c-salma-0002", "image": "salma.png"}),
        ] {
            store.insert("users", document).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_clients_cannot_set_status() {
        let store = store();
        seed(&store).await;
        let factory = ResourceFactory::new(store.clone(), descriptor(store.clone()));
        let caller = user("u-cli", UserKind::Client, Language::Fr);

        let scope = CallerBinding::BodyByKind.bind(&caller.auth, Scope::new()).unwrap();
        let reply = factory
            .create_one(
                &caller,
                body(json!({"address": "12 Main St", "employee": "u-emp", "status": "accepted"})),
                &scope,
            )
            .await
            .unwrap();

        assert_eq!(reply.body.data["status"], "in_revision");
        assert_eq!(reply.body.data["client"], "u-cli");
    }

    #[tokio::test]
    async fn test_create_notifies_employee() {
        let store = store();
        seed(&store).await;
        let factory = ResourceFactory::new(store.clone(), descriptor(store.clone()));
        let caller = user("u-cli", UserKind::Client, Language::Fr);

        factory
            .create_one(
                &caller,
                body(json!({"address": "12 Main St", "employee": "u-emp", "client": "u-cli"})),
                &Scope::new(),
            )
            .await
            .unwrap();

        let sent = store
            .find("notifications", &FilterPredicate::eq("notifiable", "u-emp"), &FindOptions::default())
            .await
            .unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["type"], "appointment");
        assert_eq!(sent[0]["data"]["image"], "salma.png");
        assert_eq!(
            sent[0]["data"]["message"]["fr"],
            "Vous avez reçu une nouvelle demande de service de Salma"
        );
    }

    #[tokio::test]
    async fn test_short_address_is_rejected() {
        let store = store();
        let factory = ResourceFactory::new(store.clone(), descriptor(store.clone()));
        let result = factory
            .create_one(
                &user("u-cli", UserKind::Client, Language::Fr),
                body(json!({"address": "rue", "employee": "u-emp", "client": "u-cli"})),
                &Scope::new(),
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_own_listing_populates_parties() {
        let store = store();
        seed(&store).await;
        store
            .insert(
                "appointments",
                json!({"_id": "a-1", "client": "u-cli", "employee": "u-emp", "address": "12 Main St", "status": "accepted"}),
            )
            .await
            .unwrap();
        store
            .insert(
                "appointments",
                json!({"_id": "a-2", "client": "u-other", "employee": "u-emp", "address": "3 rue Fes", "status": "in_revision"}),
            )
            .await
            .unwrap();
        store
            .insert("contracts", json!({"_id": "c-1", "appointment": "a-1", "price": 300}))
            .await
            .unwrap();

        let factory = ResourceFactory::new(store.clone(), own_appointments());
        let caller = user("u-cli", UserKind::Client, Language::Fr);
        let scope = CallerBinding::QueryByKind.bind(&caller.auth, Scope::new()).unwrap();
        let params = QueryParams::new(&PaginationConfig::default());

        let reply = factory.get_all(&caller, &params, &scope).await.unwrap();
        let data = reply.body.data.as_array().unwrap();
        assert_eq!(data.len(), 1);
        assert_eq!(data[0]["id"], "a-1");
        assert_eq!(data[0]["contract"]["price"], 300);
        assert_eq!(
            data[0]["employee"],
            json!({"id": "u-emp", "name": "Hamza", "username": "e-hamza-0001", "phone": "0611111111"})
        );
    }
}
