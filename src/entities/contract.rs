//! Contracts between an employee and a client
//!
//! An employee answers an appointment by creating a contract, which marks
//! the appointment accepted. The employee may revise the contract; the client
//! accepts it. Each step notifies the other party.

use super::appointment::Appointment;
use super::notification::{NotificationKind, notify};
use super::{clients, employees, end_users};
use crate::core::auth::AuthPolicy;
use crate::core::context::{CallerBinding, Scope};
use crate::core::document::document_id;
use crate::core::error::HookError;
use crate::core::factory::timestamp;
use crate::core::filter::FilterPredicate;
use crate::core::hooks::SideEffect;
use crate::core::populate::PopulateSpec;
use crate::core::projection::{SharedProjector, StandardView};
use crate::core::resource::{Resource, ResourceDescriptor, ResourceField, WritePhase, WritePolicy};
use crate::core::store::DocumentStore;
use crate::resource_fields;
use crate::server::{AppState, ResourceRoutes, guarded};
use async_trait::async_trait;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use validator::Validate;

resource_fields! {
    pub enum ContractField {
        Appointment => "appointment",
        Employee => "employee",
        Client => "client",
        Price => "price",
        WorkType => "workType",
        Service => "service",
        Summary => "summary",
        AcceptedAt => "acceptedAt",
        StartAt => "startAt",
        FinishAt => "finishAt",
        Status => "status",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkType {
    ByDay,
    ByProject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    Accepted,
    Refused,
    #[default]
    InRevision,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[serde(default)]
    pub appointment: Option<String>,

    #[validate(length(min = 1, message = "employee is required"))]
    pub employee: String,

    #[validate(length(min = 1, message = "client is required"))]
    pub client: String,

    #[validate(range(min = 0.0, message = "price must not be negative"))]
    pub price: f64,

    pub work_type: WorkType,

    /// Service id
    #[validate(length(min = 1, message = "service is required"))]
    pub service: String,

    #[validate(length(min = 1, message = "summary is required"))]
    pub summary: String,

    #[serde(default)]
    pub accepted_at: Option<String>,

    pub start_at: String,

    pub finish_at: String,

    #[serde(default)]
    pub status: ContractStatus,
}

impl Resource for Contract {
    type Field = ContractField;

    const NAME: &'static str = "contract";
    const COLLECTION: &'static str = "contracts";

    fn prepare(&mut self, _phase: WritePhase) {
        if self.status == ContractStatus::Accepted && self.accepted_at.is_none() {
            self.accepted_at = Some(timestamp());
        }
    }
}

fn hook_failed(hook: &str, error: impl ToString) -> HookError {
    HookError::Failed {
        hook: hook.to_string(),
        message: error.to_string(),
    }
}

/// Marks the answered appointment accepted and tells its client
struct AcceptAppointment {
    store: Arc<dyn DocumentStore>,
}

#[async_trait]
impl SideEffect for AcceptAppointment {
    fn name(&self) -> &'static str {
        "accept_appointment"
    }

    async fn run(&self, document: &Value) -> Result<(), HookError> {
        let Some(appointment_id) = document.get("appointment").and_then(Value::as_str) else {
            return Ok(());
        };

        let mut fields = Map::new();
        fields.insert("status".to_string(), json!("accepted"));
        fields.insert("updatedAt".to_string(), json!(timestamp()));
        let target = FilterPredicate::id(appointment_id);
        self.store
            .set_fields(Appointment::COLLECTION, &target, fields)
            .await?;

        let client = self
            .store
            .find_one(Appointment::COLLECTION, &target)
            .await?
            .and_then(|appointment| appointment.get("client").and_then(Value::as_str).map(str::to_string));
        let Some(client) = client else {
            return Ok(());
        };

        let data = json!({
            "message": {
                "fr": "L'employé a accepté votre rendez-vous et a créé un contrat",
                "ar": "قبل الحرفي موعدك وأنشأ عقدًا",
            },
            "contract_id": document_id(document),
            "appointment_id": appointment_id,
        });
        notify(&self.store, NotificationKind::Contract, &client, data)
            .await
            .map(|_| ())
            .map_err(|e| hook_failed(self.name(), e))
    }
}

/// Tells one party of a contract that the other changed it
struct NotifyParty {
    store: Arc<dyn DocumentStore>,
    party: ContractField,
    message: (&'static str, &'static str),
}

#[async_trait]
impl SideEffect for NotifyParty {
    fn name(&self) -> &'static str {
        "notify_contract_party"
    }

    async fn run(&self, document: &Value) -> Result<(), HookError> {
        let Some(party) = document.get(self.party.as_str()).and_then(Value::as_str) else {
            return Ok(());
        };
        let (fr, ar) = self.message;
        let data = json!({
            "message": {"fr": fr, "ar": ar},
            "contract_id": document_id(document),
        });
        notify(&self.store, NotificationKind::Contract, party, data)
            .await
            .map(|_| ())
            .map_err(|e| hook_failed(self.name(), e))
    }
}

fn view() -> SharedProjector {
    StandardView::new().name_of("service").shared()
}

pub fn descriptor(store: Arc<dyn DocumentStore>) -> ResourceDescriptor<Contract> {
    ResourceDescriptor::new()
        .write_policy(WritePolicy::deny(&[ContractField::Status, ContractField::AcceptedAt]))
        .search(&["summary", "workType", "status"])
        .populate(PopulateSpec::reference("service", "services").select(&["name"]))
        .projector(view())
        .after_create(Arc::new(AcceptAppointment { store }))
}

/// Revisions by the employee, who may not move the contract between parties
pub fn revisions(store: Arc<dyn DocumentStore>) -> ResourceDescriptor<Contract> {
    ResourceDescriptor::new()
        .write_policy(WritePolicy::deny(&[
            ContractField::Status,
            ContractField::AcceptedAt,
            ContractField::Employee,
            ContractField::Client,
            ContractField::Appointment,
        ]))
        .populate(PopulateSpec::reference("service", "services").select(&["name"]))
        .projector(view())
        .after_update(Arc::new(NotifyParty {
            store,
            party: ContractField::Client,
            message: (
                "Votre contrat a été modifié par l'employé",
                "قام الحرفي بتعديل عقدك",
            ),
        }))
}

/// Acceptance by the client: nothing in the body is writable
pub fn acceptance(store: Arc<dyn DocumentStore>) -> ResourceDescriptor<Contract> {
    ResourceDescriptor::new()
        .write_policy(WritePolicy::allow(&[]))
        .populate(PopulateSpec::reference("service", "services").select(&["name"]))
        .projector(view())
        .after_update(Arc::new(NotifyParty {
            store,
            party: ContractField::Employee,
            message: ("Le client a accepté votre contrat", "قبل الزبون عقدك"),
        }))
}

pub struct ContractRoutes;

#[async_trait]
impl ResourceRoutes for ContractRoutes {
    fn resource_name(&self) -> &str {
        Contract::NAME
    }

    fn plural(&self) -> &str {
        Contract::COLLECTION
    }

    fn build_routes(&self, state: &AppState) -> Router {
        let handlers = state.handlers(descriptor(state.store.clone()));

        let employee = Router::new()
            .route("/", handlers.bound(CallerBinding::BodyByKind).create_one())
            .route(
                "/update/{id}",
                state
                    .handlers(revisions(state.store.clone()))
                    .bound(CallerBinding::Query("employee"))
                    .update_one(),
            );

        let client = Router::new().route(
            "/accept/{id}",
            state
                .handlers(acceptance(state.store.clone()))
                .scoped(Scope::new().assign("status", "accepted"))
                .bound(CallerBinding::Query("client"))
                .update_one(),
        );

        let mine = Router::new().route(
            "/my-contracts",
            handlers.bound(CallerBinding::QueryByKind).get_all(),
        );

        let admin = Router::new().route("/", handlers.get_all()).route(
            "/{id}",
            handlers
                .get_one()
                .merge(handlers.update_one())
                .merge(handlers.delete_one()),
        );

        Router::new()
            .merge(guarded(employee, employees()))
            .merge(guarded(client, clients()))
            .merge(guarded(mine, end_users()))
            .merge(guarded(admin, AuthPolicy::AdminOnly))
    }
}
