//! Notifications addressed to marketplace users
//!
//! Other resources create notifications through [`notify`]; users list their
//! own with `GET /notifications/mine` and mark them all read with
//! `PATCH /notifications/read`. Administrators get plain CRUD.

use super::{admin_panel, end_users};
use crate::core::context::{CallerBinding, RequestContext};
use crate::core::error::ApiResult;
use crate::core::factory::{Envelope, Reply, ResourceFactory, timestamp};
use crate::core::filter::{FilterPredicate, Scalar};
use crate::core::projection::{StandardView, View, ViewProjector};
use crate::core::resource::{Resource, ResourceDescriptor, ResourceField};
use crate::core::store::DocumentStore;
use crate::resource_fields;
use crate::server::{AppState, ResourceRoutes, guarded};
use axum::Router;
use axum::routing::{MethodRouter, patch};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use validator::Validate;

resource_fields! {
    pub enum NotificationField {
        Kind => "type",
        Notifiable => "notifiable",
        Data => "data",
        ReadAt => "readAt",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Welcome,
    Appointment,
    Review,
    Contract,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: NotificationKind,

    /// Id of the user the notification is for
    #[validate(length(min = 1, message = "notifiable is required"))]
    pub notifiable: String,

    /// Free-form payload, usually `image` and a bilingual `message`
    #[serde(default)]
    pub data: Value,

    #[serde(default)]
    pub read_at: Option<String>,
}

impl Resource for Notification {
    type Field = NotificationField;

    const NAME: &'static str = "notification";
    const COLLECTION: &'static str = "notifications";
}

/// Localized message plus the derived `read` flag
fn project(document: &Value, view: &View) -> Value {
    let mut out = StandardView::new()
        .localized("data.message")
        .project(document, view);

    let read = out.get("readAt").is_some_and(|at| !at.is_null());
    if let Value::Object(map) = &mut out {
        map.insert("read".to_string(), Value::Bool(read));
    }
    out
}

pub fn descriptor() -> ResourceDescriptor<Notification> {
    ResourceDescriptor::new().projector(Arc::new(project))
}

/// Store an unread notification for a user
pub async fn notify(
    store: &Arc<dyn DocumentStore>,
    kind: NotificationKind,
    notifiable: &str,
    data: Value,
) -> ApiResult<Value> {
    tracing::debug!(?kind, notifiable, "notifying user");

    ResourceFactory::new(store.clone(), descriptor())
        .insert(Notification {
            kind,
            notifiable: notifiable.to_string(),
            data,
            read_at: None,
        })
        .await
}

/// Mark every unread notification of the caller as read
pub async fn mark_all_read(store: &dyn DocumentStore, context: &RequestContext) -> ApiResult<Reply> {
    let (user_id, _) = CallerBinding::caller(&context.auth)?;

    let unread = FilterPredicate::eq(NotificationField::Notifiable.as_str(), user_id)
        .and(FilterPredicate::eq(NotificationField::ReadAt.as_str(), Scalar::Null));
    let mut fields = Map::new();
    fields.insert(
        NotificationField::ReadAt.as_str().to_string(),
        Value::String(timestamp()),
    );

    let count = store
        .set_fields(Notification::COLLECTION, &unread, fields)
        .await?;
    tracing::debug!(user_id, count, "notifications marked read");

    Ok(Reply::ok(Envelope::data(json!({}))))
}

fn read_route(store: Arc<dyn DocumentStore>) -> MethodRouter {
    patch(move |context: RequestContext| {
        let store = store.clone();
        async move {
            mark_all_read(store.as_ref(), &context)
                .await
                .map_err(|e| context.localize(e))
        }
    })
}

pub struct NotificationRoutes;

impl ResourceRoutes for NotificationRoutes {
    fn resource_name(&self) -> &str {
        Notification::NAME
    }

    fn plural(&self) -> &str {
        Notification::COLLECTION
    }

    fn build_routes(&self, state: &AppState) -> Router {
        let handlers = state.handlers(descriptor());

        let mine = Router::new()
            .route(
                "/mine",
                handlers.bound(CallerBinding::Query("notifiable")).get_all(),
            )
            .route("/read", read_route(state.store.clone()));

        let admin = Router::new()
            .route("/", handlers.get_all().merge(handlers.create_one()))
            .route(
                "/{id}",
                handlers
                    .get_one()
                    .merge(handlers.update_one())
                    .merge(handlers.delete_one()),
            );

        guarded(mine, end_users()).merge(guarded(admin, admin_panel()))
    }
}
