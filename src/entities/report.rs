//! Abuse reports sent by visitors
//!
//! Anyone may file a report; only administrators read them, and only they
//! decide whether a report has been `reviewed`.

use super::admin_panel;
use crate::core::auth::AuthPolicy;
use crate::core::error::ApiResult;
use crate::core::resource::{Resource, ResourceDescriptor, WritePhase, WritePolicy};
use crate::resource_fields;
use crate::server::{AppState, ResourceRoutes, guard, guarded};
use async_trait::async_trait;
use axum::Router;
use serde::{Deserialize, Serialize};
use validator::Validate;

resource_fields! {
    pub enum ReportField {
        Email => "email",
        Kind => "type",
        Description => "description",
        Reviewed => "reviewed",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    Duplicate,
    Scam,
    WrongCategory,
    BadImage,
    WrongNumber,
    #[default]
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Report {
    #[validate(email(message = "email must be a valid address"))]
    pub email: String,

    #[serde(rename = "type", default)]
    pub kind: ReportKind,

    #[serde(default)]
    #[validate(length(max = 2000, message = "description is too long"))]
    pub description: Option<String>,

    #[serde(default)]
    pub reviewed: bool,
}

impl Resource for Report {
    type Field = ReportField;

    const NAME: &'static str = "report";
    const COLLECTION: &'static str = "reports";

    fn prepare(&mut self, _phase: WritePhase) {
        self.email = self.email.trim().to_lowercase();
    }
}

pub fn descriptor() -> ResourceDescriptor<Report> {
    ResourceDescriptor::new()
        .write_policy(WritePolicy::deny(&[ReportField::Reviewed]))
        .search(&["description"])
        .unique("email")
}

pub struct ReportRoutes;

#[async_trait]
impl ResourceRoutes for ReportRoutes {
    fn resource_name(&self) -> &str {
        Report::NAME
    }

    fn plural(&self) -> &str {
        Report::COLLECTION
    }

    fn build_routes(&self, state: &AppState) -> Router {
        let handlers = state.handlers(descriptor());

        let admin = Router::new().route(
            "/{id}",
            handlers
                .get_one()
                .merge(handlers.update_one())
                .merge(handlers.delete_one()),
        );

        Router::new()
            .route(
                "/",
                handlers
                    .create_one()
                    .merge(guard(handlers.get_all(), AuthPolicy::AdminOnly)),
            )
            .merge(guarded(admin, admin_panel()))
    }

    async fn ensure_indexes(&self, state: &AppState) -> ApiResult<()> {
        state.factory(descriptor()).ensure_indexes().await
    }
}
