//! Client profiles, one per client account

use super::user::User;
use crate::core::auth::AuthPolicy;
use crate::core::error::ApiResult;
use crate::core::populate::PopulateSpec;
use crate::core::projection::StandardView;
use crate::core::resource::{Resource, ResourceDescriptor, WritePolicy};
use crate::resource_fields;
use crate::server::{AppState, ResourceRoutes, guarded};
use async_trait::async_trait;
use axum::Router;
use serde::{Deserialize, Serialize};
use validator::Validate;

resource_fields! {
    pub enum ClientField {
        User => "user",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct Client {
    #[validate(length(min = 1, message = "user is required"))]
    pub user: String,
}

impl Resource for Client {
    type Field = ClientField;

    const NAME: &'static str = "client";
    const COLLECTION: &'static str = "clients";
}

pub fn descriptor() -> ResourceDescriptor<Client> {
    ResourceDescriptor::new()
        .write_policy(WritePolicy::deny(&[ClientField::User]))
        .search(&["user.name", "user.username"])
        .populate(
            PopulateSpec::reference("user", User::COLLECTION)
                .select(&["name", "username", "phone", "image", "status"]),
        )
        .projector(StandardView::new().shared())
        .unique("user")
}

pub struct ClientRoutes;

#[async_trait]
impl ResourceRoutes for ClientRoutes {
    fn resource_name(&self) -> &str {
        Client::NAME
    }

    fn plural(&self) -> &str {
        Client::COLLECTION
    }

    fn build_routes(&self, state: &AppState) -> Router {
        let handlers = state.handlers(descriptor());

        let admin = Router::new()
            .route("/", handlers.get_all())
            .route("/{id}", handlers.get_one());

        guarded(admin, AuthPolicy::AdminOnly)
    }

    async fn ensure_indexes(&self, state: &AppState) -> ApiResult<()> {
        state.factory(descriptor()).ensure_indexes().await
    }
}
