//! Services (trades) employees offer
//!
//! Shaped like cities, plus an image. Deleting a service also deletes its
//! image from the [`AssetStore`].

use super::admin_panel;
use crate::core::document::document_id;
use crate::core::error::{ApiResult, HookError};
use crate::core::hooks::Cleanup;
use crate::core::locale::Localized;
use crate::core::projection::StandardView;
use crate::core::resource::{Resource, ResourceDescriptor, WritePhase, slugify};
use crate::resource_fields;
use crate::server::{AppState, ResourceRoutes, guard, guarded};
use async_trait::async_trait;
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use validator::Validate;

resource_fields! {
    pub enum ServiceField {
        Key => "key",
        Name => "name",
        Image => "image",
        IsActive => "isActive",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(default)]
    pub key: Localized,

    #[validate(nested)]
    pub name: Localized,

    #[serde(default)]
    pub image: Option<String>,

    #[serde(default = "active")]
    pub is_active: bool,
}

fn active() -> bool {
    true
}

impl Resource for Service {
    type Field = ServiceField;

    const NAME: &'static str = "service";
    const COLLECTION: &'static str = "services";

    fn new_id(&self) -> String {
        slugify(&self.name.fr, '_')
    }

    fn prepare(&mut self, _phase: WritePhase) {
        self.key = Localized::new(slugify(&self.name.fr, '_'), slugify(&self.name.ar, '_'));
    }
}

/// Object storage holding uploaded images
#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}

/// Asset store for deployments without object storage
pub struct NoopAssetStore;

#[async_trait]
impl AssetStore for NoopAssetStore {
    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        tracing::info!(key, "no asset store configured, skipping delete");
        Ok(())
    }
}

/// Removes `services/{id}` once the service is gone
struct DeleteImage {
    assets: Arc<dyn AssetStore>,
}

#[async_trait]
impl Cleanup for DeleteImage {
    fn name(&self) -> &'static str {
        "delete_service_image"
    }

    async fn run(&self, document: &Value) -> Result<(), HookError> {
        let Some(id) = document_id(document) else {
            return Ok(());
        };

        self.assets
            .delete(&format!("services/{}", id))
            .await
            .map_err(|e| HookError::Failed {
                hook: self.name().to_string(),
                message: e.to_string(),
            })
    }
}

pub fn descriptor(assets: Arc<dyn AssetStore>) -> ResourceDescriptor<Service> {
    ResourceDescriptor::new()
        .search(&["name.fr", "name.ar"])
        .user_filter("isActive", true)
        .projector(
            StandardView::new()
                .localized("name")
                .localized("key")
                .public_fields(&["id", "name", "image"])
                .shared(),
        )
        .on_delete(Arc::new(DeleteImage { assets }))
        .unique("name.ar")
}

pub struct ServiceRoutes {
    assets: Arc<dyn AssetStore>,
}

impl ServiceRoutes {
    pub fn new(assets: Arc<dyn AssetStore>) -> Self {
        Self { assets }
    }
}

impl Default for ServiceRoutes {
    fn default() -> Self {
        Self::new(Arc::new(NoopAssetStore))
    }
}

#[async_trait]
impl ResourceRoutes for ServiceRoutes {
    fn resource_name(&self) -> &str {
        Service::NAME
    }

    fn plural(&self) -> &str {
        Service::COLLECTION
    }

    fn build_routes(&self, state: &AppState) -> Router {
        let handlers = state.handlers(descriptor(self.assets.clone()));

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
                    .get_all()
                    .merge(guard(handlers.create_one(), admin_panel())),
            )
            .merge(guarded(admin, admin_panel()))
    }

    async fn ensure_indexes(&self, state: &AppState) -> ApiResult<()> {
        state
            .factory(descriptor(self.assets.clone()))
            .ensure_indexes()
            .await
    }
}
