//! Resource registry: one entry per resource, each building its own routes

use crate::core::error::ApiResult;
use crate::server::state::AppState;
use async_trait::async_trait;
use axum::Router;
use indexmap::IndexMap;

/// How a resource exposes itself over HTTP
///
/// Each resource (city, appointment, review, ...) implements this trait and
/// builds its routes relative to its own mount point, `/api/{plural}`.
#[async_trait]
pub trait ResourceRoutes: Send + Sync {
    /// Singular name (e.g. "city")
    fn resource_name(&self) -> &str;

    /// Plural form, used as the mount point (e.g. "cities")
    fn plural(&self) -> &str;

    /// Build the routes of this resource
    ///
    /// Paths are relative: `/` for the collection, `/{id}` for one document.
    fn build_routes(&self, state: &AppState) -> Router;

    /// Declare the store indexes the resource relies on
    async fn ensure_indexes(&self, _state: &AppState) -> ApiResult<()> {
        Ok(())
    }
}

/// Registry of every resource served by the application
///
/// Resources keep their registration order, so route building and index
/// creation are deterministic.
#[derive(Default)]
pub struct ResourceRegistry {
    resources: IndexMap<String, Box<dyn ResourceRoutes>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource
    ///
    /// The singular name is the key; registering it again replaces the entry.
    pub fn register(&mut self, resource: Box<dyn ResourceRoutes>) {
        let name = resource.resource_name().to_string();
        self.resources.insert(name, resource);
    }

    /// Build a router with every resource mounted under `/api/{plural}`
    pub fn build_routes(&self, state: &AppState) -> Router {
        self.resources
            .values()
            .fold(Router::new(), |router, resource| {
                let mount = format!("/api/{}", resource.plural());
                tracing::debug!(resource = resource.resource_name(), %mount, "mounting routes");
                router.nest(&mount, resource.build_routes(state))
            })
    }

    /// Create the indexes of every resource
    pub async fn ensure_indexes(&self, state: &AppState) -> ApiResult<()> {
        for resource in self.resources.values() {
            resource.ensure_indexes(state).await?;
        }
        Ok(())
    }

    /// Names of all registered resources, in registration order
    pub fn resource_names(&self) -> Vec<&str> {
        self.resources.keys().map(|s| s.as_str()).collect()
    }
}
