//! ServerBuilder for fluent API to build HTTP servers

use super::guard::{Authenticator, authenticate};
use super::registry::{ResourceRegistry, ResourceRoutes};
use super::state::AppState;
use crate::config::AppConfig;
use crate::core::auth::AuthProvider;
use crate::core::context::RequestContext;
use crate::core::error::{LocalizedError, RequestError};
use crate::core::store::DocumentStore;
use crate::storage::InMemoryDocumentStore;
use anyhow::Result;
use axum::http::Uri;
use axum::middleware;
use axum::{Json, Router, routing::get};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Builder for the marketplace HTTP server
///
/// # Example
///
/// ```ignore
/// ServerBuilder::new(config)
///     .with_store(store)
///     .register_marketplace()
///     .serve()
///     .await?;
/// ```
pub struct ServerBuilder {
    config: AppConfig,
    store: Option<Arc<dyn DocumentStore>>,
    auth_provider: Option<Arc<dyn AuthProvider>>,
    registry: ResourceRegistry,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            store: None,
            auth_provider: None,
            registry: ResourceRegistry::new(),
            custom_routes: Vec::new(),
        }
    }

    /// Set the document store (in-memory when unset)
    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the auth provider
    ///
    /// Defaults to the bearer tokens listed in the configuration.
    pub fn with_auth_provider(mut self, provider: Arc<dyn AuthProvider>) -> Self {
        self.auth_provider = Some(provider);
        self
    }

    /// Add custom routes to the server
    ///
    /// Use this for endpoints outside the resource factory, such as login
    /// or webhooks. They go through the same authentication middleware.
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Register one resource
    pub fn register(mut self, resource: Box<dyn ResourceRoutes>) -> Self {
        self.registry.register(resource);
        self
    }

    /// Register every marketplace resource
    pub fn register_marketplace(self) -> Self {
        crate::entities::all()
            .into_iter()
            .fold(self, |builder, resource| builder.register(resource))
    }

    /// Build the final router
    ///
    /// Creates the store indexes the resources declare, then assembles:
    /// - health routes
    /// - resource routes under `/api/{plural}`
    /// - custom routes
    /// - a localized 404 for everything else
    pub async fn build(self) -> Result<Router> {
        let ServerBuilder {
            config,
            store,
            auth_provider,
            registry,
            custom_routes,
        } = self;

        let store = store.unwrap_or_else(|| Arc::new(InMemoryDocumentStore::new()));
        let provider = auth_provider.unwrap_or_else(|| Arc::new(config.auth.provider()));
        let authenticator = Authenticator::new(provider, config.locale.default_language);

        tracing::info!(
            backend = store.backend_name(),
            resources = ?registry.resource_names(),
            "building server"
        );

        let state = AppState::new(store, config);
        registry.ensure_indexes(&state).await?;

        let mut app = health_routes().merge(registry.build_routes(&state));
        for custom_router in custom_routes {
            app = app.merge(custom_router);
        }

        Ok(app
            .fallback(route_not_found)
            .layer(middleware::from_fn_with_state(authenticator, authenticate))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()))
    }

    /// Serve the application with graceful shutdown
    ///
    /// Binds to the configured address and handles SIGTERM and SIGINT
    /// (Ctrl+C) for graceful shutdown.
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.server.address();
        let app = self.build().await?;
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "m3allem"
    }))
}

async fn route_not_found(context: RequestContext, uri: Uri) -> LocalizedError {
    context.localize(RequestError::RouteNotFound {
        path: uri.path().to_string(),
    })
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = ServerBuilder::new(AppConfig::default());
        assert!(builder.store.is_none());
        assert!(builder.auth_provider.is_none());
        assert!(builder.registry.resource_names().is_empty());
        assert!(builder.custom_routes.is_empty());
    }

    #[test]
    fn test_with_custom_routes_appends_router() {
        let builder = ServerBuilder::default()
            .with_custom_routes(Router::new())
            .with_custom_routes(Router::new());
        assert_eq!(builder.custom_routes.len(), 2);
    }

    #[test]
    fn test_register_marketplace() {
        let builder = ServerBuilder::default().register_marketplace();
        let names = builder.registry.resource_names();
        for name in ["city", "service", "user", "employee", "appointment", "contract", "review", "page", "report", "contact", "setting"] {
            assert!(names.contains(&name), "missing {}", name);
        }
    }

    #[tokio::test]
    async fn test_build_produces_router() {
        let custom = Router::new().route("/custom", get(|| async { "ok" }));
        let router = ServerBuilder::default()
            .with_custom_routes(custom)
            .register_marketplace()
            .build()
            .await;
        assert!(router.is_ok());
    }
}
