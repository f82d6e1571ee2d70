//! # m3allem
//!
//! REST backend for a service marketplace where clients book tradespeople
//! (employees) through appointments, contracts and reviews.
//!
//! ## Features
//!
//! - **Resource factory**: `create_one`, `get_all`, `get_one`, `update_one`,
//!   `delete_one` and `get_all_aggregate`, configured per resource by a
//!   [`ResourceDescriptor`](core::resource::ResourceDescriptor)
//! - **Search and pagination**: query strings compile to store-agnostic filters
//! - **Write protection**: non-admin bodies are filtered through a closed field enum
//! - **Bilingual output**: French/Arabic documents collapse to the caller's language
//! - **Role-aware views**: administrators see raw documents, users a public shape
//! - **Pluggable storage**: in-memory by default, MongoDB behind `mongodb_backend`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use m3allem::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::from_yaml_file("config/m3allem.yaml")?;
//!     let store = m3allem::storage::from_config(&config.storage).await?;
//!
//!     ServerBuilder::new(config)
//!         .with_store(store)
//!         .register_marketplace()
//!         .serve()
//!         .await
//! }
//! ```

pub mod config;
pub mod core;
pub mod entities;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        auth::{AdminRole, AuthContext, AuthPolicy, AuthProvider, NoAuthProvider, StaticTokenProvider, UserKind},
        context::{CallerBinding, RequestContext, Scope},
        error::{ApiError, ApiResult},
        factory::{AggregatePlan, Lookup, Reply, ResourceFactory},
        filter::FilterPredicate,
        hooks::{Cleanup, SideEffect},
        locale::{Language, Localized},
        populate::PopulateSpec,
        projection::{StandardView, View, ViewProjector},
        query::QueryParams,
        resource::{Resource, ResourceDescriptor, ResourceField, WritePhase, WritePolicy},
        store::DocumentStore,
    };

    // === Macros ===
    pub use crate::resource_fields;

    // === Storage ===
    pub use crate::storage::InMemoryDocumentStore;
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoDocumentStore;

    // === Config ===
    pub use crate::config::AppConfig;

    // === Server ===
    pub use crate::server::{AppState, Handlers, ResourceRoutes, ServerBuilder, guard, guarded};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
}
