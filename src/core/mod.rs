//! Core module containing the resource factory and its building blocks

pub mod auth;
pub mod context;
pub mod document;
pub mod error;
pub mod factory;
pub mod filter;
pub mod hooks;
pub mod locale;
pub mod pipeline;
pub mod populate;
pub mod projection;
pub mod query;
pub mod resource;
pub mod store;

pub use auth::{AuthContext, AuthPolicy, AuthProvider, NoAuthProvider, StaticTokenProvider};
pub use context::{CallerBinding, JsonBody, RequestContext, Scope};
pub use error::{ApiError, ApiResult};
pub use factory::{AggregatePlan, Envelope, Lookup, Reply, ResourceFactory};
pub use filter::{FilterPredicate, Scalar};
pub use locale::{Language, Localized};
pub use projection::{StandardView, View, ViewProjector};
pub use query::{PaginationMeta, QueryParams};
pub use resource::{Resource, ResourceDescriptor, ResourceField, WritePhase, WritePolicy};
pub use store::{DocumentStore, StoreError};
