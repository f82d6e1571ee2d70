//! HTTP server: routing, authentication and handler wiring
//!
//! - [`ServerBuilder`] assembles the application router
//! - [`ResourceRegistry`] mounts every resource under `/api/{plural}`
//! - [`Handlers`] turns factory operations into axum handlers
//! - [`guard`] holds the authentication middleware and route guards

pub mod builder;
pub mod guard;
pub mod handlers;
pub mod registry;
pub mod state;

pub use builder::ServerBuilder;
pub use guard::{guard, guarded};
pub use handlers::{BodyResolver, Handlers};
pub use registry::{ResourceRegistry, ResourceRoutes};
pub use state::AppState;
