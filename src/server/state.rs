//! Shared state handed to every resource when its routes are built

use crate::config::AppConfig;
use crate::core::resource::{Resource, ResourceDescriptor};
use crate::core::{DocumentStore, ResourceFactory};
use crate::server::handlers::Handlers;
use std::sync::Arc;

/// Store and configuration of a running server
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: AppConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    /// Factory serving `R` over this state's store
    pub fn factory<R: Resource>(&self, descriptor: ResourceDescriptor<R>) -> ResourceFactory<R> {
        ResourceFactory::new(self.store.clone(), descriptor)
    }

    /// Handler builder for `R`, using the configured pagination
    pub fn handlers<R: Resource>(&self, descriptor: ResourceDescriptor<R>) -> Handlers<R> {
        Handlers::new(self.factory(descriptor), self.config.pagination.clone())
    }
}
