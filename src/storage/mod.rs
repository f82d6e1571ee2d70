//! Document store backends

pub mod in_memory;
#[cfg(feature = "mongodb_backend")]
pub mod mongodb;

pub use in_memory::InMemoryDocumentStore;
#[cfg(feature = "mongodb_backend")]
pub use mongodb::MongoDocumentStore;

use crate::config::{StorageBackend, StorageConfig};
use crate::core::store::DocumentStore;
use std::sync::Arc;

/// Database used when the configuration names none
pub const DEFAULT_DATABASE: &str = "m3allem";

/// Open the store the configuration asks for
pub async fn from_config(config: &StorageConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.backend {
        StorageBackend::InMemory => Ok(Arc::new(InMemoryDocumentStore::new())),

        #[cfg(feature = "mongodb_backend")]
        StorageBackend::Mongodb => {
            let uri = config
                .uri
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("storage.uri is required for the mongodb backend"))?;
            let database = config.database.as_deref().unwrap_or(DEFAULT_DATABASE);
            let store = MongoDocumentStore::connect(uri, database).await?;
            tracing::info!(database, "connected to MongoDB");
            Ok(Arc::new(store))
        }

        #[cfg(not(feature = "mongodb_backend"))]
        StorageBackend::Mongodb => {
            anyhow::bail!("the mongodb backend requires the `mongodb_backend` feature")
        }
    }
}
