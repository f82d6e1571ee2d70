use m3allem::config::AppConfig;
use m3allem::server::ServerBuilder;
use m3allem::storage;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "m3allem=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::var("M3ALLEM_CONFIG") {
        Ok(path) => {
            tracing::info!(path, "loading configuration");
            AppConfig::from_yaml_file(&path)?
        }
        Err(_) => AppConfig::default(),
    };

    let store = storage::from_config(&config.storage).await?;
    tracing::info!(backend = store.backend_name(), "document store ready");

    ServerBuilder::new(config)
        .with_store(store)
        .register_marketplace()
        .serve()
        .await
}
