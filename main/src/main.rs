use std::{sync::Arc, time::Duration};

use api_router::{api_routes, api_state::ApiState};
use axum::{extract::FromRef, Router};
use common::{
    storage::store::{FsIndexStore, IndexStore},
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config
    let config = get_config()?;

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    // Create embedding provider based on config
    let embedding_provider =
        Arc::new(EmbeddingProvider::from_config(&config, Some(openai_client.clone())).await?);
    info!(
        embedding_backend = embedding_provider.backend_label(),
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    let index_store: Arc<dyn IndexStore> =
        Arc::new(FsIndexStore::new(&config.vector_store_path).await?);
    info!(root = %config.vector_store_path, "Vector index store ready");

    spawn_retention_sweep(index_store.clone(), config.index_retention_hours);

    let api_state = ApiState::new(&config, embedding_provider, openai_client, index_store).await?;

    // Create Axum router
    let app = Router::new()
        .merge(api_routes(&api_state))
        .with_state(AppState { api_state });

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let serve_address = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(serve_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Deletes session indexes older than the configured retention window on a
/// fixed cadence. Sweep failures are logged and never stop the server.
fn spawn_retention_sweep(store: Arc<dyn IndexStore>, retention_hours: u64) {
    if retention_hours == 0 {
        warn!("Index retention disabled; session indexes grow until removed externally");
        return;
    }

    let max_age = Duration::from_secs(retention_hours * 60 * 60);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RETENTION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match store.evict_older_than(max_age).await {
                Ok(0) => {}
                Ok(removed) => info!(removed, "evicted stale session indexes"),
                Err(err) => error!(error = %err, "retention sweep failed"),
            }
        }
    });
}

#[derive(Clone, FromRef)]
struct AppState {
    api_state: ApiState,
}
