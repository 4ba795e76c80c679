// Hotel booking assistant server
// config -> logging -> inventory pipeline -> model client -> scheduler -> HTTP

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{info, warn};

use hotel_booking_assistant::{
    create_router, init_logging, spawn_daily_refresh, AppConfig, AppState,
    ConversationOrchestrator, DataStore, GeminiClient, HttpInventorySource, InventoryEngine,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    init_logging(&config.logging).map_err(|e| anyhow!("failed to initialise logging: {e}"))?;

    let source = Arc::new(HttpInventorySource::new(&config.source)?);
    let store = DataStore::new(source, config.store.clone());
    let inventory = Arc::new(InventoryEngine::new(store, config.inventory.clone()));

    // Warm the snapshot; a failure here is retried lazily on the first request
    match inventory.initialize().await {
        Ok(loaded) => info!(
            provenance = %loaded.provenance,
            hotel = %loaded.snapshot.name,
            "Hotel data ready"
        ),
        Err(e) => warn!(kind = e.kind(), error = %e, "Hotel data not available at startup"),
    }

    let model = Arc::new(GeminiClient::new(&config.model)?);
    let orchestrator = Arc::new(ConversationOrchestrator::new(inventory.clone(), model));

    let _refresh = spawn_daily_refresh(inventory, config.refresh_at);

    let address = config.server.listen_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    info!(address = %address, "Server running");
    info!("API endpoint: http://{address}/api/chat");
    info!("Health check: http://{address}/health");

    axum::serve(listener, create_router(AppState::new(orchestrator)))
        .await
        .context("server terminated unexpectedly")?;

    Ok(())
}
