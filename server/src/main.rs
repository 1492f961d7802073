//! Hookline Server - Main Entry Point
//!
//! Receives protocol events over HTTP and forwards them as webhooks.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use hookline_server::{
    api, config,
    payload::{LinkPreviewFetcher, MediaResolver, PayloadBuilder},
    pipeline::Pipeline,
    polls::PollStore,
    protocol::{ChatStorage, Detached, HttpBridge, ProtocolClient},
    receipts::ReceiptGate,
    router::EventRouter,
    webhooks::WebhookDispatcher,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hookline_server=debug,tower_http=info".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        device_id = %config.device_id,
        "Starting Hookline Server"
    );

    // Poll store (missing or corrupt file starts empty)
    let polls = Arc::new(PollStore::open(config.poll_store_path()).await);

    // Protocol collaborators
    let (client, storage): (Arc<dyn ProtocolClient>, Arc<dyn ChatStorage>) =
        match &config.protocol_api_url {
            Some(url) => {
                let bridge = Arc::new(HttpBridge::new(url).context("Failed to build protocol client")?);
                info!(url = %url, "Using protocol sidecar");
                let client: Arc<dyn ProtocolClient> = bridge.clone();
                let storage: Arc<dyn ChatStorage> = bridge;
                (client, storage)
            }
            None => {
                warn!("PROTOCOL_API_URL not set. Lookups and library vote decryption disabled.");
                let client: Arc<dyn ProtocolClient> = Arc::new(Detached);
                let storage: Arc<dyn ChatStorage> = Arc::new(Detached);
                (client, storage)
            }
        };

    let media = MediaResolver::new(
        client.clone(),
        config.auto_download_media,
        config.media_path.clone(),
    );
    info!(
        auto_download = media.auto_download(),
        path = %config.media_path.display(),
        "Media policy configured"
    );

    let previews = Some(LinkPreviewFetcher::new(config.link_preview_timeout));

    let builder = PayloadBuilder::new(client, storage, polls.clone(), media, previews);
    let receipts = Arc::new(ReceiptGate::new(config.read_receipt_cooldown));
    info!(cooldown_secs = receipts.cooldown().as_secs(), "Read receipt debounce configured");
    let router = EventRouter::new(builder, receipts, config.device_id.clone());

    let dispatcher = WebhookDispatcher::new(
        config.webhook_urls.clone(),
        config.webhook_secret.clone(),
        config.webhook_timeout,
    )
    .context("Failed to build webhook dispatcher")?;
    if dispatcher.destinations().is_empty() {
        warn!("WEBHOOK_URLS not set. Events will be processed but not delivered.");
    } else {
        info!(
            destinations = dispatcher.destinations().len(),
            signed = config.webhook_secret.is_some(),
            "Webhook destinations configured"
        );
    }

    let pipeline = Pipeline::new(router, dispatcher);

    // Build router
    let app = api::create_router(api::AppState::new(pipeline.clone(), polls));

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    // Drain in-flight events before exiting
    pipeline.shutdown().await;

    info!("Server shutdown complete");

    Ok(())
}
