//! Voice canvas relay server.
//!
//! Run with: cargo run -p voice-canvas-server -- --config voice-canvas.toml
//!
//! Serves the HTTP API on `PORT` and the WebSocket hub on `WS_PORT`.

mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voice_canvas_core::{TranslationGateway, TreeSource};
use voice_canvas_gateway::{FigmaClient, GeminiConfig, GeminiGateway};
use voice_canvas_transport::{
    Hub, HubConfig, http::create_api_router, websocket::create_ws_router,
};

use crate::config::Settings;

#[derive(Parser, Debug)]
#[command(name = "voice-canvas-server", version, about = "Voice canvas relay server")]
struct Args {
    /// Settings file (defaults to ./voice-canvas.toml when present)
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    tracing::info!("Validating configuration...");
    let mut settings = Settings::load(args.config.as_deref())?;
    settings.apply_env(|key| std::env::var(key).ok());
    settings.validate()?;

    let figma = Arc::new(FigmaClient::new(
        settings.figma_access_token.clone(),
        settings.figma_file_key.clone(),
    ));
    let gemini: Arc<dyn TranslationGateway> = Arc::new(GeminiGateway::new(
        GeminiConfig::new(settings.gemini_api_key.clone())
            .with_model(settings.gemini_model.clone()),
    ));
    let tree: Arc<dyn TreeSource> = figma.clone();

    let hub = Arc::new(Hub::new(
        gemini,
        Some(tree),
        HubConfig {
            translation_timeout: settings.translation_timeout(),
            ..HubConfig::default()
        },
    ));

    let api_listener = TcpListener::bind(settings.http_addr())
        .await
        .with_context(|| format!("failed to bind HTTP API on {}", settings.http_addr()))?;
    let ws_listener = TcpListener::bind(settings.ws_addr())
        .await
        .with_context(|| format!("failed to bind WebSocket server on {}", settings.ws_addr()))?;
    tracing::info!("HTTP server listening on http://{}", api_listener.local_addr()?);
    tracing::info!("WebSocket server listening on ws://{}", ws_listener.local_addr()?);

    let api = {
        let hub = Arc::clone(&hub);
        let app = create_api_router(Arc::clone(&hub));
        tokio::spawn(async move {
            axum::serve(api_listener, app)
                .with_graceful_shutdown(async move { hub.closed().await })
                .await
        })
    };
    let ws = {
        let hub = Arc::clone(&hub);
        let app = create_ws_router(Arc::clone(&hub));
        tokio::spawn(async move {
            axum::serve(ws_listener, app)
                .with_graceful_shutdown(async move { hub.closed().await })
                .await
        })
    };

    tracing::info!("Testing Figma API connection...");
    match figma.file_metadata().await {
        Ok(metadata) => tracing::info!(
            file = %metadata.name,
            nodes = metadata.node_count,
            "Successfully connected to Figma"
        ),
        Err(e) => tracing::warn!(
            "Failed to connect to Figma: {e}. Please check FIGMA_ACCESS_TOKEN and FIGMA_FILE_KEY"
        ),
    }

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutting down gracefully...");
    hub.close();

    for (name, server) in [("HTTP", api), ("WebSocket", ws)] {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("{name} server error: {e}"),
            Err(e) => tracing::error!("{name} server task failed: {e}"),
        }
    }
    Ok(())
}
