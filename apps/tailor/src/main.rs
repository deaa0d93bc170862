mod clock;
mod config;
mod errors;
mod events;
mod generation;
mod llm_client;
mod models;
mod render;
mod routes;
mod state;
mod store;
#[cfg(test)]
mod testing;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::clock::SystemClock;
use crate::config::Config;
use crate::events::EventBus;
use crate::generation::generator::{Pipeline, PipelineParts};
use crate::llm_client::{GenerationClient, HttpTransport};
use crate::render::{PdfLatexEngine, TypesetCompiler};
use crate::routes::{build_router, cors_layer};
use crate::state::AppState;
use crate::store::{DocumentStore, JsonFileStore, SettingsStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Tailor API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize settings store
    let settings: Arc<dyn SettingsStore> =
        Arc::new(JsonFileStore::open(config.settings_path()).await?);
    info!("Settings loaded from {}", config.settings_path().display());
    seed_api_key(settings.as_ref(), &config).await?;

    tokio::fs::create_dir_all(&config.output_dir).await?;
    tokio::fs::create_dir_all(config.debug_dir()).await?;

    // Initialize generation client and typesetting engine
    let client = GenerationClient::new(Arc::new(HttpTransport::new(
        config.generation_api_base.clone(),
    )));
    let engine = Arc::new(PdfLatexEngine::new(
        config.latex_program.clone(),
        config.latex_passes,
    ));
    info!(
        "Typesetting with {} ({} pass(es))",
        config.latex_program, config.latex_passes
    );
    let compiler = TypesetCompiler::new(engine, config.debug_dir());

    let documents = DocumentStore::new(settings.clone());
    let events = EventBus::new();

    let pipeline = Arc::new(Pipeline::new(PipelineParts {
        client,
        compiler: compiler.clone(),
        documents: documents.clone(),
        settings: settings.clone(),
        events: events.clone(),
        clock: Arc::new(SystemClock),
        output_dir: config.output_dir.clone(),
    }));

    // Build app state
    let state = AppState {
        pipeline,
        compiler,
        documents,
        settings,
        events,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins)?);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("HOST '{}' is not an IP address", config.host))?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Copies `GENERATION_API_KEY` into the store when the stored key is empty.
async fn seed_api_key(settings: &dyn SettingsStore, config: &Config) -> Result<()> {
    let Some(key) = &config.generation_api_key else {
        return Ok(());
    };
    if store::get_string(settings, store::API_KEY).await?.is_empty() {
        settings.set(store::API_KEY, json!(key)).await?;
        info!("API key seeded from GENERATION_API_KEY");
    } else {
        warn!("GENERATION_API_KEY ignored; a stored API key already exists");
    }
    Ok(())
}
