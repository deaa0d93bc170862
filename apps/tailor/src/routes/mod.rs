pub mod events;
pub mod health;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::generation::handlers as generation;
use crate::render::handlers as render;
use crate::state::AppState;
use crate::store::handlers as store;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Documents
        .route(
            "/api/v1/documents/generate",
            post(generation::handle_generate),
        )
        .route("/api/v1/documents", get(store::handle_list_documents))
        .route("/api/v1/keywords", get(generation::handle_get_keywords))
        .route(
            "/api/v1/templates/load",
            post(generation::handle_load_template),
        )
        // Passthroughs
        .route("/api/v1/generate/raw", post(generation::handle_generate_raw))
        .route("/api/v1/render/compile", post(render::handle_compile))
        // Settings
        .route(
            "/api/v1/settings/:key",
            get(store::handle_get_setting).put(store::handle_put_setting),
        )
        // Notifications
        .route("/api/v1/events/:topic", get(events::handle_events))
        .with_state(state)
}

/// CORS limited to the configured origins and the methods the API serves.
pub fn cors_layer(origins: &[String]) -> Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            anyhow::ensure!(origin != "*", "CORS origins must be listed explicitly");
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin '{origin}'"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]))
}
