use std::sync::Arc;

use crate::events::EventBus;
use crate::generation::generator::Pipeline;
use crate::render::TypesetCompiler;
use crate::store::{DocumentStore, SettingsStore};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Used directly by the standalone compile endpoint.
    pub compiler: TypesetCompiler,
    pub documents: DocumentStore,
    pub settings: Arc<dyn SettingsStore>,
    pub events: EventBus,
}
