//! mapsyncd library
//!
//! HTTP surface over the mapsync core: the location list behind the
//! snapshot cache, the map page and a health endpoint.

use anyhow::Context;
use axum::Router;
use mapsync_core::config::MapConfig;
use mapsync_core::engine::SyncEvent;
use mapsync_core::{CacheGate, MapSyncConfig, SourceRegistry, SyncEngine};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod page;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Snapshot cache in front of the sync engine
    pub gate: Arc<CacheGate>,
    /// Map page, rendered once at startup
    pub index_html: Arc<str>,
}

impl AppState {
    /// Create new application state
    pub fn new(gate: CacheGate, map: &MapConfig) -> Self {
        Self {
            gate: Arc::new(gate),
            index_html: Arc::from(page::render_index(map)),
        }
    }
}

/// Wire store, sources, engine and cache gate from configuration
///
/// Returns the state and the engine's event receiver.
pub async fn build_state(
    config: &MapSyncConfig,
    registry: &SourceRegistry,
) -> anyhow::Result<(AppState, mpsc::Receiver<SyncEvent>)> {
    let store = registry
        .create_store(&config.store)
        .await
        .with_context(|| format!("Failed to open {} store", config.store.type_name()))?;

    let sources = registry
        .create_sources(&config.sources)
        .context("Failed to create source clients")?;

    let (engine, events) = SyncEngine::new(sources, store, config)?;
    let gate = CacheGate::new(engine, config.cache.ttl(), config.engine.request_timeout());

    Ok((AppState::new(gate, &config.map), events))
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route("/", get(api::serve_index))
        .route("/api/locations", get(api::get_locations))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
