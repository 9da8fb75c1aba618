//! HTTP front of the showroom saga orchestrator.
//!
//! Exposes the sale and replenishment flows as JSON-RPC methods on
//! `POST /rpc`, with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::{Collaborators, ReplenishmentOrchestrator, SagaConfig, SaleOrchestrator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared application state accessible from all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub sale: SaleOrchestrator,
    pub replenishment: ReplenishmentOrchestrator,
}

impl AppState {
    pub fn new(collaborators: Collaborators, config: SagaConfig) -> Self {
        Self {
            sale: SaleOrchestrator::new(collaborators.clone(), config.clone()),
            replenishment: ReplenishmentOrchestrator::new(collaborators, config),
        }
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/rpc", post(routes::jsonrpc::handle))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state wired to the configured remote collaborators.
pub fn create_default_state(config: &Config) -> Result<Arc<AppState>, rpc::RpcError> {
    let collaborators = Collaborators::over_rpc(&config.endpoints, config.timeouts)?;
    Ok(Arc::new(AppState::new(collaborators, config.saga.clone())))
}
