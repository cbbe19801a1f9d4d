//! HTTP and WebSocket surface

pub mod handlers;
pub mod ws;

use crate::generator::TransactionGenerator;
use crate::pipeline::Pipeline;
use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Pipeline,
    pub generator: Arc<Mutex<TransactionGenerator>>,
}

impl AppState {
    pub fn new(pipeline: Pipeline, generator: TransactionGenerator) -> Self {
        Self {
            pipeline,
            generator: Arc::new(Mutex::new(generator)),
        }
    }
}

/// Create the main router with all routes
pub fn create_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/api/status", get(handlers::status))
        .route(
            "/api/transactions/analyze",
            post(handlers::analyze_transaction),
        )
        .route("/api/alerts", get(handlers::list_alerts))
        .route(
            "/api/alerts/:alert_id/respond",
            post(handlers::respond_to_alert),
        )
        .route("/api/cases/investigate", post(handlers::investigate_case))
        .route("/api/analytics/dashboard", get(handlers::dashboard))
        .route(
            "/api/test/generate-transaction",
            post(handlers::generate_transaction),
        )
        .route("/ws", get(ws::websocket_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(parsed)
}
