//! Route configuration for the gateway.

use std::sync::Arc;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::GatewayConfig;
use crate::handlers::{finish_incidents, health_check, receive_webhook, record_incidents};
use crate::state::GatewayState;

/// Create the gateway router.
pub fn create_router(state: Arc<GatewayState>) -> Router {
    let cors = build_cors_layer(state.config());

    Router::new()
        // Alertmanager webhook receiver
        .route("/webhook", post(receive_webhook))
        // Incident intake
        .route("/alerts", post(record_incidents).delete(finish_incidents))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Any origin is allowed unless specific origins are configured.
fn build_cors_layer(config: &GatewayConfig) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if config.cors_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(origins)
}
