//! Health endpoint

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::core::StoreRegistry;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    stores: Vec<String>,
}

/// `GET /health`
pub fn health_routes(registry: Arc<StoreRegistry>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(registry)
}

async fn health_handler(State(registry): State<Arc<StoreRegistry>>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        stores: registry.names().map(str::to_string).collect(),
    };

    (StatusCode::OK, Json(response))
}
