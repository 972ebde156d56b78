//! Demo application served by the `x402-gate` binary.
//!
//! `/weather` and `/premium/*` are meant to be priced by the gate, `/health`
//! and `/` are free. Every unknown path or method answers 404.

use crate::facilitator::Facilitator;
use crate::gate::Gate;
use crate::server::PaymentLayer;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

/// Builds the demo router with `gate` applied in front of every route.
pub fn router<F: Facilitator + 'static>(gate: Gate<F>) -> Router {
    Router::new()
        .route("/", get(root_handler).fallback(not_found))
        .route("/weather", get(weather_handler).fallback(not_found))
        .route("/premium/*path", get(premium_handler).fallback(not_found))
        .route("/health", get(health_handler).fallback(not_found))
        .fallback(not_found)
        .layer(PaymentLayer::new(gate))
}

async fn weather_handler() -> impl IntoResponse {
    Json(json!({
        "location": "San Francisco",
        "temperature": 68,
        "conditions": "Sunny",
        "humidity": 65,
    }))
}

async fn premium_handler(Path(path): Path<String>) -> impl IntoResponse {
    Json(json!({
        "content": path,
        "tier": "premium",
    }))
}

/// Health check endpoint (no payment required).
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "protocol": "x402",
        "version": crate::types::X402_VERSION,
    }))
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({
        "message": "x402 gate demo",
        "endpoints": {
            "/weather": "Weather data (paid)",
            "/premium/*": "Premium content (paid)",
            "/health": "Health check (free)"
        },
    }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" })))
}
