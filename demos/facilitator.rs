//! Mock x402 facilitator for local runs.
//!
//! Accepts a proof when it is Base64 JSON of the form
//! `{"payer": "0x...", "amount": "1000"}` and the amount covers
//! `maxAmountRequired`. Anything that does not decode gets a 400.
//! `/verify` only reports validity; `/settle` issues the receipt, with a
//! made-up transaction hash. Nothing touches a chain.
//!
//! Run with:
//! ```bash
//! cargo run --example facilitator
//! ```
//!
//! Environment variables:
//! - PORT: Server port (default: 8080)

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ethers::types::U256;
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use x402_gate::types::VerificationRequest;

#[derive(Default)]
struct AppState {
    settled: AtomicU64,
}

#[derive(Deserialize)]
struct DemoProof {
    payer: String,
    amount: String,
}

fn decode_proof(header: &str) -> Option<DemoProof> {
    let bytes = BASE64.decode(header.as_bytes()).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Checks a proof against its requirement: the decoded proof, or the
/// `(status, body)` to answer with.
fn check_proof(
    request: &VerificationRequest,
) -> Result<DemoProof, (StatusCode, Json<serde_json::Value>)> {
    let Some(proof) = decode_proof(&request.payment_header) else {
        tracing::warn!("undecodable payment header");
        return Err((
            StatusCode::BAD_REQUEST,
            Json(json!({ "isValid": false, "invalidReason": "invalid_payload" })),
        ));
    };

    let paid = U256::from_dec_str(&proof.amount).ok();
    let required = U256::from_dec_str(&request.payment_requirements.max_amount_required).ok();
    let covers = matches!((paid, required), (Some(paid), Some(required)) if paid >= required);
    if !covers {
        tracing::info!(payer = %proof.payer, amount = %proof.amount, "insufficient amount");
        return Err((
            StatusCode::OK,
            Json(json!({ "isValid": false, "invalidReason": "insufficient_amount" })),
        ));
    }
    Ok(proof)
}

async fn verify_handler(Json(request): Json<VerificationRequest>) -> impl IntoResponse {
    match check_proof(&request) {
        Ok(proof) => (
            StatusCode::OK,
            Json(json!({ "isValid": true, "payer": proof.payer })),
        ),
        Err(answer) => answer,
    }
}

async fn settle_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerificationRequest>,
) -> impl IntoResponse {
    let proof = match check_proof(&request) {
        Ok(proof) => proof,
        Err((status, _)) if status == StatusCode::OK => {
            return (
                StatusCode::OK,
                Json(json!({ "success": false, "errorReason": "insufficient_amount" })),
            )
        }
        Err(answer) => return answer,
    };

    let requirements = &request.payment_requirements;
    let n = state.settled.fetch_add(1, Ordering::SeqCst) + 1;
    tracing::info!(payer = %proof.payer, resource = %requirements.resource, "payment settled");
    (
        StatusCode::OK,
        Json(json!({
            "success": true,
            "transaction": format!("0x{:064x}", n),
            "network": requirements.network,
            "payer": proof.payer,
            "settledAt": chrono::Utc::now().to_rfc3339(),
        })),
    )
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "x402-facilitator",
        "version": 1,
    }))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()?;

    let app = Router::new()
        .route("/verify", post(verify_handler))
        .route("/settle", post(settle_handler))
        .route("/health", get(health_handler))
        .with_state(Arc::new(AppState::default()));

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "mock facilitator listening");

    axum::serve(listener, app).await?;

    Ok(())
}
