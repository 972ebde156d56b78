//! `x402-gate` demo server.
//!
//! Environment variables (a `.env` file is honoured):
//! - PAY_TO: Address to receive payments (required)
//! - FACILITATOR_URL: URL of the facilitator service
//! - BASE_URL: Public origin used in `resource` URLs
//! - ROUTES_FILE: JSON object of priced routes (defaults to the demo table)
//! - FACILITATOR_TIMEOUT_SECONDS: Bound on each facilitator call
//! - PORT: Server port (default: 3000)
//! - RUST_LOG: Log filter (default: info)

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use x402_gate::{app, Gate, GateConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let gate = match GateConfig::from_env().and_then(|config| Gate::from_config(&config)) {
        Ok(gate) => gate,
        Err(e) => {
            tracing::error!(error = %e, "invalid gate configuration");
            std::process::exit(1);
        }
    };

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse::<u16>()?;

    let app = app::router(gate).layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "x402 gate listening");

    axum::serve(listener, app).await?;

    Ok(())
}
