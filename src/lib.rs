//! # x402-gate
//!
//! Route-based payment gating for HTTP services, using the x402 protocol.
//!
//! x402 revives the HTTP 402 "Payment Required" status code. A server declares
//! a price for some of its routes. Clients that call one of them without paying
//! get a 402 describing what to pay. They retry with an `X-PAYMENT` header, and
//! the server has a facilitator check that proof before serving the request.
//!
//! This crate is the server half of that exchange:
//!
//! - **Route matching** ([`routes`]): exact paths and `/prefix/*` wildcards,
//!   most specific match wins.
//! - **Requirement resolution** ([`resolver`]): turns a `$0.001` or atomic
//!   price into the canonical requirement record.
//! - **Gating** ([`gate`]): the per-request decision, with exactly one
//!   facilitator round trip when a proof is present.
//! - **axum integration** ([`server`]): a tower `Layer` that applies the gate.
//! - **Demo app** ([`app`]): the router served by the `x402-gate` binary.
//!
//! Signing, settlement and on-chain work are left to the facilitator.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use x402_gate::{Gate, GateConfig, PaymentLayer};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GateConfig::from_json_str(r#"{
//!     "payTo": "0x209693Bc6afc0C5328bA36FaF03C514EF312287C",
//!     "facilitatorUrl": "https://x402.org/facilitator",
//!     "routes": {
//!         "GET /weather": { "price": "$0.001", "network": "base-sepolia" }
//!     }
//! }"#)?;
//!
//! let app: Router = Router::new()
//!     .route("/weather", get(|| async { "sunny" }))
//!     .layer(PaymentLayer::new(Gate::from_config(&config)?));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Responses
//!
//! | Situation | Status |
//! |---|---|
//! | Route not priced | whatever the app returns |
//! | No or empty `X-PAYMENT` | 402 with `paymentRequirements` |
//! | Facilitator rejects the payment | 402 with `reason` |
//! | Facilitator cannot parse the proof | 400 with `reason` |
//! | Facilitator unreachable or erroring | 502 |
//! | Facilitator too slow | 504 |
//! | Payment accepted | handler's status plus `X-PAYMENT-RESPONSE` |
//!
//! ## References
//!
//! - [x402 Specification](https://github.com/coinbase/x402)
//! - [x402.org](https://x402.org)

#![warn(rustdoc::missing_crate_level_docs)]

pub mod app;
pub mod config;
pub mod errors;
pub mod facilitator;
pub mod gate;
pub mod network;
pub mod price;
pub mod resolver;
pub mod routes;
pub mod server;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::{GateConfig, RouteEntryConfig};
pub use errors::{Result, X402Error};
pub use facilitator::{Facilitator, FacilitatorClient, FacilitatorError, VerificationVerdict};
pub use gate::{Gate, GateOutcome, ProofOfPayment, Rejection};
pub use network::{AssetRegistry, Network, PayTo};
pub use price::{AssetRef, PriceSpec};
pub use resolver::RequirementResolver;
pub use routes::{RouteConfig, RoutePattern, RouteTable};
pub use server::{PaymentLayer, PaymentService};
pub use types::{PaymentRequiredResponse, PaymentRequirements, VerificationRequest, X402_VERSION};
