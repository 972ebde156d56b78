//! Example x402 client.
//!
//! Requests a gated endpoint, reads the 402 requirements, then retries with a
//! proof the mock facilitator (`cargo run --example facilitator`) understands.
//!
//! Run with:
//! ```bash
//! cargo run --example client
//! ```
//!
//! Environment variables:
//! - API_URL: The protected API endpoint to access (default: http://localhost:3000/weather)
//! - PAYER: Address reported as the payer

use anyhow::{bail, Context};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use reqwest::StatusCode;
use serde_json::json;
use x402_gate::types::PaymentRequiredResponse;
use x402_gate::utils::{decode_receipt, PAYMENT_HEADER, PAYMENT_RESPONSE_HEADER};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let api_url = std::env::var("API_URL")
        .unwrap_or_else(|_| "http://localhost:3000/weather".to_string());
    let payer = std::env::var("PAYER")
        .unwrap_or_else(|_| "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb".to_string());

    let client = reqwest::Client::new();

    tracing::info!(%api_url, "requesting without payment");
    let response = client.get(&api_url).send().await?;
    if response.status() != StatusCode::PAYMENT_REQUIRED {
        println!("{}: {}", response.status(), response.text().await?);
        return Ok(());
    }

    let required: PaymentRequiredResponse = response
        .json()
        .await
        .context("402 body is not an x402 payment requirement")?;
    let requirements = &required.payment_requirements;
    println!(
        "Payment required: {} atomic units of {} on {} to {}",
        requirements.max_amount_required,
        requirements.asset,
        requirements.network,
        requirements.pay_to
    );

    let proof = json!({
        "payer": payer,
        "amount": requirements.max_amount_required,
        "resource": requirements.resource,
    });
    let proof = BASE64.encode(serde_json::to_vec(&proof)?);

    let response = client
        .get(&api_url)
        .header(PAYMENT_HEADER, proof)
        .send()
        .await?;
    let status = response.status();
    if !status.is_success() {
        bail!("paid request failed with {}: {}", status, response.text().await?);
    }

    if let Some(receipt) = response.headers().get(PAYMENT_RESPONSE_HEADER) {
        let receipt = receipt.to_str()?;
        match decode_receipt(receipt) {
            Some(settlement) => {
                println!("Payment settled: {}", serde_json::to_string_pretty(&settlement)?)
            }
            None => println!("Payment settled: {}", receipt),
        }
    }

    let body = response.text().await?;
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", body),
    }

    Ok(())
}
