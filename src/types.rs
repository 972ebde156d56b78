//! Wire types for the x402 protocol.
//!
//! These are the JSON shapes that cross a process boundary: the requirement
//! record embedded in 402 responses, the body sent to the facilitator, and the
//! facilitator's answer.

use crate::network::Network;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Version of the x402 protocol.
pub const X402_VERSION: u32 = 1;

/// The only payment scheme produced by the resolver.
pub const EXACT_SCHEME: &str = "exact";

/// MIME type advertised when a route does not configure one.
pub const DEFAULT_MIME_TYPE: &str = "application/json";

/// Describes the payment requirements for a specific resource.
///
/// Produced per request by the
/// [`RequirementResolver`](crate::resolver::RequirementResolver) and never cached.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Payment scheme, always `"exact"`
    pub scheme: String,

    /// Network the payment settles on
    pub network: Network,

    /// Amount in the asset's smallest unit, as a decimal integer string
    pub max_amount_required: String,

    /// Absolute URL of the protected resource, without query string
    pub resource: String,

    /// Human-readable description of what the payment is for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// MIME type of the resource
    pub mime_type: String,

    /// Recipient address
    pub pay_to: String,

    /// Maximum time in seconds that the payment is valid
    pub max_timeout_seconds: u64,

    /// Token contract address or mint
    pub asset: String,

    /// Scheme-specific extra data (e.g., {"name": "USDC", "version": "2"} for EIP-3009)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra: Option<Value>,
}

/// Body of every 402 (and malformed-proof 400) response.
///
/// `paymentRequirements` and `accepts` carry the same record; the latter keeps
/// stock x402 clients working.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequiredResponse {
    /// Protocol version (currently 1)
    #[serde(rename = "x402Version")]
    pub x402_version: u32,

    /// Human-readable summary
    pub error: String,

    /// The requirement the request must satisfy
    pub payment_requirements: PaymentRequirements,

    /// Accepted requirements, in the list form x402 clients expect
    pub accepts: Vec<PaymentRequirements>,

    /// Facilitator reason code when a proof was rejected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl PaymentRequiredResponse {
    pub fn new(error: impl Into<String>, requirements: PaymentRequirements) -> Self {
        Self {
            x402_version: X402_VERSION,
            error: error.into(),
            accepts: vec![requirements.clone()],
            payment_requirements: requirements,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Request sent to a facilitator's `/verify` endpoint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationRequest {
    #[serde(rename = "x402Version")]
    pub x402_version: u32,

    /// The X-PAYMENT header value, forwarded untouched
    pub payment_header: String,

    /// The requirement the server expects the proof to satisfy
    pub payment_requirements: PaymentRequirements,
}

impl VerificationRequest {
    pub fn new(payment_header: impl Into<String>, requirements: PaymentRequirements) -> Self {
        Self {
            x402_version: X402_VERSION,
            payment_header: payment_header.into(),
            payment_requirements: requirements,
        }
    }
}

/// Response from the facilitator's `/verify` endpoint.
///
/// Field aliases accept the spellings used by common facilitators.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FacilitatorResponse {
    #[serde(alias = "accepted")]
    pub is_valid: bool,

    #[serde(default, alias = "reason", skip_serializing_if = "Option::is_none")]
    pub invalid_reason: Option<String>,

    /// Opaque receipt: either a string or a JSON object
    #[serde(
        default,
        alias = "receipt",
        alias = "settlement",
        skip_serializing_if = "Option::is_none"
    )]
    pub settlement_receipt: Option<Value>,
}

/// Response from the facilitator's `/settle` endpoint.
///
/// Only the outcome is read here. The full JSON body becomes the receipt.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    #[serde(default, alias = "error", skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl SettlementResponse {
    /// A settlement failed when it says so, or reports an error without a success flag.
    pub fn failed(&self) -> bool {
        match self.success {
            Some(success) => !success,
            None => self.error_reason.is_some(),
        }
    }
}
