//! The payment gate.
//!
//! [`Gate::intercept`] is a framework-independent decision procedure: given a
//! request's method, URI and headers it either lets the request through, asks
//! for payment, or reports that the payment was verified and which receipt to
//! attach. It holds only read-only state and can be shared across tasks.
//!
//! Per request:
//! 1. no matching route: [`GateOutcome::Passthrough`];
//! 2. matching route without a proof: 402 and no facilitator call;
//! 3. matching route with a proof: exactly one facilitator call, bounded by
//!    the requirement's `maxTimeoutSeconds`.

use crate::config::GateConfig;
use crate::errors::{Result, X402Error};
use crate::facilitator::{Facilitator, FacilitatorClient, FacilitatorError, VerificationVerdict};
use crate::network::AssetRegistry;
use crate::resolver::RequirementResolver;
use crate::routes::RouteTable;
use crate::types::{PaymentRequiredResponse, PaymentRequirements, VerificationRequest};
use crate::utils::{encode_receipt, resource_url, PAYMENT_HEADER};
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const PROOF_REQUIRED: &str = "X-PAYMENT header is required";
const PROOF_EMPTY: &str = "X-PAYMENT header is empty";
const PROOF_REJECTED: &str = "Payment was rejected by the facilitator";
const PROOF_MALFORMED: &str = "X-PAYMENT header is malformed";

/// State of the `X-PAYMENT` header on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofOfPayment {
    Absent,
    /// Present but blank
    Empty,
    /// Present but not visible ASCII, so it cannot be forwarded
    Unreadable,
    Present(String),
}

impl ProofOfPayment {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match headers.get(PAYMENT_HEADER) {
            None => ProofOfPayment::Absent,
            Some(value) => match value.to_str() {
                Ok(proof) if proof.trim().is_empty() => ProofOfPayment::Empty,
                Ok(proof) => ProofOfPayment::Present(proof.to_string()),
                Err(_) => ProofOfPayment::Unreadable,
            },
        }
    }
}

/// A request the gate refuses to forward.
#[derive(Debug, Clone, PartialEq)]
pub enum Rejection {
    /// 402: no usable payment, or the facilitator rejected it.
    PaymentRequired(PaymentRequiredResponse),
    /// 400: the proof could not be understood.
    MalformedProof(PaymentRequiredResponse),
    /// 400: the request itself is unusable (e.g. a bad `Host` header).
    BadRequest(String),
    /// 502 or 504: the facilitator could not produce a verdict.
    FacilitatorUnavailable { status: StatusCode, message: String },
    /// 500
    Internal(String),
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            Rejection::MalformedProof(_) | Rejection::BadRequest(_) => StatusCode::BAD_REQUEST,
            Rejection::FacilitatorUnavailable { status, .. } => *status,
            Rejection::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn from_facilitator_error(err: FacilitatorError) -> Self {
        let status = match err {
            FacilitatorError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        };
        Rejection::FacilitatorUnavailable {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            Rejection::PaymentRequired(body) | Rejection::MalformedProof(body) => {
                (status, Json(body)).into_response()
            }
            Rejection::BadRequest(message)
            | Rejection::FacilitatorUnavailable { message, .. }
            | Rejection::Internal(message) => {
                (status, Json(json!({ "error": message }))).into_response()
            }
        }
    }
}

/// What the caller should do with the request.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// Not a priced route. Route it normally.
    Passthrough,
    /// Payment verified. Run the handler, then set `X-PAYMENT-RESPONSE` to `receipt`.
    Paid { receipt: HeaderValue },
    /// Answer with this rejection. The handler must not run.
    Rejected(Rejection),
}

/// Route-based payment gate.
///
/// Cloning is cheap: all state sits behind [`Arc`]s.
#[derive(Debug)]
pub struct Gate<F> {
    routes: Arc<RouteTable>,
    resolver: Arc<RequirementResolver>,
    facilitator: Arc<F>,
    base_url: Option<Url>,
}

impl<F> Clone for Gate<F> {
    fn clone(&self) -> Self {
        Self {
            routes: Arc::clone(&self.routes),
            resolver: Arc::clone(&self.resolver),
            facilitator: Arc::clone(&self.facilitator),
            base_url: self.base_url.clone(),
        }
    }
}

impl Gate<FacilitatorClient> {
    /// Builds a gate backed by an HTTP facilitator, validating the whole configuration.
    pub fn from_config(config: &GateConfig) -> Result<Self> {
        let build = || -> Result<Self> {
            let resolver = RequirementResolver::new(config.pay_to()?, AssetRegistry::usdc());
            let gate = Gate::new(config.route_table()?, resolver, config.facilitator_client()?)?;
            Ok(match config.base_url()? {
                Some(base_url) => gate.with_base_url(base_url),
                None => gate,
            })
        };
        build().map_err(into_config_error)
    }
}

impl<F: Facilitator> Gate<F> {
    /// Builds a gate, checking every route against the resolver up front.
    pub fn new(routes: RouteTable, resolver: RequirementResolver, facilitator: F) -> Result<Self> {
        for route in routes.routes() {
            resolver.check(route).map_err(into_config_error)?;
        }
        tracing::info!(
            routes = routes.len(),
            pay_to = %resolver.pay_to(),
            "x402 gate configured"
        );
        Ok(Self {
            routes: Arc::new(routes),
            resolver: Arc::new(resolver),
            facilitator: Arc::new(facilitator),
            base_url: None,
        })
    }

    /// Fixes the scheme and host of every `resource` URL, and prefixes its path.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Decides what to do with a request.
    pub async fn intercept(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> GateOutcome {
        let Some(route) = self.routes.match_route(method, uri.path()) else {
            return GateOutcome::Passthrough;
        };

        let resource = match resource_url(self.base_url.as_ref(), uri, headers) {
            Ok(resource) => resource,
            Err(e) => {
                tracing::debug!(error = %e, "cannot build resource URL");
                return GateOutcome::Rejected(Rejection::BadRequest(e.to_string()));
            }
        };
        let requirements = match self.resolver.resolve(route, &resource) {
            Ok(requirements) => requirements,
            Err(e) => {
                tracing::error!(
                    route = %route.pattern,
                    error = %e,
                    "failed to resolve payment requirements"
                );
                return GateOutcome::Rejected(Rejection::Internal(e.to_string()));
            }
        };

        let proof = match ProofOfPayment::from_headers(headers) {
            ProofOfPayment::Absent => {
                tracing::debug!(route = %route.pattern, "payment required");
                return payment_required(PaymentRequiredResponse::new(PROOF_REQUIRED, requirements));
            }
            ProofOfPayment::Empty => {
                tracing::debug!(route = %route.pattern, "empty payment header");
                return payment_required(PaymentRequiredResponse::new(PROOF_EMPTY, requirements));
            }
            ProofOfPayment::Unreadable => {
                tracing::warn!(route = %route.pattern, "payment header is not visible ASCII");
                return GateOutcome::Rejected(Rejection::MalformedProof(
                    PaymentRequiredResponse::new(PROOF_MALFORMED, requirements)
                        .with_reason("unreadable_header"),
                ));
            }
            ProofOfPayment::Present(proof) => proof,
        };

        self.verify(route.pattern.to_string(), proof, requirements).await
    }

    async fn verify(
        &self,
        route: String,
        proof: String,
        requirements: PaymentRequirements,
    ) -> GateOutcome {
        let budget = Duration::from_secs(requirements.max_timeout_seconds);
        let request = VerificationRequest::new(proof, requirements);

        let verdict = match tokio::time::timeout(budget, self.facilitator.verify(&request)).await {
            Ok(verdict) => verdict,
            Err(_) => Err(FacilitatorError::Timeout(budget)),
        };
        let requirements = request.payment_requirements;

        match verdict {
            Ok(VerificationVerdict::Accepted { receipt }) => {
                let header = encode_receipt(&receipt)
                    .map_err(|e| e.to_string())
                    .and_then(|encoded| HeaderValue::from_str(&encoded).map_err(|e| e.to_string()));
                match header {
                    Ok(receipt) => {
                        tracing::info!(route = %route, "payment accepted");
                        GateOutcome::Paid { receipt }
                    }
                    Err(e) => {
                        tracing::error!(
                            route = %route,
                            error = %e,
                            "facilitator receipt is not a valid header value"
                        );
                        GateOutcome::Rejected(Rejection::FacilitatorUnavailable {
                            status: StatusCode::BAD_GATEWAY,
                            message: format!("unusable settlement receipt: {e}"),
                        })
                    }
                }
            }
            Ok(VerificationVerdict::Rejected { reason }) => {
                tracing::info!(route = %route, reason = %reason, "payment rejected");
                payment_required(
                    PaymentRequiredResponse::new(PROOF_REJECTED, requirements).with_reason(reason),
                )
            }
            Ok(VerificationVerdict::Malformed { reason }) => {
                tracing::warn!(route = %route, reason = %reason, "malformed payment proof");
                GateOutcome::Rejected(Rejection::MalformedProof(
                    PaymentRequiredResponse::new(PROOF_MALFORMED, requirements).with_reason(reason),
                ))
            }
            Err(e) => {
                tracing::error!(route = %route, error = %e, "payment verification failed");
                GateOutcome::Rejected(Rejection::from_facilitator_error(e))
            }
        }
    }
}

fn payment_required(body: PaymentRequiredResponse) -> GateOutcome {
    GateOutcome::Rejected(Rejection::PaymentRequired(body))
}

fn into_config_error(err: X402Error) -> X402Error {
    match err {
        X402Error::ConfigError(_) => err,
        other => X402Error::ConfigError(other.to_string()),
    }
}
