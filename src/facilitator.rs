//! Client side of the payment facilitator.
//!
//! The gate never inspects a proof of payment itself. It forwards the proof and
//! the resolved requirement to a facilitator over HTTP and branches on the
//! [`VerificationVerdict`]. Transport problems surface as [`FacilitatorError`]
//! and are kept apart from a rejected payment.
//!
//! Facilitators that settle during `/verify` return the receipt directly. For
//! the others, a valid verdict without a receipt is followed by `/settle`, and
//! the settlement response becomes the receipt.
//!
//! ```
//! use x402_gate::facilitator::FacilitatorClient;
//!
//! let facilitator = FacilitatorClient::try_new("https://facilitator.example.com").unwrap();
//! assert_eq!(facilitator.verify_url().as_str(), "https://facilitator.example.com/verify");
//! assert_eq!(facilitator.settle_url().as_str(), "https://facilitator.example.com/settle");
//! ```

use crate::errors::{Result, X402Error};
use crate::types::{FacilitatorResponse, SettlementResponse, VerificationRequest};
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use url::Url;

/// Reason reported when a facilitator refuses a proof without naming why.
pub const UNSPECIFIED_REASON: &str = "payment_rejected";

/// Reason reported when settlement fails without naming why.
pub const SETTLEMENT_FAILED: &str = "settlement_failed";

/// Outcome of a verification that reached the facilitator.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationVerdict {
    /// Payment is good. The receipt is echoed back in `X-PAYMENT-RESPONSE`.
    Accepted { receipt: Value },
    /// The proof is well formed but does not satisfy the requirement.
    Rejected { reason: String },
    /// The facilitator could not make sense of the proof.
    Malformed { reason: String },
}

/// Failures talking to the facilitator. None of these is a verdict.
#[derive(Debug, thiserror::Error)]
pub enum FacilitatorError {
    #[error("facilitator unreachable: {0}")]
    Unreachable(String),

    #[error("facilitator did not answer within {0:?}")]
    Timeout(Duration),

    #[error("unexpected HTTP status {status} from facilitator: {body}")]
    HttpStatus { status: StatusCode, body: String },

    #[error("could not decode facilitator response: {0}")]
    Decode(String),
}

/// Anything that can verify (and, where needed, settle) a proof of payment
/// against a requirement.
#[async_trait]
pub trait Facilitator: Send + Sync {
    async fn verify(
        &self,
        request: &VerificationRequest,
    ) -> std::result::Result<VerificationVerdict, FacilitatorError>;
}

#[async_trait]
impl<T: Facilitator + ?Sized> Facilitator for Arc<T> {
    async fn verify(
        &self,
        request: &VerificationRequest,
    ) -> std::result::Result<VerificationVerdict, FacilitatorError> {
        (**self).verify(request).await
    }
}

/// A [`Facilitator`] reached over HTTP at `{base_url}/verify` and `{base_url}/settle`.
#[derive(Clone, Debug)]
pub struct FacilitatorClient {
    base_url: Url,
    verify_url: Url,
    settle_url: Url,
    client: Client,
    /// Sent with every request, e.g. an API key
    headers: HeaderMap,
    timeout: Duration,
}

impl FacilitatorClient {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    /// Builds a client for the facilitator at `base_url`.
    pub fn try_new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let verify_url = base_url.join("./verify")?;
        let settle_url = base_url.join("./settle")?;
        let client = Client::builder()
            .connect_timeout(Self::CONNECT_TIMEOUT)
            .build()
            .map_err(|e| X402Error::ConfigError(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url,
            verify_url,
            settle_url,
            client,
            headers: HeaderMap::new(),
            timeout: Self::DEFAULT_TIMEOUT,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn verify_url(&self) -> &Url {
        &self.verify_url
    }

    pub fn settle_url(&self) -> &Url {
        &self.settle_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Attaches custom headers to all future requests.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Bounds each HTTP request to the facilitator.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Posts `request` to `url`, returning the status and the raw body.
    async fn post(
        &self,
        url: &Url,
        request: &VerificationRequest,
    ) -> std::result::Result<(StatusCode, String), FacilitatorError> {
        let response = self
            .client
            .post(url.clone())
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        Ok((status, body))
    }

    async fn post_verify(
        &self,
        request: &VerificationRequest,
    ) -> std::result::Result<VerificationVerdict, FacilitatorError> {
        let (status, body) = self.post(&self.verify_url, request).await?;
        if status == StatusCode::BAD_REQUEST {
            return Ok(VerificationVerdict::Malformed {
                reason: malformed_reason(&body),
            });
        }
        if !status.is_success() {
            return Err(FacilitatorError::HttpStatus { status, body });
        }

        let decoded: FacilitatorResponse =
            serde_json::from_str(&body).map_err(|e| FacilitatorError::Decode(e.to_string()))?;
        match decoded {
            FacilitatorResponse {
                is_valid: true,
                settlement_receipt: None,
                ..
            } => {
                let span = tracing::info_span!("x402.facilitator.settle", url = %self.settle_url);
                self.post_settle(request).instrument(span).await
            }
            decoded => Ok(into_verdict(decoded)),
        }
    }

    async fn post_settle(
        &self,
        request: &VerificationRequest,
    ) -> std::result::Result<VerificationVerdict, FacilitatorError> {
        let (status, body) = self.post(&self.settle_url, request).await?;
        if status == StatusCode::BAD_REQUEST {
            return Ok(VerificationVerdict::Malformed {
                reason: malformed_reason(&body),
            });
        }
        if !status.is_success() {
            return Err(FacilitatorError::HttpStatus { status, body });
        }

        let receipt: Value =
            serde_json::from_str(&body).map_err(|e| FacilitatorError::Decode(e.to_string()))?;
        let outcome: SettlementResponse = match &receipt {
            Value::Object(_) => serde_json::from_value(receipt.clone())
                .map_err(|e| FacilitatorError::Decode(e.to_string()))?,
            Value::String(_) => SettlementResponse::default(),
            _ => {
                return Err(FacilitatorError::Decode(format!(
                    "settlement response is not a receipt: {body}"
                )))
            }
        };
        if outcome.failed() {
            let reason = outcome
                .error_reason
                .unwrap_or_else(|| SETTLEMENT_FAILED.to_string());
            tracing::info!(reason = %reason, "settlement failed");
            return Ok(VerificationVerdict::Rejected { reason });
        }
        Ok(VerificationVerdict::Accepted { receipt })
    }

    fn transport_error(&self, err: reqwest::Error) -> FacilitatorError {
        if err.is_timeout() {
            FacilitatorError::Timeout(self.timeout)
        } else {
            FacilitatorError::Unreachable(err.to_string())
        }
    }
}

#[async_trait]
impl Facilitator for FacilitatorClient {
    async fn verify(
        &self,
        request: &VerificationRequest,
    ) -> std::result::Result<VerificationVerdict, FacilitatorError> {
        let span = tracing::info_span!(
            "x402.facilitator.verify",
            url = %self.verify_url,
            timeout = ?self.timeout
        );
        self.post_verify(request).instrument(span).await
    }
}

/// Maps a verify response that needs no settlement step.
fn into_verdict(response: FacilitatorResponse) -> VerificationVerdict {
    match response.settlement_receipt {
        Some(receipt) if response.is_valid => VerificationVerdict::Accepted { receipt },
        _ => VerificationVerdict::Rejected {
            reason: response
                .invalid_reason
                .unwrap_or_else(|| UNSPECIFIED_REASON.to_string()),
        },
    }
}

/// Extracts a reason from a 400 body, whatever its shape.
fn malformed_reason(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        ["invalidReason", "reason", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
    });
    match from_json {
        Some(reason) => reason,
        None if body.trim().is_empty() => "invalid_payment".to_string(),
        None => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Network;
    use crate::types::PaymentRequirements;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> VerificationRequest {
        VerificationRequest::new(
            "proof-abc",
            PaymentRequirements {
                scheme: "exact".to_string(),
                network: Network::BaseSepolia,
                max_amount_required: "1000".to_string(),
                resource: "http://localhost/weather".to_string(),
                description: None,
                mime_type: "application/json".to_string(),
                pay_to: "0x209693Bc6afc0C5328bA36FaF03C514EF312287C".to_string(),
                max_timeout_seconds: 60,
                asset: "0x036CbD53842c5426634e7929541eC2318f3dCF7e".to_string(),
                extra: None,
            },
        )
    }

    #[test]
    fn test_verify_url_construction() {
        let client = FacilitatorClient::try_new("https://facilitator.example.com/x402").unwrap();
        assert_eq!(
            client.verify_url().as_str(),
            "https://facilitator.example.com/x402/verify"
        );
        assert_eq!(
            client.settle_url().as_str(),
            "https://facilitator.example.com/x402/settle"
        );

        let client = FacilitatorClient::try_new("https://facilitator.example.com/").unwrap();
        assert_eq!(client.verify_url().as_str(), "https://facilitator.example.com/verify");

        assert!(FacilitatorClient::try_new("not a url").is_err());
    }

    #[tokio::test]
    async fn test_accepted_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .and(header("x-api-key", "secret"))
            .and(body_partial_json(json!({
                "paymentHeader": "proof-abc",
                "paymentRequirements": { "maxAmountRequired": "1000" }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"isValid": true, "settlementReceipt": "R1"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/settle"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", "secret".parse().unwrap());
        let client = FacilitatorClient::try_new(&server.uri())
            .unwrap()
            .with_headers(headers);

        let verdict = client.verify(&request()).await.unwrap();
        assert_eq!(verdict, VerificationVerdict::Accepted { receipt: json!("R1") });
    }

    #[tokio::test]
    async fn test_rejected_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"isValid": false, "invalidReason": "insufficient_amount"}),
            ))
            .mount(&server)
            .await;

        let client = FacilitatorClient::try_new(&server.uri()).unwrap();
        let verdict = client.verify(&request()).await.unwrap();
        assert_eq!(
            verdict,
            VerificationVerdict::Rejected {
                reason: "insufficient_amount".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_bad_request_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_payload"})),
            )
            .mount(&server)
            .await;

        let client = FacilitatorClient::try_new(&server.uri()).unwrap();
        let verdict = client.verify(&request()).await.unwrap();
        assert_eq!(
            verdict,
            VerificationVerdict::Malformed {
                reason: "invalid_payload".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_server_error_is_not_a_verdict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .expect(1)
            .mount(&server)
            .await;

        let client = FacilitatorClient::try_new(&server.uri()).unwrap();
        let err = client.verify(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            FacilitatorError::HttpStatus { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
        ));
    }

    #[tokio::test]
    async fn test_garbage_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = FacilitatorClient::try_new(&server.uri()).unwrap();
        let err = client.verify(&request()).await.unwrap_err();
        assert!(matches!(err, FacilitatorError::Decode(_)));
    }

    async fn facilitator_verifying(verify: Value, settle: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_json(verify))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/settle"))
            .and(body_partial_json(json!({"paymentHeader": "proof-abc"})))
            .respond_with(settle)
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_valid_verdict_without_receipt_is_settled() {
        let settlement = json!({
            "success": true,
            "transaction": "0xdeadbeef",
            "network": "base-sepolia",
            "payer": "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb"
        });
        let server = facilitator_verifying(
            json!({"isValid": true, "payer": "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEbb"}),
            ResponseTemplate::new(200).set_body_json(settlement.clone()),
        )
        .await;

        let client = FacilitatorClient::try_new(&server.uri()).unwrap();
        let verdict = client.verify(&request()).await.unwrap();
        assert_eq!(verdict, VerificationVerdict::Accepted { receipt: settlement });
    }

    #[tokio::test]
    async fn test_failed_settlement_is_a_rejection() {
        let server = facilitator_verifying(
            json!({"isValid": true}),
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": false, "errorReason": "insufficient_funds"})),
        )
        .await;

        let client = FacilitatorClient::try_new(&server.uri()).unwrap();
        let verdict = client.verify(&request()).await.unwrap();
        assert_eq!(
            verdict,
            VerificationVerdict::Rejected {
                reason: "insufficient_funds".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_settlement_server_error_is_not_a_verdict() {
        let server = facilitator_verifying(
            json!({"isValid": true}),
            ResponseTemplate::new(500).set_body_string("boom"),
        )
        .await;

        let client = FacilitatorClient::try_new(&server.uri()).unwrap();
        let err = client.verify(&request()).await.unwrap_err();
        assert!(matches!(err, FacilitatorError::HttpStatus { .. }));
    }

    #[tokio::test]
    async fn test_settlement_without_receipt_is_decode_error() {
        let server = facilitator_verifying(
            json!({"isValid": true}),
            ResponseTemplate::new(200).set_body_json(json!(null)),
        )
        .await;

        let client = FacilitatorClient::try_new(&server.uri()).unwrap();
        let err = client.verify(&request()).await.unwrap_err();
        assert!(matches!(err, FacilitatorError::Decode(_)));
    }

    #[tokio::test]
    async fn test_slow_facilitator_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"isValid": true, "settlementReceipt": "R1"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = FacilitatorClient::try_new(&server.uri())
            .unwrap()
            .with_timeout(Duration::from_millis(100));
        let err = client.verify(&request()).await.unwrap_err();
        assert!(matches!(err, FacilitatorError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_unreachable_facilitator() {
        // Nothing listens on port 9 of the loopback interface.
        let client = FacilitatorClient::try_new("http://127.0.0.1:9").unwrap();
        let err = client.verify(&request()).await.unwrap_err();
        assert!(matches!(err, FacilitatorError::Unreachable(_)));
    }

    #[test]
    fn test_malformed_reason_extraction() {
        assert_eq!(malformed_reason(r#"{"invalidReason":"bad_sig"}"#), "bad_sig");
        assert_eq!(malformed_reason("not base64"), "not base64");
        assert_eq!(malformed_reason(""), "invalid_payment");
    }
}
