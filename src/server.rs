//! Tower integration for axum servers.
//!
//! [`PaymentLayer`] wraps any axum service with a [`Gate`]. Unpriced requests
//! reach the inner service untouched, rejected ones never do, and paid ones
//! get the settlement receipt added to the inner service's response.
//!
//! ```no_run
//! use axum::{routing::get, Router};
//! use x402_gate::config::GateConfig;
//! use x402_gate::gate::Gate;
//! use x402_gate::server::PaymentLayer;
//!
//! # fn build() -> x402_gate::Result<Router> {
//! let gate = Gate::from_config(&GateConfig::from_env()?)?;
//! let app = Router::new()
//!     .route("/weather", get(|| async { "sunny" }))
//!     .layer(PaymentLayer::new(gate));
//! # Ok(app)
//! # }
//! ```

use crate::facilitator::Facilitator;
use crate::gate::{Gate, GateOutcome};
use crate::utils::PAYMENT_RESPONSE_HEADER;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Applies a [`Gate`] in front of a service.
#[derive(Debug)]
pub struct PaymentLayer<F> {
    gate: Gate<F>,
}

impl<F> Clone for PaymentLayer<F> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
        }
    }
}

impl<F> PaymentLayer<F> {
    pub fn new(gate: Gate<F>) -> Self {
        Self { gate }
    }
}

impl<S, F> Layer<S> for PaymentLayer<F> {
    type Service = PaymentService<S, F>;

    fn layer(&self, inner: S) -> Self::Service {
        PaymentService {
            inner,
            gate: self.gate.clone(),
        }
    }
}

/// Service produced by [`PaymentLayer`].
#[derive(Debug)]
pub struct PaymentService<S, F> {
    inner: S,
    gate: Gate<F>,
}

impl<S: Clone, F> Clone for PaymentService<S, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            gate: self.gate.clone(),
        }
    }
}

impl<S, F> Service<Request> for PaymentService<S, F>
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + 'static,
    S::Future: Send + 'static,
    F: Facilitator + 'static,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Response, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let gate = self.gate.clone();
        // Keep the service that was polled ready and leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            // `Body` is not `Sync`; only borrow the parts across the await.
            let (parts, body) = req.into_parts();
            let outcome = gate.intercept(&parts.method, &parts.uri, &parts.headers).await;
            let req = Request::from_parts(parts, body);
            match outcome {
                GateOutcome::Passthrough => inner.call(req).await,
                GateOutcome::Rejected(rejection) => Ok(rejection.into_response()),
                GateOutcome::Paid { receipt } => {
                    let mut response = inner.call(req).await?;
                    response
                        .headers_mut()
                        .insert(PAYMENT_RESPONSE_HEADER, receipt);
                    Ok(response)
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GateConfig, RouteEntryConfig};
    use crate::network::Network;
    use crate::price::PriceSpec;
    use crate::utils::PAYMENT_HEADER;
    use axum::body::Body;
    use axum::routing::get;
    use axum::Router;
    use http::StatusCode;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

    fn app(facilitator_url: &str, hits: Arc<AtomicUsize>) -> Router {
        let config = GateConfig::new(PAY_TO, facilitator_url).with_route(
            "GET /weather",
            RouteEntryConfig::new(PriceSpec::dollar("$0.001").unwrap(), Network::BaseSepolia),
        );
        let gate = Gate::from_config(&config).unwrap();
        Router::new()
            .route(
                "/weather",
                get(move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        (StatusCode::CREATED, "sunny")
                    }
                }),
            )
            .route("/health", get(|| async { "ok" }))
            .layer(PaymentLayer::new(gate))
    }

    #[tokio::test]
    async fn test_paid_request_gets_receipt() {
        let facilitator = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/verify"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"isValid": true, "settlementReceipt": "R1"})),
            )
            .expect(1)
            .mount(&facilitator)
            .await;

        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(&facilitator.uri(), hits.clone())
            .oneshot(
                http::Request::builder()
                    .uri("/weather")
                    .header(PAYMENT_HEADER, "proof")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[PAYMENT_RESPONSE_HEADER], "R1");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unpaid_request_never_reaches_handler() {
        let facilitator = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&facilitator)
            .await;

        let hits = Arc::new(AtomicUsize::new(0));
        let response = app(&facilitator.uri(), hits.clone())
            .oneshot(http::Request::builder().uri("/weather").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        assert!(response.headers().get(PAYMENT_RESPONSE_HEADER).is_none());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unpriced_route_passes_through() {
        let hits = Arc::new(AtomicUsize::new(0));
        let response = app("http://127.0.0.1:9", hits)
            .oneshot(http::Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(PAYMENT_RESPONSE_HEADER).is_none());
    }
}
