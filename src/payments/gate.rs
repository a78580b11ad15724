//! Server-side payment gate: verify, execute, settle.
//!
//! The gate is an axum middleware stage bound to a route with a static
//! [`PaymentRequirement`]. Requests without a valid payment are answered
//! with HTTP 402 and the accepted requirement; verified requests run the
//! inner handler and are settled afterwards. Settlement failure is logged
//! and never alters the committed response.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::HOST, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use super::error::PaymentError;
use super::facilitator::FacilitatorClient;
use super::types::{
    decode_payment, PaymentConfig, PaymentPayload, PaymentRequirement, PaymentRequirements,
    X402_VERSION,
};

/// Name of the payment header.
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

/// Verified payment attached to the request extensions for the inner
/// handler.
#[derive(Debug, Clone)]
pub struct VerifiedPayment(pub PaymentPayload);

/// Payment gate bound to a single protected route.
pub struct PaymentGate {
    requirement: PaymentRequirement,
    config: PaymentConfig,
    facilitator: FacilitatorClient,
}

impl PaymentGate {
    pub fn new(requirement: PaymentRequirement, config: PaymentConfig) -> Arc<Self> {
        let facilitator = FacilitatorClient::from_config(&config);
        Arc::new(Self {
            requirement,
            config,
            facilitator,
        })
    }

    /// The static requirement this gate enforces.
    pub fn requirement(&self) -> &PaymentRequirement {
        &self.requirement
    }

    fn requirements_for(&self, resource: &str) -> PaymentRequirements {
        PaymentRequirements::for_resource(&self.requirement, resource, &self.config)
    }

    /// 402 with the accepted requirement, used for missing headers and
    /// failed verification.
    fn payment_required(&self, error: &str, resource: &str) -> Response {
        let requirements = self.requirements_for(resource);
        let body = serde_json::json!({
            "x402Version": X402_VERSION,
            "error": error,
            "accepts": [requirements],
        });
        (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
    }

    /// 402 with an error code, used for decode and facilitator failures.
    fn payment_error(&self, error: &PaymentError) -> Response {
        let body = serde_json::json!({
            "x402Version": X402_VERSION,
            "error": error.to_string(),
            "code": error.code(),
            "details": serde_json::Value::Null,
        });
        (StatusCode::PAYMENT_REQUIRED, Json(body)).into_response()
    }
}

/// Middleware entry point; wire up with
/// `middleware::from_fn_with_state(gate, require_payment)`.
pub async fn require_payment(
    State(gate): State<Arc<PaymentGate>>,
    mut request: Request,
    next: Next,
) -> Response {
    let resource = resource_url(&request);

    let token = request
        .headers()
        .get(PAYMENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let Some(token) = token else {
        return gate.payment_required("X-PAYMENT header is required", &resource);
    };

    let payment = match decode_payment(&token) {
        Ok(payment) => payment,
        Err(e) => {
            tracing::debug!("Rejected unparseable payment header: {}", e);
            return gate.payment_error(&e);
        }
    };

    let requirements = gate.requirements_for(&resource);

    let verification = match gate.facilitator.verify(&payment, &requirements).await {
        Ok(verification) => verification,
        Err(e) => {
            tracing::warn!("Payment verification unavailable: {}", e);
            return gate.payment_error(&e);
        }
    };

    if !verification.is_valid {
        let reason = verification
            .invalid_reason
            .unwrap_or_else(|| "Payment verification failed".to_string());
        return gate.payment_required(&reason, &resource);
    }

    tracing::info!(
        tx_id = %payment.tx_id,
        amount = %payment.amount,
        from = %payment.from_agent,
        "Payment verified"
    );

    request.extensions_mut().insert(VerifiedPayment(payment.clone()));
    let response = next.run(request).await;

    // Service is granted on verify; settlement is best-effort.
    match gate.facilitator.settle(&payment, &requirements).await {
        Ok(settlement) => {
            tracing::info!(tx_id = ?settlement.tx_id, "Payment settled");
        }
        Err(e) => {
            tracing::warn!("Payment settlement failed: {}", e);
        }
    }

    response
}

/// Resource URL of the protected endpoint, reconstructed from the Host
/// header when present.
fn resource_url(request: &Request) -> String {
    match request.headers().get(HOST).and_then(|v| v.to_str().ok()) {
        Some(host) => format!("http://{}{}", host, request.uri()),
        None => request.uri().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::routing::{get, post};
    use axum::{middleware, Router};

    use super::*;
    use crate::payments::client::send_paid_request;
    use crate::payments::types::create_and_encode_payment;

    /// Mock facilitator behavior switches.
    struct MockFacilitator {
        verify_valid: bool,
        invalid_reason: Option<&'static str>,
        settle_status: StatusCode,
        verify_calls: AtomicUsize,
        settle_calls: AtomicUsize,
    }

    impl MockFacilitator {
        fn valid() -> Arc<Self> {
            Arc::new(Self {
                verify_valid: true,
                invalid_reason: None,
                settle_status: StatusCode::OK,
                verify_calls: AtomicUsize::new(0),
                settle_calls: AtomicUsize::new(0),
            })
        }

        fn invalid(reason: &'static str) -> Arc<Self> {
            Arc::new(Self {
                verify_valid: false,
                invalid_reason: Some(reason),
                settle_status: StatusCode::OK,
                verify_calls: AtomicUsize::new(0),
                settle_calls: AtomicUsize::new(0),
            })
        }

        fn settle_failing() -> Arc<Self> {
            Arc::new(Self {
                verify_valid: true,
                invalid_reason: None,
                settle_status: StatusCode::INTERNAL_SERVER_ERROR,
                verify_calls: AtomicUsize::new(0),
                settle_calls: AtomicUsize::new(0),
            })
        }
    }

    async fn mock_verify(
        State(mock): State<Arc<MockFacilitator>>,
    ) -> Json<serde_json::Value> {
        mock.verify_calls.fetch_add(1, Ordering::SeqCst);
        Json(serde_json::json!({
            "isValid": mock.verify_valid,
            "invalidReason": mock.invalid_reason,
        }))
    }

    async fn mock_settle(State(mock): State<Arc<MockFacilitator>>) -> Response {
        mock.settle_calls.fetch_add(1, Ordering::SeqCst);
        if mock.settle_status.is_success() {
            Json(serde_json::json!({"success": true, "txId": "settled-tx"})).into_response()
        } else {
            (
                mock.settle_status,
                Json(serde_json::json!({"errorReason": "settlement exploded"})),
            )
                .into_response()
        }
    }

    async fn spawn(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    async fn spawn_facilitator(mock: Arc<MockFacilitator>) -> String {
        let router = Router::new()
            .route("/verify", post(mock_verify))
            .route("/settle", post(mock_settle))
            .route(
                "/supported",
                get(|| async { Json(serde_json::json!({"kinds": ["nanda-points"]})) }),
            )
            .with_state(mock);
        let addr = spawn(router).await;
        format!("http://{}", addr)
    }

    /// Gated app whose handler counts invocations.
    async fn spawn_gated_app(facilitator_url: &str, amount: u64) -> (String, Arc<AtomicUsize>) {
        let handler_calls = Arc::new(AtomicUsize::new(0));
        let calls = Arc::clone(&handler_calls);
        let mut config = PaymentConfig::new(facilitator_url, "server-agent");
        config.retry_count = 0;
        let gate = PaymentGate::new(
            PaymentRequirement::new(amount, "Premium endpoint"),
            config,
        );
        let router = Router::new()
            .route(
                "/api/premium",
                post(move || {
                    let calls = Arc::clone(&calls);
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Json(serde_json::json!({"data": "premium content"}))
                    }
                })
                .layer(middleware::from_fn_with_state(gate, require_payment)),
            );
        let addr = spawn(router).await;
        (format!("http://{}/api/premium", addr), handler_calls)
    }

    #[tokio::test]
    async fn test_missing_header_returns_402_with_requirements() {
        let facilitator = spawn_facilitator(MockFacilitator::valid()).await;
        let (url, handler_calls) = spawn_gated_app(&facilitator, 10).await;

        let response = reqwest::Client::new().post(&url).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::PAYMENT_REQUIRED);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["x402Version"], 1);
        assert_eq!(body["error"], "X-PAYMENT header is required");
        assert_eq!(body["accepts"][0]["maxAmountRequired"], "10");
        assert_eq!(body["accepts"][0]["scheme"], "nanda-points");
        assert_eq!(body["accepts"][0]["payTo"], "server-agent");
        assert_eq!(body["accepts"][0]["asset"], "NP");
        assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unparseable_header_never_reaches_handler() {
        let mock = MockFacilitator::valid();
        let facilitator = spawn_facilitator(Arc::clone(&mock)).await;
        let (url, handler_calls) = spawn_gated_app(&facilitator, 10).await;

        let response = reqwest::Client::new()
            .post(&url)
            .header(PAYMENT_HEADER, "not valid base64 !!!")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::PAYMENT_REQUIRED);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["code"], "INVALID_PAYMENT");
        assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
        assert_eq!(mock.verify_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_valid_payment_runs_handler_and_settles() {
        let mock = MockFacilitator::valid();
        let facilitator = spawn_facilitator(Arc::clone(&mock)).await;
        let (url, handler_calls) = spawn_gated_app(&facilitator, 10).await;

        let header =
            create_and_encode_payment("client", "server-agent", 10, &facilitator, &url, "test")
                .unwrap();
        let response = reqwest::Client::new()
            .post(&url)
            .header(PAYMENT_HEADER, header)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["data"], "premium content");
        assert_eq!(handler_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mock.verify_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mock.settle_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_settlement_failure_does_not_downgrade_response() {
        let mock = MockFacilitator::settle_failing();
        let facilitator = spawn_facilitator(Arc::clone(&mock)).await;
        let (url, handler_calls) = spawn_gated_app(&facilitator, 10).await;

        let response = send_paid_request(
            &url,
            "client",
            "server-agent",
            10,
            &facilitator,
            Some(&serde_json::json!({"message": "hi"})),
            reqwest::Method::POST,
        )
        .await
        .unwrap();

        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["data"], "premium content");
        assert_eq!(handler_calls.load(Ordering::SeqCst), 1);
        assert_eq!(mock.settle_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_verification_returns_reason() {
        let facilitator = spawn_facilitator(MockFacilitator::invalid("insufficient balance")).await;
        let (url, handler_calls) = spawn_gated_app(&facilitator, 10).await;

        let header =
            create_and_encode_payment("client", "server-agent", 1, &facilitator, &url, "test")
                .unwrap();
        let response = reqwest::Client::new()
            .post(&url)
            .header(PAYMENT_HEADER, header)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::PAYMENT_REQUIRED);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["error"], "insufficient balance");
        assert_eq!(body["accepts"][0]["maxAmountRequired"], "10");
        assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unreachable_facilitator_returns_network_error() {
        // Nothing listens on this port.
        let (url, handler_calls) = spawn_gated_app("http://127.0.0.1:9", 10).await;

        let header = create_and_encode_payment(
            "client",
            "server-agent",
            10,
            "http://127.0.0.1:9",
            &url,
            "test",
        )
        .unwrap();
        let response = reqwest::Client::new()
            .post(&url)
            .header(PAYMENT_HEADER, header)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::PAYMENT_REQUIRED);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["code"], "NETWORK_ERROR");
        assert_eq!(handler_calls.load(Ordering::SeqCst), 0);
    }
}
