//! Client for the NANDA Points facilitator service.
//!
//! The facilitator is the service of record for payments; this client only
//! calls its `/verify`, `/settle`, and `/supported` endpoints. Transport
//! failures retry up to the configured count; non-2xx replies map to typed
//! failures carrying the remote-supplied reason and are not retried.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::PaymentError;
use super::types::{PaymentConfig, PaymentPayload, PaymentRequirements};

/// Per-call timeout for facilitator requests.
const FACILITATOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Request body for `/verify` and `/settle`.
#[derive(Debug, Serialize)]
struct FacilitatorRequest<'a> {
    payment: &'a PaymentPayload,
    #[serde(rename = "paymentRequirements")]
    payment_requirements: &'a PaymentRequirements,
}

/// Facilitator verdict on a payment.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyResponse {
    #[serde(rename = "isValid", default)]
    pub is_valid: bool,

    #[serde(rename = "invalidReason", default)]
    pub invalid_reason: Option<String>,
}

/// Facilitator settlement result.
#[derive(Debug, Clone, Deserialize)]
pub struct SettleResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(rename = "txId", default)]
    pub tx_id: Option<String>,

    #[serde(rename = "errorReason", default)]
    pub error_reason: Option<String>,
}

/// Stateless HTTP client for the facilitator service.
pub struct FacilitatorClient {
    client: reqwest::Client,
    base_url: String,
    retry_count: u32,
    retry_delay: Duration,
}

impl FacilitatorClient {
    pub fn new(facilitator_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: facilitator_url.trim_end_matches('/').to_string(),
            retry_count: 3,
            retry_delay: Duration::from_millis(1_000),
        }
    }

    /// Create a client with retry settings from the payment configuration.
    pub fn from_config(config: &PaymentConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.facilitator_url.trim_end_matches('/').to_string(),
            retry_count: config.retry_count,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Verify a payment against requirements without settling.
    pub async fn verify(
        &self,
        payment: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyResponse, PaymentError> {
        let body = FacilitatorRequest {
            payment,
            payment_requirements: requirements,
        };
        let response = self.post_with_retry("verify", &body).await?;
        let status = response.status();
        let text = response.text().await.map_err(PaymentError::from)?;
        if !status.is_success() {
            return Err(PaymentError::VerificationFailed {
                reason: remote_reason(&text, status),
            });
        }
        serde_json::from_str(&text).map_err(|e| {
            PaymentError::Network(format!("invalid verify response: {}, body: {}", e, text))
        })
    }

    /// Verify and settle a payment.
    pub async fn settle(
        &self,
        payment: &PaymentPayload,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResponse, PaymentError> {
        let body = FacilitatorRequest {
            payment,
            payment_requirements: requirements,
        };
        let response = self.post_with_retry("settle", &body).await?;
        let status = response.status();
        let text = response.text().await.map_err(PaymentError::from)?;
        if !status.is_success() {
            return Err(PaymentError::SettlementFailed {
                reason: remote_reason(&text, status),
            });
        }
        serde_json::from_str(&text).map_err(|e| {
            PaymentError::Network(format!("invalid settle response: {}, body: {}", e, text))
        })
    }

    /// Query supported payment schemes.
    pub async fn supported(&self) -> Result<serde_json::Value, PaymentError> {
        let url = format!("{}/supported", self.base_url);
        let mut last_err = None;
        for attempt in 0..=self.retry_count {
            if attempt > 0 {
                tokio::time::sleep(self.retry_delay).await;
            }
            match self
                .client
                .get(&url)
                .timeout(FACILITATOR_TIMEOUT)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.map_err(PaymentError::from)?;
                    if !status.is_success() {
                        return Err(PaymentError::Network(format!(
                            "supported query returned HTTP {}: {}",
                            status.as_u16(),
                            text
                        )));
                    }
                    return serde_json::from_str(&text).map_err(|e| {
                        PaymentError::Network(format!("invalid supported response: {}", e))
                    });
                }
                Err(e) => last_err = Some(PaymentError::from(e)),
            }
        }
        Err(last_err.unwrap_or_else(|| PaymentError::Network("no attempts made".to_string())))
    }

    /// POST with transport-level retry. Non-2xx responses are returned to
    /// the caller for error mapping, not retried.
    async fn post_with_retry<T: Serialize>(
        &self,
        endpoint: &str,
        body: &T,
    ) -> Result<reqwest::Response, PaymentError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut last_err = None;
        for attempt in 0..=self.retry_count {
            if attempt > 0 {
                tracing::debug!(
                    "Retrying facilitator {} (attempt {}/{})",
                    endpoint,
                    attempt,
                    self.retry_count
                );
                tokio::time::sleep(self.retry_delay).await;
            }
            match self
                .client
                .post(&url)
                .json(body)
                .timeout(FACILITATOR_TIMEOUT)
                .send()
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) => last_err = Some(PaymentError::from(e)),
            }
        }
        Err(last_err.unwrap_or_else(|| PaymentError::Network("no attempts made".to_string())))
    }
}

/// Pull a reason out of a facilitator error body, falling back to the
/// HTTP status.
fn remote_reason(body: &str, status: reqwest::StatusCode) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["invalidReason", "errorReason", "error"] {
            if let Some(reason) = value.get(key).and_then(|v| v.as_str()) {
                return reason.to_string();
            }
        }
    }
    format!("facilitator returned HTTP {}", status.as_u16())
}
