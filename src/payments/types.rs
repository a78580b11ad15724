//! x402 payment data structures and the `X-PAYMENT` header codec.
//!
//! Wire field names follow the x402 camelCase convention (`x402Version`,
//! `payTo`, `txId`, `maxAmountRequired`, ...). Serialization order is the
//! struct declaration order, which is the canonical header layout.

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::PaymentError;

/// x402 protocol version implemented here.
pub const X402_VERSION: u32 = 1;

/// Payment scheme identifier.
pub const SCHEME: &str = "nanda-points";

/// Payment network identifier.
pub const NETWORK: &str = "nanda-network";

/// Settlement asset symbol (NANDA Points).
pub const ASSET: &str = "NP";

fn default_version() -> u32 {
    X402_VERSION
}

fn default_scheme() -> String {
    SCHEME.to_string()
}

fn default_network() -> String {
    NETWORK.to_string()
}

/// x402 compliant payment payload, carried base64-encoded in the
/// `X-PAYMENT` header. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPayload {
    #[serde(rename = "x402Version", default = "default_version")]
    pub x402_version: u32,

    #[serde(default = "default_scheme")]
    pub scheme: String,

    #[serde(default = "default_network")]
    pub network: String,

    /// Receiving agent
    #[serde(rename = "payTo", default)]
    pub pay_to: String,

    /// Amount in NANDA Points, string-encoded integer
    #[serde(default)]
    pub amount: String,

    /// Paying agent
    #[serde(rename = "from", default)]
    pub from_agent: String,

    /// Transaction id (UUID)
    #[serde(rename = "txId", default)]
    pub tx_id: String,

    /// Millisecond timestamp at construction
    #[serde(default)]
    pub timestamp: i64,

    /// Open-ended extension map; absent on the wire normalizes to empty
    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// x402 compliant payment requirements, sent in 402 `accepts` entries and
/// to the facilitator alongside the payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequirements {
    #[serde(default = "default_scheme")]
    pub scheme: String,

    #[serde(default = "default_network")]
    pub network: String,

    /// Required amount as a string-encoded integer
    #[serde(rename = "maxAmountRequired", default)]
    pub max_amount_required: String,

    /// URL of the protected resource
    #[serde(default)]
    pub resource: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "mimeType", default)]
    pub mime_type: String,

    #[serde(rename = "payTo", default)]
    pub pay_to: String,

    #[serde(rename = "maxTimeoutSeconds", default)]
    pub max_timeout_seconds: u64,

    #[serde(default)]
    pub asset: String,

    #[serde(default)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl PaymentRequirements {
    /// Build requirements for a resource URL from a static requirement and
    /// the payment configuration. `extra` carries the facilitator URL so
    /// clients know where to settle.
    pub fn for_resource(
        requirement: &PaymentRequirement,
        resource: &str,
        config: &PaymentConfig,
    ) -> Self {
        let pay_to = requirement
            .recipient
            .clone()
            .unwrap_or_else(|| config.agent_name.clone());
        let mut extra = HashMap::new();
        extra.insert(
            "facilitatorUrl".to_string(),
            serde_json::Value::String(config.facilitator_url.clone()),
        );
        Self {
            scheme: SCHEME.to_string(),
            network: NETWORK.to_string(),
            max_amount_required: requirement.amount.to_string(),
            resource: resource.to_string(),
            description: requirement.description.clone(),
            mime_type: "application/json".to_string(),
            pay_to,
            max_timeout_seconds: 60,
            asset: ASSET.to_string(),
            extra,
        }
    }
}

/// Static payment requirement bound to a protected route at registration
/// time.
#[derive(Debug, Clone)]
pub struct PaymentRequirement {
    /// NANDA Points required for access
    pub amount: u64,

    /// What the payment covers
    pub description: String,

    /// Specific recipient; defaults to the configured agent name
    pub recipient: Option<String>,

    /// Payment timeout in milliseconds
    pub timeout_ms: u64,
}

impl PaymentRequirement {
    pub fn new(amount: u64, description: &str) -> Self {
        Self {
            amount,
            description: description.to_string(),
            recipient: None,
            timeout_ms: 30_000,
        }
    }

    pub fn with_recipient(mut self, recipient: &str) -> Self {
        self.recipient = Some(recipient.to_string());
        self
    }
}

/// Configuration for NANDA Points integration.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    /// Facilitator service base URL
    pub facilitator_url: String,

    /// This agent's name, the default payment recipient
    pub agent_name: String,

    /// Default timeout for facilitator requests in milliseconds
    pub timeout_ms: u64,

    /// Number of retries for failed facilitator requests
    pub retry_count: u32,

    /// Delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

impl PaymentConfig {
    pub fn new(facilitator_url: &str, agent_name: &str) -> Self {
        Self {
            facilitator_url: facilitator_url.trim_end_matches('/').to_string(),
            agent_name: agent_name.to_string(),
            timeout_ms: 30_000,
            retry_count: 3,
            retry_delay_ms: 1_000,
        }
    }
}

/// Create a payment payload with a fresh transaction id and the current
/// millisecond timestamp.
pub fn create_payment(
    from_agent: &str,
    to_agent: &str,
    amount: u64,
    facilitator_url: &str,
    resource: &str,
    description: &str,
) -> PaymentPayload {
    let mut extra = HashMap::new();
    extra.insert(
        "facilitatorUrl".to_string(),
        serde_json::Value::String(facilitator_url.to_string()),
    );
    extra.insert(
        "resource".to_string(),
        serde_json::Value::String(resource.to_string()),
    );
    extra.insert(
        "description".to_string(),
        serde_json::Value::String(description.to_string()),
    );
    PaymentPayload {
        x402_version: X402_VERSION,
        scheme: SCHEME.to_string(),
        network: NETWORK.to_string(),
        pay_to: to_agent.to_string(),
        amount: amount.to_string(),
        from_agent: from_agent.to_string(),
        tx_id: Uuid::new_v4().to_string(),
        timestamp: chrono::Utc::now().timestamp_millis(),
        extra,
    }
}

/// Encode a payment payload as base64 JSON for the `X-PAYMENT` header.
pub fn encode_payment(payment: &PaymentPayload) -> Result<String, PaymentError> {
    let json = serde_json::to_vec(payment)
        .map_err(|e| PaymentError::InvalidPayment(format!("serialization failed: {}", e)))?;
    Ok(BASE64.encode(json))
}

/// Decode a payment payload from an `X-PAYMENT` header value.
pub fn decode_payment(header: &str) -> Result<PaymentPayload, PaymentError> {
    let bytes = BASE64
        .decode(header.trim())
        .map_err(|e| PaymentError::InvalidPayment(format!("base64 decode failed: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| PaymentError::InvalidPayment(format!("JSON decode failed: {}", e)))
}

/// Create and encode a payment in one step.
pub fn create_and_encode_payment(
    from_agent: &str,
    to_agent: &str,
    amount: u64,
    facilitator_url: &str,
    resource: &str,
    description: &str,
) -> Result<String, PaymentError> {
    let payment = create_payment(
        from_agent,
        to_agent,
        amount,
        facilitator_url,
        resource,
        description,
    );
    encode_payment(&payment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_round_trip() {
        let payment = create_payment(
            "client-agent",
            "server-agent",
            25,
            "http://localhost:3001",
            "http://localhost:5000/api/send",
            "test payment",
        );
        let encoded = encode_payment(&payment).unwrap();
        let decoded = decode_payment(&encoded).unwrap();
        assert_eq!(decoded, payment);
    }

    #[test]
    fn test_payment_fields() {
        let payment = create_payment("a", "b", 10, "http://localhost:3001", "", "payment");
        assert_eq!(payment.amount, "10");
        assert_eq!(payment.pay_to, "b");
        assert_eq!(payment.from_agent, "a");
        assert_eq!(payment.x402_version, 1);
        assert_eq!(payment.scheme, SCHEME);
        assert_eq!(payment.network, NETWORK);
        // tx_id must be a valid UUID
        Uuid::parse_str(&payment.tx_id).unwrap();
    }

    #[test]
    fn test_tx_ids_distinct_for_identical_arguments() {
        let a = create_payment("a", "b", 10, "http://localhost:3001", "", "payment");
        let b = create_payment("a", "b", 10, "http://localhost:3001", "", "payment");
        assert_ne!(a.tx_id, b.tx_id);
    }

    #[test]
    fn test_wire_field_names_and_order() {
        let payment = create_payment("a", "b", 10, "http://localhost:3001", "", "payment");
        let json = serde_json::to_string(&payment).unwrap();
        assert!(json.starts_with("{\"x402Version\":1,\"scheme\":\"nanda-points\""));
        assert!(json.contains("\"payTo\":\"b\""));
        assert!(json.contains("\"from\":\"a\""));
        assert!(json.contains("\"txId\":"));
    }

    #[test]
    fn test_decode_missing_extra_normalizes_to_empty_map() {
        let json = serde_json::json!({
            "x402Version": 1,
            "scheme": "nanda-points",
            "network": "nanda-network",
            "payTo": "b",
            "amount": "10",
            "from": "a",
            "txId": Uuid::new_v4().to_string(),
            "timestamp": 1700000000000i64,
        });
        let encoded = BASE64.encode(serde_json::to_vec(&json).unwrap());
        let decoded = decode_payment(&encoded).unwrap();
        assert!(decoded.extra.is_empty());
    }

    #[test]
    fn test_decode_rejects_bad_base64() {
        let err = decode_payment("not valid base64 !!!").unwrap_err();
        assert_eq!(err.code(), "INVALID_PAYMENT");
    }

    #[test]
    fn test_decode_rejects_non_json() {
        let encoded = BASE64.encode(b"definitely not json");
        let err = decode_payment(&encoded).unwrap_err();
        assert_eq!(err.code(), "INVALID_PAYMENT");
    }

    #[test]
    fn test_requirements_for_resource() {
        let config = PaymentConfig::new("http://localhost:3001/", "server-agent");
        let requirement = PaymentRequirement::new(10, "Send message to agent bridge");
        let requirements = PaymentRequirements::for_resource(
            &requirement,
            "http://localhost:5000/api/send",
            &config,
        );
        assert_eq!(requirements.max_amount_required, "10");
        assert_eq!(requirements.pay_to, "server-agent");
        assert_eq!(requirements.asset, "NP");
        assert_eq!(requirements.max_timeout_seconds, 60);
        assert_eq!(
            requirements.extra.get("facilitatorUrl").unwrap(),
            "http://localhost:3001"
        );

        let overridden = requirement.with_recipient("treasury");
        let requirements =
            PaymentRequirements::for_resource(&overridden, "http://localhost:5000/api/send", &config);
        assert_eq!(requirements.pay_to, "treasury");
    }
}
