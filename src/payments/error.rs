//! Payment error taxonomy.
//!
//! Each variant carries the error code that goes out in 402 bodies so callers
//! can handle failures programmatically.

use thiserror::Error;

/// Error from payment decoding, verification, or settlement.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The `X-PAYMENT` header failed base64 or JSON decoding.
    #[error("Invalid payment header: {0}")]
    InvalidPayment(String),

    /// The facilitator rejected the payment during verification.
    #[error("Payment verification failed: {reason}")]
    VerificationFailed { reason: String },

    /// The facilitator rejected the payment during settlement.
    #[error("Payment settlement failed: {reason}")]
    SettlementFailed { reason: String },

    /// The facilitator could not be reached.
    #[error("Facilitator request failed: {0}")]
    Network(String),
}

impl PaymentError {
    /// Error code for 402 response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::InvalidPayment(_) => "INVALID_PAYMENT",
            PaymentError::VerificationFailed { .. } => "VERIFICATION_FAILED",
            PaymentError::SettlementFailed { .. } => "SETTLEMENT_FAILED",
            PaymentError::Network(_) => "NETWORK_ERROR",
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            PaymentError::Network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            PaymentError::Network(format!("Connection failed: {}", e))
        } else {
            PaymentError::Network(format!("Request failed: {}", e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            PaymentError::InvalidPayment("bad".into()).code(),
            "INVALID_PAYMENT"
        );
        assert_eq!(
            PaymentError::VerificationFailed {
                reason: "expired".into()
            }
            .code(),
            "VERIFICATION_FAILED"
        );
        assert_eq!(
            PaymentError::SettlementFailed {
                reason: "balance".into()
            }
            .code(),
            "SETTLEMENT_FAILED"
        );
        assert_eq!(PaymentError::Network("refused".into()).code(), "NETWORK_ERROR");
    }
}
