//! NANDA Points (x402) payment integration.
//!
//! Server side: [`gate::require_payment`] wraps protected routes in a
//! verify → execute → settle pipeline against the facilitator service.
//! Client side: payment construction, the `X-PAYMENT` header codec, and
//! [`client::send_paid_request`].

pub mod client;
pub mod error;
pub mod facilitator;
pub mod gate;
pub mod types;

pub use client::send_paid_request;
pub use error::PaymentError;
pub use facilitator::{FacilitatorClient, SettleResponse, VerifyResponse};
pub use gate::{require_payment, PaymentGate, VerifiedPayment, PAYMENT_HEADER};
pub use types::{
    create_and_encode_payment, create_payment, decode_payment, encode_payment, PaymentConfig,
    PaymentPayload, PaymentRequirement, PaymentRequirements,
};
