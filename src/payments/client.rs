//! Client-side helper for paid HTTP requests.

use std::time::Duration;

use super::error::PaymentError;
use super::gate::PAYMENT_HEADER;
use super::types::create_and_encode_payment;

/// Timeout for outbound paid requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Send an HTTP request carrying a freshly constructed NANDA Points
/// payment in the `X-PAYMENT` header.
pub async fn send_paid_request(
    url: &str,
    from_agent: &str,
    to_agent: &str,
    amount: u64,
    facilitator_url: &str,
    body: Option<&serde_json::Value>,
    method: reqwest::Method,
) -> Result<reqwest::Response, PaymentError> {
    let description = format!("Payment for {} {}", method, url);
    let header = create_and_encode_payment(
        from_agent,
        to_agent,
        amount,
        facilitator_url,
        url,
        &description,
    )?;

    let client = reqwest::Client::new();
    let mut request = client
        .request(method, url)
        .header(PAYMENT_HEADER, header)
        .timeout(REQUEST_TIMEOUT);
    if let Some(body) = body {
        request = request.json(body);
    }
    request.send().await.map_err(PaymentError::from)
}
