//! Processor webhook payload verification and parsing

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use super::processor::ProcessorPaymentStatus;

/// Replay window for webhook timestamps
const MAX_TIMESTAMP_SKEW_SECS: i64 = 300;

/// Webhook envelope posted by the processor
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookPayment,
}

/// Payment state carried in a webhook
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayment {
    pub id: String,
    pub status: ProcessorPaymentStatus,
    /// Order record key we sent as reference when charging
    pub reference_id: String,
    pub receipt_number: Option<String>,
    /// Amount in minor units
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub processing_fee: i64,
    pub failure_reason: Option<String>,
}

/// Verify a processor webhook signature (HMAC-SHA256)
///
/// Header format: `t=<unix_secs>,v1=<hex_hmac>`. The MAC covers
/// `"{timestamp}.{raw_body}"` so the raw request body must be passed
/// through untouched, before any JSON parsing.
pub fn verify_signature(payload: &[u8], sig_header: &str, secret: &str) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signature = "";
    for part in sig_header.split(',') {
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signature = v;
        }
    }

    if timestamp.is_empty() || signature.is_empty() {
        return Err("Invalid signature header");
    }

    let signed_payload = format!("{timestamp}.{}", std::str::from_utf8(payload).unwrap_or(""));
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
    mac.update(signed_payload.as_bytes());

    // Decode hex signature and use constant-time comparison via hmac::verify_slice
    let sig_bytes = hex::decode(signature).map_err(|_| "Invalid signature hex")?;
    mac.verify_slice(&sig_bytes)
        .map_err(|_| "Webhook signature mismatch")?;

    // Reject events older than the replay window
    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    let now = chrono::Utc::now().timestamp();
    if (now - ts).abs() > MAX_TIMESTAMP_SKEW_SECS {
        return Err("Webhook timestamp too old");
    }

    Ok(())
}

/// Parse the webhook body after the signature has been verified
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, serde_json::Error> {
    serde_json::from_slice(payload)
}

#[cfg(test)]
pub(crate) fn sign_for_tests(payload: &[u8], secret: &str) -> String {
    let ts = chrono::Utc::now().timestamp();
    let signed_payload = format!("{ts}.{}", std::str::from_utf8(payload).unwrap());
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(signed_payload.as_bytes());
    let sig = hex::encode(mac.finalize().into_bytes());
    format!("t={ts},v1={sig}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test";

    #[test]
    fn test_valid_signature_accepted() {
        let body = br#"{"type":"payment.updated"}"#;
        let header = sign_for_tests(body, SECRET);
        assert!(verify_signature(body, &header, SECRET).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = br#"{"type":"payment.updated"}"#;
        let header = sign_for_tests(body, "whsec_other");
        assert_eq!(
            verify_signature(body, &header, SECRET),
            Err("Webhook signature mismatch")
        );
    }

    #[test]
    fn test_tampered_body_rejected() {
        let body = br#"{"type":"payment.updated"}"#;
        let header = sign_for_tests(body, SECRET);
        assert!(verify_signature(br#"{"type":"tampered"}"#, &header, SECRET).is_err());
    }

    #[test]
    fn test_malformed_header_rejected() {
        let body = b"{}";
        assert_eq!(
            verify_signature(body, "v1=abc", SECRET),
            Err("Invalid signature header")
        );
        assert_eq!(
            verify_signature(body, "", SECRET),
            Err("Invalid signature header")
        );
    }

    #[test]
    fn test_stale_timestamp_rejected() {
        let body = b"{}";
        let ts = chrono::Utc::now().timestamp() - MAX_TIMESTAMP_SKEW_SECS - 10;
        let signed_payload = format!("{ts}.{}", std::str::from_utf8(body).unwrap());
        let mut mac = Hmac::<Sha256>::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(signed_payload.as_bytes());
        let sig = hex::encode(mac.finalize().into_bytes());
        let header = format!("t={ts},v1={sig}");

        assert_eq!(
            verify_signature(body, &header, SECRET),
            Err("Webhook timestamp too old")
        );
    }

    #[test]
    fn test_parse_event() {
        let body = br#"{
            "type": "payment.updated",
            "data": {
                "id": "pay_123",
                "status": "completed",
                "reference_id": "abc",
                "receipt_number": "R-1",
                "amount": 1250,
                "processing_fee": 36,
                "failure_reason": null
            }
        }"#;
        let event = parse_event(body).unwrap();
        assert_eq!(event.event_type, "payment.updated");
        assert_eq!(event.data.id, "pay_123");
        assert_eq!(event.data.status, ProcessorPaymentStatus::Completed);
        assert_eq!(event.data.amount, 1250);
    }
}
