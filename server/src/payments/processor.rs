//! Card processor client via REST API (no SDK dependency)
//!
//! The processor is an external service: charges are created with a
//! one-time card token, settlement state is read back by payment id,
//! and asynchronous updates arrive through the webhook endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Failure category reported to callers and stored as `failure_reason`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorErrorKind {
    CardDeclined,
    InvalidRequest,
    Unavailable,
    Timeout,
}

impl fmt::Display for ProcessorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProcessorErrorKind::CardDeclined => "card_declined",
            ProcessorErrorKind::InvalidRequest => "invalid_request",
            ProcessorErrorKind::Unavailable => "processor_unavailable",
            ProcessorErrorKind::Timeout => "processor_timeout",
        };
        f.write_str(s)
    }
}

/// Structured processor failure: category plus human-readable detail
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {detail}")]
pub struct ProcessorError {
    pub kind: ProcessorErrorKind,
    pub detail: String,
}

impl ProcessorError {
    pub fn new(kind: ProcessorErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Settlement state as reported by the processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorPaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// Charge request forwarded to the processor
#[derive(Debug, Clone, Serialize)]
pub struct ChargeRequest {
    pub token: String,
    /// Amount in minor units (cents)
    pub amount: i64,
    pub currency: String,
    /// Our order record key, echoed back in webhooks
    pub reference_id: String,
}

/// Successful charge response
#[derive(Debug, Clone, Deserialize)]
pub struct ChargeOutcome {
    pub id: String,
    pub status: ProcessorPaymentStatus,
    pub receipt_number: Option<String>,
    /// Processor fee in minor units
    #[serde(default)]
    pub processing_fee: i64,
    pub failure_reason: Option<String>,
}

/// Read-through payment state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentState {
    pub id: String,
    pub status: ProcessorPaymentStatus,
    /// Amount in minor units
    pub amount: i64,
    #[serde(default)]
    pub processing_fee: i64,
    pub receipt_number: Option<String>,
    pub failure_reason: Option<String>,
}

/// Rejection body returned by the processor on non-2xx responses
#[derive(Debug, Deserialize)]
struct ProcessorRejection {
    error: ProcessorRejectionDetail,
}

#[derive(Debug, Deserialize)]
struct ProcessorRejectionDetail {
    code: String,
    message: String,
}

/// Card processor abstraction (swapped for a scripted double in tests)
#[async_trait]
pub trait CardProcessor: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, ProcessorError>;
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentState, ProcessorError>;
}

/// HTTP client for the real processor API
pub struct HttpCardProcessor {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpCardProcessor {
    pub fn new(base_url: &str, api_key: &str, timeout_ms: u64) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn read_rejection(response: reqwest::Response) -> ProcessorError {
        let status = response.status();
        let body: Option<ProcessorRejection> = response.json().await.ok();
        classify_rejection(status.as_u16(), body)
    }
}

/// Map a transport-level failure to a processor error
fn map_request_error(e: reqwest::Error) -> ProcessorError {
    if e.is_timeout() {
        ProcessorError::new(ProcessorErrorKind::Timeout, "Processor request timed out")
    } else if e.is_connect() {
        ProcessorError::new(
            ProcessorErrorKind::Unavailable,
            format!("Processor unreachable: {e}"),
        )
    } else {
        ProcessorError::new(ProcessorErrorKind::Unavailable, e.to_string())
    }
}

/// Map an HTTP rejection to a processor error
fn classify_rejection(status: u16, body: Option<ProcessorRejection>) -> ProcessorError {
    let (code, message) = match body {
        Some(r) => (r.error.code, r.error.message),
        None => (String::new(), format!("Processor returned HTTP {status}")),
    };

    let kind = if status == 402 || code.contains("declined") || code.contains("insufficient") {
        ProcessorErrorKind::CardDeclined
    } else if (400..500).contains(&status) {
        ProcessorErrorKind::InvalidRequest
    } else {
        ProcessorErrorKind::Unavailable
    };

    ProcessorError::new(kind, message)
}

#[async_trait]
impl CardProcessor for HttpCardProcessor {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, ProcessorError> {
        // Fresh key per attempt: a retried charge after a collision is a
        // distinct attempt, never a replay of the failed one
        let idempotency_key = Uuid::new_v4().to_string();

        let response = self
            .client
            .post(format!("{}/v1/charges", self.base_url))
            .bearer_auth(&self.api_key)
            .header("Idempotency-Key", idempotency_key)
            .json(request)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            return Err(Self::read_rejection(response).await);
        }

        response.json::<ChargeOutcome>().await.map_err(|e| {
            ProcessorError::new(
                ProcessorErrorKind::Unavailable,
                format!("Malformed charge response: {e}"),
            )
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentState, ProcessorError> {
        let response = self
            .client
            .get(format!("{}/v1/charges/{payment_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(map_request_error)?;

        if !response.status().is_success() {
            return Err(Self::read_rejection(response).await);
        }

        response.json::<PaymentState>().await.map_err(|e| {
            ProcessorError::new(
                ProcessorErrorKind::Unavailable,
                format!("Malformed payment response: {e}"),
            )
        })
    }
}
