//! Webhook API Handlers

use axum::{Json, body::Bytes, extract::State, http::HeaderMap};
use serde_json::{Value, json};

use crate::core::ServerState;
use crate::utils::{AppError, AppResult};

/// Header carrying the hex HMAC-SHA256 signature of the raw body.
pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

/// Receive a payment event from the card processor.
///
/// The body must stay raw bytes: the signature covers the exact payload,
/// so deserializing before verification would break it.
pub async fn payment_event(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::validation("Missing webhook signature"))?;

    state.payments.handle_webhook(&body, signature).await?;
    Ok(Json(json!({ "received": true })))
}
