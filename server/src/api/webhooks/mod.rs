//! Webhook API Module
//!
//! Public ingress for processor callbacks. Authentication is the HMAC
//! signature over the raw body, not the admin token.

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

/// Webhook router
pub fn router() -> Router<ServerState> {
    Router::new().route("/api/webhooks/payments", post(handler::payment_event))
}
