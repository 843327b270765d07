//! Payment API Module
//!
//! Admin read-through to the card processor. Order mutation driven by
//! payment outcomes lives in the reconciler, not here.

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

/// Payment router
pub fn router() -> Router<ServerState> {
    Router::new().route("/api/payments/{payment_id}", get(handler::get_status))
}
