//! Payment API Handlers

use axum::{
    Json,
    extract::{Path, State},
};

use crate::core::ServerState;
use crate::payments::processor::PaymentState;
use crate::utils::AppResult;

/// Fetch the processor's current view of a payment
pub async fn get_status(
    State(state): State<ServerState>,
    Path(payment_id): Path<String>,
) -> AppResult<Json<PaymentState>> {
    let payment = state.payments.get_status(&payment_id).await?;
    Ok(Json(payment))
}
