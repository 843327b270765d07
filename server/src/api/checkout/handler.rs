//! Checkout handlers
//!
//! Storefront entry points: create an order (cash or card) and report a
//! failed card payment back.

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};

use crate::core::ServerState;
use crate::db::models::{Order, OrderCreate, PaymentFailure, PaymentMethod};
use crate::payments::processor::ProcessorErrorKind;
use crate::utils::validation::{MAX_SHORT_TEXT_LEN, validate_required_text};
use crate::utils::{AppError, AppResponse, AppResult};

/// POST /api/checkout - create an order, charging the card inline
///
/// Cash orders come back accepted (PROCESSING). Card orders are created
/// in PENDING_PAYMENT and charged synchronously: on settlement the
/// response carries the accepted order; on a processor-reported rejection
/// the order is soft-cancelled and the response is 402 with the cancelled
/// order attached, so no abandoned cart is left behind. A timed-out or
/// unreachable processor leaves the order pending for the webhook or the
/// stale-payment sweep to resolve.
pub async fn create_order(
    State(state): State<ServerState>,
    Json(payload): Json<OrderCreate>,
) -> Result<Response, AppError> {
    let method = payload.payment_method;
    let token = payload.payment_token.clone();

    let order = state.orders.create(payload).await?;

    if method != PaymentMethod::Card {
        return Ok(Json(order).into_response());
    }

    // Creation validation guarantees the token is present for card orders
    let token = token.ok_or_else(|| AppError::internal("Card order accepted without token"))?;

    match state.payments.charge_for_order(&order, &token).await {
        Ok(settled) => Ok(Json(settled).into_response()),
        Err(AppError::Payment(failure)) => {
            let order = match failure.kind {
                // Definitive rejection: the charge will never settle
                ProcessorErrorKind::CardDeclined | ProcessorErrorKind::InvalidRequest => {
                    let reason = failure.kind.to_string();
                    state.orders.fail_payment(&order, None, &reason).await?
                }
                // Outcome unknown: the charge may still have gone through
                ProcessorErrorKind::Timeout | ProcessorErrorKind::Unavailable => order,
            };

            let err = AppError::Payment(failure);
            let (status, code, message) = err.response_parts();
            let body = AppResponse {
                code: code.to_string(),
                message,
                data: Some(order),
                trace_id: None,
            };
            Ok((status, Json(body)).into_response())
        }
        Err(err) => Err(err),
    }
}

/// POST /api/checkout/payment-failed - soft-cancel after a failed charge
///
/// Addressed by the customer-visible order number because the client may
/// hold no other stable reference at this point.
pub async fn payment_failed(
    State(state): State<ServerState>,
    Json(payload): Json<PaymentFailure>,
) -> AppResult<Json<Order>> {
    validate_required_text(&payload.reason, "reason", MAX_SHORT_TEXT_LEN)?;

    let order = state
        .orders
        .mark_payment_failed(payload.order_number, &payload.reason)
        .await?;
    Ok(Json(order))
}
