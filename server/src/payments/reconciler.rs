//! Payment reconciliation
//!
//! Bridges order intent and the processor's authoritative settlement
//! outcome. Order creation is idempotent per order number, reconciliation
//! is idempotent per processor payment id, so either side can be retried
//! without duplicate orders or double-applied payments.

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use tracing::{debug, info, warn};

use crate::db::models::{Order, OrderStatus, PaymentStatus};
use crate::db::repository::order::PaymentSettlement;
use crate::orders::OrderService;
use crate::payments::processor::{
    CardProcessor, ChargeOutcome, ChargeRequest, PaymentState, ProcessorError,
    ProcessorErrorKind, ProcessorPaymentStatus,
};
use crate::payments::webhook;
use crate::utils::time::now_millis;
use crate::utils::{AppError, AppResult};

/// Smallest charge the processor accepts, in minor units (0.50 EUR/USD)
const MIN_CHARGE_MINOR_UNITS: i64 = 50;

/// Webhook event type carrying settlement outcomes
const PAYMENT_UPDATED: &str = "payment.updated";

#[derive(Clone)]
pub struct PaymentReconciler {
    processor: Arc<dyn CardProcessor>,
    orders: OrderService,
    currency: String,
    webhook_secret: String,
}

impl PaymentReconciler {
    pub fn new(
        processor: Arc<dyn CardProcessor>,
        orders: OrderService,
        currency: String,
        webhook_secret: String,
    ) -> Self {
        Self {
            processor,
            orders,
            currency,
            webhook_secret,
        }
    }

    /// Charge a card for a freshly created PENDING_PAYMENT order.
    ///
    /// On settlement the order moves to PROCESSING with the processor's
    /// identifiers recorded. On failure the error is returned without
    /// touching the order; the checkout flow owns the follow-up and
    /// soft-cancels definitive rejections via `fail_payment`.
    pub async fn charge_for_order(&self, order: &Order, token: &str) -> AppResult<Order> {
        let amount = Self::to_minor_units(order.total)?;
        if amount < MIN_CHARGE_MINOR_UNITS {
            return Err(AppError::validation(format!(
                "Charge amount {} is below the processor minimum",
                order.total
            )));
        }

        let reference_id = order
            .id
            .as_ref()
            .map(|id| id.key().to_string())
            .ok_or_else(|| AppError::internal("Order record has no id"))?;

        let request = ChargeRequest {
            token: token.to_string(),
            amount,
            currency: self.currency.clone(),
            reference_id,
        };

        let outcome = self.processor.charge(&request).await?;
        self.apply_charge_outcome(order, outcome).await
    }

    async fn apply_charge_outcome(
        &self,
        order: &Order,
        outcome: ChargeOutcome,
    ) -> AppResult<Order> {
        match outcome.status {
            ProcessorPaymentStatus::Completed => {
                let settlement = PaymentSettlement {
                    payment_id: outcome.id,
                    receipt_number: outcome.receipt_number,
                    amount_paid: order.total,
                    processing_fee: Self::to_major_units(outcome.processing_fee),
                    paid_at: now_millis(),
                };
                self.orders.settle_payment(order, &settlement).await
            }
            ProcessorPaymentStatus::Pending => {
                // Settlement will arrive over the webhook
                info!(
                    order_number = order.order_number,
                    payment_id = %outcome.id,
                    "Charge accepted, awaiting asynchronous settlement"
                );
                Ok(order.clone())
            }
            ProcessorPaymentStatus::Failed => Err(AppError::Payment(ProcessorError::new(
                ProcessorErrorKind::CardDeclined,
                outcome
                    .failure_reason
                    .unwrap_or_else(|| "card was declined".to_string()),
            ))),
            ProcessorPaymentStatus::Refunded => Err(AppError::Payment(ProcessorError::new(
                ProcessorErrorKind::InvalidRequest,
                "charge reported as refunded".to_string(),
            ))),
        }
    }

    /// Reconcile a processor webhook delivery.
    ///
    /// Unverified payloads are rejected before any parsing. Verified
    /// `payment.updated` events apply the same completed/failed effects as
    /// the synchronous path. Redeliveries short-circuit once the stored
    /// payment id matches a terminal payment state.
    pub async fn handle_webhook(&self, raw_body: &[u8], signature_header: &str) -> AppResult<()> {
        webhook::verify_signature(raw_body, signature_header, &self.webhook_secret)
            .map_err(|reason| AppError::validation(format!("Webhook rejected: {reason}")))?;

        let event = webhook::parse_event(raw_body)
            .map_err(|e| AppError::validation(format!("Malformed webhook payload: {e}")))?;

        if event.event_type != PAYMENT_UPDATED {
            debug!(event_type = %event.event_type, "Ignoring webhook event type");
            return Ok(());
        }

        let payment = event.data;
        let order = match self.orders.get(&payment.reference_id).await {
            Ok(order) => order,
            Err(AppError::NotFound(_)) => {
                // Ack so the processor stops redelivering an event we can
                // never apply; the mismatch needs manual reconciliation.
                warn!(
                    reference_id = %payment.reference_id,
                    payment_id = %payment.id,
                    "Webhook references an unknown order"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if order.payment.payment_id.as_deref() == Some(payment.id.as_str())
            && matches!(
                order.payment.status,
                PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Refunded
            )
        {
            debug!(
                order_number = order.order_number,
                payment_id = %payment.id,
                "Webhook redelivery for an already reconciled payment"
            );
            return Ok(());
        }

        match payment.status {
            ProcessorPaymentStatus::Completed => {
                let settlement = PaymentSettlement {
                    payment_id: payment.id,
                    receipt_number: payment.receipt_number,
                    amount_paid: Self::to_major_units(payment.amount),
                    processing_fee: Self::to_major_units(payment.processing_fee),
                    paid_at: now_millis(),
                };
                self.orders.settle_payment(&order, &settlement).await?;
            }
            ProcessorPaymentStatus::Failed => {
                if order.status == OrderStatus::PendingPayment {
                    let reason = payment
                        .failure_reason
                        .unwrap_or_else(|| "card_declined".to_string());
                    self.orders
                        .fail_payment(&order, Some(payment.id), &reason)
                        .await?;
                } else {
                    warn!(
                        order_number = order.order_number,
                        status = ?order.status,
                        "Ignoring failure event for order outside pending payment"
                    );
                }
            }
            ProcessorPaymentStatus::Pending => {
                debug!(
                    order_number = order.order_number,
                    "Webhook reports payment still pending"
                );
            }
            ProcessorPaymentStatus::Refunded => {
                // No refund transition exists in the order state machine,
                // refunds are handled out of band.
                warn!(
                    order_number = order.order_number,
                    payment_id = %payment.id,
                    "Refund event received, manual handling required"
                );
            }
        }

        Ok(())
    }

    /// Read-through status query, never mutates local state
    pub async fn get_status(&self, payment_id: &str) -> AppResult<PaymentState> {
        Ok(self.processor.get_payment(payment_id).await?)
    }

    /// Round to the nearest cent and convert to minor units
    fn to_minor_units(amount: f64) -> AppResult<i64> {
        let amount = Decimal::from_f64(amount)
            .ok_or_else(|| AppError::validation("Charge amount is not a finite number"))?;
        (amount * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| AppError::validation("Charge amount out of range"))
    }

    fn to_major_units(minor: i64) -> f64 {
        (Decimal::from(minor) / Decimal::ONE_HUNDRED)
            .to_f64()
            .unwrap_or(0.0)
    }
}
