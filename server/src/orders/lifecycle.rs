//! Order lifecycle service
//!
//! Single write path for orders: creation, status transitions, archive
//! and the payment-driven soft-cancel/settle paths all go through here,
//! so cache invalidation and confirmation notifications cannot be
//! forgotten by a handler.

use chrono_tz::Tz;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use tracing::{info, warn};

use crate::cache::ResponseCache;
use crate::db::models::{
    Order, OrderCreate, OrderStatus, PaymentInfo, PaymentMethod, PaymentStatus,
};
use crate::db::repository::OrderRepository;
use crate::db::repository::order::PaymentSettlement;
use crate::notify::NotifyService;
use crate::utils::time::current_year;
use crate::utils::validation::{
    MAX_ADDRESS_LEN, MAX_EMAIL_LEN, MAX_NAME_LEN, MAX_NOTE_LEN, MAX_SHORT_TEXT_LEN,
    validate_money, validate_optional_text, validate_required_text,
};
use crate::utils::{AppError, AppResult};

/// Cache key fragment shared by every order view
const ORDERS_CACHE_PREFIX: &str = "/api/orders";

#[derive(Clone)]
pub struct OrderService {
    repo: OrderRepository,
    cache: ResponseCache,
    notify: NotifyService,
    tz: Tz,
    number_base: i64,
}

impl OrderService {
    pub fn new(
        repo: OrderRepository,
        cache: ResponseCache,
        notify: NotifyService,
        tz: Tz,
        number_base: i64,
    ) -> Self {
        Self {
            repo,
            cache,
            notify,
            tz,
            number_base,
        }
    }

    /// Create an order from a checkout payload.
    ///
    /// Cash orders are accepted immediately (PROCESSING, payment stays
    /// PENDING until the courier settles). Card orders start in
    /// PENDING_PAYMENT and move only when the charge settles.
    ///
    /// The confirmation notification is enqueued fire-and-forget; a full
    /// or closed notification queue never fails the checkout.
    pub async fn create(&self, data: OrderCreate) -> AppResult<Order> {
        Self::validate(&data)?;

        let total = Self::compute_total(&data.items)?;
        validate_money(total, "total")?;

        let status = match data.payment_method {
            PaymentMethod::Cash => OrderStatus::Processing,
            PaymentMethod::Card => OrderStatus::PendingPayment,
        };

        let order = Order {
            id: None,
            order_number: 0,
            year: current_year(self.tz),
            created_at: crate::utils::time::now_millis(),
            items: data.items,
            address: data.address,
            phone: data.phone,
            first_name: data.first_name,
            last_name: data.last_name,
            email: data.email,
            total,
            status,
            payment: PaymentInfo::pending(data.payment_method),
        };

        let created = self.repo.create(order, self.number_base).await?;

        info!(
            order_number = created.order_number,
            year = created.year,
            method = ?created.payment.method,
            total = created.total,
            "Order created"
        );

        self.notify.order_confirmed(&created);
        self.cache.invalidate(ORDERS_CACHE_PREFIX);

        Ok(created)
    }

    /// Apply an admin status transition.
    ///
    /// Rejected transitions leave the stored status untouched.
    pub async fn update_status(&self, id: &str, target: OrderStatus) -> AppResult<Order> {
        let order = self.get(id).await?;

        if !order.status.can_transition(target) {
            return Err(AppError::state_transition(format!(
                "Cannot move order #{} from {:?} to {:?}",
                order.order_number, order.status, target
            )));
        }

        let updated = self
            .repo
            .update_status(id, target)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;

        self.cache.invalidate(ORDERS_CACHE_PREFIX);
        Ok(updated)
    }

    /// Archive an order. Archiving an already archived order is a no-op.
    pub async fn archive(&self, id: &str) -> AppResult<Order> {
        let order = self.get(id).await?;

        if order.status.is_archived() {
            return Ok(order);
        }

        self.update_status(id, OrderStatus::Archived).await
    }

    /// Soft-cancel after a failed card payment, addressed by the
    /// customer-visible order number (current business year).
    ///
    /// Idempotent: reporting the same failure twice returns the already
    /// cancelled order without touching it.
    pub async fn mark_payment_failed(&self, order_number: i64, reason: &str) -> AppResult<Order> {
        let year = current_year(self.tz);
        let order = self
            .repo
            .find_by_number(year, order_number)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Order #{order_number} not found for {year}"))
            })?;

        self.fail_payment(&order, None, reason).await
    }

    /// Soft-cancel a specific order after a failed payment.
    ///
    /// Only PENDING_PAYMENT orders qualify; anything else either already
    /// handled the failure (idempotent short-circuit) or is not a
    /// payment-cancellable state.
    pub async fn fail_payment(
        &self,
        order: &Order,
        payment_id: Option<String>,
        reason: &str,
    ) -> AppResult<Order> {
        if order.status == OrderStatus::Cancelled
            && order.payment.status == PaymentStatus::Failed
        {
            return Ok(order.clone());
        }

        if order.status != OrderStatus::PendingPayment {
            return Err(AppError::state_transition(format!(
                "Cannot report payment failure for order #{} in {:?}",
                order.order_number, order.status
            )));
        }

        let id = Self::record_key(order)?;
        let updated = self
            .repo
            .mark_payment_failed(&id, payment_id, reason)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;

        warn!(
            order_number = updated.order_number,
            reason, "Order soft-cancelled after payment failure"
        );

        self.cache.invalidate(ORDERS_CACHE_PREFIX);
        Ok(updated)
    }

    /// Record a completed settlement and accept the order.
    ///
    /// Idempotent per processor payment id: a webhook redelivery for an
    /// already settled payment returns the order unchanged. A settlement
    /// arriving after the order was soft-cancelled is acknowledged but
    /// not applied; the mismatch is logged for manual reconciliation.
    pub async fn settle_payment(
        &self,
        order: &Order,
        settlement: &PaymentSettlement,
    ) -> AppResult<Order> {
        if order.payment.status == PaymentStatus::Completed
            && order.payment.payment_id.as_deref() == Some(settlement.payment_id.as_str())
        {
            return Ok(order.clone());
        }

        match order.status {
            OrderStatus::PendingPayment => {
                let id = Self::record_key(order)?;
                let updated = self
                    .repo
                    .apply_settlement(&id, settlement)
                    .await?
                    .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))?;

                info!(
                    order_number = updated.order_number,
                    payment_id = %settlement.payment_id,
                    "Payment settled, order accepted"
                );

                self.cache.invalidate(ORDERS_CACHE_PREFIX);
                Ok(updated)
            }
            OrderStatus::Cancelled => {
                warn!(
                    order_number = order.order_number,
                    payment_id = %settlement.payment_id,
                    "Settlement arrived for a cancelled order, needs manual review"
                );
                Ok(order.clone())
            }
            _ => {
                warn!(
                    order_number = order.order_number,
                    status = ?order.status,
                    payment_id = %settlement.payment_id,
                    "Ignoring settlement for order outside pending payment"
                );
                Ok(order.clone())
            }
        }
    }

    /// Fetch by record id
    pub async fn get(&self, id: &str) -> AppResult<Order> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {id} not found")))
    }

    /// Fetch by customer-visible number (current business year)
    pub async fn get_by_number(&self, order_number: i64) -> AppResult<Order> {
        let year = current_year(self.tz);
        self.repo
            .find_by_number(year, order_number)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Order #{order_number} not found for {year}"))
            })
    }

    pub async fn list_open(&self) -> AppResult<Vec<Order>> {
        Ok(self.repo.find_open().await?)
    }

    pub async fn list_archived(&self) -> AppResult<Vec<Order>> {
        Ok(self.repo.find_archived().await?)
    }

    fn record_key(order: &Order) -> AppResult<String> {
        order
            .id
            .as_ref()
            .map(|id| id.key().to_string())
            .ok_or_else(|| AppError::internal("Order record has no id"))
    }

    /// Sum of line totals with exact decimal arithmetic, rounded to cents
    fn compute_total(items: &[crate::db::models::OrderItem]) -> AppResult<f64> {
        let mut total = Decimal::ZERO;
        for item in items {
            let unit = Decimal::from_f64(item.unit_price).ok_or_else(|| {
                AppError::validation(format!("Item '{}' has an invalid price", item.name))
            })?;
            total += unit * Decimal::from(item.quantity);
        }
        total
            .round_dp(2)
            .to_f64()
            .ok_or_else(|| AppError::internal("Order total overflowed"))
    }

    fn validate(data: &OrderCreate) -> AppResult<()> {
        if data.items.is_empty() {
            return Err(AppError::validation("Order must contain at least one item"));
        }
        for item in &data.items {
            validate_required_text(&item.name, "item name", MAX_NAME_LEN)?;
            validate_money(item.unit_price, "unit_price")?;
            if item.quantity < 1 {
                return Err(AppError::validation(format!(
                    "Item '{}' quantity must be at least 1",
                    item.name
                )));
            }
        }

        validate_required_text(&data.first_name, "first_name", MAX_NAME_LEN)?;
        validate_required_text(&data.phone, "phone", MAX_SHORT_TEXT_LEN)?;
        validate_optional_text(&data.last_name, "last_name", MAX_NAME_LEN)?;
        validate_optional_text(&data.address, "address", MAX_ADDRESS_LEN)?;
        validate_optional_text(&data.email, "email", MAX_EMAIL_LEN)?;

        if data.payment_method == PaymentMethod::Card {
            match &data.payment_token {
                Some(token) => validate_required_text(token, "payment_token", MAX_NOTE_LEN)?,
                None => {
                    return Err(AppError::validation(
                        "payment_token is required for card payments",
                    ));
                }
            }
        }

        Ok(())
    }
}
