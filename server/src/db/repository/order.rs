//! Order Repository
//!
//! Order persistence with a per-year atomic counter for customer-visible
//! order numbers. The counter lives in the `order_counter` table, one
//! record per business year, and is bumped inside a single UPSERT so
//! concurrent checkouts never observe the same value.

use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use tracing::warn;

use super::{BaseRepository, RepoError, RepoResult, is_duplicate_error, record_id_from};
use crate::db::models::{Order, OrderStatus, PaymentStatus};

const TABLE: &str = "order";
const COUNTER_TABLE: &str = "order_counter";

/// Attempts before giving up on a unique-number collision
const MAX_CREATE_ATTEMPTS: u32 = 3;

/// Counter row shape returned by the UPSERT
#[derive(Debug, Deserialize)]
struct CounterRow {
    next: i64,
}

/// Identity of an order removed by the retention purge
#[derive(Debug, Clone, Deserialize)]
pub struct PurgedOrder {
    pub order_number: i64,
    pub year: i32,
}

/// Fields written when a payment settles as completed
#[derive(Debug, Clone)]
pub struct PaymentSettlement {
    pub payment_id: String,
    pub receipt_number: Option<String>,
    pub amount_paid: f64,
    pub processing_fee: f64,
    pub paid_at: i64,
}

#[derive(Clone)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Allocate the next order number for a business year.
    ///
    /// `UPSERT` creates the counter record on first use and increments it
    /// atomically afterwards. The first allocated number equals `base`.
    pub async fn next_order_number(&self, year: i32, base: i64) -> RepoResult<i64> {
        let mut result = self
            .base
            .db()
            .query(format!(
                "UPSERT type::thing('{COUNTER_TABLE}', $year) SET next = (next ?? $seed) + 1 RETURN next"
            ))
            .bind(("year", year as i64))
            .bind(("seed", base - 1))
            .await?;
        let row: Option<CounterRow> = result.take(0)?;
        row.map(|r| r.next)
            .ok_or_else(|| RepoError::Database("Order counter returned no row".to_string()))
    }

    /// Persist a new order, allocating its number.
    ///
    /// The unique `(year, order_number)` index backs up the counter: if a
    /// collision still slips through, the number is reallocated and the
    /// insert retried.
    pub async fn create(&self, mut order: Order, number_base: i64) -> RepoResult<Order> {
        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            order.order_number = self.next_order_number(order.year, number_base).await?;

            match self.insert(order.clone()).await {
                Ok(created) => return Ok(created),
                Err(RepoError::Duplicate(msg)) if attempt < MAX_CREATE_ATTEMPTS => {
                    warn!(
                        order_number = order.order_number,
                        year = order.year,
                        attempt,
                        "Order number collision: {}, reallocating",
                        msg
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(RepoError::Database(
            "Order number allocation kept colliding".to_string(),
        ))
    }

    async fn insert(&self, order: Order) -> RepoResult<Order> {
        let created: Option<Order> = self
            .base
            .db()
            .create(TABLE)
            .content(order)
            .await
            .map_err(|e| {
                let msg = e.to_string();
                if is_duplicate_error(&msg) {
                    RepoError::Duplicate(msg)
                } else {
                    RepoError::Database(msg)
                }
            })?;
        created.ok_or_else(|| RepoError::Database("Failed to create order".to_string()))
    }

    /// Find order by record id
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Order>> {
        let record_id = record_id_from(TABLE, id);
        let order: Option<Order> = self.base.db().select(record_id).await?;
        Ok(order)
    }

    /// Find order by customer-visible number within a business year
    pub async fn find_by_number(&self, year: i32, order_number: i64) -> RepoResult<Option<Order>> {
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM order WHERE year = $year AND order_number = $number LIMIT 1")
            .bind(("year", year as i64))
            .bind(("number", order_number))
            .await?;
        let orders: Vec<Order> = result.take(0)?;
        Ok(orders.into_iter().next())
    }

    /// All orders that have not been archived, newest first
    pub async fn find_open(&self) -> RepoResult<Vec<Order>> {
        let orders: Vec<Order> = self
            .base
            .db()
            .query("SELECT * FROM order WHERE status != $archived ORDER BY created_at DESC")
            .bind(("archived", OrderStatus::Archived))
            .await?
            .take(0)?;
        Ok(orders)
    }

    /// Archived orders, newest first
    pub async fn find_archived(&self) -> RepoResult<Vec<Order>> {
        let orders: Vec<Order> = self
            .base
            .db()
            .query("SELECT * FROM order WHERE status = $archived ORDER BY created_at DESC")
            .bind(("archived", OrderStatus::Archived))
            .await?
            .take(0)?;
        Ok(orders)
    }

    /// Overwrite the lifecycle status
    pub async fn update_status(&self, id: &str, status: OrderStatus) -> RepoResult<Option<Order>> {
        let record_id = record_id_from(TABLE, id);
        let mut result = self
            .base
            .db()
            .query("UPDATE $id SET status = $status RETURN AFTER")
            .bind(("id", record_id))
            .bind(("status", status))
            .await?;
        let order: Option<Order> = result.take(0)?;
        Ok(order)
    }

    /// Record a completed settlement and move the order into processing
    pub async fn apply_settlement(
        &self,
        id: &str,
        settlement: &PaymentSettlement,
    ) -> RepoResult<Option<Order>> {
        let record_id = record_id_from(TABLE, id);
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE $id SET \
                    status = $status, \
                    payment.status = $payment_status, \
                    payment.payment_id = $payment_id, \
                    payment.receipt_number = $receipt_number, \
                    payment.amount_paid = $amount_paid, \
                    payment.processing_fee = $processing_fee, \
                    payment.paid_at = $paid_at, \
                    payment.failure_reason = NONE \
                RETURN AFTER",
            )
            .bind(("id", record_id))
            .bind(("status", OrderStatus::Processing))
            .bind(("payment_status", PaymentStatus::Completed))
            .bind(("payment_id", settlement.payment_id.clone()))
            .bind(("receipt_number", settlement.receipt_number.clone()))
            .bind(("amount_paid", settlement.amount_paid))
            .bind(("processing_fee", settlement.processing_fee))
            .bind(("paid_at", settlement.paid_at))
            .await?;
        let order: Option<Order> = result.take(0)?;
        Ok(order)
    }

    /// Record a failed payment and soft-cancel the order.
    ///
    /// `payment_id` only overwrites when present; a client-driven failure
    /// report carries no processor id and must not clobber one stored by
    /// an earlier webhook.
    pub async fn mark_payment_failed(
        &self,
        id: &str,
        payment_id: Option<String>,
        reason: &str,
    ) -> RepoResult<Option<Order>> {
        let record_id = record_id_from(TABLE, id);
        let mut result = self
            .base
            .db()
            .query(
                "UPDATE $id SET \
                    status = $status, \
                    payment.status = $payment_status, \
                    payment.payment_id = $payment_id ?? payment.payment_id, \
                    payment.failure_reason = $reason \
                RETURN AFTER",
            )
            .bind(("id", record_id))
            .bind(("status", OrderStatus::Cancelled))
            .bind(("payment_status", PaymentStatus::Failed))
            .bind(("payment_id", payment_id))
            .bind(("reason", reason.to_string()))
            .await?;
        let order: Option<Order> = result.take(0)?;
        Ok(order)
    }

    /// Orders stuck in PENDING_PAYMENT created before `cutoff`
    pub async fn find_stale_pending(&self, cutoff: i64) -> RepoResult<Vec<Order>> {
        let orders: Vec<Order> = self
            .base
            .db()
            .query(
                "SELECT * FROM order \
                 WHERE status = $pending AND created_at < $cutoff \
                 ORDER BY created_at ASC",
            )
            .bind(("pending", OrderStatus::PendingPayment))
            .bind(("cutoff", cutoff))
            .await?
            .take(0)?;
        Ok(orders)
    }

    /// Count archived orders on each side of the retention cutoff.
    ///
    /// Returns `(eligible, retained)`: strictly older than the cutoff
    /// versus at-or-after it.
    pub async fn count_archived_split(&self, cutoff: i64) -> RepoResult<(i64, i64)> {
        let mut result = self
            .base
            .db()
            .query(
                "SELECT count() AS count FROM order \
                 WHERE status = $archived AND created_at < $cutoff GROUP ALL",
            )
            .query(
                "SELECT count() AS count FROM order \
                 WHERE status = $archived AND created_at >= $cutoff GROUP ALL",
            )
            .bind(("archived", OrderStatus::Archived))
            .bind(("cutoff", cutoff))
            .await?;
        let eligible: Option<i64> = result.take((0, "count"))?;
        let retained: Option<i64> = result.take((1, "count"))?;
        Ok((eligible.unwrap_or(0), retained.unwrap_or(0)))
    }

    /// Delete archived orders strictly older than `cutoff`.
    ///
    /// Only rows already in ARCHIVED status qualify; the purge never
    /// touches live orders regardless of age.
    pub async fn purge_archived_before(&self, cutoff: i64) -> RepoResult<Vec<PurgedOrder>> {
        let mut result = self
            .base
            .db()
            .query(
                "DELETE order \
                 WHERE status = $archived AND created_at < $cutoff \
                 RETURN BEFORE",
            )
            .bind(("archived", OrderStatus::Archived))
            .bind(("cutoff", cutoff))
            .await?;
        let purged: Vec<PurgedOrder> = result.take(0)?;
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{OrderItem, PaymentInfo, PaymentMethod};
    use surrealdb::engine::local::Mem;

    async fn test_repo() -> OrderRepository {
        let db = Surreal::new::<Mem>(()).await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        crate::db::DbService::define_schema(&db).await.unwrap();
        OrderRepository::new(db)
    }

    fn sample_order(year: i32, created_at: i64) -> Order {
        Order {
            id: None,
            order_number: 0,
            year,
            created_at,
            items: vec![OrderItem {
                name: "Margherita".to_string(),
                unit_price: 9.50,
                quantity: 1,
            }],
            address: Some("Calle Mayor 1".to_string()),
            phone: "600000001".to_string(),
            first_name: "Ada".to_string(),
            last_name: None,
            email: None,
            total: 9.50,
            status: OrderStatus::Processing,
            payment: PaymentInfo::pending(PaymentMethod::Cash),
        }
    }

    #[tokio::test]
    async fn test_counter_seeds_base_and_increments() {
        let repo = test_repo().await;

        assert_eq!(repo.next_order_number(2026, 1000).await.unwrap(), 1000);
        assert_eq!(repo.next_order_number(2026, 1000).await.unwrap(), 1001);
        assert_eq!(repo.next_order_number(2026, 1000).await.unwrap(), 1002);

        // Each year gets its own counter
        assert_eq!(repo.next_order_number(2027, 1000).await.unwrap(), 1000);
        assert_eq!(repo.next_order_number(2026, 1000).await.unwrap(), 1003);
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_numbers() {
        let repo = test_repo().await;

        let first = repo.create(sample_order(2026, 1_000), 1000).await.unwrap();
        let second = repo.create(sample_order(2026, 2_000), 1000).await.unwrap();

        assert_eq!(first.order_number, 1000);
        assert_eq!(second.order_number, 1001);
        assert!(first.id.is_some());
    }

    #[tokio::test]
    async fn test_find_by_number_scoped_to_year() {
        let repo = test_repo().await;
        repo.create(sample_order(2026, 1_000), 1000).await.unwrap();

        let found = repo.find_by_number(2026, 1000).await.unwrap();
        assert!(found.is_some());
        assert_eq!(found.unwrap().first_name, "Ada");

        assert!(repo.find_by_number(2025, 1000).await.unwrap().is_none());
        assert!(repo.find_by_number(2026, 9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_excludes_archived() {
        let repo = test_repo().await;
        let order = repo.create(sample_order(2026, 1_000), 1000).await.unwrap();
        let mut archived = sample_order(2026, 2_000);
        archived.status = OrderStatus::Archived;
        repo.create(archived, 1000).await.unwrap();

        let open = repo.find_open().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].order_number, order.order_number);

        let archived = repo.find_archived().await.unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].order_number, 1001);
    }

    #[tokio::test]
    async fn test_purge_only_removes_old_archived() {
        let repo = test_repo().await;
        let cutoff = 5_000;

        // Old but live: must survive
        repo.create(sample_order(2026, 1_000), 1000).await.unwrap();
        // Old and archived: purged
        let mut old_archived = sample_order(2026, 2_000);
        old_archived.status = OrderStatus::Archived;
        repo.create(old_archived, 1000).await.unwrap();
        // Archived exactly at the cutoff: retained (strictly-older rule)
        let mut at_cutoff = sample_order(2026, cutoff);
        at_cutoff.status = OrderStatus::Archived;
        repo.create(at_cutoff, 1000).await.unwrap();

        let (eligible, retained) = repo.count_archived_split(cutoff).await.unwrap();
        assert_eq!(eligible, 1);
        assert_eq!(retained, 1);

        let purged = repo.purge_archived_before(cutoff).await.unwrap();
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].order_number, 1001);

        assert_eq!(repo.find_open().await.unwrap().len(), 1);
        assert_eq!(repo.find_archived().await.unwrap().len(), 1);
    }
}
