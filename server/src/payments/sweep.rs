//! 滞留支付清扫
//!
//! 卡支付下单后若处理器超时或客户端中途离开，订单会停在
//! PENDING_PAYMENT。本任务周期性把超过支付窗口的滞留订单软取消
//! （reason = `payment_timeout`），保证没有订单被无限期卡住。

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::db::repository::OrderRepository;
use crate::orders::OrderService;
use crate::utils::AppError;
use crate::utils::time::now_millis;

const TIMEOUT_REASON: &str = "payment_timeout";

pub struct PendingPaymentSweep {
    repo: OrderRepository,
    orders: OrderService,
    interval_secs: u64,
    timeout_mins: i64,
    shutdown: CancellationToken,
}

impl PendingPaymentSweep {
    pub fn new(
        repo: OrderRepository,
        orders: OrderService,
        interval_secs: u64,
        timeout_mins: i64,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            repo,
            orders,
            interval_secs,
            timeout_mins,
            shutdown,
        }
    }

    pub async fn run(self) {
        info!(
            interval_secs = self.interval_secs,
            timeout_mins = self.timeout_mins,
            "Pending payment sweep started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(std::time::Duration::from_secs(self.interval_secs)) => {}
                _ = self.shutdown.cancelled() => {
                    info!("Pending payment sweep received shutdown signal");
                    return;
                }
            }

            if let Err(e) = self.sweep_once().await {
                error!("Pending payment sweep failed: {}", e);
            }
        }
    }

    /// 软取消所有超过支付窗口的 PENDING_PAYMENT 订单
    async fn sweep_once(&self) -> Result<(), AppError> {
        let cutoff = now_millis() - self.timeout_mins * 60_000;
        let stale = self.repo.find_stale_pending(cutoff).await?;

        if stale.is_empty() {
            return Ok(());
        }

        let mut cancelled = 0usize;
        for order in &stale {
            match self.orders.fail_payment(order, None, TIMEOUT_REASON).await {
                Ok(_) => cancelled += 1,
                Err(e) => {
                    // 单个失败不中断整批，下一轮会重试
                    error!(
                        order_number = order.order_number,
                        "Failed to time out pending payment: {}", e
                    );
                }
            }
        }

        info!(cancelled, "Timed out stale pending payments");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResponseCache;
    use crate::db::models::{OrderCreate, OrderItem, OrderStatus, PaymentMethod, PaymentStatus};
    use crate::notify::NotifyService;
    use surrealdb::Surreal;
    use surrealdb::engine::local::Mem;

    #[tokio::test]
    async fn test_sweep_cancels_only_stale_orders() {
        let db = Surreal::new::<Mem>(()).await.unwrap();
        db.use_ns("test").use_db("test").await.unwrap();
        crate::db::DbService::define_schema(&db).await.unwrap();

        let repo = OrderRepository::new(db);
        let (notify, _rx) = NotifyService::new(8);
        let orders = OrderService::new(
            repo.clone(),
            ResponseCache::new(0),
            notify,
            chrono_tz::Europe::Madrid,
            1000,
        );

        let create = OrderCreate {
            items: vec![OrderItem {
                name: "Diavola".to_string(),
                unit_price: 11.0,
                quantity: 1,
            }],
            address: None,
            phone: "600000000".to_string(),
            first_name: "Ada".to_string(),
            last_name: None,
            email: None,
            payment_method: PaymentMethod::Card,
            payment_token: Some("tok_visa".to_string()),
        };
        let fresh = orders.create(create.clone()).await.unwrap();

        // 手工造一单超窗的滞留订单
        let mut stale = fresh.clone();
        stale.id = None;
        stale.created_at = now_millis() - 60 * 60_000;
        let stale = repo.create(stale, 1000).await.unwrap();

        let sweep = PendingPaymentSweep::new(
            repo.clone(),
            orders.clone(),
            300,
            30,
            CancellationToken::new(),
        );
        sweep.sweep_once().await.unwrap();

        let fresh_after = orders.get_by_number(fresh.order_number).await.unwrap();
        assert_eq!(fresh_after.status, OrderStatus::PendingPayment);

        let stale_after = orders.get_by_number(stale.order_number).await.unwrap();
        assert_eq!(stale_after.status, OrderStatus::Cancelled);
        assert_eq!(stale_after.payment.status, PaymentStatus::Failed);
        assert_eq!(
            stale_after.payment.failure_reason.as_deref(),
            Some(TIMEOUT_REASON)
        );
    }
}
