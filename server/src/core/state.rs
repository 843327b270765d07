use std::sync::Arc;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use tokio::sync::mpsc;

use crate::auth::JwtService;
use crate::cache::ResponseCache;
use crate::core::Config;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::db::DbService;
use crate::db::repository::OrderRepository;
use crate::notify::worker::{HttpMailer, LogMailer, Mailer, NotifyWorker};
use crate::notify::{NotifyService, OrderConfirmation};
use crate::orders::{OrderService, RetentionCleanup, RetentionScheduler};
use crate::payments::processor::HttpCardProcessor;
use crate::payments::{CardProcessor, PaymentReconciler, PendingPaymentSweep};

/// 服务器状态 - 持有所有服务的共享引用
///
/// 所有服务内部用 Arc 共享，Clone 是浅拷贝，成本极低。
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | db | Surreal<Db> | 嵌入式数据库 |
/// | cache | ResponseCache | 进程内响应缓存 |
/// | jwt | Arc<JwtService> | 管理端 JWT 认证 |
/// | orders | OrderService | 订单生命周期 |
/// | payments | PaymentReconciler | 支付对账 |
/// | cleanup | RetentionCleanup | 归档保留清理 |
/// | notify | NotifyService | 确认通知队列 |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 嵌入式数据库 (SurrealDB)
    pub db: Surreal<Db>,
    /// 进程内响应缓存
    pub cache: ResponseCache,
    /// JWT 认证服务 (Arc 共享所有权)
    pub jwt: Arc<JwtService>,
    /// 订单生命周期服务
    pub orders: OrderService,
    /// 支付对账服务
    pub payments: PaymentReconciler,
    /// 归档保留清理服务
    pub cleanup: RetentionCleanup,
    /// 确认通知队列
    pub notify: NotifyService,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 数据库 (work_dir/database/pizzeria.db, RocksDB)
    /// 2. 支付处理器 HTTP 客户端
    /// 3. 各服务 (缓存、JWT、订单、对账、清理、通知)
    ///
    /// # Panics
    ///
    /// 数据库或 HTTP 客户端初始化失败时 panic
    pub async fn initialize(config: &Config) -> (Self, mpsc::Receiver<OrderConfirmation>) {
        let db_path = config.database_path();
        let db_service = DbService::new(&db_path.to_string_lossy())
            .await
            .expect("Failed to initialize database");

        let processor = HttpCardProcessor::new(
            &config.payment_api_url,
            &config.payment_api_key,
            config.payment_timeout_ms,
        )
        .expect("Failed to build payment processor client");

        if config.is_production() && config.payment_webhook_secret.is_empty() {
            tracing::warn!("PAYMENT_WEBHOOK_SECRET is empty, webhook deliveries will be rejected");
        }

        Self::assemble(config, db_service.db, Arc::new(processor))
    }

    /// 使用外部提供的数据库和支付处理器装配状态
    ///
    /// 测试和嵌入场景使用：调用方负责选择存储引擎 (如 Mem)，
    /// 本方法补齐表结构定义。
    ///
    /// # Panics
    ///
    /// 表结构定义失败时 panic
    pub async fn with_db(
        config: &Config,
        db: Surreal<Db>,
        processor: Arc<dyn CardProcessor>,
    ) -> (Self, mpsc::Receiver<OrderConfirmation>) {
        DbService::define_schema(&db)
            .await
            .expect("Failed to define database schema");
        Self::assemble(config, db, processor)
    }

    fn assemble(
        config: &Config,
        db: Surreal<Db>,
        processor: Arc<dyn CardProcessor>,
    ) -> (Self, mpsc::Receiver<OrderConfirmation>) {
        let cache = ResponseCache::new(config.cache_ttl_secs);
        let jwt = Arc::new(JwtService::with_config(config.jwt.clone()));
        let (notify, notify_rx) = NotifyService::new(config.notify_buffer);

        let repo = OrderRepository::new(db.clone());
        let orders = OrderService::new(
            repo.clone(),
            cache.clone(),
            notify.clone(),
            config.timezone,
            config.order_number_base,
        );
        let payments = PaymentReconciler::new(
            processor,
            orders.clone(),
            config.currency.clone(),
            config.payment_webhook_secret.clone(),
        );
        let cleanup = RetentionCleanup::new(repo, cache.clone(), config.retention_days);

        let state = Self {
            config: config.clone(),
            db,
            cache,
            jwt,
            orders,
            payments,
            cleanup,
            notify,
        };

        (state, notify_rx)
    }

    /// 启动后台任务
    ///
    /// 必须在 `Server::run()` 进入监听循环之前调用。
    ///
    /// 启动的任务：
    /// - 通知工作者 (Worker)
    /// - 缓存过期清扫 (Periodic)
    /// - 归档保留清理调度器 (Periodic)
    /// - 滞留支付清扫 (Periodic)
    pub fn start_background_tasks(
        &self,
        notify_rx: mpsc::Receiver<OrderConfirmation>,
    ) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::new();

        // 通知工作者：未配置邮件服务时退化为仅记录日志
        let mailer: Arc<dyn Mailer> = match &self.config.mail_api_url {
            Some(url) => {
                match HttpMailer::new(url, &self.config.mail_api_key, &self.config.mail_from) {
                    Ok(mailer) => Arc::new(mailer),
                    Err(e) => {
                        tracing::warn!("Failed to build mail client: {}, using log-only mailer", e);
                        Arc::new(LogMailer)
                    }
                }
            }
            None => Arc::new(LogMailer),
        };
        let worker = NotifyWorker::new(mailer);
        let notify_token = tasks.shutdown_token();
        tasks.spawn(
            "notify_worker",
            TaskKind::Worker,
            worker.run(notify_rx, notify_token),
        );

        // 缓存过期清扫
        let cache = self.cache.clone();
        let sweep_secs = self.config.cache_sweep_secs;
        let token = tasks.shutdown_token();
        tasks.spawn("cache_sweeper", TaskKind::Periodic, async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(std::time::Duration::from_secs(sweep_secs)) => {
                        let removed = cache.sweep();
                        if removed > 0 {
                            tracing::debug!(removed, "Swept expired cache entries");
                        }
                    }
                    _ = token.cancelled() => break,
                }
            }
        });

        // 归档保留清理
        let scheduler = RetentionScheduler::new(
            self.cleanup.clone(),
            &self.config.cleanup_run_at,
            self.config.timezone,
            tasks.shutdown_token(),
        );
        tasks.spawn("retention_scheduler", TaskKind::Periodic, scheduler.run());

        // 滞留支付清扫
        let sweep = PendingPaymentSweep::new(
            OrderRepository::new(self.db.clone()),
            self.orders.clone(),
            self.config.payment_sweep_secs,
            self.config.pending_payment_timeout_mins,
            tasks.shutdown_token(),
        );
        tasks.spawn("pending_payment_sweep", TaskKind::Periodic, sweep.run());

        tasks.log_summary();
        tasks
    }
}
