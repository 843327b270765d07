//! 归档订单保留清理
//!
//! 归档订单保留 `retention_days` 天，之后由每日清理任务硬删除。
//! 删除基于 `created_at` 严格早于截止时间，等于截止时间的订单保留。
//!
//! `RetentionScheduler` 注册为 `TaskKind::Periodic`，按 `cleanup_run_at`
//! 每日触发一次；管理端也可以通过 API 手动触发同一个 `RetentionCleanup`。

use std::sync::Arc;

use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::cache::ResponseCache;
use crate::db::repository::OrderRepository;
use crate::utils::time::{now_millis, parse_run_at};
use crate::utils::{AppError, AppResult};

const MILLIS_PER_DAY: i64 = 86_400_000;

// ============================================================================
// RetentionCleanup
// ============================================================================

/// 清理预览：不删除，只统计
#[derive(Debug, Serialize)]
pub struct CleanupPreview {
    pub eligible: i64,
    pub retained: i64,
    pub cutoff: i64,
}

/// 清理结果
#[derive(Debug, Serialize)]
pub struct CleanupReport {
    pub deleted_count: usize,
    pub cutoff: i64,
}

/// 归档订单清理服务
///
/// `run_lock` 串行化删除：调度触发和手动触发同时到达时，后者等待
/// 前者完成，不会对同一批订单做重复删除。
#[derive(Clone)]
pub struct RetentionCleanup {
    repo: OrderRepository,
    cache: ResponseCache,
    retention_days: i64,
    run_lock: Arc<Mutex<()>>,
}

impl RetentionCleanup {
    pub fn new(repo: OrderRepository, cache: ResponseCache, retention_days: i64) -> Self {
        Self {
            repo,
            cache,
            retention_days,
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    fn cutoff(&self) -> i64 {
        now_millis() - self.retention_days * MILLIS_PER_DAY
    }

    /// 统计当前会被删除/保留的归档订单数量
    pub async fn preview(&self) -> AppResult<CleanupPreview> {
        let cutoff = self.cutoff();
        let (eligible, retained) = self
            .repo
            .count_archived_split(cutoff)
            .await
            .map_err(|e| AppError::scheduler(format!("Cleanup preview failed: {e}")))?;

        Ok(CleanupPreview {
            eligible,
            retained,
            cutoff,
        })
    }

    /// 删除超过保留期的归档订单
    ///
    /// 数据库错误直接返回，不做部分删除后的重试。
    pub async fn run(&self) -> AppResult<CleanupReport> {
        let _guard = self.run_lock.lock().await;

        let cutoff = self.cutoff();
        let purged = self
            .repo
            .purge_archived_before(cutoff)
            .await
            .map_err(|e| AppError::scheduler(format!("Retention cleanup failed: {e}")))?;

        if !purged.is_empty() {
            for order in &purged {
                tracing::debug!(
                    order_number = order.order_number,
                    year = order.year,
                    "Purged archived order"
                );
            }
            self.cache.invalidate("/api/orders");
        }

        tracing::info!(
            deleted = purged.len(),
            cutoff,
            retention_days = self.retention_days,
            "Retention cleanup finished"
        );

        Ok(CleanupReport {
            deleted_count: purged.len(),
            cutoff,
        })
    }
}

// ============================================================================
// RetentionScheduler
// ============================================================================

/// 每日清理调度器
pub struct RetentionScheduler {
    cleanup: RetentionCleanup,
    run_at: NaiveTime,
    tz: Tz,
    shutdown: CancellationToken,
}

impl RetentionScheduler {
    pub fn new(
        cleanup: RetentionCleanup,
        run_at: &str,
        tz: Tz,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            cleanup,
            run_at: parse_run_at(run_at),
            tz,
            shutdown,
        }
    }

    /// 主循环：每天在 `run_at` 触发一次清理
    pub async fn run(self) {
        tracing::info!(run_at = %self.run_at, "Retention scheduler started");

        loop {
            let sleep_duration = Self::duration_until_next_run(self.run_at, self.tz);
            tracing::info!(
                "Next retention cleanup in {} minutes",
                sleep_duration.as_secs() / 60
            );

            tokio::select! {
                _ = tokio::time::sleep(sleep_duration) => {}
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Retention scheduler received shutdown signal");
                    return;
                }
            }

            if let Err(e) = self.cleanup.run().await {
                tracing::error!("Scheduled retention cleanup failed: {}", e);
            }
        }
    }

    /// 计算距离下一次 `run_at` 的 Duration
    fn duration_until_next_run(run_at: NaiveTime, tz: Tz) -> std::time::Duration {
        let now = chrono::Utc::now().with_timezone(&tz);
        let today = now.date_naive();

        let target_date = if now.time() >= run_at {
            // 今天的触发点已过，等明天
            today + chrono::Duration::days(1)
        } else {
            today
        };

        let target_datetime = target_date
            .and_time(run_at)
            .and_local_timezone(tz)
            .single()
            .unwrap_or_else(|| {
                // DST edge case: fallback to +1 min
                (target_date.and_time(run_at) + chrono::Duration::minutes(1))
                    .and_local_timezone(tz)
                    .latest()
                    .unwrap_or_else(|| {
                        tracing::error!(
                            "Cannot resolve local time for retention scheduler, using fallback"
                        );
                        now + chrono::Duration::hours(1)
                    })
            });

        let duration = target_datetime.signed_duration_since(now);
        if duration.num_seconds() <= 0 {
            // Safety: 不应该发生，兜底 1 分钟
            std::time::Duration::from_secs(60)
        } else {
            duration
                .to_std()
                .unwrap_or(std::time::Duration::from_secs(60))
        }
    }
}
