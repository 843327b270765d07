//! 时间工具函数: 业务时区转换
//!
//! 所有时间戳统一使用 `i64` Unix millis，
//! 业务年份和清理截止日期按配置时区计算。

use chrono::{Datelike, NaiveTime};
use chrono_tz::Tz;

/// 当前 Unix 时间戳 (毫秒)
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// 当前业务年份 (业务时区)
///
/// 订单号在每个业务年份内独立递增。
pub fn current_year(tz: Tz) -> i32 {
    chrono::Utc::now().with_timezone(&tz).year()
}

/// 解析时刻字符串 (HH:MM)，失败返回 00:00
pub fn parse_run_at(run_at: &str) -> NaiveTime {
    NaiveTime::parse_from_str(run_at, "%H:%M").unwrap_or_else(|e| {
        tracing::warn!(
            "Failed to parse cleanup_run_at '{}': {}, falling back to 00:00",
            run_at,
            e
        );
        NaiveTime::MIN
    })
}
