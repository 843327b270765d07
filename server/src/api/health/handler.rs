//! Health check handlers

use axum::{Json, extract::State};
use serde::Serialize;
use std::time::Instant;

use crate::core::ServerState;

/// 健康检查响应
#[derive(Serialize)]
pub struct HealthResponse {
    /// 状态 (ok | degraded)
    status: &'static str,
    /// 版本号
    version: &'static str,
    /// 数据库检查
    database: CheckResult,
}

/// 单项检查结果
#[derive(Serialize)]
pub struct CheckResult {
    status: &'static str,
    /// 延迟 (毫秒)
    #[serde(skip_serializing_if = "Option::is_none")]
    latency_ms: Option<u128>,
}

/// GET /health - 健康检查
pub async fn health(State(state): State<ServerState>) -> Json<HealthResponse> {
    let start = Instant::now();
    let database = match state.db.query("RETURN 1").await {
        Ok(_) => CheckResult {
            status: "ok",
            latency_ms: Some(start.elapsed().as_millis()),
        },
        Err(e) => {
            tracing::error!("Health check database probe failed: {}", e);
            CheckResult {
                status: "error",
                latency_ms: None,
            }
        }
    };

    let status = if database.status == "ok" {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}
