//! Checkout API 模块 (店面公开路由)

// 管理端 POST /api/orders 复用同一个下单 handler
pub(crate) mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/checkout", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create_order))
        .route("/payment-failed", post(handler::payment_failed))
}
