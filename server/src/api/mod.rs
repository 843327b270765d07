//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`checkout`] - 店面下单接口 (公开)
//! - [`webhooks`] - 支付回调接口 (公开, HMAC 验签)
//! - [`orders`] - 订单管理接口
//! - [`payments`] - 支付查询接口
//! - [`pizzas`] - 菜单管理接口
//! - [`ingredients`] - 配料管理接口

pub mod middleware;

pub mod checkout;
pub mod health;
pub mod webhooks;

// Admin API
pub mod ingredients;
pub mod orders;
pub mod payments;
pub mod pizzas;

use std::time::Duration;

use axum::middleware as axum_middleware;
use axum::{BoxError, Router, error_handling::HandleErrorLayer, http::StatusCode};
use http::{HeaderName, HeaderValue};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::require_admin;
use crate::cache::cache_layer;
use crate::core::ServerState;

/// Custom request ID generator
#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        let id = Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Map a middleware error to a response; only the timeout layer errors here.
async fn handle_timeout(err: BoxError) -> (StatusCode, &'static str) {
    if err.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "Request timed out")
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    }
}

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        // Storefront API - public routes
        .merge(checkout::router())
        // Processor callbacks - public, HMAC-signed
        .merge(webhooks::router())
        // Admin API - admin token required
        .merge(orders::router())
        .merge(payments::router())
        // Catalog API - public reads, admin mutations
        .merge(pizzas::router())
        .merge(ingredients::router())
        // Health API - public route
        .merge(health::router())
}

/// Build a fully configured application with all middleware and state
///
/// This is used by both the HTTP server and the integration tests.
pub fn build_app(state: &ServerState) -> Router<ServerState> {
    build_router()
        // ========== Innermost: per-request deadline around the handlers ==========
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_timeout))
                .timeout(Duration::from_millis(state.config.request_timeout_ms)),
        )
        // Read cache - sits inside auth so cached admin data still needs a token
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            cache_layer,
        ))
        // Admin gate (JWT) - executes before routes, injects CurrentAdmin
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            require_admin,
        ))
        // ========== Tower HTTP Middleware ==========
        // CORS - Handle cross-origin requests
        .layer(CorsLayer::permissive())
        // Compression - Gzip compress responses
        .layer(CompressionLayer::new())
        // Request logging
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        // Trace - Request tracing (logs at INFO level)
        .layer(TraceLayer::new_for_http())
        // Propagate request ID to response (inside Set so it sees the header)
        .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
            "x-request-id",
        )))
        // Request ID - outermost, so every layer below logs with it
        .layer(SetRequestIdLayer::new(
            HeaderName::from_static("x-request-id"),
            XRequestId,
        ))
}
