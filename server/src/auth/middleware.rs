//! 认证中间件
//!
//! 管理端路由要求网关签发的 JWT；店面路由（下单、支付回调、菜单读取）
//! 保持公开。

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http::Method;

use crate::auth::{CurrentAdmin, JwtService};
use crate::core::ServerState;
use crate::utils::AppError;

/// 无需认证的店面路由 (method + path 精确匹配)
fn is_public_route(method: &Method, path: &str) -> bool {
    matches!(
        (method, path),
        (&Method::POST, "/api/checkout")
            | (&Method::POST, "/api/checkout/payment-failed")
            | (&Method::POST, "/api/webhooks/payments")
            | (&Method::GET, "/api/pizzas")
            | (&Method::GET, "/api/ingredients")
    )
}

/// 管理端认证中间件
///
/// 从 `Authorization: Bearer <token>` 头提取并验证 JWT，校验
/// `role == "admin"`，验证成功后将 [`CurrentAdmin`] 注入请求扩展。
///
/// # 跳过认证的路径
///
/// - `OPTIONS *` (CORS 预检)
/// - 非 `/api/` 路径 (健康检查等)
/// - 店面公开路由，见 [`is_public_route`]
///
/// # 错误处理
///
/// | 错误 | HTTP 状态码 |
/// |------|------------|
/// | 无 Authorization 头 | 401 Unauthorized |
/// | 令牌过期 | 401 TokenExpired |
/// | 无效令牌 | 401 InvalidToken |
/// | 非管理员角色 | 403 Forbidden |
pub async fn require_admin(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = req.uri().path();

    // 允许 CORS 预检的 OPTIONS 请求 (跳过认证)
    if req.method() == Method::OPTIONS {
        return Ok(next.run(req).await);
    }

    // 非 API 路由跳过认证 (让它们正常返回 404)
    if !path.starts_with("/api/") {
        return Ok(next.run(req).await);
    }

    if is_public_route(req.method(), path) {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header {
        Some(header) => JwtService::extract_from_header(header)
            .ok_or(AppError::InvalidToken)?,
        None => {
            tracing::warn!(uri = %req.uri(), "Rejected request without credentials");
            return Err(AppError::Unauthorized);
        }
    };

    match state.jwt.validate_token(token) {
        Ok(claims) => {
            let admin = CurrentAdmin::from(claims);
            if !admin.is_admin() {
                tracing::warn!(sub = %admin.id, role = %admin.role, "Non-admin token rejected");
                return Err(AppError::forbidden("Admin role required"));
            }
            req.extensions_mut().insert(admin);
            Ok(next.run(req).await)
        }
        Err(e) => {
            tracing::warn!(uri = %req.uri(), error = %e, "Token validation failed");
            match e {
                crate::auth::JwtError::ExpiredToken => Err(AppError::TokenExpired),
                _ => Err(AppError::InvalidToken),
            }
        }
    }
}
