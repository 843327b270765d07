//! 缓存中间件
//!
//! 拦在路由之前的读缓存：命中直接返回已缓存的响应体，
//! 未命中则放行并在 200 响应返回前写入缓存。
//! 只缓存白名单内的 GET 端点。

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;

use crate::core::ServerState;
use crate::utils::AppError;

/// 可缓存的只读端点
const CACHEABLE_PATHS: [&str; 4] = [
    "/api/pizzas",
    "/api/ingredients",
    "/api/orders/open",
    "/api/orders/archived",
];

fn is_cacheable(method: &http::Method, path: &str) -> bool {
    method == http::Method::GET && CACHEABLE_PATHS.contains(&path)
}

fn cache_key(req: &Request) -> String {
    match req.uri().query() {
        Some(query) => format!("{} {}?{}", req.method(), req.uri().path(), query),
        None => format!("{} {}", req.method(), req.uri().path()),
    }
}

/// 缓存中间件
///
/// 必须安放在压缩层内侧，缓存的是未压缩的响应体。
pub async fn cache_layer(
    State(state): State<ServerState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !is_cacheable(req.method(), req.uri().path()) {
        return Ok(next.run(req).await);
    }

    let key = cache_key(&req);
    if let Some(hit) = state.cache.get(&key) {
        let mut builder = Response::builder().status(http::StatusCode::OK);
        if let Some(content_type) = &hit.content_type {
            builder = builder.header(http::header::CONTENT_TYPE, content_type);
        }
        return builder
            .body(Body::from(hit.body))
            .map_err(|e| AppError::internal(format!("Failed to build cached response: {e}")));
    }

    let response = next.run(req).await;

    // 只缓存 200 响应，其余直接透传
    if response.status() != http::StatusCode::OK {
        return Ok(response);
    }

    let (parts, body) = response.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|e| AppError::internal(format!("Failed to buffer response body: {e}")))?
        .to_bytes();

    let content_type = parts
        .headers
        .get(http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    state.cache.set(key, bytes.to_vec(), content_type);

    Ok(Response::from_parts(parts, Body::from(bytes)))
}
