//! 端到端 API 测试 (内存数据库 + 脚本化支付处理器)
//!
//! 通过 tower::ServiceExt::oneshot 驱动完整中间件栈 (请求 ID、
//! 认证、缓存、超时)，不绑定端口。

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use hmac::{Hmac, Mac};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use sha2::Sha256;
use surrealdb::Surreal;
use surrealdb::engine::local::Mem;
use tower::ServiceExt;

use pizzeria_server::api::build_app;
use pizzeria_server::auth::JwtConfig;
use pizzeria_server::payments::processor::{
    CardProcessor, ChargeOutcome, ChargeRequest, PaymentState, ProcessorError, ProcessorErrorKind,
    ProcessorPaymentStatus,
};
use pizzeria_server::{Config, ServerState};

const WEBHOOK_SECRET: &str = "whsec_integration_test";

/// 脚本化处理器：按测试令牌决定扣款结果
struct ScriptedProcessor;

#[async_trait]
impl CardProcessor for ScriptedProcessor {
    async fn charge(&self, request: &ChargeRequest) -> Result<ChargeOutcome, ProcessorError> {
        match request.token.as_str() {
            "tok_visa" => Ok(ChargeOutcome {
                id: format!("pay_{}", request.reference_id),
                status: ProcessorPaymentStatus::Completed,
                receipt_number: Some("R-100".to_string()),
                processing_fee: 36,
                failure_reason: None,
            }),
            "tok_async" => Ok(ChargeOutcome {
                id: format!("pay_{}", request.reference_id),
                status: ProcessorPaymentStatus::Pending,
                receipt_number: None,
                processing_fee: 0,
                failure_reason: None,
            }),
            "tok_declined" => Err(ProcessorError::new(
                ProcessorErrorKind::CardDeclined,
                "Insufficient funds",
            )),
            "tok_timeout" => Err(ProcessorError::new(
                ProcessorErrorKind::Timeout,
                "Processor request timed out",
            )),
            other => Err(ProcessorError::new(
                ProcessorErrorKind::InvalidRequest,
                format!("Unknown test token {other}"),
            )),
        }
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentState, ProcessorError> {
        Ok(PaymentState {
            id: payment_id.to_string(),
            status: ProcessorPaymentStatus::Completed,
            amount: 1250,
            processing_fee: 36,
            receipt_number: Some("R-100".to_string()),
            failure_reason: None,
        })
    }
}

fn test_config() -> Config {
    let mut config = Config::from_env();
    config.environment = "test".to_string();
    config.jwt = JwtConfig {
        secret: "integration-test-secret-0123456789abcdef".to_string(),
        expiration_minutes: 60,
        issuer: "pizzeria-server".to_string(),
        audience: "pizzeria-admin".to_string(),
    };
    config.payment_webhook_secret = WEBHOOK_SECRET.to_string();
    config.order_number_base = 1000;
    config.cache_ttl_secs = 60;
    config
}

async fn test_state() -> ServerState {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("pizzeria").use_db("main").await.unwrap();

    let config = test_config();
    // 通知接收端直接丢弃：入队失败只产生告警，不影响下单
    let (state, _notify_rx) =
        ServerState::with_db(&config, db, Arc::new(ScriptedProcessor)).await;
    state
}

fn app(state: &ServerState) -> Router {
    build_app(state).with_state(state.clone())
}

fn admin_token(state: &ServerState) -> String {
    state.jwt.issue_token("admin-1").unwrap()
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json_body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json_body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Margherita + 两杯可乐 = 8.50 + 2 * 2.00 = 12.50
fn checkout_payload(method: &str, token: Option<&str>) -> Value {
    json!({
        "items": [
            { "name": "Margherita", "unit_price": 8.50, "quantity": 1 },
            { "name": "Coke", "unit_price": 2.00, "quantity": 2 }
        ],
        "address": "Calle Mayor 1",
        "phone": "+34600111222",
        "first_name": "Ana",
        "last_name": "García",
        "email": "ana@example.com",
        "payment_method": method,
        "payment_token": token,
    })
}

/// 处理器侧的 webhook 签名: HMAC-SHA256("{ts}.{body}")
fn sign_webhook(payload: &[u8], secret: &str) -> String {
    let ts = chrono::Utc::now().timestamp();
    let signed = format!("{ts}.{}", std::str::from_utf8(payload).unwrap());
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(signed.as_bytes());
    format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
}

async fn post_webhook(app: &Router, body: &Value, secret: &str) -> (StatusCode, Value) {
    let raw = body.to_string();
    let signature = sign_webhook(raw.as_bytes(), secret);
    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/payments")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-webhook-signature", signature)
        .body(Body::from(raw))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// 从 API 响应中取出纯 record key ("order:abc" -> "abc")
fn record_key(order: &Value) -> String {
    order["id"]
        .as_str()
        .unwrap()
        .trim_start_matches("order:")
        .to_string()
}

#[tokio::test]
async fn test_cash_checkout_is_accepted_immediately() {
    let state = test_state().await;
    let app = app(&state);

    let (status, order) = send(
        &app,
        "POST",
        "/api/checkout",
        None,
        Some(checkout_payload("CASH", None)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "PROCESSING");
    assert_eq!(order["total"], 12.5);
    assert_eq!(order["order_number"], 1000);
    assert_eq!(order["payment"]["method"], "CASH");
    assert_eq!(order["payment"]["status"], "PENDING");

    // 订单号按业务年份递增
    let (_, second) = send(
        &app,
        "POST",
        "/api/checkout",
        None,
        Some(checkout_payload("CASH", None)),
    )
    .await;
    assert_eq!(second["order_number"], 1001);
}

#[tokio::test]
async fn test_card_checkout_settles_synchronously() {
    let state = test_state().await;
    let app = app(&state);

    let (status, order) = send(
        &app,
        "POST",
        "/api/checkout",
        None,
        Some(checkout_payload("CARD", Some("tok_visa"))),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "PROCESSING");
    assert_eq!(order["payment"]["status"], "COMPLETED");
    assert_eq!(order["payment"]["receipt_number"], "R-100");
    assert_eq!(order["payment"]["amount_paid"], 12.5);
    assert_eq!(order["payment"]["processing_fee"], 0.36);
    let payment_id = order["payment"]["payment_id"].as_str().unwrap();
    assert!(payment_id.starts_with("pay_"));
}

#[tokio::test]
async fn test_card_decline_soft_cancels_inline() {
    let state = test_state().await;
    let app = app(&state);
    let token = admin_token(&state);

    // 拒付返回 402，订单已软取消并附在响应里
    let (status, body) = send(
        &app,
        "POST",
        "/api/checkout",
        None,
        Some(checkout_payload("CARD", Some("tok_declined"))),
    )
    .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "E6001");
    assert_eq!(body["data"]["status"], "CANCELLED");
    assert_eq!(body["data"]["payment"]["status"], "FAILED");
    assert_eq!(body["data"]["payment"]["failure_reason"], "card_declined");
    let order_number = body["data"]["order_number"].as_i64().unwrap();

    // 管理端能查到这笔已取消订单，不是消失的弃单
    let (status, cancelled) = send(
        &app,
        "GET",
        &format!("/api/orders/number/{order_number}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");

    // 客户端重复上报同一笔失败是幂等的
    let (status, again) = send(
        &app,
        "POST",
        "/api/checkout/payment-failed",
        None,
        Some(json!({ "order_number": order_number, "reason": "card_declined" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["status"], "CANCELLED");
    assert_eq!(again["payment"]["failure_reason"], "card_declined");
}

#[tokio::test]
async fn test_processor_timeout_leaves_order_pending() {
    let state = test_state().await;
    let app = app(&state);

    // 超时结果未知：订单保持待支付，等 webhook 或清扫任务收尾
    let (status, body) = send(
        &app,
        "POST",
        "/api/checkout",
        None,
        Some(checkout_payload("CARD", Some("tok_timeout"))),
    )
    .await;

    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["code"], "E6001");
    assert_eq!(body["data"]["status"], "PENDING_PAYMENT");
    let order_number = body["data"]["order_number"].as_i64().unwrap();

    // 客户端主动上报失败即可软取消
    let (status, cancelled) = send(
        &app,
        "POST",
        "/api/checkout/payment-failed",
        None,
        Some(json!({ "order_number": order_number, "reason": "payment_timeout" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(cancelled["payment"]["failure_reason"], "payment_timeout");
}

#[tokio::test]
async fn test_checkout_validation_rejects_bad_payloads() {
    let state = test_state().await;
    let app = app(&state);

    // 空订单
    let empty = json!({
        "items": [],
        "phone": "+34600111222",
        "first_name": "Ana",
        "payment_method": "CASH",
    });
    let (status, body) = send(&app, "POST", "/api/checkout", None, Some(empty)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "E0002");

    // 卡支付缺少令牌
    let (status, body) = send(
        &app,
        "POST",
        "/api/checkout",
        None,
        Some(checkout_payload("CARD", None)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "E0002");

    // 非法单价
    let bad_price = json!({
        "items": [{ "name": "Margherita", "unit_price": -1.0, "quantity": 1 }],
        "phone": "+34600111222",
        "first_name": "Ana",
        "payment_method": "CASH",
    });
    let (status, _) = send(&app, "POST", "/api/checkout", None, Some(bad_price)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let state = test_state().await;
    let app = app(&state);

    let (status, body) = send(&app, "GET", "/api/orders/open", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "E3001");

    let (status, body) = send(&app, "GET", "/api/orders/open", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "E3002");

    let token = admin_token(&state);
    let (status, body) = send(&app, "GET", "/api/orders/open", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_array());
}

#[tokio::test]
async fn test_public_routes_skip_admin_gate() {
    let state = test_state().await;
    let app = app(&state);

    let (status, menu) = send(&app, "GET", "/api/pizzas", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(menu.is_array());

    let (status, health) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "ok");
    assert_eq!(health["database"]["status"], "ok");
}

#[tokio::test]
async fn test_manual_status_flow_and_archive() {
    let state = test_state().await;
    let app = app(&state);
    let token = admin_token(&state);

    let (_, order) = send(
        &app,
        "POST",
        "/api/checkout",
        None,
        Some(checkout_payload("CASH", None)),
    )
    .await;
    let id = order["id"].as_str().unwrap().to_string();

    // PROCESSING -> COMPLETED
    let (status, updated) = send(
        &app,
        "PATCH",
        &format!("/api/orders/{id}/status"),
        Some(&token),
        Some(json!({ "status": "COMPLETED" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "COMPLETED");

    // 逆向转移被拒绝，状态保持不变
    let (status, body) = send(
        &app,
        "PATCH",
        &format!("/api/orders/{id}/status"),
        Some(&token),
        Some(json!({ "status": "PROCESSING" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "E0005");

    let (_, current) = send(&app, "GET", &format!("/api/orders/{id}"), Some(&token), None).await;
    assert_eq!(current["status"], "COMPLETED");

    // 归档，重复归档是幂等 no-op
    let (status, archived) = send(
        &app,
        "POST",
        &format!("/api/orders/{id}/archive"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(archived["status"], "ARCHIVED");

    let (status, again) = send(
        &app,
        "POST",
        &format!("/api/orders/{id}/archive"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["status"], "ARCHIVED");

    // 归档后从活动列表消失，出现在归档列表
    let (_, open) = send(&app, "GET", "/api/orders/open", Some(&token), None).await;
    assert_eq!(open.as_array().unwrap().len(), 0);
    let (_, archived_list) = send(&app, "GET", "/api/orders/archived", Some(&token), None).await;
    assert_eq!(archived_list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_webhook_settles_async_payment_idempotently() {
    let state = test_state().await;
    let app = app(&state);
    let token = admin_token(&state);

    // 扣款被受理但结算异步到达
    let (status, order) = send(
        &app,
        "POST",
        "/api/checkout",
        None,
        Some(checkout_payload("CARD", Some("tok_async"))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["status"], "PENDING_PAYMENT");
    let key = record_key(&order);
    let id = order["id"].as_str().unwrap().to_string();

    let event = json!({
        "type": "payment.updated",
        "data": {
            "id": "pay_async_1",
            "status": "completed",
            "reference_id": key,
            "receipt_number": "R-777",
            "amount": 1250,
            "processing_fee": 36,
            "failure_reason": null
        }
    });

    let (status, ack) = post_webhook(&app, &event, WEBHOOK_SECRET).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["received"], true);

    let (_, settled) = send(&app, "GET", &format!("/api/orders/{id}"), Some(&token), None).await;
    assert_eq!(settled["status"], "PROCESSING");
    assert_eq!(settled["payment"]["status"], "COMPLETED");
    assert_eq!(settled["payment"]["payment_id"], "pay_async_1");
    assert_eq!(settled["payment"]["receipt_number"], "R-777");
    assert_eq!(settled["payment"]["amount_paid"], 12.5);

    // 重复投递短路，订单不被二次修改
    let (status, _) = post_webhook(&app, &event, WEBHOOK_SECRET).await;
    assert_eq!(status, StatusCode::OK);
    let (_, after) = send(&app, "GET", &format!("/api/orders/{id}"), Some(&token), None).await;
    assert_eq!(after["status"], "PROCESSING");
    assert_eq!(after["payment"]["paid_at"], settled["payment"]["paid_at"]);
}

#[tokio::test]
async fn test_webhook_failure_soft_cancels_pending_order() {
    let state = test_state().await;
    let app = app(&state);
    let token = admin_token(&state);

    let (_, order) = send(
        &app,
        "POST",
        "/api/checkout",
        None,
        Some(checkout_payload("CARD", Some("tok_async"))),
    )
    .await;
    let key = record_key(&order);
    let id = order["id"].as_str().unwrap().to_string();

    let event = json!({
        "type": "payment.updated",
        "data": {
            "id": "pay_async_2",
            "status": "failed",
            "reference_id": key,
            "receipt_number": null,
            "amount": 1250,
            "processing_fee": 0,
            "failure_reason": "insufficient_funds"
        }
    });

    let (status, _) = post_webhook(&app, &event, WEBHOOK_SECRET).await;
    assert_eq!(status, StatusCode::OK);

    let (_, cancelled) = send(&app, "GET", &format!("/api/orders/{id}"), Some(&token), None).await;
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(cancelled["payment"]["status"], "FAILED");
    assert_eq!(cancelled["payment"]["failure_reason"], "insufficient_funds");
}

#[tokio::test]
async fn test_webhook_bad_signature_rejected() {
    let state = test_state().await;
    let app = app(&state);

    let event = json!({
        "type": "payment.updated",
        "data": {
            "id": "pay_x",
            "status": "completed",
            "reference_id": "nonexistent",
            "receipt_number": null,
            "amount": 100,
            "processing_fee": 0,
            "failure_reason": null
        }
    });

    // 错误密钥签名
    let (status, body) = post_webhook(&app, &event, "whsec_wrong").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "E0002");

    // 缺少签名头
    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/payments")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(event.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_unknown_reference_is_acked() {
    let state = test_state().await;
    let app = app(&state);

    // 引用不存在的订单：确认接收，避免处理器无限重投
    let event = json!({
        "type": "payment.updated",
        "data": {
            "id": "pay_orphan",
            "status": "completed",
            "reference_id": "does-not-exist",
            "receipt_number": null,
            "amount": 500,
            "processing_fee": 0,
            "failure_reason": null
        }
    });

    let (status, ack) = post_webhook(&app, &event, WEBHOOK_SECRET).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["received"], true);
}

#[tokio::test]
async fn test_pizza_catalog_crud_and_menu_visibility() {
    let state = test_state().await;
    let app = app(&state);
    let token = admin_token(&state);

    let payload = json!({
        "name": "Diavola",
        "description": "Spicy salami",
        "price": 11.90,
        "ingredients": ["tomato", "mozzarella", "salami"],
    });

    // 写菜单需要管理端令牌
    let (status, _) = send(&app, "POST", "/api/pizzas", None, Some(payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, pizza) = send(&app, "POST", "/api/pizzas", Some(&token), Some(payload.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pizza["name"], "Diavola");
    assert_eq!(pizza["is_available"], true);
    let id = pizza["id"].as_str().unwrap().to_string();

    // 重名创建被拒
    let (status, body) = send(&app, "POST", "/api/pizzas", Some(&token), Some(payload)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "E0004");

    // 公开菜单可见
    let (_, menu) = send(&app, "GET", "/api/pizzas", None, None).await;
    assert_eq!(menu.as_array().unwrap().len(), 1);

    // 下架后从公开菜单消失，管理端全量列表仍可见
    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/pizzas/{id}"),
        Some(&token),
        Some(json!({ "is_available": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, menu) = send(&app, "GET", "/api/pizzas", None, None).await;
    assert_eq!(menu.as_array().unwrap().len(), 0);
    let (_, all) = send(&app, "GET", "/api/pizzas/all", Some(&token), None).await;
    assert_eq!(all.as_array().unwrap().len(), 1);

    // 删除
    let (status, deleted) = send(
        &app,
        "DELETE",
        &format!("/api/pizzas/{id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, true);
    let (_, all) = send(&app, "GET", "/api/pizzas/all", Some(&token), None).await;
    assert_eq!(all.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_open_orders_cache_reflects_mutations() {
    let state = test_state().await;
    let app = app(&state);
    let token = admin_token(&state);

    send(
        &app,
        "POST",
        "/api/checkout",
        None,
        Some(checkout_payload("CASH", None)),
    )
    .await;

    // 两次读取，第二次命中缓存
    let (_, first) = send(&app, "GET", "/api/orders/open", Some(&token), None).await;
    assert_eq!(first.as_array().unwrap().len(), 1);
    let (_, cached) = send(&app, "GET", "/api/orders/open", Some(&token), None).await;
    assert_eq!(cached.as_array().unwrap().len(), 1);

    // 新订单使缓存失效，列表立即反映变化
    send(
        &app,
        "POST",
        "/api/checkout",
        None,
        Some(checkout_payload("CASH", None)),
    )
    .await;
    let (_, refreshed) = send(&app, "GET", "/api/orders/open", Some(&token), None).await;
    assert_eq!(refreshed.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_payment_read_through() {
    let state = test_state().await;
    let app = app(&state);
    let token = admin_token(&state);

    let (status, _) = send(&app, "GET", "/api/payments/pay_123", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, payment) = send(&app, "GET", "/api/payments/pay_123", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["id"], "pay_123");
    assert_eq!(payment["status"], "completed");
    assert_eq!(payment["amount"], 1250);
}

#[tokio::test]
async fn test_unknown_order_number_is_404() {
    let state = test_state().await;
    let app = app(&state);
    let token = admin_token(&state);

    let (status, body) = send(&app, "GET", "/api/orders/number/99999", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "E0003");
}
