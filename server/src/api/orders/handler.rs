//! Order API Handlers
//!
//! Thin wrappers over `OrderService` and `RetentionCleanup`. Transition
//! rules live in the service; handlers only translate HTTP in and out.

use axum::{
    Json,
    extract::{Path, State},
};

use crate::core::ServerState;
use crate::db::models::{Order, OrderStatusUpdate};
use crate::orders::{CleanupPreview, CleanupReport};
use crate::utils::AppResult;

/// List active orders (pending_payment, processing, completed)
pub async fn list_open(State(state): State<ServerState>) -> AppResult<Json<Vec<Order>>> {
    let orders = state.orders.list_open().await?;
    Ok(Json(orders))
}

/// List archived orders
pub async fn list_archived(State(state): State<ServerState>) -> AppResult<Json<Vec<Order>>> {
    let orders = state.orders.list_archived().await?;
    Ok(Json(orders))
}

/// Get order by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let order = state.orders.get(&id).await?;
    Ok(Json(order))
}

/// Get order by its per-year order number
pub async fn get_by_number(
    State(state): State<ServerState>,
    Path(number): Path<i64>,
) -> AppResult<Json<Order>> {
    let order = state.orders.get_by_number(number).await?;
    Ok(Json(order))
}

/// Manually advance or cancel an order
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<OrderStatusUpdate>,
) -> AppResult<Json<Order>> {
    let order = state.orders.update_status(&id, payload.status).await?;
    Ok(Json(order))
}

/// Move an order into the archive (idempotent)
pub async fn archive(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let order = state.orders.archive(&id).await?;
    Ok(Json(order))
}

/// Dry-run of the retention purge
pub async fn cleanup_preview(State(state): State<ServerState>) -> AppResult<Json<CleanupPreview>> {
    let preview = state.cleanup.preview().await?;
    Ok(Json(preview))
}

/// Run the retention purge now instead of waiting for the scheduler
pub async fn cleanup_run(State(state): State<ServerState>) -> AppResult<Json<CleanupReport>> {
    let report = state.cleanup.run().await?;
    Ok(Json(report))
}
