//! Order API Module
//!
//! Admin-facing order management. Creation is shared with the public
//! checkout flow; everything else here requires an admin token.

mod handler;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::api::checkout::handler::create_order;
use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    // 静态路径必须注册在 /{id} 之前，否则会被当成订单 ID 解析
    Router::new()
        // Staff-entered orders (phone, walk-in) share the checkout flow
        .route("/", post(create_order))
        // Active board: pending_payment + processing + completed
        .route("/open", get(handler::list_open))
        // Order history (archived orders)
        .route("/archived", get(handler::list_archived))
        // Lookup by human-facing order number
        .route("/number/{number}", get(handler::get_by_number))
        // Retention dry-run and manual purge
        .route("/cleanup/preview", get(handler::cleanup_preview))
        .route("/cleanup/run", post(handler::cleanup_run))
        // Order detail
        .route("/{id}", get(handler::get_by_id))
        // Manual lifecycle transitions
        .route("/{id}/status", patch(handler::update_status))
        .route("/{id}/archive", post(handler::archive))
}
