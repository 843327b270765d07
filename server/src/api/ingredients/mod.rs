//! Ingredient API 模块
//!
//! 自选披萨的配料目录, 读取公开, 增删改仅限管理端。

mod handler;

use axum::{
    Router,
    routing::get,
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/ingredients", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        // Full list including hidden entries (must be before /{id})
        .route("/all", get(handler::list_all))
        .route(
            "/{id}",
            get(handler::get_by_id)
                .put(handler::update)
                .delete(handler::delete),
        )
}
