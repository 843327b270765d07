//! Pizza API Handlers

use axum::{
    Json,
    extract::{Path, State},
};

use crate::core::ServerState;
use crate::db::models::{Pizza, PizzaCreate, PizzaUpdate};
use crate::db::repository::PizzaRepository;
use crate::utils::validation::{MAX_NAME_LEN, validate_money, validate_required_text};
use crate::utils::{AppError, AppResult};

const CACHE_PREFIX: &str = "/api/pizzas";

/// GET /api/pizzas - 菜单 (仅在售)
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<Vec<Pizza>>> {
    let repo = PizzaRepository::new(state.db.clone());
    let pizzas = repo.find_available().await?;
    Ok(Json(pizzas))
}

/// GET /api/pizzas/all - 全量列表 (含下架, 管理端)
pub async fn list_all(State(state): State<ServerState>) -> AppResult<Json<Vec<Pizza>>> {
    let repo = PizzaRepository::new(state.db.clone());
    let pizzas = repo.find_all().await?;
    Ok(Json(pizzas))
}

/// GET /api/pizzas/:id - 获取单个披萨
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Pizza>> {
    let repo = PizzaRepository::new(state.db.clone());
    let pizza = repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Pizza {} not found", id)))?;
    Ok(Json(pizza))
}

/// POST /api/pizzas - 创建披萨
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<PizzaCreate>,
) -> AppResult<Json<Pizza>> {
    validate_required_text(&payload.name, "name", MAX_NAME_LEN)?;
    validate_money(payload.price, "price")?;

    let repo = PizzaRepository::new(state.db.clone());
    let pizza = repo.create(payload).await?;

    state.cache.invalidate(CACHE_PREFIX);
    Ok(Json(pizza))
}

/// PUT /api/pizzas/:id - 更新披萨
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<PizzaUpdate>,
) -> AppResult<Json<Pizza>> {
    if let Some(ref name) = payload.name {
        validate_required_text(name, "name", MAX_NAME_LEN)?;
    }
    if let Some(price) = payload.price {
        validate_money(price, "price")?;
    }

    let repo = PizzaRepository::new(state.db.clone());
    let pizza = repo.update(&id, payload).await?;

    state.cache.invalidate(CACHE_PREFIX);
    Ok(Json(pizza))
}

/// DELETE /api/pizzas/:id - 删除披萨
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<bool>> {
    let repo = PizzaRepository::new(state.db.clone());
    let deleted = repo.delete(&id).await?;
    if !deleted {
        return Err(AppError::not_found(format!("Pizza {} not found", id)));
    }

    state.cache.invalidate(CACHE_PREFIX);
    Ok(Json(deleted))
}
