//! Ingredient API Handlers

use axum::{
    Json,
    extract::{Path, State},
};

use crate::core::ServerState;
use crate::db::models::{Ingredient, IngredientCreate, IngredientUpdate};
use crate::db::repository::IngredientRepository;
use crate::utils::validation::{MAX_NAME_LEN, validate_money, validate_required_text};
use crate::utils::{AppError, AppResult};

const CACHE_PREFIX: &str = "/api/ingredients";

/// GET /api/ingredients - 配料目录 (仅在售)
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<Vec<Ingredient>>> {
    let repo = IngredientRepository::new(state.db.clone());
    let ingredients = repo.find_available().await?;
    Ok(Json(ingredients))
}

/// GET /api/ingredients/all - 全量列表 (含下架, 管理端)
pub async fn list_all(State(state): State<ServerState>) -> AppResult<Json<Vec<Ingredient>>> {
    let repo = IngredientRepository::new(state.db.clone());
    let ingredients = repo.find_all().await?;
    Ok(Json(ingredients))
}

/// GET /api/ingredients/:id - 获取单个配料
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Ingredient>> {
    let repo = IngredientRepository::new(state.db.clone());
    let ingredient = repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Ingredient {} not found", id)))?;
    Ok(Json(ingredient))
}

/// POST /api/ingredients - 创建配料
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<IngredientCreate>,
) -> AppResult<Json<Ingredient>> {
    validate_required_text(&payload.name, "name", MAX_NAME_LEN)?;
    validate_money(payload.price, "price")?;

    let repo = IngredientRepository::new(state.db.clone());
    let ingredient = repo.create(payload).await?;

    state.cache.invalidate(CACHE_PREFIX);
    Ok(Json(ingredient))
}

/// PUT /api/ingredients/:id - 更新配料
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(payload): Json<IngredientUpdate>,
) -> AppResult<Json<Ingredient>> {
    if let Some(ref name) = payload.name {
        validate_required_text(name, "name", MAX_NAME_LEN)?;
    }
    if let Some(price) = payload.price {
        validate_money(price, "price")?;
    }

    let repo = IngredientRepository::new(state.db.clone());
    let ingredient = repo.update(&id, payload).await?;

    state.cache.invalidate(CACHE_PREFIX);
    Ok(Json(ingredient))
}

/// DELETE /api/ingredients/:id - 删除配料
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<bool>> {
    let repo = IngredientRepository::new(state.db.clone());
    let deleted = repo.delete(&id).await?;
    if !deleted {
        return Err(AppError::not_found(format!("Ingredient {} not found", id)));
    }

    state.cache.invalidate(CACHE_PREFIX);
    Ok(Json(deleted))
}
