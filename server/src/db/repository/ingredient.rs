//! Ingredient Repository

use super::{BaseRepository, RepoError, RepoResult, record_id_from};
use crate::db::models::{Ingredient, IngredientCreate, IngredientUpdate};
use crate::utils::time::now_millis;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const TABLE: &str = "ingredient";

#[derive(Clone)]
pub struct IngredientRepository {
    base: BaseRepository,
}

impl IngredientRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find all available ingredients ordered by sort_order
    pub async fn find_available(&self) -> RepoResult<Vec<Ingredient>> {
        let ingredients: Vec<Ingredient> = self
            .base
            .db()
            .query("SELECT * FROM ingredient WHERE is_available = true ORDER BY sort_order")
            .await?
            .take(0)?;
        Ok(ingredients)
    }

    /// Find all ingredients (including unavailable)
    pub async fn find_all(&self) -> RepoResult<Vec<Ingredient>> {
        let ingredients: Vec<Ingredient> = self
            .base
            .db()
            .query("SELECT * FROM ingredient ORDER BY sort_order")
            .await?
            .take(0)?;
        Ok(ingredients)
    }

    /// Find ingredient by id
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Ingredient>> {
        let record_id = record_id_from(TABLE, id);
        let ingredient: Option<Ingredient> = self.base.db().select(record_id).await?;
        Ok(ingredient)
    }

    /// Find ingredient by name
    pub async fn find_by_name(&self, name: &str) -> RepoResult<Option<Ingredient>> {
        let name_owned = name.to_string();
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM ingredient WHERE name = $name LIMIT 1")
            .bind(("name", name_owned))
            .await?;
        let ingredients: Vec<Ingredient> = result.take(0)?;
        Ok(ingredients.into_iter().next())
    }

    /// Create a new ingredient
    pub async fn create(&self, data: IngredientCreate) -> RepoResult<Ingredient> {
        // Check duplicate name
        if self.find_by_name(&data.name).await?.is_some() {
            return Err(RepoError::Duplicate(format!(
                "Ingredient '{}' already exists",
                data.name
            )));
        }

        let ingredient = Ingredient {
            id: None,
            name: data.name,
            kind: data.kind,
            price: data.price,
            is_available: data.is_available.unwrap_or(true),
            sort_order: data.sort_order.unwrap_or(0),
            created_at: now_millis(),
        };

        let created: Option<Ingredient> = self.base.db().create(TABLE).content(ingredient).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create ingredient".to_string()))
    }

    /// Update an ingredient
    pub async fn update(&self, id: &str, data: IngredientUpdate) -> RepoResult<Ingredient> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Ingredient {} not found", id)))?;

        // Check duplicate name if changing
        if let Some(ref new_name) = data.name
            && new_name != &existing.name
            && self.find_by_name(new_name).await?.is_some()
        {
            return Err(RepoError::Duplicate(format!(
                "Ingredient '{}' already exists",
                new_name
            )));
        }

        let record_id = record_id_from(TABLE, id);
        self.base
            .db()
            .query("UPDATE $id MERGE $data")
            .bind(("id", record_id))
            .bind(("data", data))
            .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Ingredient {} not found", id)))
    }

    /// Hard delete an ingredient
    pub async fn delete(&self, id: &str) -> RepoResult<bool> {
        let record_id = record_id_from(TABLE, id);
        let deleted: Option<Ingredient> = self.base.db().delete(record_id).await?;
        Ok(deleted.is_some())
    }
}
