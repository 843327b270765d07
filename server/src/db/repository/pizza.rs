//! Pizza Repository

use super::{BaseRepository, RepoError, RepoResult, record_id_from};
use crate::db::models::{Pizza, PizzaCreate, PizzaUpdate};
use crate::utils::time::now_millis;
use surrealdb::Surreal;
use surrealdb::engine::local::Db;

const TABLE: &str = "pizza";

#[derive(Clone)]
pub struct PizzaRepository {
    base: BaseRepository,
}

impl PizzaRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Find all available pizzas ordered by sort_order
    pub async fn find_available(&self) -> RepoResult<Vec<Pizza>> {
        let pizzas: Vec<Pizza> = self
            .base
            .db()
            .query("SELECT * FROM pizza WHERE is_available = true ORDER BY sort_order")
            .await?
            .take(0)?;
        Ok(pizzas)
    }

    /// Find all pizzas (including unavailable)
    pub async fn find_all(&self) -> RepoResult<Vec<Pizza>> {
        let pizzas: Vec<Pizza> = self
            .base
            .db()
            .query("SELECT * FROM pizza ORDER BY sort_order")
            .await?
            .take(0)?;
        Ok(pizzas)
    }

    /// Find pizza by id
    pub async fn find_by_id(&self, id: &str) -> RepoResult<Option<Pizza>> {
        let record_id = record_id_from(TABLE, id);
        let pizza: Option<Pizza> = self.base.db().select(record_id).await?;
        Ok(pizza)
    }

    /// Find pizza by name
    pub async fn find_by_name(&self, name: &str) -> RepoResult<Option<Pizza>> {
        let name_owned = name.to_string();
        let mut result = self
            .base
            .db()
            .query("SELECT * FROM pizza WHERE name = $name LIMIT 1")
            .bind(("name", name_owned))
            .await?;
        let pizzas: Vec<Pizza> = result.take(0)?;
        Ok(pizzas.into_iter().next())
    }

    /// Create a new pizza
    pub async fn create(&self, data: PizzaCreate) -> RepoResult<Pizza> {
        // Check duplicate name
        if self.find_by_name(&data.name).await?.is_some() {
            return Err(RepoError::Duplicate(format!(
                "Pizza '{}' already exists",
                data.name
            )));
        }

        let pizza = Pizza {
            id: None,
            name: data.name,
            description: data.description,
            price: data.price,
            ingredients: data.ingredients,
            image_url: data.image_url,
            is_available: data.is_available.unwrap_or(true),
            sort_order: data.sort_order.unwrap_or(0),
            created_at: now_millis(),
        };

        let created: Option<Pizza> = self.base.db().create(TABLE).content(pizza).await?;
        created.ok_or_else(|| RepoError::Database("Failed to create pizza".to_string()))
    }

    /// Update a pizza
    pub async fn update(&self, id: &str, data: PizzaUpdate) -> RepoResult<Pizza> {
        let existing = self
            .find_by_id(id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("Pizza {} not found", id)))?;

        // Check duplicate name if changing
        if let Some(ref new_name) = data.name
            && new_name != &existing.name
            && self.find_by_name(new_name).await?.is_some()
        {
            return Err(RepoError::Duplicate(format!(
                "Pizza '{}' already exists",
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
            .ok_or_else(|| RepoError::NotFound(format!("Pizza {} not found", id)))
    }

    /// Hard delete a pizza
    pub async fn delete(&self, id: &str) -> RepoResult<bool> {
        let record_id = record_id_from(TABLE, id);
        let deleted: Option<Pizza> = self.base.db().delete(record_id).await?;
        Ok(deleted.is_some())
    }
}
