//! Database Module
//!
//! Handles the embedded SurrealDB instance and table definitions

pub mod models;
pub mod repository;

use crate::utils::AppError;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, RocksDb};

const NAMESPACE: &str = "pizzeria";
const DATABASE: &str = "main";

/// Database service, owns the embedded SurrealDB handle
#[derive(Clone)]
pub struct DbService {
    pub db: Surreal<Db>,
}

impl DbService {
    /// Open the RocksDB-backed database and define tables
    pub async fn new(db_path: &str) -> Result<Self, AppError> {
        std::fs::create_dir_all(db_path)
            .map_err(|e| AppError::database(format!("Failed to create database dir: {e}")))?;

        let db = Surreal::new::<RocksDb>(db_path)
            .await
            .map_err(|e| AppError::database(format!("Failed to open database: {e}")))?;

        db.use_ns(NAMESPACE)
            .use_db(DATABASE)
            .await
            .map_err(|e| AppError::database(format!("Failed to select namespace: {e}")))?;

        tracing::info!(path = db_path, "Database connection established (RocksDB)");

        Self::define_schema(&db).await?;
        tracing::info!("Database table definitions applied");

        Ok(Self { db })
    }

    /// Define tables and indexes (idempotent, safe on every startup).
    ///
    /// The unique `(year, order_number)` index is what makes order-number
    /// allocation safe under concurrent checkouts: the counter hands out
    /// the numbers, the index guarantees no duplicate is ever persisted.
    pub async fn define_schema(db: &Surreal<Db>) -> Result<(), AppError> {
        db.query(
            "DEFINE TABLE IF NOT EXISTS order SCHEMALESS;
             DEFINE TABLE IF NOT EXISTS order_counter SCHEMALESS;
             DEFINE TABLE IF NOT EXISTS ingredient SCHEMALESS;
             DEFINE TABLE IF NOT EXISTS pizza SCHEMALESS;
             DEFINE INDEX IF NOT EXISTS order_year_number ON TABLE order FIELDS year, order_number UNIQUE;
             DEFINE INDEX IF NOT EXISTS order_status ON TABLE order FIELDS status;
             DEFINE INDEX IF NOT EXISTS ingredient_name ON TABLE ingredient FIELDS name UNIQUE;
             DEFINE INDEX IF NOT EXISTS pizza_name ON TABLE pizza FIELDS name UNIQUE;",
        )
        .await
        .map_err(|e| AppError::database(format!("Failed to define schema: {e}")))?
        .check()
        .map_err(|e| AppError::database(format!("Schema definition rejected: {e}")))?;
        Ok(())
    }
}
