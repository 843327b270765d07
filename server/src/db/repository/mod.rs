//! Repository Module
//!
//! Provides CRUD operations for SurrealDB tables.

// Catalog Domain
pub mod ingredient;
pub mod pizza;

// Orders
pub mod order;

// Re-exports
pub use ingredient::IngredientRepository;
pub use order::OrderRepository;
pub use pizza::PizzaRepository;

use surrealdb::Surreal;
use surrealdb::engine::local::Db;
use thiserror::Error;

use crate::utils::AppError;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<surrealdb::Error> for RepoError {
    fn from(err: surrealdb::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::NotFound(msg),
            RepoError::Duplicate(msg) => AppError::Conflict(msg),
            RepoError::Database(msg) => AppError::Database(msg),
            RepoError::Validation(msg) => AppError::Validation(msg),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Classify a database error message as a unique-index violation
pub(crate) fn is_duplicate_error(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("unique") || lower.contains("already exists") || lower.contains("duplicate")
}

// =============================================================================
// ID Convention: 全栈统一使用 "table:id" 格式
// =============================================================================
//
// 使用 surrealdb::RecordId 处理所有 ID：
//   - 解析: let id: RecordId = "order:abc".parse()?;
//   - 创建: let id = RecordId::from_table_key("order", "abc");
//   - 获取表名: id.table()
//   - 获取纯ID: id.key().to_string()
//   - CRUD: db.select(id) / db.delete(id) 直接使用 RecordId

/// Build a RecordId from an API path segment, accepting both
/// "table:key" and bare "key" forms.
pub(crate) fn record_id_from(table: &str, id: &str) -> surrealdb::RecordId {
    let key = id
        .strip_prefix(table)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(id);
    surrealdb::RecordId::from_table_key(table, key)
}

/// Base repository with database reference
#[derive(Clone)]
pub struct BaseRepository {
    db: Surreal<Db>,
}

impl BaseRepository {
    pub fn new(db: Surreal<Db>) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Surreal<Db> {
        &self.db
    }
}
