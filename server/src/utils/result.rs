//! 应用结果类型别名

use super::error::AppError;

/// 应用结果类型
pub type AppResult<T> = Result<T, AppError>;
