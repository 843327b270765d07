//! 认证授权模块
//!
//! 提供管理端 JWT 认证：
//! - [`JwtService`] - JWT 令牌服务
//! - [`CurrentAdmin`] - 当前管理员上下文
//! - [`require_admin`] - 认证中间件

pub mod jwt;
pub mod middleware;

pub use jwt::{Claims, CurrentAdmin, JwtConfig, JwtError, JwtService};
pub use middleware::require_admin;
