//! JWT 令牌服务
//!
//! 管理端令牌由网关签发，本服务只负责验证（共享密钥 HS256）。
//! `issue_token` 供运维脚本和测试造令牌使用。

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// JWT 配置
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// 共享密钥 (至少 32 字节)
    pub secret: String,
    /// 令牌过期时间 (分钟)
    pub expiration_minutes: i64,
    /// 签发者
    pub issuer: String,
    /// 受众
    pub audience: String,
}

impl Default for JwtConfig {
    fn default() -> Self {
        let secret = match load_admin_secret() {
            Ok(secret) => secret,
            Err(e) => {
                #[cfg(debug_assertions)]
                {
                    tracing::warn!("JWT configuration error: {}, using generated dev key", e);
                    generate_dev_secret()
                }
                #[cfg(not(debug_assertions))]
                {
                    panic!("🚨 FATAL: ADMIN_JWT_SECRET configuration failed: {}", e);
                }
            }
        };

        Self {
            secret,
            expiration_minutes: std::env::var("JWT_EXPIRATION_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(720), // 默认 12 小时
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "pizzeria-server".to_string()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "pizzeria-admin".to_string()),
        }
    }
}

/// 从环境变量加载管理端共享密钥
fn load_admin_secret() -> Result<String, JwtError> {
    match std::env::var("ADMIN_JWT_SECRET") {
        Ok(secret) if secret.len() >= 32 => Ok(secret),
        Ok(_) => Err(JwtError::ConfigError(
            "ADMIN_JWT_SECRET must be at least 32 characters long".to_string(),
        )),
        Err(_) => Err(JwtError::ConfigError(
            "ADMIN_JWT_SECRET environment variable not set".to_string(),
        )),
    }
}

/// 生成开发环境临时密钥 (64 个十六进制字符)
fn generate_dev_secret() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}

/// 存储在令牌中的 JWT Claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// 管理员标识 (Subject)
    pub sub: String,
    /// 角色，必须是 "admin"
    pub role: String,
    /// 过期时间戳
    pub exp: i64,
    /// 签发时间戳
    pub iat: i64,
    /// 签发者
    pub iss: String,
    /// 受众
    pub aud: String,
}

/// JWT 错误
#[derive(Error, Debug)]
pub enum JwtError {
    #[error("无效令牌: {0}")]
    InvalidToken(String),

    #[error("令牌已过期")]
    ExpiredToken,

    #[error("无效签名")]
    InvalidSignature,

    #[error("令牌生成失败: {0}")]
    GenerationFailed(String),

    #[error("配置错误: {0}")]
    ConfigError(String),
}

/// JWT 令牌服务
#[derive(Clone)]
pub struct JwtService {
    pub config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new() -> Self {
        Self::with_config(JwtConfig::default())
    }

    pub fn with_config(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 签发管理员令牌
    pub fn issue_token(&self, admin_id: &str) -> Result<String, JwtError> {
        let now = Utc::now();
        let expiration = now + Duration::minutes(self.config.expiration_minutes);

        let claims = Claims {
            sub: admin_id.to_string(),
            role: "admin".to_string(),
            exp: expiration.timestamp(),
            iat: now.timestamp(),
            iss: self.config.issuer.clone(),
            aud: self.config.audience.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| JwtError::GenerationFailed(e.to_string()))
    }

    /// 验证并解码令牌
    pub fn validate_token(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[&self.config.audience]);
        validation.set_issuer(&[&self.config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss", "aud"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                ErrorKind::InvalidSignature => JwtError::InvalidSignature,
                ErrorKind::InvalidToken => JwtError::InvalidToken(e.to_string()),
                _ => JwtError::InvalidToken(format!("Token validation failed: {}", e)),
            }
        })?;

        Ok(token_data.claims)
    }

    /// 从 Authorization 头提取令牌
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ")
    }
}

impl Default for JwtService {
    fn default() -> Self {
        Self::new()
    }
}

/// 当前管理员上下文 (从 JWT Claims 解析)
///
/// 由认证中间件注入请求扩展。
#[derive(Debug, Clone)]
pub struct CurrentAdmin {
    pub id: String,
    pub role: String,
}

impl From<Claims> for CurrentAdmin {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            role: claims.role,
        }
    }
}

impl CurrentAdmin {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> JwtConfig {
        JwtConfig {
            secret: "test-secret-key-with-at-least-32-chars!".to_string(),
            expiration_minutes: 60,
            issuer: "pizzeria-server".to_string(),
            audience: "pizzeria-admin".to_string(),
        }
    }

    #[test]
    fn test_issue_and_validate_round_trip() {
        let service = JwtService::with_config(test_config());
        let token = service.issue_token("admin-1").unwrap();
        let claims = service.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "admin-1");
        assert_eq!(claims.role, "admin");
        assert!(CurrentAdmin::from(claims).is_admin());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let config = JwtConfig {
            expiration_minutes: -5,
            ..test_config()
        };
        let service = JwtService::with_config(config);
        let token = service.issue_token("admin-1").unwrap();

        assert!(matches!(
            service.validate_token(&token),
            Err(JwtError::ExpiredToken)
        ));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let service = JwtService::with_config(test_config());
        let other = JwtService::with_config(JwtConfig {
            secret: "another-secret-key-also-32-chars-long!!".to_string(),
            ..test_config()
        });

        let token = other.issue_token("admin-1").unwrap();
        assert!(matches!(
            service.validate_token(&token),
            Err(JwtError::InvalidSignature)
        ));
    }

    #[test]
    fn test_wrong_audience_is_rejected() {
        let service = JwtService::with_config(test_config());
        let other = JwtService::with_config(JwtConfig {
            audience: "someone-else".to_string(),
            ..test_config()
        });

        let token = other.issue_token("admin-1").unwrap();
        assert!(service.validate_token(&token).is_err());
    }

    #[test]
    fn test_extract_from_header() {
        assert_eq!(
            JwtService::extract_from_header("Bearer abc.def.ghi"),
            Some("abc.def.ghi")
        );
        assert_eq!(JwtService::extract_from_header("Basic abc"), None);
    }

    #[test]
    fn test_dev_secret_is_long_enough() {
        let secret = generate_dev_secret();
        assert!(secret.len() >= 32);
        assert_ne!(secret, generate_dev_secret());
    }
}
