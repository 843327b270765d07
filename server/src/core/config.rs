use std::path::PathBuf;

use chrono_tz::Tz;

use crate::auth::JwtConfig;

/// 服务器配置 - 披萨店后端的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | PIZZERIA_WORK_DIR | /var/lib/pizzeria | 工作目录 |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | BUSINESS_TIMEZONE | Europe/Madrid | 营业时区 (订单年份、调度) |
/// | ORDER_NUMBER_BASE | 1000 | 每年首单号 |
/// | CACHE_TTL_SECS | 60 | 响应缓存 TTL (秒，0 = 关闭) |
/// | CACHE_SWEEP_INTERVAL_SECS | 120 | 缓存过期清扫间隔 (秒) |
/// | RETENTION_DAYS | 30 | 归档订单保留天数 |
/// | CLEANUP_RUN_AT | 03:30 | 每日清理时间 (HH:MM) |
/// | PENDING_PAYMENT_TIMEOUT_MINUTES | 30 | 卡支付等待窗口 (分钟) |
/// | PAYMENT_SWEEP_INTERVAL_SECS | 300 | 滞留支付清扫间隔 (秒) |
/// | PAYMENT_API_URL | http://localhost:9090 | 支付处理器地址 |
/// | PAYMENT_API_KEY | (空) | 支付处理器密钥 |
/// | PAYMENT_WEBHOOK_SECRET | (空) | Webhook 签名共享密钥 |
/// | PAYMENT_TIMEOUT_MS | 10000 | 支付请求超时 (毫秒) |
/// | CURRENCY | EUR | 结算币种 |
/// | MAIL_API_URL | (未设置 = 仅记录日志) | 邮件服务地址 |
/// | MAIL_API_KEY | (空) | 邮件服务密钥 |
/// | MAIL_FROM | orders@pizzeria.local | 确认邮件发件人 |
/// | NOTIFY_QUEUE_SIZE | 256 | 通知队列容量 |
/// | REQUEST_TIMEOUT_MS | 30000 | 请求超时 (毫秒) |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | 关闭超时 (毫秒) |
///
/// # 示例
///
/// ```ignore
/// PIZZERIA_WORK_DIR=/data/pizzeria HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 营业时区，决定订单年份归属和调度触发时刻
    pub timezone: Tz,
    /// JWT 认证配置
    pub jwt: JwtConfig,

    // === 订单配置 ===
    /// 每年第一单的订单号
    pub order_number_base: i64,
    /// 归档订单保留天数
    pub retention_days: i64,
    /// 每日清理触发时间 (HH:MM)
    pub cleanup_run_at: String,

    // === 缓存配置 ===
    /// 响应缓存 TTL (秒)，0 表示关闭缓存
    pub cache_ttl_secs: u64,
    /// 缓存过期条目清扫间隔 (秒)
    pub cache_sweep_secs: u64,

    // === 支付配置 ===
    /// 支付处理器 API 地址
    pub payment_api_url: String,
    /// 支付处理器 API 密钥
    pub payment_api_key: String,
    /// Webhook 签名共享密钥
    pub payment_webhook_secret: String,
    /// 支付处理器请求超时 (毫秒)
    pub payment_timeout_ms: u64,
    /// 结算币种 (ISO 4217)
    pub currency: String,
    /// 卡支付等待窗口 (分钟)，超过即软取消
    pub pending_payment_timeout_mins: i64,
    /// 滞留支付清扫间隔 (秒)
    pub payment_sweep_secs: u64,

    // === 通知配置 ===
    /// 邮件服务 API 地址 (未设置时只记录日志)
    pub mail_api_url: Option<String>,
    /// 邮件服务 API 密钥
    pub mail_api_key: String,
    /// 确认邮件发件人
    pub mail_from: String,
    /// 通知队列容量
    pub notify_buffer: usize,

    // === HTTP 配置 ===
    /// 请求超时时间 (毫秒)
    pub request_timeout_ms: u64,
    /// 关闭超时时间 (毫秒)
    pub shutdown_timeout_ms: u64,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("PIZZERIA_WORK_DIR")
                .unwrap_or_else(|_| "/var/lib/pizzeria".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            timezone: Self::timezone_from_env(),
            jwt: JwtConfig::default(),

            order_number_base: std::env::var("ORDER_NUMBER_BASE")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(1000),
            retention_days: std::env::var("RETENTION_DAYS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(30),
            cleanup_run_at: std::env::var("CLEANUP_RUN_AT").unwrap_or_else(|_| "03:30".into()),

            cache_ttl_secs: std::env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(60),
            cache_sweep_secs: std::env::var("CACHE_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(120),

            payment_api_url: std::env::var("PAYMENT_API_URL")
                .unwrap_or_else(|_| "http://localhost:9090".into()),
            payment_api_key: std::env::var("PAYMENT_API_KEY").unwrap_or_default(),
            payment_webhook_secret: std::env::var("PAYMENT_WEBHOOK_SECRET").unwrap_or_default(),
            payment_timeout_ms: std::env::var("PAYMENT_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10000),
            currency: std::env::var("CURRENCY").unwrap_or_else(|_| "EUR".into()),
            pending_payment_timeout_mins: std::env::var("PENDING_PAYMENT_TIMEOUT_MINUTES")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(30),
            payment_sweep_secs: std::env::var("PAYMENT_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(300),

            mail_api_url: std::env::var("MAIL_API_URL").ok(),
            mail_api_key: std::env::var("MAIL_API_KEY").unwrap_or_default(),
            mail_from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "orders@pizzeria.local".into()),
            notify_buffer: std::env::var("NOTIFY_QUEUE_SIZE")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(256),

            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(30000),
            shutdown_timeout_ms: std::env::var("SHUTDOWN_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10000),
        }
    }

    /// 解析营业时区，无效值回退到 Europe/Madrid
    fn timezone_from_env() -> Tz {
        match std::env::var("BUSINESS_TIMEZONE") {
            Ok(name) => match name.parse::<Tz>() {
                Ok(tz) => tz,
                Err(_) => {
                    tracing::warn!(
                        "Invalid BUSINESS_TIMEZONE '{}', falling back to Europe/Madrid",
                        name
                    );
                    chrono_tz::Europe::Madrid
                }
            },
            Err(_) => chrono_tz::Europe::Madrid,
        }
    }

    /// 数据库文件路径 (work_dir/database/pizzeria.db)
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir)
            .join("database")
            .join("pizzeria.db")
    }

    /// 日志目录 (work_dir/logs)
    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
