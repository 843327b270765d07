//! Pizzeria Server - 披萨店订单生命周期与支付对账服务
//!
//! # 架构概述
//!
//! 本模块是披萨店后端的主入口，提供以下核心功能：
//!
//! - **订单生命周期** (`orders`): 状态机、订单号分配、归档与保留清理
//! - **支付对账** (`payments`): 同步扣款、webhook 回调、超时清扫
//! - **数据库** (`db`): 嵌入式 SurrealDB 存储
//! - **认证** (`auth`): 网关签发的管理端 JWT 验证
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── auth/          # 管理端 JWT 验证
//! ├── api/           # HTTP 路由和处理器
//! ├── cache/         # 只读响应缓存
//! ├── db/            # 数据库层
//! ├── orders/        # 订单生命周期
//! ├── payments/      # 支付对账
//! ├── notify/        # 订单确认邮件队列
//! └── utils/         # 工具函数
//! ```

pub mod api;
pub mod auth;
pub mod cache;
pub mod core;
pub mod db;
pub mod notify;
pub mod orders;
pub mod payments;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentAdmin, JwtService};
pub use core::{Config, Server, ServerState};
pub use orders::OrderService;
pub use payments::PaymentReconciler;
pub use utils::{AppError, AppResponse, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 初始化运行环境 (dotenv + 日志)
pub fn setup_environment() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());

    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
    ____  _                       _
   / __ \(_)___  ____  ___  _____(_)___ _
  / /_/ / /_  / /_  / / _ \/ ___/ / __ `/
 / ____/ / / /_  / /_/  __/ /  / / /_/ /
/_/   /_/ /___/ /___/\___/_/  /_/\__,_/
    "#
    );
}
