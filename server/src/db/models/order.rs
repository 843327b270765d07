//! Order Model
//!
//! 订单主表，内嵌订单项和支付信息

use super::serde_helpers;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;

// =============================================================================
// Order (主表)
// =============================================================================

/// Order lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// 卡支付下单后等待支付结算
    PendingPayment,
    /// 已接单，进入制作/配送流程
    Processing,
    /// 已完成
    Completed,
    /// 已取消 (主动取消或支付失败软取消)
    Cancelled,
    /// 已归档，等待保留期过后删除
    Archived,
}

impl OrderStatus {
    /// 状态机转移表
    ///
    /// | from | to |
    /// |------|-----|
    /// | PENDING_PAYMENT | PROCESSING, CANCELLED |
    /// | PROCESSING | COMPLETED, CANCELLED, ARCHIVED |
    /// | COMPLETED | ARCHIVED |
    /// | CANCELLED | ARCHIVED |
    /// | ARCHIVED | (terminal) |
    pub fn can_transition(self, target: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, target),
            (PendingPayment, Processing)
                | (PendingPayment, Cancelled)
                | (Processing, Completed)
                | (Processing, Cancelled)
                | (Processing, Archived)
                | (Completed, Archived)
                | (Cancelled, Archived)
        )
    }

    pub fn is_archived(self) -> bool {
        matches!(self, OrderStatus::Archived)
    }
}

/// Payment settlement status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// Payment method
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
}

/// Embedded payment information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    /// 支付处理器侧的支付 ID (webhook 幂等判断的依据)
    pub payment_id: Option<String>,
    pub receipt_number: Option<String>,
    #[serde(default)]
    pub amount_paid: f64,
    #[serde(default)]
    pub processing_fee: f64,
    pub failure_reason: Option<String>,
    pub paid_at: Option<i64>,
    pub refunded_at: Option<i64>,
}

impl PaymentInfo {
    /// 新订单的初始支付信息
    pub fn pending(method: PaymentMethod) -> Self {
        Self {
            status: PaymentStatus::Pending,
            method,
            payment_id: None,
            receipt_number: None,
            amount_paid: 0.0,
            processing_fee: 0.0,
            failure_reason: None,
            paid_at: None,
            refunded_at: None,
        }
    }
}

/// Order line item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub unit_price: f64,
    pub quantity: i32,
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    #[serde(default, with = "serde_helpers::option_record_id")]
    pub id: Option<RecordId>,
    /// 客户可见订单号，按业务年份递增
    pub order_number: i64,
    /// 业务年份 (订单号的作用域)
    pub year: i32,
    /// 下单时间 (Unix millis)
    pub created_at: i64,
    pub items: Vec<OrderItem>,
    pub address: Option<String>,
    pub phone: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub total: f64,
    pub status: OrderStatus,
    pub payment: PaymentInfo,
}

// =============================================================================
// API Request Types
// =============================================================================

/// Checkout payload (public endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreate {
    pub items: Vec<OrderItem>,
    pub address: Option<String>,
    pub phone: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub payment_method: PaymentMethod,
    /// 卡支付时处理器颁发的一次性令牌
    pub payment_token: Option<String>,
}

/// Status update payload (admin endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusUpdate {
    pub status: OrderStatus,
}

/// Payment failure payload (client-driven soft-cancel)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentFailure {
    pub order_number: i64,
    pub reason: String,
}
