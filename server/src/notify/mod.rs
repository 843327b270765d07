//! 订单确认通知服务
//!
//! `NotifyService` 通过 mpsc 通道把确认邮件请求交给后台 Worker，
//! 下单请求从不等待邮件发送：通道满或已关闭时丢弃并告警，
//! 通知失败绝不影响订单创建。

pub mod worker;

pub use worker::{HttpMailer, LogMailer, Mailer, NotifyWorker};

use tokio::sync::mpsc;

use crate::db::models::Order;

/// 发送给 Worker 的确认邮件请求
#[derive(Debug, Clone)]
pub struct OrderConfirmation {
    pub order_number: i64,
    pub year: i32,
    pub email: String,
    pub first_name: String,
    pub total: f64,
}

/// 订单通知服务 (生产端)
#[derive(Debug, Clone)]
pub struct NotifyService {
    tx: mpsc::Sender<OrderConfirmation>,
}

impl NotifyService {
    pub fn new(buffer_size: usize) -> (Self, mpsc::Receiver<OrderConfirmation>) {
        let (tx, rx) = mpsc::channel(buffer_size);
        (Self { tx }, rx)
    }

    /// 尝试入队订单确认通知
    ///
    /// 无 email 的订单直接跳过。入队失败时只记录告警。
    pub fn order_confirmed(&self, order: &Order) {
        let Some(email) = order.email.clone() else {
            return;
        };

        let confirmation = OrderConfirmation {
            order_number: order.order_number,
            year: order.year,
            email,
            first_name: order.first_name.clone(),
            total: order.total,
        };

        if let Err(e) = self.tx.try_send(confirmation) {
            tracing::warn!(
                order_number = order.order_number,
                "Order confirmation dropped: {}",
                e
            );
        }
    }
}
