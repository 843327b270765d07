//! 通知后台 Worker
//!
//! 从 mpsc 通道消费确认请求，调用邮件网关发送。
//! 通道关闭时自动退出。

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::OrderConfirmation;

/// 邮件网关抽象
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_confirmation(&self, confirmation: &OrderConfirmation) -> Result<(), String>;
}

/// HTTP 邮件网关客户端
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl HttpMailer {
    pub fn new(api_url: &str, api_key: &str, from: &str) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send_confirmation(&self, confirmation: &OrderConfirmation) -> Result<(), String> {
        let subject = format!("Order #{} confirmed", confirmation.order_number);
        let body = format!(
            "Hi {},\n\nYour order #{} has been received. Total: {:.2}.\n\nThank you!",
            confirmation.first_name, confirmation.order_number, confirmation.total
        );

        let response = self
            .client
            .post(format!("{}/v1/send", self.api_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from,
                "to": confirmation.email,
                "subject": subject,
                "text": body,
            }))
            .send()
            .await
            .map_err(|e| format!("Mail gateway request failed: {e}"))?;

        if !response.status().is_success() {
            return Err(format!("Mail gateway returned HTTP {}", response.status()));
        }
        Ok(())
    }
}

/// 仅写日志的邮件网关 (未配置 MAIL_API_URL 时使用)
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_confirmation(&self, confirmation: &OrderConfirmation) -> Result<(), String> {
        tracing::info!(
            order_number = confirmation.order_number,
            email = %confirmation.email,
            "Order confirmation (mail gateway not configured, logging only)"
        );
        Ok(())
    }
}

/// 通知后台 Worker
pub struct NotifyWorker {
    mailer: std::sync::Arc<dyn Mailer>,
}

impl NotifyWorker {
    pub fn new(mailer: std::sync::Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }

    /// 运行 worker，直到通道关闭或收到 shutdown 信号
    pub async fn run(self, mut rx: mpsc::Receiver<OrderConfirmation>, shutdown: CancellationToken) {
        tracing::info!("📧 Order notification worker started");

        loop {
            tokio::select! {
                received = rx.recv() => {
                    let Some(confirmation) = received else {
                        tracing::info!("Notification channel closed, worker stopping");
                        break;
                    };
                    self.deliver(confirmation).await;
                }
                _ = shutdown.cancelled() => {
                    tracing::info!("Notification worker stopping");
                    break;
                }
            }
        }
    }

    async fn deliver(&self, confirmation: OrderConfirmation) {
        match self.mailer.send_confirmation(&confirmation).await {
            Ok(()) => {
                tracing::debug!(
                    order_number = confirmation.order_number,
                    email = %confirmation.email,
                    "Order confirmation sent"
                );
            }
            Err(e) => {
                tracing::error!(
                    order_number = confirmation.order_number,
                    "Failed to send order confirmation: {}",
                    e
                );
            }
        }
    }
}
