//! HTTP 服务器启动与优雅停机
//!
//! 监听纯 HTTP：TLS 由前置网关终结，本服务只暴露在内网。

use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::api::build_app;
use crate::core::config::Config;
use crate::core::state::ServerState;
use crate::notify::OrderConfirmation;
use crate::utils::{AppError, AppResult};

pub struct Server {
    config: Config,
    state: Option<(ServerState, mpsc::Receiver<OrderConfirmation>)>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Create server with pre-built state (tests, embedding)
    pub fn with_state(
        config: Config,
        state: ServerState,
        notify_rx: mpsc::Receiver<OrderConfirmation>,
    ) -> Self {
        Self {
            config,
            state: Some((state, notify_rx)),
        }
    }

    pub async fn run(self) -> AppResult<()> {
        let (state, notify_rx) = match self.state {
            Some(pair) => pair,
            None => ServerState::initialize(&self.config).await,
        };

        let tasks = state.start_background_tasks(notify_rx);

        // Build fully configured app with all middleware, then apply state
        let app = build_app(&state).with_state(state.clone());
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));

        let handle = axum_server::Handle::new();
        let shutdown_future = shutdown_signal();
        let handle_clone = handle.clone();
        let grace = Duration::from_millis(self.config.shutdown_timeout_ms);

        tokio::spawn(async move {
            shutdown_future.await;
            handle_clone.graceful_shutdown(Some(grace));
        });

        tracing::info!("🍕 Pizzeria server listening on http://{}", addr);

        axum_server::bind(addr)
            .handle(handle)
            .serve(app.into_make_service())
            .await
            .map_err(|e| AppError::internal(format!("Server error: {}", e)))?;

        // HTTP listener drained, now stop the background workers
        tasks.shutdown().await;

        tracing::info!("✅ Server shutdown complete");
        Ok(())
    }
}

/// Graceful shutdown handler
///
/// Listens for SIGTERM (Kubernetes) and Ctrl+C signals
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
