use crate::{config::InferenceConfig, routes::build_router, state::AppState};
use std::net::SocketAddr;
use tokio::net::TcpListener;

pub struct InferenceService {
    config: InferenceConfig,
    state: AppState,
}

impl InferenceService {
    pub fn new(config: InferenceConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Bind to the configured address. Split from `serve` so callers can learn
    /// the port when binding to `:0`.
    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        Ok(listener)
    }

    pub async fn serve(self, listener: TcpListener) -> anyhow::Result<()> {
        let addr: SocketAddr = listener.local_addr()?;
        tracing::info!(
            %addr,
            model_path = %self.config.model_path,
            "Inference service listening"
        );

        let app = build_router(self.state)?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Inference service stopped");
        Ok(())
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
