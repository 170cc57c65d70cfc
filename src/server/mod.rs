pub mod auth;
pub mod handlers;
pub mod routes;

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::Config;
use crate::error::{Result, TaskRelayError};
use crate::service::TaskService;

pub async fn serve(
    config: Config,
    service: Arc<TaskService>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let app = routes::build(service)?;

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .map_err(|e| {
            TaskRelayError::Config(format!("failed to bind {}: {e}", config.server.bind))
        })?;

    info!(bind = %config.server.bind, "API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
        .map_err(|e| TaskRelayError::Config(format!("server error: {e}")))?;

    Ok(())
}
