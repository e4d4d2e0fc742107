mod error;
mod extractors;
mod handlers;
mod routes;
mod state;

pub use error::{AppError, AppResult};
pub use state::AppState;

use crate::{Config, Database};
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(routes::assignment_tag_routes())
        .merge(routes::topic_routes())
        .merge(routes::admin_routes())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: Config, db: Database, addr: &str) -> Result<()> {
    let state = Arc::new(AppState::new(config, db)?);
    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
