//! HTTP server implementation using Axum.

use crate::handler::{
    handle_health, handle_models, handle_providers_summary, handle_repo, handle_repos,
};
use axum::{routing::get, Router};
use hublink_core::Store;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Application state shared across handlers.
pub struct AppState {
    /// Read side of the stored tables
    pub store: Store,
}

/// Build the read-only query router.
pub fn router(store: Store) -> Router {
    let state = Arc::new(AppState { store });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/models", get(handle_models))
        .route("/repo/*hf_repo_id", get(handle_repo))
        .route("/providers/summary", get(handle_providers_summary))
        .route("/repos", get(handle_repos))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Start the query server.
///
/// Returns the actual address the server is bound to (useful when port=0).
pub async fn start_server(store: Store, host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    let app = router(store);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("Server listening on {}", actual_addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
        }
    });

    Ok(actual_addr)
}
