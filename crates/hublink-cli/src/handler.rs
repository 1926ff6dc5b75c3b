//! Query endpoint handlers.

use crate::server::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hublink_core::{HublinkError, RowFilter};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error};

/// Error wrapper mapping library errors onto HTTP statuses.
pub struct ApiError(HublinkError);

impl From<HublinkError> for ApiError {
    fn from(err: HublinkError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            error!("Query failed: {}", self.0);
        }

        let body = match &self.0 {
            HublinkError::RepoNotFound { repo_id } => {
                json!({"error": self.0.to_string(), "hf_repo_id": repo_id})
            }
            other => json!({"error": other.to_string()}),
        };
        (status, Json(body)).into_response()
    }
}

/// Raw query parameters; numbers are parsed leniently.
#[derive(Debug, Default, Deserialize)]
pub struct ModelsParams {
    pub provider: Option<String>,
    pub min_context_window: Option<String>,
    pub max_context_window: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReposParams {
    pub provider: Option<String>,
    pub limit: Option<String>,
}

fn lenient<T: std::str::FromStr>(raw: Option<&str>) -> Option<T> {
    raw.and_then(|s| s.trim().parse().ok())
}

/// Health check endpoint.
pub async fn handle_health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

pub async fn handle_models(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ModelsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = RowFilter {
        provider: params.provider,
        min_context_window: lenient(params.min_context_window.as_deref()),
        max_context_window: lenient(params.max_context_window.as_deref()),
        limit: lenient(params.limit.as_deref()),
    };
    debug!("GET /models {:?}", filter);

    Ok(Json(state.store.list_rows(&filter)?))
}

pub async fn handle_repo(
    State(state): State<Arc<AppState>>,
    Path(hf_repo_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let hf_repo_id = hf_repo_id.trim().to_string();
    match state.store.repo_detail(&hf_repo_id)? {
        Some(detail) => Ok(Json(detail)),
        None => Err(HublinkError::RepoNotFound {
            repo_id: hf_repo_id,
        }
        .into()),
    }
}

pub async fn handle_providers_summary(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.provider_summary()?))
}

pub async fn handle_repos(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReposParams>,
) -> Result<impl IntoResponse, ApiError> {
    let repos = state
        .store
        .list_repos(params.provider.as_deref(), lenient(params.limit.as_deref()))?;
    Ok(Json(repos))
}
