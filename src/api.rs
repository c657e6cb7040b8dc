use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::error::{IngestError, PersistenceError};
use crate::model::{NewSource, SourceId};
use crate::orchestrator::Orchestrator;
use crate::registry::SourceRegistry;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub registry: SourceRegistry,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        let registry = SourceRegistry::new(
            orchestrator.store().clone(),
            orchestrator.config().default_crawl_interval_secs,
        );
        Self {
            orchestrator,
            registry,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sources", get(list_sources).post(register_source))
        .route("/sources/discover", post(discover_sources))
        .route("/sources/{id}/deactivate", post(deactivate_source))
        .route("/sources/{id}/reactivate", post(reactivate_source))
        .route("/crawl", post(crawl_now))
        .route("/runs", get(recent_runs))
        .route("/keywords/top", get(top_keywords))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Maps the error taxonomy onto HTTP status codes.
pub struct ApiError(IngestError);

impl<E: Into<IngestError>> From<E> for ApiError {
    fn from(e: E) -> Self {
        ApiError(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            IngestError::Validation(_) => StatusCode::BAD_REQUEST,
            IngestError::Persistence(PersistenceError::Conflict(_)) => StatusCode::CONFLICT,
            IngestError::Persistence(PersistenceError::NotFound(_)) => StatusCode::NOT_FOUND,
            IngestError::Persistence(PersistenceError::Unavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            IngestError::Fetch(_) | IngestError::Format(_) => StatusCode::BAD_GATEWAY,
        };
        if status.is_server_error() {
            tracing::warn!(target: "api", error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string(), "kind": self.0.kind() });
        (status, Json(body)).into_response()
    }
}

async fn health(State(state): State<AppState>) -> Response {
    match state.orchestrator.store().ping().await {
        Ok(()) => "ok".into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

async fn list_sources(State(state): State<AppState>) -> Result<Response, ApiError> {
    Ok(Json(state.registry.list().await?).into_response())
}

async fn register_source(
    State(state): State<AppState>,
    Json(body): Json<NewSource>,
) -> Result<Response, ApiError> {
    let source = state.registry.register(body).await?;
    Ok((StatusCode::CREATED, Json(source)).into_response())
}

#[derive(Deserialize)]
struct DiscoverReq {
    page_url: String,
    html: String,
}

async fn discover_sources(
    State(state): State<AppState>,
    Json(body): Json<DiscoverReq>,
) -> Result<Response, ApiError> {
    let created = state
        .registry
        .discover_and_register(&body.html, &body.page_url)
        .await?;
    Ok(Json(created).into_response())
}

async fn deactivate_source(
    State(state): State<AppState>,
    Path(id): Path<SourceId>,
) -> Result<Response, ApiError> {
    Ok(Json(state.registry.deactivate(id).await?).into_response())
}

async fn reactivate_source(
    State(state): State<AppState>,
    Path(id): Path<SourceId>,
) -> Result<Response, ApiError> {
    Ok(Json(state.registry.reactivate(id).await?).into_response())
}

async fn crawl_now(State(state): State<AppState>) -> Result<Response, ApiError> {
    let report = state.orchestrator.run_cycle().await?;
    Ok(Json(report).into_response())
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

async fn recent_runs(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Response {
    let n = q.limit.unwrap_or(20).min(500);
    Json(state.orchestrator.history().snapshot_last_n(n)).into_response()
}

async fn top_keywords(
    State(state): State<AppState>,
    Query(q): Query<LimitQuery>,
) -> Result<Response, ApiError> {
    let n = q.limit.unwrap_or(20).clamp(1, 200);
    Ok(Json(state.orchestrator.store().top_keywords(n).await?).into_response())
}
