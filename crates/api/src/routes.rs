use axum::{
    extract::{Path, Query, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use ingest::EntityType;
use scoring::{
    EngineError, InvestigationStatus, RankingQuery, RunMetadata, SnapshotStore, SortKey, StatusRecord,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::metrics::{Metrics, MetricsSnapshot, ReloadOutcome, TimedOperation};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SnapshotStore>,
    pub metrics: Arc<Metrics>,
}

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<usize>,
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        data,
        count: None,
    })
}

fn ok_list<T: Serialize>(data: Vec<T>) -> Json<ApiResponse<Vec<T>>> {
    let count = Some(data.len());
    Json(ApiResponse {
        success: true,
        data,
        count,
    })
}

pub enum ApiError {
    Engine(EngineError),
    BadRequest(String),
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError::Engine(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Engine(e) => {
                let status = match &e {
                    EngineError::EntityNotFound(_) => StatusCode::NOT_FOUND,
                    EngineError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
                    EngineError::ConcurrentRunConflict => StatusCode::CONFLICT,
                    EngineError::NoSnapshot => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    error!(error = %e, "Request failed");
                }
                (status, e.to_string())
            }
        };
        (status, Json(json!({ "success": false, "error": message }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/entities", get(get_entities))
        .route("/api/entity/:name", get(get_entity))
        .route("/api/entity/:name/status", put(update_entity_status))
        .route("/api/entity/:name/status-history", get(get_status_history))
        .route("/api/communities", get(get_communities))
        .route("/api/network", get(get_network))
        .route("/api/reload", post(reload_data))
        .route("/api/metrics", get(get_metrics))
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
}

async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let response = next.run(request).await;
    state.metrics.record_request(!response.status().is_server_error() && !response.status().is_client_error());
    response
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    snapshot_loaded: bool,
    reloading: bool,
    run: Option<RunMetadata>,
}

async fn health_check(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    let snapshot = state.store.current();
    ok(HealthResponse {
        status: "healthy",
        snapshot_loaded: snapshot.is_some(),
        reloading: state.store.is_reloading(),
        run: snapshot.map(|s| s.metadata.clone()),
    })
}

#[derive(Debug, Default, Deserialize)]
pub struct EntitiesQuery {
    sort_by: Option<String>,
    filter_status: Option<String>,
    min_risk_score: Option<f64>,
    entity_type: Option<String>,
}

impl EntitiesQuery {
    fn into_ranking_query(self) -> ApiResult<RankingQuery> {
        let sort_by = match self.sort_by.as_deref() {
            None => SortKey::default(),
            Some(key) => SortKey::parse(key).ok_or_else(|| {
                ApiError::BadRequest(format!(
                    "sort_by must be one of ensemble_score, total_exposure, connected_claims_count; got '{}'",
                    key
                ))
            })?,
        };
        let status = match self.filter_status.as_deref() {
            None | Some("all") | Some("") => None,
            Some(s) => Some(s.parse::<InvestigationStatus>()?),
        };
        let entity_type = match self.entity_type.as_deref() {
            None | Some("all") | Some("") => None,
            Some(t) => Some(
                EntityType::parse(t).ok_or_else(|| ApiError::BadRequest(format!("unknown entity type '{}'", t)))?,
            ),
        };
        Ok(RankingQuery {
            sort_by,
            status,
            min_risk_score: self.min_risk_score,
            entity_type,
        })
    }
}

async fn get_entities(
    State(state): State<AppState>,
    Query(params): Query<EntitiesQuery>,
) -> ApiResult<impl IntoResponse> {
    let query = params.into_ranking_query()?;
    let snapshot = state.store.require()?;
    let statuses = state.store.statuses().all_latest();
    Ok(ok_list(snapshot.ranking(&query, &statuses)))
}

async fn get_entity(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<impl IntoResponse> {
    let snapshot = state.store.require()?;
    let status = state.store.statuses().latest(&name);
    Ok(ok(snapshot.entity_detail(&name, status)?))
}

#[derive(Deserialize)]
pub struct StatusUpdate {
    status: String,
}

async fn update_entity_status(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> ApiResult<impl IntoResponse> {
    let status: InvestigationStatus = update.status.parse()?;
    let snapshot = state.store.require()?;
    if snapshot.entity(&name).is_none() {
        return Err(EngineError::EntityNotFound(name).into());
    }

    let record = state.store.statuses().append(&name, status);
    info!(entity = %name, status = %status, "Investigation status updated");
    Ok(ok(record))
}

async fn get_status_history(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<StatusRecord>>>> {
    Ok(ok_list(state.store.statuses().history(&name)))
}

async fn get_communities(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let snapshot = state.store.require()?;
    Ok(ok_list(snapshot.community_table().to_vec()))
}

async fn get_network(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let snapshot = state.store.require()?;
    Ok(ok(snapshot.network()))
}

async fn reload_data(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let timer = TimedOperation::start();
    let result = state.store.reload().await;

    let outcome = match &result {
        Ok(_) => ReloadOutcome::Succeeded,
        Err(EngineError::ConcurrentRunConflict) => ReloadOutcome::Rejected,
        Err(_) => ReloadOutcome::Failed,
    };
    state.metrics.record_reload(outcome, timer.elapsed());

    let snapshot = result?;
    Ok(ok(snapshot.metadata.clone()))
}

async fn get_metrics(State(state): State<AppState>) -> Json<ApiResponse<MetricsSnapshot>> {
    let (entities, communities) = state
        .store
        .current()
        .map(|s| (s.metadata.entity_count, s.metadata.community_count))
        .unwrap_or((0, 0));
    ok(state.metrics.snapshot(entities, communities))
}
