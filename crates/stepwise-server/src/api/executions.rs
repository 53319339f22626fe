use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use stepwise_core::schedule::run_and_archive;
use stepwise_core::{ServerError, WorkflowExecution};

use crate::state::AppState;

const DEFAULT_LIMIT: usize = 20;
const MAX_LIMIT: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_executions).post(start_execution))
        .route("/{id}", get(get_execution))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartRequest {
    /// Execution timestamp; defaults to now.
    execution_time: Option<DateTime<Utc>>,
}

async fn list_executions(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let limit = q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let executions = state.store.list(limit).await?;
    Ok(Json(serde_json::json!({ "executions": executions })))
}

async fn get_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    match state.store.get(&id).await? {
        Some(execution) => Ok(Json(serde_json::json!({ "execution": execution }))),
        None => Err(ServerError::NotFound(format!("Execution {} not found", id))),
    }
}

/// POST /api/executions: start a run in the background.
///
/// The body is optional: `{ "executionTime": "2024-06-01T08:00:00Z" }`.
async fn start_execution(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), ServerError> {
    let request: StartRequest = if body.iter().all(u8::is_ascii_whitespace) {
        StartRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ServerError::BadRequest(format!("Invalid request body: {}", e)))?
    };

    let started_at = request.execution_time.unwrap_or_else(Utc::now);
    let execution = WorkflowExecution::start(state.workflow.name(), started_at);
    let id = execution.id.clone();

    tracing::info!("[API] Manual execution {} requested", id);
    tokio::spawn(run_and_archive(
        state.workflow.clone(),
        Some(state.store.clone()),
        execution,
    ));

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "executionId": id,
            "executionDate": started_at.format("%Y-%m-%d").to_string(),
        })),
    ))
}
