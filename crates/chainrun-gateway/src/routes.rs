use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use chainrun_core::error::ChainError;
use chainrun_core::traits::WorkflowStore;
use chainrun_core::types::{Execution, ExecutionId, Workflow, WorkflowDraft, WorkflowId};
use chainrun_engine::TriggeredRun;

use crate::error::ApiError;
use crate::middleware::Authenticated;
use crate::state::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

// GET /health, no auth required
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// POST /workflow/
pub async fn create_workflow(
    Authenticated(auth): Authenticated,
    State(state): State<Arc<AppState>>,
    Json(draft): Json<WorkflowDraft>,
) -> ApiResult<Workflow> {
    let workflow = state.store.create_workflow(auth.user_id, draft).await?;
    info!(workflow_id = %workflow.id, user_id = %auth.user_id, "Workflow created");
    Ok(Json(workflow))
}

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

// GET /workflow/?skip=0&limit=100
pub async fn list_workflows(
    Authenticated(auth): Authenticated,
    State(state): State<Arc<AppState>>,
    Query(q): Query<ListQuery>,
) -> ApiResult<Vec<Workflow>> {
    let workflows = state
        .store
        .list_workflows(auth.user_id, q.skip, q.limit)
        .await?;
    Ok(Json(workflows))
}

// GET /workflow/{id}
pub async fn get_workflow(
    Authenticated(auth): Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Workflow> {
    let id = WorkflowId(id);
    state
        .store
        .get_workflow(id, auth.user_id)
        .await?
        .map(Json)
        .ok_or(ApiError(ChainError::WorkflowNotFound(id)))
}

// PUT /workflow/{id}
pub async fn update_workflow(
    Authenticated(auth): Authenticated,
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(draft): Json<WorkflowDraft>,
) -> ApiResult<Workflow> {
    let id = WorkflowId(id);
    let updated = state
        .store
        .update_workflow(id, auth.user_id, draft)
        .await?
        .ok_or(ApiError(ChainError::WorkflowNotFound(id)))?;
    info!(workflow_id = %id, "Workflow updated");
    Ok(Json(updated))
}

// POST /execution/workflow/{workflow_id}
pub async fn trigger_execution(
    Authenticated(auth): Authenticated,
    State(state): State<Arc<AppState>>,
    Path(workflow_id): Path<i64>,
) -> ApiResult<TriggeredRun> {
    let triggered = state
        .executions
        .trigger(WorkflowId(workflow_id), auth.user_id)
        .await?;
    Ok(Json(triggered))
}

// GET /execution/workflow/{workflow_id}
pub async fn list_executions(
    Authenticated(auth): Authenticated,
    State(state): State<Arc<AppState>>,
    Path(workflow_id): Path<i64>,
) -> ApiResult<Vec<Execution>> {
    let executions = state
        .executions
        .list(WorkflowId(workflow_id), auth.user_id)
        .await?;
    Ok(Json(executions))
}

// GET /execution/{execution_id}
pub async fn get_execution(
    Authenticated(auth): Authenticated,
    State(state): State<Arc<AppState>>,
    Path(execution_id): Path<i64>,
) -> ApiResult<Execution> {
    let execution = state
        .executions
        .get(ExecutionId(execution_id), auth.user_id)
        .await?;
    Ok(Json(execution))
}
