//! `§6.1` HTTP routes: scenario catalog, test-run CRUD and lifecycle control, and action logs.
//! Grounded on the teacher's `runs.rs`: one `AppState` per route group, one `routes(state) ->
//! Router` function, handlers that map domain results into `Json`/`ApiError` and nothing else.
//! Response envelopes (`{tests, count}`, `{success, message}`, ...) follow `§6.1`'s table
//! literally rather than the bare arrays axum would return by default.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use mta_contracts::run::{CreateTestRequest, ScenarioType, TestRunStatus};
use mta_contracts::scenario::Scenario;
use mta_contracts::{ActionLog, TestRun};
use mta_core::registry::lookup_scenario;
use mta_core::traits::RunFilters;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Clone)]
pub struct ApiState {
    pub runner: Arc<mta_runner::TestRunner>,
}

pub fn routes(state: ApiState) -> Router {
    Router::new()
        .route("/api/tests/scenarios", get(list_scenarios))
        .route("/api/tests", get(list_tests).post(create_test))
        .route("/api/tests/:test_id", get(get_test).delete(delete_test))
        .route("/api/tests/:test_id/start", post(start_test))
        .route("/api/tests/:test_id/stop", post(stop_test))
        .route("/api/tests/:test_id/logs", get(get_action_logs))
        .with_state(state)
}

#[derive(Serialize)]
struct ScenariosResponse {
    scenarios: Vec<Scenario>,
    count: usize,
}

async fn list_scenarios() -> Json<ScenariosResponse> {
    let scenarios: Vec<Scenario> = [ScenarioType::Cooperation, ScenarioType::ResourceManagement]
        .into_iter()
        .filter_map(lookup_scenario)
        .collect();
    Json(ScenariosResponse { count: scenarios.len(), scenarios })
}

#[derive(Debug, Deserialize)]
pub struct ListTestsParams {
    status: Option<String>,
    #[serde(rename = "scenarioType")]
    scenario_type: Option<String>,
}

#[derive(Serialize)]
struct TestsResponse {
    tests: Vec<TestRun>,
    count: usize,
}

async fn list_tests(
    State(state): State<ApiState>,
    Query(params): Query<ListTestsParams>,
) -> Result<Json<TestsResponse>, ApiError> {
    let status = params
        .status
        .as_deref()
        .map(|s| s.parse::<TestRunStatus>())
        .transpose()
        .map_err(mta_core::error::EngineError::Validation)?;
    let scenario_type = params
        .scenario_type
        .as_deref()
        .map(|s| s.parse::<ScenarioType>())
        .transpose()
        .map_err(mta_core::error::EngineError::Validation)?;

    let tests = state.runner.list_tests(RunFilters { status, scenario_type }).await?;
    Ok(Json(TestsResponse { count: tests.len(), tests }))
}

/// `§6.1`: `durationSeconds` is bounded `[60, 1800]` when provided.
fn validate_create_request(request: &CreateTestRequest) -> Result<(), ApiError> {
    if let Some(duration) = request.duration_seconds {
        if !(60..=1800).contains(&duration) {
            return Err(mta_core::error::EngineError::validation(
                "durationSeconds must be between 60 and 1800",
            )
            .into());
        }
    }
    Ok(())
}

async fn create_test(
    State(state): State<ApiState>,
    Json(request): Json<CreateTestRequest>,
) -> Result<Json<TestRun>, ApiError> {
    validate_create_request(&request)?;
    let run = state.runner.create_test(request).await?;
    Ok(Json(run))
}

async fn get_test(State(state): State<ApiState>, Path(test_id): Path<Uuid>) -> Result<Json<TestRun>, ApiError> {
    let run = state.runner.get_test(test_id).await?;
    Ok(Json(run))
}

async fn start_test(State(state): State<ApiState>, Path(test_id): Path<Uuid>) -> Result<Json<TestRun>, ApiError> {
    state.runner.start_test(test_id).await?;
    let run = state.runner.get_test(test_id).await?;
    Ok(Json(run))
}

async fn stop_test(State(state): State<ApiState>, Path(test_id): Path<Uuid>) -> Result<Json<TestRun>, ApiError> {
    state.runner.stop_test(test_id).await?;
    let run = state.runner.get_test(test_id).await?;
    Ok(Json(run))
}

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
    message: String,
}

async fn delete_test(State(state): State<ApiState>, Path(test_id): Path<Uuid>) -> Result<Json<DeleteResponse>, ApiError> {
    state.runner.delete_test(test_id).await?;
    Ok(Json(DeleteResponse { success: true, message: format!("test {test_id} deleted") }))
}

#[derive(Debug, Deserialize)]
pub struct ActionLogParams {
    limit: Option<usize>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionLogsResponse {
    test_id: Uuid,
    logs: Vec<ActionLog>,
    count: usize,
}

async fn get_action_logs(
    State(state): State<ApiState>,
    Path(test_id): Path<Uuid>,
    Query(params): Query<ActionLogParams>,
) -> Result<Json<ActionLogsResponse>, ApiError> {
    let logs = state.runner.get_action_logs(test_id, params.limit.unwrap_or(200)).await?;
    Ok(Json(ActionLogsResponse { test_id, count: logs.len(), logs }))
}
