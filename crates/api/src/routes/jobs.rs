//! Job trigger and scheduler control endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use detector::StaleReport;
use serde::Serialize;
use store::PackageStore;

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct SchedulerResponse {
    /// Whether the schedule loop is running after this call.
    pub running: bool,
    /// False when the call was a no-op.
    pub changed: bool,
}

/// Runs the stale-packages check immediately and returns its report.
/// Queues behind an in-flight run rather than overlapping it.
pub async fn run_stale_check<S: PackageStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<StaleReport>, ApiError> {
    let report = state.job_runner.run_now().await?;
    Ok(Json(report))
}

/// Returns the report of the most recent successful run.
pub async fn stale_summary<S: PackageStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<StaleReport>, ApiError> {
    state
        .job_runner
        .last_report()
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no stale packages check has completed yet".to_string()))
}

pub async fn start_scheduler<S: PackageStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<SchedulerResponse> {
    let changed = state.job_runner.start().await;
    Json(SchedulerResponse {
        running: true,
        changed,
    })
}

pub async fn stop_scheduler<S: PackageStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<SchedulerResponse> {
    let changed = state.job_runner.stop().await;
    Json(SchedulerResponse {
        running: false,
        changed,
    })
}
