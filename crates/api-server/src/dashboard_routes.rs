use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use backtest_engine::{evaluate_signals, EvaluateParams, LatestResultCell, RecomputeOutcome};
use research_core::{DailyReturn, DashboardParams, MetricsRow, PipelineResult};
use signal_generator::SignalArtifact;

use crate::{ApiResponse, AppError, AppState};

/// Query string of `GET /api/evaluate`; absent values take the dashboard defaults.
#[derive(Debug, Deserialize)]
pub struct EvaluateQuery {
    pub threshold: Option<f64>,
    pub take_profit: Option<f64>,
    pub stop_loss: Option<f64>,
}

impl EvaluateQuery {
    fn params(&self) -> DashboardParams {
        let defaults = DashboardParams::default();
        DashboardParams {
            threshold: self.threshold.unwrap_or(defaults.threshold),
            take_profit: self.take_profit.unwrap_or(defaults.take_profit),
            stop_loss: self.stop_loss.unwrap_or(defaults.stop_loss),
        }
    }
}

/// Equity curves and the rounded metrics table.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationView {
    pub params: DashboardParams,
    pub empty: bool,
    pub row_count: usize,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub daily: Vec<DailyReturn>,
    pub metrics: Vec<MetricsRow>,
}

/// Outcome of the newest finished recomputation. Exactly one of
/// `evaluation` and `error` is set.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub request_id: u64,
    pub evaluation: Option<EvaluationView>,
    pub error: Option<String>,
}

impl DashboardSnapshot {
    fn completed(request_id: u64, evaluation: EvaluationView) -> Self {
        Self {
            request_id,
            evaluation: Some(evaluation),
            error: None,
        }
    }

    fn failed(request_id: u64, error: String) -> Self {
        Self {
            request_id,
            evaluation: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub request_id: u64,
}

#[derive(Debug, Serialize)]
pub struct DashboardStateView {
    pub latest_request_id: u64,
    /// True while the newest submission has not been published yet.
    pub pending: bool,
    pub snapshot: Option<DashboardSnapshot>,
}

pub fn dashboard_routes() -> Router<AppState> {
    Router::new()
        .route("/api/evaluate", get(evaluate))
        .route("/api/dashboard/params", post(submit_params))
        .route("/api/dashboard/state", get(dashboard_state))
}

pub(crate) fn compute_evaluation(
    artifact: &SignalArtifact,
    params: DashboardParams,
    horizon_days: usize,
) -> PipelineResult<EvaluationView> {
    let eval_params = EvaluateParams::new(params.take_profit, params.stop_loss, horizon_days);
    let result = evaluate_signals(&artifact.rows, &artifact.realized, params.threshold, &eval_params)?;
    Ok(EvaluationView {
        params,
        empty: result.is_empty(),
        row_count: result.row_count,
        start_date: result.start_date,
        end_date: result.end_date,
        metrics: result.display_metrics(),
        daily: result.daily,
    })
}

/// Evaluate synchronously under the given parameters.
async fn evaluate(
    State(state): State<AppState>,
    Query(query): Query<EvaluateQuery>,
) -> Result<Json<ApiResponse<EvaluationView>>, AppError> {
    let params = query.params();
    params.validate()?;
    let artifact = state.historical_artifact()?;
    let horizon = state.config.horizon_days;

    let view = tokio::task::spawn_blocking(move || compute_evaluation(&artifact, params, horizon))
        .await
        .map_err(|e| anyhow::anyhow!("Evaluation task failed: {}", e))??;

    Ok(Json(ApiResponse::success(view)))
}

/// Submit a recomputation. Returns immediately with the request id; the
/// result is published to the dashboard cell unless a newer request arrives
/// first.
async fn submit_params(
    State(state): State<AppState>,
    Json(params): Json<DashboardParams>,
) -> Result<(StatusCode, Json<ApiResponse<SubmitResponse>>), AppError> {
    params.validate()?;
    let artifact = state.historical_artifact()?;
    let horizon = state.config.horizon_days;
    let cell = Arc::clone(&state.dashboard);
    let request_id = cell.begin();

    tracing::info!(
        "Recomputation {} requested: threshold={} tp={} sl={}",
        request_id,
        params.threshold,
        params.take_profit,
        params.stop_loss
    );

    tokio::spawn(recompute(cell, artifact, params, horizon, request_id));

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(SubmitResponse { request_id })),
    ))
}

async fn recompute(
    cell: Arc<LatestResultCell<DashboardSnapshot>>,
    artifact: Arc<SignalArtifact>,
    params: DashboardParams,
    horizon: usize,
    request_id: u64,
) {
    let worker_cell = Arc::clone(&cell);
    let computed = tokio::task::spawn_blocking(move || {
        // skip work that is already superseded
        if !worker_cell.is_current(request_id) {
            return None;
        }
        Some(compute_evaluation(&artifact, params, horizon))
    })
    .await;

    let snapshot = match computed {
        Ok(Some(Ok(evaluation))) => DashboardSnapshot::completed(request_id, evaluation),
        Ok(Some(Err(e))) => {
            tracing::warn!("Recomputation {} failed: {}", request_id, e);
            DashboardSnapshot::failed(request_id, e.to_string())
        }
        Ok(None) => {
            tracing::debug!("Recomputation {} skipped (superseded)", request_id);
            return;
        }
        Err(e) => {
            tracing::error!("Recomputation {} task panicked: {}", request_id, e);
            DashboardSnapshot::failed(request_id, "Recomputation task failed".to_string())
        }
    };

    match cell.publish(request_id, snapshot) {
        RecomputeOutcome::Published { .. } => {
            tracing::info!("Recomputation {} published", request_id);
        }
        RecomputeOutcome::Superseded {
            latest_request_id, ..
        } => {
            tracing::debug!(
                "Recomputation {} superseded by {}",
                request_id,
                latest_request_id
            );
        }
    }
}

async fn dashboard_state(State(state): State<AppState>) -> Json<ApiResponse<DashboardStateView>> {
    let latest_request_id = state.dashboard.latest_requested();
    let snapshot = state.dashboard.latest().map(|p| (*p.value).clone());
    let pending = snapshot
        .as_ref()
        .map_or(latest_request_id > 0, |s| s.request_id < latest_request_id);

    Json(ApiResponse::success(DashboardStateView {
        latest_request_id,
        pending,
        snapshot,
    }))
}
