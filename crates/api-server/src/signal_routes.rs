use axum::{extract::State, routing::get, Json, Router};
use chrono::NaiveDate;
use serde::Serialize;

use research_core::SignalRow;
use signal_generator::ArtifactKind;

use crate::{ApiResponse, AppError, AppState};

#[derive(Debug, Serialize)]
pub struct LatestSignals {
    pub kind: ArtifactKind,
    pub date: Option<NaiveDate>,
    pub threshold: f64,
    pub rows: Vec<SignalRow>,
}

pub fn signal_routes() -> Router<AppState> {
    Router::new().route("/api/signals/latest", get(latest_signals))
}

/// Signals of the most recent date, from the live artifact when present.
async fn latest_signals(State(state): State<AppState>) -> Result<Json<ApiResponse<LatestSignals>>, AppError> {
    let artifact = state
        .live
        .as_ref()
        .or(state.historical.as_ref())
        .ok_or_else(|| AppError::not_found("No signal artifact loaded"))?;

    Ok(Json(ApiResponse::success(LatestSignals {
        kind: artifact.kind,
        date: artifact.latest_date(),
        threshold: artifact.threshold,
        rows: artifact.latest_rows(),
    })))
}
