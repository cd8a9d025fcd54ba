//! HTTP backend for the research dashboard.
//!
//! Serves evaluations of the stored historical signal artifact under
//! dashboard parameters, and the latest live signals.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use backtest_engine::LatestResultCell;
use research_core::{PipelineConfig, PipelineError};
use signal_generator::{ArtifactKind, SignalArtifact};

mod dashboard_routes;
mod signal_routes;

pub use dashboard_routes::{DashboardSnapshot, DashboardStateView, EvaluationView, SubmitResponse};
pub use signal_routes::LatestSignals;

#[cfg(test)]
#[path = "routes_tests.rs"]
mod routes_tests;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

/// Shared handler state. Artifacts are loaded once at startup and read-only.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PipelineConfig>,
    pub historical: Option<Arc<SignalArtifact>>,
    pub live: Option<Arc<SignalArtifact>>,
    pub dashboard: Arc<LatestResultCell<DashboardSnapshot>>,
}

impl AppState {
    pub fn new(
        config: PipelineConfig,
        historical: Option<SignalArtifact>,
        live: Option<SignalArtifact>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            historical: historical.map(Arc::new),
            live: live.map(Arc::new),
            dashboard: Arc::new(LatestResultCell::new()),
        }
    }

    /// Load both signal artifacts from `config.artifact_dir`. A missing file
    /// is tolerated; a corrupt one is not.
    pub fn load(config: PipelineConfig) -> Result<Self, PipelineError> {
        let historical = load_optional(&config.artifact_dir, ArtifactKind::Historical)?;
        let live = load_optional(&config.artifact_dir, ArtifactKind::Live)?;
        Ok(Self::new(config, historical, live))
    }

    fn historical_artifact(&self) -> Result<Arc<SignalArtifact>, AppError> {
        self.historical
            .clone()
            .ok_or_else(|| AppError::not_found("No historical signal artifact loaded"))
    }
}

fn load_optional(dir: &Path, kind: ArtifactKind) -> Result<Option<SignalArtifact>, PipelineError> {
    let path = dir.join(kind.file_name());
    match SignalArtifact::load(&path) {
        Ok(artifact) => {
            tracing::info!(
                "Loaded {:?} signal artifact: {} rows, threshold {}",
                kind,
                artifact.rows.len(),
                artifact.threshold
            );
            Ok(Some(artifact))
        }
        Err(PipelineError::MissingInput(msg)) => {
            tracing::warn!("{}", msg);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Standard JSON envelope for successful responses.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Handler error rendered as `{ "success": false, "error": ... }`.
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let status = if err.is_validation() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!("{}", self.message);
        }
        (
            self.status,
            Json(json!({
                "success": false,
                "error": self.message,
            })),
        )
            .into_response()
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .merge(dashboard_routes::dashboard_routes())
        .merge(signal_routes::signal_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("api_server=info,tower_http=info"));
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

pub async fn run_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = PipelineConfig::from_env().context("Invalid pipeline configuration")?;
    let bind_addr = std::env::var("DASHBOARD_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string());
    tracing::info!(
        "Artifacts from {} (horizon {} days)",
        config.artifact_dir.display(),
        config.horizon_days
    );

    let state = AppState::load(config).context("Failed to load signal artifacts")?;
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    tracing::info!("Dashboard backend listening on {}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
