#[cfg(test)]
mod tests {
    use super::super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::NaiveDate;
    use research_core::{RealizedReturn, SignalRow};
    use std::time::Duration;
    use tower::ServiceExt;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    /// Two instruments over five dates with stored probabilities.
    fn historical_artifact() -> SignalArtifact {
        let mut rows = Vec::new();
        let mut realized = Vec::new();
        for d in 1..=5u32 {
            for (i, name) in ["AAPL", "MSFT"].iter().enumerate() {
                let p = 0.55 + 0.1 * ((d as usize + i) % 4) as f64;
                rows.push(SignalRow {
                    instrument: name.to_string(),
                    date: date(d),
                    predicted_probability: p,
                    signal: 0,
                    weight: 0.0,
                });
                realized.push(RealizedReturn {
                    instrument: name.to_string(),
                    date: date(d),
                    realized_return: (if i == 0 { 0.02 } else { -0.01 }) * d as f64,
                });
            }
        }
        let rows = signal_generator::rethreshold(&rows, 0.6).unwrap();
        SignalArtifact::new(ArtifactKind::Historical, 0.6, rows, realized)
    }

    fn app_with_artifact() -> Router {
        build_router(AppState::new(
            PipelineConfig::default(),
            Some(historical_artifact()),
            None,
        ))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_params(app: Router, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/dashboard/params")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(app_with_artifact(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_evaluate_with_defaults() {
        let (status, body) = get_json(app_with_artifact(), "/api/evaluate").await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["empty"], false);
        assert_eq!(data["daily"].as_array().unwrap().len(), 5);
        assert_eq!(data["metrics"][0]["series"], "Model");
        assert_eq!(data["metrics"][1]["series"], "Buy & Hold");
        assert_eq!(data["params"]["threshold"], 0.6);
    }

    #[tokio::test]
    async fn test_evaluate_rejects_out_of_range_threshold() {
        let (status, body) = get_json(app_with_artifact(), "/api/evaluate?threshold=0.95").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("threshold"));
    }

    #[tokio::test]
    async fn test_missing_artifact_is_not_found() {
        let app = build_router(AppState::new(PipelineConfig::default(), None, None));
        let (status, body) = get_json(app.clone(), "/api/evaluate").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);

        let (status, _) = get_json(app, "/api/signals/latest").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_latest_signals_from_historical() {
        let (status, body) = get_json(app_with_artifact(), "/api/signals/latest").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["date"], "2024-04-05");
        assert_eq!(body["data"]["rows"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_submitted_params_are_published() {
        let app = app_with_artifact();
        let (status, body) = post_params(
            app.clone(),
            serde_json::json!({ "threshold": 0.7, "take_profit": 0.1, "stop_loss": -0.1 }),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let request_id = body["data"]["request_id"].as_u64().unwrap();

        let mut published = None;
        for _ in 0..100 {
            let (_, state) = get_json(app.clone(), "/api/dashboard/state").await;
            if state["data"]["snapshot"]["request_id"].as_u64() == Some(request_id) {
                published = Some(state);
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let state = published.expect("recomputation was not published");
        assert_eq!(state["data"]["pending"], false);
        assert_eq!(state["data"]["snapshot"]["evaluation"]["params"]["threshold"], 0.7);
    }

    async fn wait_for_snapshot(app: Router, request_id: u64) -> serde_json::Value {
        for _ in 0..100 {
            let (_, state) = get_json(app.clone(), "/api/dashboard/state").await;
            if state["data"]["snapshot"]["request_id"].as_u64() == Some(request_id) {
                return state;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("recomputation {} was not published", request_id);
    }

    #[tokio::test]
    async fn test_failed_recomputation_resolves_state() {
        let mut artifact = historical_artifact();
        let duplicate = artifact.realized[0].clone();
        artifact.realized.push(duplicate);
        let app = build_router(AppState::new(PipelineConfig::default(), Some(artifact), None));

        let (status, body) = post_params(
            app.clone(),
            serde_json::json!({ "threshold": 0.6, "take_profit": 0.1, "stop_loss": -0.1 }),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let request_id = body["data"]["request_id"].as_u64().unwrap();

        let state = wait_for_snapshot(app, request_id).await;
        assert_eq!(state["data"]["pending"], false);
        assert!(state["data"]["snapshot"]["evaluation"].is_null());
        assert!(state["data"]["snapshot"]["error"]
            .as_str()
            .unwrap()
            .contains("duplicate realized return"));
    }

    #[tokio::test]
    async fn test_invalid_submission_rejected() {
        let (status, body) = post_params(
            app_with_artifact(),
            serde_json::json!({ "threshold": 0.6, "take_profit": 0.5, "stop_loss": -0.05 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("take_profit"));
    }

    #[test]
    fn test_load_tolerates_missing_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            artifact_dir: dir.path().to_path_buf(),
            ..PipelineConfig::default()
        };
        historical_artifact()
            .save(&dir.path().join(ArtifactKind::Historical.file_name()))
            .unwrap();

        let state = AppState::load(config).unwrap();
        assert!(state.historical.is_some());
        assert!(state.live.is_none());
    }
}
