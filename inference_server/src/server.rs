use anyhow::Result;
use axum::Router;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::Json;
use axum::routing::{get, post};
use feature_processing::pipeline::FeaturePipeline;
use log::{error, info};
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::engine::{Scorer, feature_matrix};
use crate::error::ServerError;
use crate::misc::{HealthResponse, PredictRequest, PredictResponse};

/// Read-only collaborators shared by every request.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<FeaturePipeline>,
    scorer: Arc<dyn Scorer>,
    lookback_years: u32,
}

impl AppState {
    pub fn new(pipeline: FeaturePipeline, scorer: Arc<dyn Scorer>, lookback_years: u32) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            scorer,
            lookback_years,
        }
    }
}

/// POST /predict. Always answers 200; failures are reported in the body.
async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> Json<PredictResponse> {
    let outcome = match payload {
        Ok(Json(request)) => run_prediction(&state, request).await,
        Err(rejection) => Err(ServerError::InvalidRequest(rejection.body_text())),
    };

    match outcome {
        Ok(response) => Json(response),
        Err(e) => {
            error!("Prediction failed [{}]: {}", e.kind(), e);
            Json(PredictResponse::from(e))
        }
    }
}

async fn run_prediction(
    state: &AppState,
    request: PredictRequest,
) -> Result<PredictResponse, ServerError> {
    request.validate()?;

    let table = state
        .pipeline
        .build_feature_table(
            &request.stock_code,
            request.last_close,
            &request.predict_date,
            state.lookback_years,
        )
        .await?;

    let features = feature_matrix(&table)?;
    let predicted_values = state.scorer.score(&features).await?;

    info!(
        "Scored {} rows for {} (predict {})",
        table.len(),
        request.stock_code,
        request.predict_date
    );
    Ok(PredictResponse::Prediction {
        dates: table.dates(),
        predicted_values,
    })
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .with_state(state)
}

pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    pub fn init(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub async fn run(&self) -> Result<()> {
        let app = router(self.state.clone());

        let addr = self.config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        info!("HTTP server running on {}", addr);
        axum::serve(listener, app).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::engine::AzureMlScorer;
    use axum::http::StatusCode;
    use chrono::{Days, NaiveDate};
    use data_ingestion::fetcher::InMemoryProvider;
    use data_ingestion::record::{PriceHistory, PriceRecord};
    use feature_processing::misc::TargetAlignment;
    use futures_util::FutureExt;
    use futures_util::future::BoxFuture;
    use ndarray::Array2;
    use serde_json::{Value, json};

    /// Returns each row's close, so responses can be checked against input.
    struct CloseEcho;

    impl Scorer for CloseEcho {
        fn score<'a>(
            &'a self,
            features: &'a Array2<f64>,
        ) -> BoxFuture<'a, Result<Value, ServerError>> {
            let closes: Vec<f64> = features.column(3).to_vec();
            futures_util::future::ready(Ok(json!(closes))).boxed()
        }
    }

    fn history() -> PriceHistory {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..30)
            .map(|i| {
                (
                    start.checked_add_days(Days::new(i)).unwrap(),
                    PriceRecord::flat(100.0 + i as f64),
                )
            })
            .collect()
    }

    fn state(scorer: Arc<dyn Scorer>, alignment: TargetAlignment) -> AppState {
        let provider = InMemoryProvider::new().with_history("7203", history());
        let pipeline = FeaturePipeline::new(Arc::new(provider)).with_alignment(alignment);
        AppState::new(pipeline, scorer, 3)
    }

    fn request(stock_code: &str, last_close: f64, predict_date: &str) -> PredictRequest {
        PredictRequest {
            stock_code: stock_code.to_string(),
            last_close,
            predict_date: predict_date.to_string(),
        }
    }

    async fn call(state: AppState, request: PredictRequest) -> Value {
        let Json(response) = predict(State(state), Ok(Json(request))).await;
        serde_json::to_value(response).unwrap()
    }

    fn error_message(body: &Value) -> &str {
        assert_eq!(body.as_object().map(|o| o.len()), Some(1), "{}", body);
        body["error"].as_str().unwrap()
    }

    #[tokio::test]
    async fn returns_dates_paired_with_predictions() {
        let state = state(Arc::new(CloseEcho), TargetAlignment::NextRow);
        let body = call(state, request("7203", 130.0, "2024-02-01")).await;

        assert_eq!(
            body,
            json!({
                "dates": ["2024-01-25", "2024-01-26", "2024-01-27", "2024-01-28", "2024-01-29", "2024-01-30"],
                "predicted_values": [124.0, 125.0, 126.0, 127.0, 128.0, 129.0],
            })
        );
    }

    #[tokio::test]
    async fn invalid_requests_become_error_payloads() {
        let state = state(Arc::new(CloseEcho), TargetAlignment::NextRow);

        let body = call(state.clone(), request("", 130.0, "2024-02-01")).await;
        assert!(error_message(&body).contains("stock_code"));

        let body = call(state.clone(), request("7203", -1.0, "2024-02-01")).await;
        assert!(error_message(&body).contains("last_close"));

        let body = call(state, request("7203", 130.0, "2024-01-15")).await;
        assert!(error_message(&body).starts_with("Invalid prediction date"));
    }

    #[tokio::test]
    async fn pipeline_failures_become_error_payloads() {
        let body = call(
            state(Arc::new(CloseEcho), TargetAlignment::NextRow),
            request("6758", 130.0, "2024-02-01"),
        )
        .await;
        assert!(error_message(&body).contains("No price data returned for 6758"));

        let body = call(
            state(Arc::new(CloseEcho), TargetAlignment::CalendarDays),
            request("7203", 130.0, "2024-02-01"),
        )
        .await;
        assert!(error_message(&body).starts_with("No complete feature rows"));
    }

    #[tokio::test]
    async fn scoring_service_failure_becomes_error_payload() {
        let scoring_app = Router::new().route(
            "/score",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "deployment is scaling") }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, scoring_app).await.unwrap();
        });
        let scorer = AzureMlScorer::new(&ScoringConfig {
            endpoint: format!("http://{}/score", addr),
            api_key: "secret".to_string(),
        })
        .unwrap();

        let body = call(
            state(Arc::new(scorer), TargetAlignment::NextRow),
            request("7203", 130.0, "2024-02-01"),
        )
        .await;
        assert_eq!(
            error_message(&body),
            "Scoring service returned HTTP 503: deployment is scaling"
        );
    }

    #[tokio::test]
    async fn served_router_answers_bad_json_with_error_payload() {
        let app = router(state(Arc::new(CloseEcho), TargetAlignment::NextRow));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let client = reqwest::Client::new();

        let response = client
            .post(format!("http://{}/predict", addr))
            .header("content-type", "application/json")
            .body(r#"{"stock_code": "7203", "last_close": "high"}"#)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        assert!(!error_message(&body).is_empty());

        let health: Value = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");
    }
}
