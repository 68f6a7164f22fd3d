use feature_processing::misc::{FeatureTable, NUM_FEATURES};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::debug;
use ndarray::Array2;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

use crate::config::ScoringConfig;
use crate::error::ServerError;

const MAX_ERROR_BODY: usize = 200;

/// Remote model that maps a feature matrix to predictions.
pub trait Scorer: Send + Sync {
    fn score<'a>(&'a self, features: &'a Array2<f64>) -> BoxFuture<'a, Result<Value, ServerError>>;
}

/// Projects `open, high, low, close, volume, MA5, MA25` into a rows x 7 matrix.
pub fn feature_matrix(table: &FeatureTable) -> Result<Array2<f64>, ServerError> {
    let values: Vec<f64> = table.rows().iter().flat_map(|row| row.features()).collect();
    let matrix = Array2::from_shape_vec((table.len(), NUM_FEATURES), values)?;
    Ok(matrix)
}

#[derive(Serialize)]
struct ScoringPayload {
    data: Vec<Vec<f64>>,
}

/// Azure ML online endpoint, authenticated with a bearer key.
pub struct AzureMlScorer {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl AzureMlScorer {
    pub fn new(config: &ScoringConfig) -> Result<Self, ServerError> {
        Ok(Self {
            client: Client::builder().build()?,
            endpoint: config.endpoint.trim().to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

impl Scorer for AzureMlScorer {
    fn score<'a>(&'a self, features: &'a Array2<f64>) -> BoxFuture<'a, Result<Value, ServerError>> {
        async move {
            let payload = ScoringPayload {
                data: features.rows().into_iter().map(|row| row.to_vec()).collect(),
            };
            debug!("Scoring {} feature rows", payload.data.len());

            let response = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&payload)
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(ServerError::UpstreamStatus {
                    status: status.as_u16(),
                    body: body.chars().take(MAX_ERROR_BODY).collect(),
                });
            }

            let prediction: Value = serde_json::from_str(&body)
                .map_err(|e| ServerError::MalformedResponse(e.to_string()))?;
            if !prediction.is_array() {
                return Err(ServerError::MalformedResponse(format!(
                    "expected a JSON array, got {}",
                    json_kind(&prediction)
                )));
            }
            Ok(prediction)
        }
        .boxed()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
