use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServerError;

#[derive(Debug, Clone, Deserialize)]
pub struct PredictRequest {
    /// Listing code, e.g. `7203`.
    pub stock_code: String,
    /// Most recent known close, used as the final bar before `predict_date`.
    pub last_close: f64,
    /// `YYYY-MM-DD`
    pub predict_date: String,
}

impl PredictRequest {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.stock_code.trim().is_empty() {
            return Err(ServerError::InvalidRequest(
                "stock_code must not be empty".to_string(),
            ));
        }
        if !self.last_close.is_finite() || self.last_close <= 0.0 {
            return Err(ServerError::InvalidRequest(format!(
                "last_close must be a positive number, got {}",
                self.last_close
            )));
        }
        if self.predict_date.trim().is_empty() {
            return Err(ServerError::InvalidRequest(
                "predict_date must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictResponse {
    Prediction {
        dates: Vec<String>,
        predicted_values: Value,
    },
    Failure {
        error: String,
    },
}

impl From<ServerError> for PredictResponse {
    fn from(err: ServerError) -> Self {
        PredictResponse::Failure {
            error: err.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(stock_code: &str, last_close: f64, predict_date: &str) -> PredictRequest {
        PredictRequest {
            stock_code: stock_code.to_string(),
            last_close,
            predict_date: predict_date.to_string(),
        }
    }

    #[test]
    fn validation() {
        assert!(request("7203", 1500.0, "2024-12-31").validate().is_ok());
        assert!(request(" ", 1500.0, "2024-12-31").validate().is_err());
        assert!(request("7203", 0.0, "2024-12-31").validate().is_err());
        assert!(request("7203", -3.0, "2024-12-31").validate().is_err());
        assert!(request("7203", f64::INFINITY, "2024-12-31").validate().is_err());
        assert!(request("7203", 1500.0, "").validate().is_err());
    }

    #[test]
    fn request_deserializes_from_frontend_payload() {
        let req: PredictRequest = serde_json::from_str(
            r#"{"stock_code":"7203","last_close":1500.0,"predict_date":"2024-12-31"}"#,
        )
        .unwrap();
        assert_eq!(req.stock_code, "7203");
        assert_eq!(req.last_close, 1500.0);

        // Integral closes are accepted as numbers.
        let req: PredictRequest = serde_json::from_str(
            r#"{"stock_code":"7203","last_close":1500,"predict_date":"2024-12-31"}"#,
        )
        .unwrap();
        assert_eq!(req.last_close, 1500.0);
    }

    #[test]
    fn response_shapes() {
        let ok = PredictResponse::Prediction {
            dates: vec!["2024-12-27".to_string()],
            predicted_values: json!([2710.5]),
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            json!({"dates": ["2024-12-27"], "predicted_values": [2710.5]})
        );

        let failed = PredictResponse::from(ServerError::MalformedResponse("not json".to_string()));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"error": "Malformed scoring response: not json"})
        );
    }
}
