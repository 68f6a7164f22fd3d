use feature_processing::error::PipelineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Scoring service request failed: {0}")]
    UpstreamServiceError(#[from] reqwest::Error),

    #[error("Scoring service returned HTTP {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Malformed scoring response: {0}")]
    MalformedResponse(String),

    #[error("Feature matrix shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),
}

impl ServerError {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::Pipeline(PipelineError::DataUnavailable(_)) => "data_unavailable",
            ServerError::Pipeline(PipelineError::InvalidDate(_)) => "invalid_date",
            ServerError::Pipeline(PipelineError::EmptyResult(_)) => "empty_result",
            ServerError::Pipeline(_) => "pipeline",
            ServerError::UpstreamServiceError(_) | ServerError::UpstreamStatus { .. } => {
                "upstream_service_error"
            }
            ServerError::MalformedResponse(_) => "malformed_response",
            ServerError::ShapeError(_) => "shape",
        }
    }
}
