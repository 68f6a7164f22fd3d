use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataIngestionError {
    #[error("HTTP request error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    #[error("JSON deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    #[error("Price provider returned HTTP {status} for {symbol}")]
    HttpStatus { symbol: String, status: u16 },

    #[error("Price provider error [{code}]: {description}")]
    ProviderError { code: String, description: String },

    #[error("No price data returned for {0}")]
    NoData(String),

    #[error("Malformed price series for {symbol}: {reason}")]
    MalformedSeries { symbol: String, reason: String },
}
