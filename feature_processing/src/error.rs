use data_ingestion::error::DataIngestionError;
use polars::prelude::PolarsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Historical data unavailable: {0}")]
    DataUnavailable(#[from] DataIngestionError),

    #[error("Invalid prediction date: {0}")]
    InvalidDate(String),

    #[error("No complete feature rows remain out of {0} rows")]
    EmptyResult(usize),

    #[error("Last close must be a finite number, got {0}")]
    InvalidQuote(f64),

    #[error("Lookback window must be at least one year, got {0}")]
    InvalidLookback(u32),

    #[error("Feature computation error: {0}")]
    PolarsError(#[from] PolarsError),
}
