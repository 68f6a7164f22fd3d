use chrono::NaiveDate;
use data_ingestion::error::DataIngestionError;
use data_ingestion::fetcher::HistoryProvider;
use log::info;
use std::sync::Arc;

use crate::error::PipelineError;
use crate::misc::{FeatureTable, TargetAlignment};
use crate::processor::augment;

pub const DEFAULT_LOOKBACK_YEARS: u32 = 3;

/// Turns a provider's daily history plus a live quote into a model-ready
/// feature table.
pub struct FeaturePipeline {
    provider: Arc<dyn HistoryProvider>,
    alignment: TargetAlignment,
}

impl FeaturePipeline {
    pub fn new(provider: Arc<dyn HistoryProvider>) -> Self {
        Self {
            provider,
            alignment: TargetAlignment::default(),
        }
    }

    pub fn with_alignment(mut self, alignment: TargetAlignment) -> Self {
        self.alignment = alignment;
        self
    }

    pub async fn build_feature_table(
        &self,
        stock_code: &str,
        last_close: f64,
        predict_date: &str,
        years: u32,
    ) -> Result<FeatureTable, PipelineError> {
        let predict_date = parse_predict_date(predict_date)?;
        if !last_close.is_finite() {
            return Err(PipelineError::InvalidQuote(last_close));
        }
        if years == 0 {
            return Err(PipelineError::InvalidLookback(years));
        }

        let history = self.provider.fetch_history(stock_code, years).await?;
        if history.is_empty() {
            return Err(DataIngestionError::NoData(stock_code.to_string()).into());
        }
        let fetched = history.len();

        let rows = augment(history, last_close, predict_date, self.alignment)?;
        let table = FeatureTable::from_augmented(&rows)?;

        info!(
            "Built {} feature rows for {} from {} bars (predict {}, {:?})",
            table.len(),
            stock_code,
            fetched,
            predict_date,
            self.alignment
        );
        Ok(table)
    }
}

fn parse_predict_date(value: &str) -> Result<NaiveDate, PipelineError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|e| PipelineError::InvalidDate(format!("{:?}: {}", value, e)))
}
