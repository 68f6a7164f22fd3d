use chrono::NaiveDate;
use data_ingestion::record::PriceRecord;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

pub const MA_SHORT_WINDOW: usize = 5;
pub const MA_LONG_WINDOW: usize = 25;

/// Model input columns, in matrix order.
pub const FEATURE_COLUMNS: [&str; 7] = ["open", "high", "low", "close", "volume", "MA5", "MA25"];
pub const NUM_FEATURES: usize = FEATURE_COLUMNS.len();

/// How a row's `target` close is located.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetAlignment {
    /// Offset in rows equals the calendar days between the row's date and the
    /// prediction date.
    #[default]
    CalendarDays,
    /// Offset of one row: the gap between the synthetic quote row and the
    /// prediction date.
    NextRow,
}

/// A bar with its derived columns. `None` marks a value that could not be
/// computed for this row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AugmentedRow {
    pub date: NaiveDate,
    pub record: PriceRecord,
    pub ma5: Option<f64>,
    pub ma25: Option<f64>,
    pub target: Option<f64>,
}

impl AugmentedRow {
    pub fn complete(&self) -> Option<FeatureRow> {
        Some(FeatureRow {
            date: self.date,
            open: self.record.open,
            high: self.record.high,
            low: self.record.low,
            close: self.record.close,
            volume: self.record.volume,
            ma5: self.ma5?,
            ma25: self.ma25?,
            target: self.target?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
    pub ma5: f64,
    pub ma25: f64,
    pub target: f64,
}

impl FeatureRow {
    /// Values in `FEATURE_COLUMNS` order.
    pub fn features(&self) -> [f64; NUM_FEATURES] {
        [
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume as f64,
            self.ma5,
            self.ma25,
        ]
    }
}

/// Date-ordered rows with every column present.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Keeps only complete rows. Fails when none survive.
    pub fn from_augmented(rows: &[AugmentedRow]) -> Result<Self, PipelineError> {
        let complete: Vec<FeatureRow> = rows.iter().filter_map(AugmentedRow::complete).collect();
        if complete.is_empty() {
            return Err(PipelineError::EmptyResult(rows.len()));
        }
        Ok(Self { rows: complete })
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row dates as `YYYY-MM-DD`.
    pub fn dates(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.date.format("%Y-%m-%d").to_string())
            .collect()
    }
}
