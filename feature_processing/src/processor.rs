use chrono::NaiveDate;
use data_ingestion::record::{PriceHistory, PriceRecord};
use log::debug;
use polars::prelude::*;

use crate::error::PipelineError;
use crate::misc::{AugmentedRow, MA_LONG_WINDOW, MA_SHORT_WINDOW, TargetAlignment};

/// Upserts the caller's quote at `predict_date - 1 day` and derives MA5, MA25
/// and target for every row. Rows are returned in date order, incomplete ones
/// included.
pub fn augment(
    mut history: PriceHistory,
    last_close: f64,
    predict_date: NaiveDate,
    alignment: TargetAlignment,
) -> Result<Vec<AugmentedRow>, PipelineError> {
    let last_date = history.last_date().ok_or_else(|| {
        PipelineError::InvalidDate("no trading dates to compare against".to_string())
    })?;
    if predict_date <= last_date {
        return Err(PipelineError::InvalidDate(format!(
            "{} is not after the last trading date {}",
            predict_date, last_date
        )));
    }

    // predict_date > last_date, so the previous day always exists.
    let quote_date = predict_date
        .pred_opt()
        .ok_or_else(|| PipelineError::InvalidDate(predict_date.to_string()))?;
    if let Some(replaced) = history.upsert(quote_date, PriceRecord::flat(last_close)) {
        debug!(
            "Quote row overwrote existing bar on {} (close {})",
            quote_date, replaced.close
        );
    }

    let (dates, records): (Vec<NaiveDate>, Vec<PriceRecord>) =
        history.iter().map(|(date, record)| (date, *record)).unzip();
    let closes: Vec<f64> = records.iter().map(|r| r.close).collect();

    let (ma5, ma25) = moving_averages(&closes)?;
    let targets = align_targets(&dates, &closes, predict_date, alignment);

    let rows = dates
        .into_iter()
        .zip(records)
        .enumerate()
        .map(|(i, (date, record))| AugmentedRow {
            date,
            record,
            ma5: ma5[i],
            ma25: ma25[i],
            target: targets[i],
        })
        .collect();

    Ok(rows)
}

/// Trailing simple means of `closes` over the short and long windows,
/// including the current row. `None` until a full window exists.
fn moving_averages(closes: &[f64]) -> PolarsResult<(Vec<Option<f64>>, Vec<Option<f64>>)> {
    let s1 = Series::new("close", closes);
    let df = DataFrame::new(vec![s1])?;

    let df = df
        .lazy()
        .with_columns([
            trailing_mean(MA_SHORT_WINDOW).alias("MA5"),
            trailing_mean(MA_LONG_WINDOW).alias("MA25"),
        ])
        .collect()?;

    Ok((column_values(&df, "MA5")?, column_values(&df, "MA25")?))
}

fn trailing_mean(window: usize) -> Expr {
    col("close").rolling_mean(RollingOptions {
        window_size: Duration::parse(&format!("{}i", window)),
        min_periods: window,
        ..Default::default()
    })
}

fn column_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    Ok(df.column(name)?.f64()?.into_iter().collect())
}

/// Row `i` takes the close found `offset` rows later, where the offset comes
/// from `alignment`. Offsets that land outside the table give `None`.
fn align_targets(
    dates: &[NaiveDate],
    closes: &[f64],
    predict_date: NaiveDate,
    alignment: TargetAlignment,
) -> Vec<Option<f64>> {
    dates
        .iter()
        .enumerate()
        .map(|(i, date)| {
            let offset = match alignment {
                TargetAlignment::CalendarDays => (predict_date - *date).num_days(),
                TargetAlignment::NextRow => 1,
            };
            usize::try_from(offset)
                .ok()
                .and_then(|offset| i.checked_add(offset))
                .and_then(|j| closes.get(j).copied())
        })
        .collect()
}
