use chrono::{DateTime, Months, NaiveDate, Utc};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use log::{debug, info};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;

use crate::config::ProviderConfig;
use crate::error::DataIngestionError;
use crate::record::{PriceHistory, PriceRecord, validate_record};

/// Source of daily price history for a traded instrument.
pub trait HistoryProvider: Send + Sync {
    /// Daily bars for `stock_code` covering the trailing `years` up to now.
    fn fetch_history<'a>(
        &'a self,
        stock_code: &'a str,
        years: u32,
    ) -> BoxFuture<'a, Result<PriceHistory, DataIngestionError>>;
}

#[derive(Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Deserialize)]
struct Chart {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Deserialize)]
struct ChartData {
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Deserialize)]
struct Indicators {
    quote: Vec<QuoteColumns>,
}

#[derive(Deserialize)]
struct QuoteColumns {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<f64>>,
}

/// Daily bars from the Yahoo Finance chart API.
pub struct YahooChartFetcher {
    client: Client,
    config: ProviderConfig,
}

impl YahooChartFetcher {
    pub fn new(config: ProviderConfig) -> Result<Self, DataIngestionError> {
        let client = Client::builder().user_agent(&config.user_agent).build()?;
        Ok(Self { client, config })
    }

    fn symbol(&self, stock_code: &str) -> String {
        format!("{}{}", stock_code.trim(), self.config.ticker_suffix)
    }

    fn chart_url(&self, symbol: &str, years: u32, now: DateTime<Utc>) -> String {
        let (start, end) = lookback_window(years, now);
        format!(
            "{}/{}?period1={}&period2={}&interval=1d",
            self.config.base_url.trim_end_matches('/'),
            symbol,
            start,
            end
        )
    }
}

impl HistoryProvider for YahooChartFetcher {
    fn fetch_history<'a>(
        &'a self,
        stock_code: &'a str,
        years: u32,
    ) -> BoxFuture<'a, Result<PriceHistory, DataIngestionError>> {
        async move {
            let symbol = self.symbol(stock_code);
            let url = self.chart_url(&symbol, years, Utc::now());
            debug!("Requesting {}y of daily bars: {}", years, url);

            let response = self
                .client
                .get(&url)
                .header("Accept", "application/json")
                .send()
                .await?;

            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                // Unknown symbols come back as 404 with a `chart.error` body.
                return Err(match parse_chart(&symbol, &body) {
                    Err(err @ DataIngestionError::ProviderError { .. }) => err,
                    _ => DataIngestionError::HttpStatus {
                        symbol,
                        status: status.as_u16(),
                    },
                });
            }

            let history = parse_chart(&symbol, &body)?;
            info!(
                "Fetched {} daily bars for {} ({:?} to {:?})",
                history.len(),
                symbol,
                history.first_date(),
                history.last_date()
            );
            Ok(history)
        }
        .boxed()
    }
}

/// Unix seconds for `now - years` and `now`.
fn lookback_window(years: u32, now: DateTime<Utc>) -> (i64, i64) {
    let start = now
        .checked_sub_months(Months::new(years.saturating_mul(12)))
        .map_or(0, |start| start.timestamp().max(0));
    (start, now.timestamp())
}

fn parse_chart(symbol: &str, body: &str) -> Result<PriceHistory, DataIngestionError> {
    let response: ChartResponse = serde_json::from_str(body)?;

    if let Some(error) = response.chart.error {
        return Err(DataIngestionError::ProviderError {
            code: error.code,
            description: error.description,
        });
    }

    let results = response
        .chart
        .result
        .ok_or_else(|| DataIngestionError::NoData(symbol.to_string()))?;
    let data = results
        .first()
        .ok_or_else(|| DataIngestionError::NoData(symbol.to_string()))?;
    let quote = data
        .indicators
        .quote
        .first()
        .ok_or_else(|| DataIngestionError::NoData(symbol.to_string()))?;

    let malformed = |reason: String| DataIngestionError::MalformedSeries {
        symbol: symbol.to_string(),
        reason,
    };

    let rows = data.timestamp.len();
    let columns = [
        ("open", quote.open.len()),
        ("high", quote.high.len()),
        ("low", quote.low.len()),
        ("close", quote.close.len()),
        ("volume", quote.volume.len()),
    ];
    if let Some((name, len)) = columns.iter().find(|(_, len)| *len != rows) {
        return Err(malformed(format!(
            "{} has {} values for {} timestamps",
            name, len, rows
        )));
    }

    // Bars are stamped at the session open; shift into exchange time before
    // taking the calendar date.
    let gmtoffset = data.meta.as_ref().map_or(0, |meta| meta.gmtoffset);
    let mut history = PriceHistory::new();

    for (i, ts) in data.timestamp.iter().enumerate() {
        let (Some(open), Some(high), Some(low), Some(close), Some(volume)) = (
            quote.open[i],
            quote.high[i],
            quote.low[i],
            quote.close[i],
            quote.volume[i],
        ) else {
            debug!("Skipping incomplete bar at {} for {}", ts, symbol);
            continue;
        };

        let date = trading_date(*ts, gmtoffset)
            .ok_or_else(|| malformed(format!("timestamp {} is out of range", ts)))?;
        let volume = share_count(volume)
            .ok_or_else(|| malformed(format!("invalid volume {} on {}", volume, date)))?;
        let record = PriceRecord {
            open,
            high,
            low,
            close,
            volume,
        };
        if !validate_record(&record) {
            return Err(malformed(format!("invalid bar on {}", date)));
        }
        history.upsert(date, record);
    }

    if history.is_empty() {
        return Err(DataIngestionError::NoData(symbol.to_string()));
    }
    Ok(history)
}

fn share_count(volume: f64) -> Option<i64> {
    (volume.is_finite() && volume >= 0.0).then_some(volume as i64)
}

fn trading_date(timestamp: i64, gmtoffset: i64) -> Option<NaiveDate> {
    DateTime::from_timestamp(timestamp.checked_add(gmtoffset)?, 0).map(|dt| dt.date_naive())
}

/// Serves fixed histories from memory for tests. Unknown codes yield `NoData`.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    histories: HashMap<String, PriceHistory>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(mut self, stock_code: &str, history: PriceHistory) -> Self {
        self.histories.insert(stock_code.to_string(), history);
        self
    }
}

impl HistoryProvider for InMemoryProvider {
    fn fetch_history<'a>(
        &'a self,
        stock_code: &'a str,
        _years: u32,
    ) -> BoxFuture<'a, Result<PriceHistory, DataIngestionError>> {
        let history = self
            .histories
            .get(stock_code)
            .cloned()
            .ok_or_else(|| DataIngestionError::NoData(stock_code.to_string()));
        futures_util::future::ready(history).boxed()
    }
}
