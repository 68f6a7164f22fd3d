use chrono::NaiveDate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One daily OHLCV bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl PriceRecord {
    /// A bar where every price equals `price` and nothing traded.
    pub fn flat(price: f64) -> Self {
        Self {
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0,
        }
    }
}

/// Daily bars keyed by trading date. Dates are unique and iterate in
/// ascending order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceHistory {
    records: BTreeMap<NaiveDate, PriceRecord>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record` at `date`, returning the bar it replaced if the date
    /// was already present.
    pub fn upsert(&mut self, date: NaiveDate, record: PriceRecord) -> Option<PriceRecord> {
        self.records.insert(date, record)
    }

    pub fn get(&self, date: NaiveDate) -> Option<&PriceRecord> {
        self.records.get(&date)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.records.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.records.keys().next_back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &PriceRecord)> + '_ {
        self.records.iter().map(|(date, record)| (*date, record))
    }
}

impl FromIterator<(NaiveDate, PriceRecord)> for PriceHistory {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, PriceRecord)>>(iter: I) -> Self {
        let mut history = PriceHistory::new();
        for (date, record) in iter {
            history.upsert(date, record);
        }
        history
    }
}

pub fn validate_record(data: &PriceRecord) -> bool {
    let mut is_valid = true;
    if data.volume < 0 {
        warn!("Invalid Volume data");
        is_valid = false;
    }

    for (name, value) in [
        ("Open", data.open),
        ("High", data.high),
        ("Low", data.low),
        ("Close", data.close),
    ] {
        if !value.is_finite() {
            warn!("{} is not a finite number", name);
            is_valid = false;
        } else if value < 0.0 {
            warn!("{} cannot be negative", name);
            is_valid = false;
        }
    }

    is_valid
}
