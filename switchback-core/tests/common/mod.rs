//! Shared test scaffolding: a deterministic in-memory data provider and
//! date/series builders.

#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;

use switchback_core::data::{Frequency, Metric, Provider, ProviderError};
use switchback_core::frame::{Column, Frame, DATE_IDX};

/// Serves preloaded frames, trimmed to the requested window, regardless of
/// metric and frequency. Unknown symbols report `SymbolNotFound`.
pub struct FixtureProvider {
    name: &'static str,
    data_type: &'static str,
    series: HashMap<String, Frame>,
}

impl FixtureProvider {
    pub fn new(name: &'static str, data_type: &'static str) -> Self {
        Self { name, data_type, series: HashMap::new() }
    }

    pub fn with_series(mut self, symbol: &str, frame: Frame) -> Self {
        self.series.insert(symbol.to_string(), frame);
        self
    }
}

impl Provider for FixtureProvider {
    fn name(&self) -> &'static str {
        self.name
    }

    fn data_type(&self) -> &'static str {
        self.data_type
    }

    fn get_data_for_period(
        &self,
        symbol: &str,
        _metric: Metric,
        _frequency: Frequency,
        begin: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Frame, ProviderError> {
        let frame = self
            .series
            .get(symbol)
            .ok_or_else(|| ProviderError::SymbolNotFound { symbol: symbol.to_string() })?;
        Ok(frame.time_trim(
            begin.unwrap_or(NaiveDate::MIN),
            end.unwrap_or(NaiveDate::MAX),
            true,
        )?)
    }

    fn last_trading_day(
        &self,
        for_date: NaiveDate,
        _frequency: Frequency,
    ) -> Result<NaiveDate, ProviderError> {
        Ok(for_date)
    }
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Calendar month end, e.g. `month_end(2020, 2)` is 2020-02-29.
pub fn month_end(year: i32, month: u32) -> NaiveDate {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .unwrap()
        .pred_opt()
        .unwrap()
}

/// `count` consecutive month-end dates starting at `year`/`month`.
pub fn month_ends(year: i32, month: u32, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let (mut y, mut m) = (year, month);
    for _ in 0..count {
        dates.push(month_end(y, m));
        if m == 12 {
            y += 1;
            m = 1;
        } else {
            m += 1;
        }
    }
    dates
}

/// `count` consecutive first-of-month dates, mirroring FRED's monthly
/// observation stamps.
pub fn month_starts(year: i32, month: u32, count: usize) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(count);
    let (mut y, mut m) = (year, month);
    for _ in 0..count {
        dates.push(NaiveDate::from_ymd_opt(y, m, 1).unwrap());
        if m == 12 {
            y += 1;
            m = 1;
        } else {
            m += 1;
        }
    }
    dates
}

/// Build a `(DATE, <name>)` frame from parallel dates and values.
pub fn series_frame(name: &str, dates: Vec<NaiveDate>, values: Vec<f64>) -> Frame {
    Frame::new(vec![Column::date(DATE_IDX, dates), Column::float(name, values)]).unwrap()
}
