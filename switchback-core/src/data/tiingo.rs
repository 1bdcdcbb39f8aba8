//! Tiingo end-of-day equity provider.
//!
//! Fetches resampled EOD price history as CSV and resolves trading-day
//! questions through the JSON variant of the same endpoint. URLs are formed
//! exactly as recorded fixtures expect them.

use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::frame::{Column, Frame, DATE_IDX};

use super::provider::{Provider, ProviderError};
use super::{Frequency, Metric};

const TIINGO_API: &str = "https://api.tiingo.com";

/// One row of the Tiingo JSON price response; only the date is consumed.
#[derive(Debug, Deserialize)]
struct EodRow {
    date: String,
}

pub struct TiingoProvider {
    client: reqwest::blocking::Client,
    token: String,
}

impl TiingoProvider {
    pub fn new(token: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("switchback/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");
        Self { client, token: token.into() }
    }

    /// EOD price URL. Omitting either bound requests Tiingo's full history;
    /// `csv` selects the CSV format used for bulk data (the JSON variant
    /// backs `last_trading_day`).
    fn price_url(
        &self,
        symbol: &str,
        begin: Option<NaiveDate>,
        end: Option<NaiveDate>,
        frequency: Frequency,
        csv: bool,
    ) -> String {
        let format = if csv { "format=csv&" } else { "" };
        match (begin, end) {
            (Some(b), Some(e)) => format!(
                "{TIINGO_API}/tiingo/daily/{symbol}/prices?startDate={}&endDate={}&{format}resampleFreq={}&token={}",
                b.format("%Y-%m-%d"),
                e.format("%Y-%m-%d"),
                frequency.resample_param(),
                self.token,
            ),
            _ => format!(
                "{TIINGO_API}/tiingo/daily/{symbol}/prices?{format}resampleFreq={}&token={}",
                frequency.resample_param(),
                self.token,
            ),
        }
    }

    fn get_body(&self, symbol: &str, url: &str) -> Result<String, ProviderError> {
        debug!(symbol, url, "fetching eod prices");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(ProviderError::from_reqwest)?;
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::SymbolNotFound { symbol: symbol.to_string() });
        }
        if !status.is_success() {
            warn!(symbol, status = status.as_u16(), "eod price request failed");
            return Err(ProviderError::Http { status: status.as_u16(), url: url.to_string() });
        }
        resp.text().map_err(ProviderError::from_reqwest)
    }
}

/// Parse a Tiingo EOD CSV body into a `(DATE, <symbol>)` frame carrying
/// `metric`. Unparseable numeric fields become NaN; a malformed date is a
/// parse error.
pub fn parse_eod_csv(symbol: &str, metric: Metric, body: &str) -> Result<Frame, ProviderError> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| ProviderError::Parse(e.to_string()))?;

    let date_idx = headers
        .iter()
        .position(|h| h == "date")
        .ok_or_else(|| ProviderError::Parse("response has no 'date' column".into()))?;
    let value_idx = headers
        .iter()
        .position(|h| h == metric.csv_column())
        .ok_or_else(|| {
            ProviderError::Parse(format!("response has no '{}' column", metric.csv_column()))
        })?;

    let mut dates = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let raw_date = record
            .get(date_idx)
            .ok_or_else(|| ProviderError::Parse("short record".into()))?;
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|e| ProviderError::Parse(format!("bad date '{raw_date}': {e}")))?;
        let value = record
            .get(value_idx)
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(f64::NAN);
        dates.push(date);
        values.push(value);
    }

    if dates.is_empty() {
        return Err(ProviderError::NoData { symbol: symbol.to_string() });
    }

    Ok(Frame::new(vec![
        Column::date(DATE_IDX, dates),
        Column::float(symbol, values),
    ])?)
}

impl Provider for TiingoProvider {
    fn name(&self) -> &'static str {
        "tiingo"
    }

    fn data_type(&self) -> &'static str {
        "security"
    }

    fn get_data_for_period(
        &self,
        symbol: &str,
        metric: Metric,
        frequency: Frequency,
        begin: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Frame, ProviderError> {
        let url = self.price_url(symbol, begin, end, frequency, true);
        let body = self.get_body(symbol, &url)?;
        parse_eod_csv(symbol, metric, &body)
    }

    /// Probe SPY for the period containing `for_date`; the provider answers
    /// with the resampled bar stamped on the period's last trading day.
    fn last_trading_day(
        &self,
        for_date: NaiveDate,
        frequency: Frequency,
    ) -> Result<NaiveDate, ProviderError> {
        let url = self.price_url("SPY", Some(for_date), Some(for_date), frequency, false);
        let body = self.get_body("SPY", &url)?;
        let rows: Vec<EodRow> =
            serde_json::from_str(&body).map_err(|e| ProviderError::Parse(e.to_string()))?;
        let first = rows
            .first()
            .ok_or(ProviderError::NoData { symbol: "SPY".to_string() })?;
        let day = first.date.split('T').next().unwrap_or(&first.date);
        NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map_err(|e| ProviderError::Parse(format!("bad date '{}': {e}", first.date)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn price_url_with_bounds_matches_recorded_format() {
        let t = TiingoProvider::new("TEST");
        let url = t.price_url(
            "VFINX",
            Some(day(1980, 1, 1)),
            Some(day(2021, 1, 1)),
            Frequency::Monthly,
            true,
        );
        assert_eq!(
            url,
            "https://api.tiingo.com/tiingo/daily/VFINX/prices?startDate=1980-01-01&endDate=2021-01-01&format=csv&resampleFreq=monthly&token=TEST"
        );
    }

    #[test]
    fn price_url_without_bounds_omits_dates() {
        let t = TiingoProvider::new("TEST");
        let url = t.price_url("SPY", None, None, Frequency::Daily, true);
        assert_eq!(
            url,
            "https://api.tiingo.com/tiingo/daily/SPY/prices?format=csv&resampleFreq=daily&token=TEST"
        );
    }

    #[test]
    fn json_url_drops_format_parameter() {
        let t = TiingoProvider::new("TEST");
        let url = t.price_url(
            "SPY",
            Some(day(2021, 1, 29)),
            Some(day(2021, 1, 29)),
            Frequency::Weekly,
            false,
        );
        assert_eq!(
            url,
            "https://api.tiingo.com/tiingo/daily/SPY/prices?startDate=2021-01-29&endDate=2021-01-29&resampleFreq=weekly&token=TEST"
        );
    }

    const SAMPLE_CSV: &str = "\
date,close,high,low,open,volume,adjClose,adjHigh,adjLow,adjOpen,adjVolume,divCash,splitFactor
2020-01-31,321.73,323.33,320.36,320.93,7000,318.21,319.79,316.85,317.42,7000,0.0,1.0
2020-02-28,293.05,297.89,285.54,295.31,9000,290.22,295.01,282.78,292.45,9000,1.4,1.0
";

    #[test]
    fn csv_parse_selects_requested_metric() {
        let f = parse_eod_csv("SPY", Metric::AdjustedClose, SAMPLE_CSV).unwrap();
        assert_eq!(f.nrows(), 2);
        assert_eq!(f.dates().unwrap()[0], day(2020, 1, 31));
        assert_eq!(f.floats("SPY").unwrap(), &[318.21, 290.22]);

        let close = parse_eod_csv("SPY", Metric::Close, SAMPLE_CSV).unwrap();
        assert_eq!(close.floats("SPY").unwrap(), &[321.73, 293.05]);
    }

    #[test]
    fn csv_parse_turns_bad_floats_into_nan() {
        let body = "\
date,close,high,low,open,volume,adjClose,adjHigh,adjLow,adjOpen,adjVolume,divCash,splitFactor
2020-01-31,,,,,,n/a,,,,,,
";
        let f = parse_eod_csv("SPY", Metric::AdjustedClose, body).unwrap();
        assert!(f.floats("SPY").unwrap()[0].is_nan());
    }

    #[test]
    fn csv_parse_missing_metric_column_is_an_error() {
        let body = "date,close\n2020-01-31,100.0\n";
        let err = parse_eod_csv("SPY", Metric::AdjustedClose, body).unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[test]
    fn csv_parse_empty_body_reports_no_data() {
        let body = "date,close,adjClose\n";
        let err = parse_eod_csv("SPY", Metric::AdjustedClose, body).unwrap_err();
        assert!(matches!(err, ProviderError::NoData { .. }));
    }
}
