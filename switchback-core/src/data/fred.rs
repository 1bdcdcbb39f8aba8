//! FRED economic-series provider (St. Louis Fed `fredgraph` CSV export).
//!
//! Serves rate series such as the 3-month T-Bill secondary rate (`TB3MS`
//! monthly, `DTB3` daily). FRED publishes a value for every calendar slot
//! and marks market holidays with a literal `.`, which parses to NaN here;
//! carry-forward happens at the risk-free lookup layer, not in the frame.

use chrono::NaiveDate;
use std::time::Duration;
use tracing::{debug, warn};

use crate::frame::{Column, Frame, DATE_IDX};

use super::provider::{Provider, ProviderError};
use super::{Frequency, Metric};

const FRED_API: &str = "https://fred.stlouisfed.org/graph/fredgraph.csv";

pub struct FredProvider {
    client: reqwest::blocking::Client,
}

impl FredProvider {
    pub fn new() -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("switchback/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }

    fn series_url(
        &self,
        series: &str,
        begin: Option<NaiveDate>,
        end: Option<NaiveDate>,
        frequency: Frequency,
    ) -> String {
        // FRED requires explicit bounds; fall back to its earliest epoch and today.
        let begin = begin.unwrap_or_else(|| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap());
        let end = end.unwrap_or_else(|| chrono::Utc::now().date_naive());
        format!(
            "{FRED_API}?mode=fred&id={series}&cosd={}&coed={}&fq={}&fam=avg",
            begin.format("%Y-%m-%d"),
            end.format("%Y-%m-%d"),
            frequency.fred_param(),
        )
    }
}

impl Default for FredProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a fredgraph CSV body into a `(DATE, <series>)` frame.
///
/// Expected columns are `DATE,{series}`; a `.` observation means NaN.
pub fn parse_fredgraph_csv(series: &str, body: &str) -> Result<Frame, ProviderError> {
    let mut reader = csv::Reader::from_reader(body.as_bytes());
    let headers = reader
        .headers()
        .map_err(|e| ProviderError::Parse(e.to_string()))?;

    let date_idx = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("date"))
        .ok_or_else(|| ProviderError::Parse("response has no DATE column".into()))?;
    let value_idx = headers
        .iter()
        .position(|h| h == series)
        .ok_or_else(|| ProviderError::Parse(format!("response has no '{series}' column")))?;

    let mut dates = Vec::new();
    let mut values = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| ProviderError::Parse(e.to_string()))?;
        let raw_date = record
            .get(date_idx)
            .ok_or_else(|| ProviderError::Parse("short record".into()))?;
        let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
            .map_err(|e| ProviderError::Parse(format!("bad date '{raw_date}': {e}")))?;
        let value = match record.get(value_idx) {
            Some(".") | None => f64::NAN,
            Some(raw) => raw.parse::<f64>().unwrap_or(f64::NAN),
        };
        dates.push(date);
        values.push(value);
    }

    if dates.is_empty() {
        return Err(ProviderError::NoData { symbol: series.to_string() });
    }

    Ok(Frame::new(vec![
        Column::date(DATE_IDX, dates),
        Column::float(series, values),
    ])?)
}

impl Provider for FredProvider {
    fn name(&self) -> &'static str {
        "fred"
    }

    fn data_type(&self) -> &'static str {
        "rate"
    }

    fn get_data_for_period(
        &self,
        symbol: &str,
        _metric: Metric,
        frequency: Frequency,
        begin: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Frame, ProviderError> {
        let url = self.series_url(symbol, begin, end, frequency);
        debug!(series = symbol, url, "fetching fred series");
        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(ProviderError::from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            warn!(series = symbol, status = status.as_u16(), "fred request failed");
            return Err(ProviderError::Http { status: status.as_u16(), url });
        }
        let body = resp.text().map_err(ProviderError::from_reqwest)?;
        parse_fredgraph_csv(symbol, &body)
    }

    /// Economic series are published on a calendar grid, so the requested
    /// date already is the period's observation date.
    fn last_trading_day(
        &self,
        for_date: NaiveDate,
        _frequency: Frequency,
    ) -> Result<NaiveDate, ProviderError> {
        Ok(for_date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn series_url_matches_recorded_format() {
        let fred = FredProvider::new();
        let url = fred.series_url(
            "DTB3",
            Some(day(1970, 1, 1)),
            Some(day(2021, 3, 5)),
            Frequency::Daily,
        );
        assert_eq!(
            url,
            "https://fred.stlouisfed.org/graph/fredgraph.csv?mode=fred&id=DTB3&cosd=1970-01-01&coed=2021-03-05&fq=Daily&fam=avg"
        );
    }

    #[test]
    fn fredgraph_parse_reads_series_and_nan_dots() {
        let body = "DATE,DTB3\n2018-12-31,2.40\n2019-01-01,.\n2019-01-02,2.42\n";
        let f = parse_fredgraph_csv("DTB3", body).unwrap();
        assert_eq!(f.nrows(), 3);
        let v = f.floats("DTB3").unwrap();
        assert_eq!(v[0], 2.40);
        assert!(v[1].is_nan());
        assert_eq!(v[2], 2.42);
    }

    #[test]
    fn fredgraph_parse_requires_series_column() {
        let err = parse_fredgraph_csv("TB3MS", "DATE,DTB3\n2019-01-02,2.42\n").unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }
}
