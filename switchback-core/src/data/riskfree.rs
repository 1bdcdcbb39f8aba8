//! Process-wide daily risk-free series.
//!
//! The daily `DTB3` series is loaded at most once per process and published
//! as an immutable snapshot behind a one-shot guard. Lookups binary-search
//! for the greatest date at or before the query and walk backward over NaN
//! holiday observations; queries may arrive out of order or repeat.

use chrono::NaiveDate;
use std::sync::{Mutex, OnceLock};
use tracing::debug;

use crate::frame::Frame;

use super::provider::{Provider, ProviderError};
use super::{Frequency, Metric};

/// FRED series id for the daily 3-month T-Bill secondary market rate.
pub const DAILY_SERIES: &str = "DTB3";

static SNAPSHOT: OnceLock<RiskFreeSeries> = OnceLock::new();
static LOAD_GUARD: Mutex<()> = Mutex::new(());

/// A date-sorted rate series supporting carry-forward lookups.
#[derive(Debug, Clone)]
pub struct RiskFreeSeries {
    dates: Vec<NaiveDate>,
    rates: Vec<f64>,
}

impl RiskFreeSeries {
    /// Build from a `(DATE, <column>)` frame; rows must be date-sorted,
    /// which provider frames already guarantee.
    pub fn from_frame(frame: &Frame, column: &str) -> Result<Self, ProviderError> {
        let dates = frame.dates()?.to_vec();
        let rates = frame.floats(column)?.to_vec();
        Ok(Self { dates, rates })
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Annualized rate (percent) in effect on `on`.
    ///
    /// Finds the greatest date ≤ `on`, then walks backward until a finite
    /// value appears. Returns 0.0 when nothing finite precedes the date.
    pub fn rate_at(&self, on: NaiveDate) -> f64 {
        let end = self.dates.partition_point(|&d| d <= on);
        self.rates[..end]
            .iter()
            .rev()
            .copied()
            .find(|r| r.is_finite())
            .unwrap_or(0.0)
    }
}

/// Load the daily snapshot through `provider` if nobody has yet.
///
/// Concurrent callers block on the build and then observe the same fully
/// constructed snapshot; the winner's data sticks for the process lifetime.
pub fn ensure_loaded(provider: &dyn Provider) -> Result<&'static RiskFreeSeries, ProviderError> {
    if let Some(series) = SNAPSHOT.get() {
        return Ok(series);
    }
    let _guard = LOAD_GUARD.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(series) = SNAPSHOT.get() {
        return Ok(series);
    }

    let today = chrono::Utc::now().date_naive();
    let begin = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    debug!(series = DAILY_SERIES, %today, "loading daily risk-free snapshot");
    let frame = provider.get_data_for_period(
        DAILY_SERIES,
        Metric::AdjustedClose,
        Frequency::Daily,
        Some(begin),
        Some(today),
    )?;
    let series = RiskFreeSeries::from_frame(&frame, DAILY_SERIES)?;
    let _ = SNAPSHOT.set(series);
    Ok(SNAPSHOT.get().unwrap())
}
