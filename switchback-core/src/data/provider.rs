//! Data provider trait and structured error types.
//!
//! The Provider trait abstracts over data sources (Tiingo equity EOD, FRED
//! economic series) so the manager can route by symbol prefix and tests can
//! substitute deterministic in-memory implementations.

use chrono::NaiveDate;
use thiserror::Error;

use crate::frame::{Frame, FrameError};

use super::{Frequency, Metric};

/// Structured error types for data operations.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request to {url} returned status {status}")]
    Http { status: u16, url: String },

    #[error("request deadline exceeded: {0}")]
    Timeout(String),

    #[error("network unreachable: {0}")]
    Network(String),

    #[error("failed to parse provider response: {0}")]
    Parse(String),

    #[error("unknown metric '{0}'")]
    InvalidMetric(String),

    #[error("invalid frequency '{0}'")]
    InvalidFrequency(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("provider returned no data for {symbol}")]
    NoData { symbol: String },

    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl ProviderError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

/// A historical time-series source.
///
/// Implementations handle the specifics of one upstream service; the
/// manager's cache sits above this trait, so providers stay stateless.
pub trait Provider: Send + Sync {
    /// Short name used in cache keys and logs.
    fn name(&self) -> &'static str;

    /// Kind of series served, e.g. `"security"` or `"rate"`.
    fn data_type(&self) -> &'static str;

    /// Fetch one symbol's series for the period as a `(DATE, <symbol>)`
    /// frame. `None` bounds request the provider's full history.
    fn get_data_for_period(
        &self,
        symbol: &str,
        metric: Metric,
        frequency: Frequency,
        begin: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Frame, ProviderError>;

    /// Resolve the last trading day of the period containing `for_date`.
    fn last_trading_day(
        &self,
        for_date: NaiveDate,
        frequency: Frequency,
    ) -> Result<NaiveDate, ProviderError>;
}
