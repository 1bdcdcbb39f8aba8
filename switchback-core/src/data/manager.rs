//! Uniform access to historical series across providers.
//!
//! A manager is single-owner, created per request: it carries the request's
//! date bounds and frequency, routes symbols to providers by prefix, and
//! memoizes fetched frames keyed by `(provider, symbol, frequency)`. A
//! cached frame is reused whenever it covers the requested range and
//! re-fetched wider when it does not.

use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::HashMap;
use tracing::debug;

use crate::frame::Frame;

use super::fred::FredProvider;
use super::provider::{Provider, ProviderError};
use super::riskfree;
use super::tiingo::TiingoProvider;
use super::{Frequency, Metric};

/// Symbol prefix that routes a request to the rate provider; the suffix is
/// the provider's series id (e.g. `$RATE.TB3MS`).
pub const RATE_PREFIX: &str = "$RATE.";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    provider: &'static str,
    symbol: String,
    frequency: Frequency,
}

#[derive(Debug, Clone)]
struct CachedSeries {
    metric: Metric,
    begin: Option<NaiveDate>,
    end: Option<NaiveDate>,
    frame: Frame,
}

impl CachedSeries {
    /// `None` bounds mean full history: an unbounded cache side covers any
    /// request, and an unbounded request needs an unbounded cache side.
    fn covers(&self, metric: Metric, begin: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
        if self.metric != metric {
            return false;
        }
        let begin_ok = match (self.begin, begin) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(have), Some(want)) => have <= want,
        };
        let end_ok = match (self.end, end) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(have), Some(want)) => have >= want,
        };
        begin_ok && end_ok
    }
}

enum FetchOutcome {
    Hit(Frame),
    Fetched(CacheKey, CachedSeries),
}

#[derive(Debug, Clone, Copy)]
enum Route {
    Equity,
    Rates,
}

/// Market data manager: provider routing, memoization, and request bounds.
pub struct Manager {
    /// Inclusive start of the request window; `None` asks providers for
    /// their full history.
    pub begin: Option<NaiveDate>,
    /// Inclusive end of the request window.
    pub end: Option<NaiveDate>,
    pub frequency: Frequency,
    pub metric: Metric,
    equity: Box<dyn Provider>,
    rates: Box<dyn Provider>,
    cache: HashMap<CacheKey, CachedSeries>,
}

impl Manager {
    /// Build a manager with the default providers. The only recognized
    /// credential key is `tiingo`; unknown keys are ignored.
    pub fn new(credentials: &HashMap<String, String>) -> Self {
        let token = credentials.get("tiingo").cloned().unwrap_or_default();
        Self::with_providers(
            Box::new(TiingoProvider::new(token)),
            Box::new(FredProvider::new()),
        )
    }

    /// Build a manager over explicit provider implementations.
    pub fn with_providers(equity: Box<dyn Provider>, rates: Box<dyn Provider>) -> Self {
        Self {
            begin: None,
            end: None,
            frequency: Frequency::Daily,
            metric: Metric::AdjustedClose,
            equity,
            rates,
            cache: HashMap::new(),
        }
    }

    fn route_symbol(symbol: &str) -> (Route, &str) {
        match symbol.strip_prefix(RATE_PREFIX) {
            Some(series) => (Route::Rates, series),
            None => (Route::Equity, symbol),
        }
    }

    fn provider(&self, route: Route) -> &dyn Provider {
        match route {
            Route::Equity => self.equity.as_ref(),
            Route::Rates => self.rates.as_ref(),
        }
    }

    /// Fetch `symbol` under the manager's current bounds and frequency as a
    /// `(DATE, <symbol>)` frame carrying the configured metric.
    pub fn get_data(&mut self, symbol: &str) -> Result<Frame, ProviderError> {
        self.get_data_for_period(symbol, self.metric, self.frequency, self.begin, self.end)
    }

    /// Fetch several symbols, one parallel provider call each. Partial
    /// failure is reported per symbol alongside the successful subset.
    pub fn get_multiple_data(
        &mut self,
        symbols: &[&str],
    ) -> (HashMap<String, Frame>, HashMap<String, ProviderError>) {
        let (metric, frequency, begin, end) =
            (self.metric, self.frequency, self.begin, self.end);

        let outcomes: Vec<(String, Result<FetchOutcome, ProviderError>)> = {
            let this: &Manager = &*self;
            symbols
                .par_iter()
                .map(|&symbol| {
                    let outcome = this.resolve(symbol, metric, frequency, begin, end);
                    (symbol.to_string(), outcome)
                })
                .collect()
        };

        let mut frames = HashMap::new();
        let mut errors = HashMap::new();
        for (symbol, outcome) in outcomes {
            match outcome {
                Ok(FetchOutcome::Hit(frame)) => {
                    frames.insert(symbol, frame);
                }
                Ok(FetchOutcome::Fetched(key, entry)) => {
                    match trim(&entry.frame, begin, end) {
                        Ok(frame) => {
                            frames.insert(symbol, frame);
                        }
                        Err(err) => {
                            errors.insert(symbol, err.into());
                        }
                    }
                    self.cache.insert(key, entry);
                }
                Err(err) => {
                    errors.insert(symbol, err);
                }
            }
        }
        (frames, errors)
    }

    /// Primitive behind [`get_data`] and [`get_multiple_data`].
    pub fn get_data_for_period(
        &mut self,
        symbol: &str,
        metric: Metric,
        frequency: Frequency,
        begin: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Frame, ProviderError> {
        match self.resolve(symbol, metric, frequency, begin, end)? {
            FetchOutcome::Hit(frame) => Ok(frame),
            FetchOutcome::Fetched(key, entry) => {
                let frame = trim(&entry.frame, begin, end)?;
                self.cache.insert(key, entry);
                Ok(frame)
            }
        }
    }

    /// Answer from cache, or fetch a range wide enough to cover both the
    /// request and whatever was cached before.
    fn resolve(
        &self,
        symbol: &str,
        metric: Metric,
        frequency: Frequency,
        begin: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<FetchOutcome, ProviderError> {
        let (route, provider_symbol) = Self::route_symbol(symbol);
        let provider = self.provider(route);
        let key = CacheKey {
            provider: provider.name(),
            symbol: provider_symbol.to_string(),
            frequency,
        };

        if let Some(entry) = self.cache.get(&key) {
            if entry.covers(metric, begin, end) {
                debug!(symbol, %frequency, "serving series from cache");
                return Ok(FetchOutcome::Hit(trim(&entry.frame, begin, end)?));
            }
        }

        let (mut fetch_begin, mut fetch_end) = (begin, end);
        if let Some(existing) = self.cache.get(&key) {
            if existing.metric == metric {
                fetch_begin = widen_begin(fetch_begin, existing.begin);
                fetch_end = widen_end(fetch_end, existing.end);
            }
        }

        let frame =
            provider.get_data_for_period(provider_symbol, metric, frequency, fetch_begin, fetch_end)?;
        Ok(FetchOutcome::Fetched(
            key,
            CachedSeries { metric, begin: fetch_begin, end: fetch_end, frame },
        ))
    }

    /// Annualized risk-free rate (percent) in effect on `on_date`, from the
    /// process-wide daily snapshot (loaded through the rate provider on
    /// first use).
    pub fn risk_free_rate(&self, on_date: NaiveDate) -> Result<f64, ProviderError> {
        let snapshot = riskfree::ensure_loaded(self.rates.as_ref())?;
        Ok(snapshot.rate_at(on_date))
    }

    /// Last trading day of the `frequency` period containing `on_date`.
    pub fn last_trading_day(
        &self,
        on_date: NaiveDate,
        frequency: Frequency,
    ) -> Result<NaiveDate, ProviderError> {
        self.equity.last_trading_day(on_date, frequency)
    }

    pub fn last_trading_day_of_week(&self, on_date: NaiveDate) -> Result<NaiveDate, ProviderError> {
        self.last_trading_day(on_date, Frequency::Weekly)
    }

    pub fn last_trading_day_of_month(&self, on_date: NaiveDate) -> Result<NaiveDate, ProviderError> {
        self.last_trading_day(on_date, Frequency::Monthly)
    }

    pub fn last_trading_day_of_year(&self, on_date: NaiveDate) -> Result<NaiveDate, ProviderError> {
        self.last_trading_day(on_date, Frequency::Annually)
    }
}

fn widen_begin(request: Option<NaiveDate>, cached: Option<NaiveDate>) -> Option<NaiveDate> {
    match (request, cached) {
        (Some(r), Some(c)) => Some(r.min(c)),
        _ => None,
    }
}

fn widen_end(request: Option<NaiveDate>, cached: Option<NaiveDate>) -> Option<NaiveDate> {
    match (request, cached) {
        (Some(r), Some(c)) => Some(r.max(c)),
        _ => None,
    }
}

fn trim(
    frame: &Frame,
    begin: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Frame, crate::frame::FrameError> {
    if begin.is_none() && end.is_none() {
        return Ok(frame.clone());
    }
    frame.time_trim(
        begin.unwrap_or(NaiveDate::MIN),
        end.unwrap_or(NaiveDate::MAX),
        true,
    )
}
