//! Portfolio simulation — replays a target-symbol signal sequence into
//! transactions, marks the result to market, and produces per-period
//! performance measurements.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::data::{Frequency, Manager, Metric, ProviderError};
use crate::frame::FrameError;

pub mod metrics;
pub mod performance;

pub use metrics::{Cagr, DrawDown, MetricsBundle};
pub use performance::{Measurement, Performance};

/// Symbol recorded on pure cash movements (deposits and withdrawals).
pub const CASH_SYMBOL: &str = "$CASH";

/// How many calendar days to look back when resolving the most recent
/// trading day at or before a mark date.
const TRADING_DAY_LOOKBACK: i64 = 10;

/// Structured error types for portfolio simulation.
#[derive(Debug, Error)]
pub enum PortfolioError {
    #[error("no target allocations supplied")]
    EmptyTargets,

    #[error("no {symbol} price available on {date}")]
    PriceUnavailable { symbol: String, date: NaiveDate },

    #[error("portfolio has no measurements on or before {0}")]
    NoMeasurements(NaiveDate),

    #[error(transparent)]
    Data(#[from] ProviderError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("internal invariant violated: {0}")]
    Invariant(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Deposit,
    Buy,
    Sell,
    Withdraw,
}

/// One cash or share movement, strictly time-ordered within a portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub date: NaiveDate,
    pub kind: TransactionKind,
    pub symbol: String,
    pub shares: f64,
    pub price_per_share: f64,
    pub total_value: f64,
}

/// One period of the signal sequence: which symbol to hold as of `date`.
#[derive(Debug, Clone, PartialEq)]
pub struct TargetAllocation {
    pub date: NaiveDate,
    pub symbol: String,
}

/// End-of-period mark recorded while replaying the signal.
#[derive(Debug, Clone)]
struct Valuation {
    date: NaiveDate,
    value: f64,
    holding: String,
}

/// A simulated single-holding switching portfolio.
#[derive(Debug, Default)]
pub struct Portfolio {
    pub name: String,
    pub start_date: Option<NaiveDate>,
    pub cash: f64,
    pub holdings: HashMap<String, f64>,
    pub transactions: Vec<Transaction>,
    initial_deposit: f64,
    total_deposited: f64,
    total_withdrawn: f64,
    valuations: Vec<Valuation>,
}

impl Portfolio {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// The single current holding, if any.
    pub fn current_holding(&self) -> Option<(&str, f64)> {
        self.holdings
            .iter()
            .next()
            .map(|(symbol, &shares)| (symbol.as_str(), shares))
    }

    /// Replay a target-symbol sequence: deposit once, then on every target
    /// change sell the current holding and buy the new one at that period's
    /// close. No-op periods stay fully invested.
    pub fn target_portfolio(
        &mut self,
        manager: &mut Manager,
        initial_deposit: f64,
        targets: &[TargetAllocation],
    ) -> Result<(), PortfolioError> {
        let first = targets.first().ok_or(PortfolioError::EmptyTargets)?;
        let last = targets.last().ok_or(PortfolioError::EmptyTargets)?;

        let prices = self.load_prices(manager, targets, first.date, last.date)?;

        self.start_date = Some(first.date);
        self.initial_deposit = initial_deposit;
        self.total_deposited += initial_deposit;
        self.cash = initial_deposit;
        self.transactions.push(Transaction {
            date: first.date,
            kind: TransactionKind::Deposit,
            symbol: CASH_SYMBOL.to_string(),
            shares: initial_deposit,
            price_per_share: 1.0,
            total_value: initial_deposit,
        });

        for target in targets {
            let held = self.current_holding().map(|(s, _)| s.to_string());
            if held.as_deref() != Some(target.symbol.as_str()) {
                if let Some(symbol) = held {
                    self.sell_all(&prices, &symbol, target.date)?;
                }
                self.buy_with_all_cash(&prices, &target.symbol, target.date)?;
            }

            let value = self.mark(&prices, target.date)?;
            self.valuations.push(Valuation {
                date: target.date,
                value,
                holding: target.symbol.clone(),
            });
        }

        debug!(
            name = %self.name,
            transactions = self.transactions.len(),
            periods = self.valuations.len(),
            "target portfolio replayed"
        );
        Ok(())
    }

    /// Portfolio value on `date`: each holding at its most recent trading
    /// day's adjusted close at or before `date`, plus cash.
    pub fn value_as_of(
        &self,
        manager: &mut Manager,
        date: NaiveDate,
    ) -> Result<f64, PortfolioError> {
        let mut total = self.cash;
        for (symbol, shares) in &self.holdings {
            let window_start = date - chrono::Duration::days(TRADING_DAY_LOOKBACK);
            let frame = manager.get_data_for_period(
                symbol,
                Metric::AdjustedClose,
                Frequency::Daily,
                Some(window_start),
                Some(date),
            )?;
            let price = frame
                .floats(symbol)?
                .iter()
                .rev()
                .copied()
                .find(|p| p.is_finite())
                .ok_or_else(|| PortfolioError::PriceUnavailable {
                    symbol: symbol.clone(),
                    date,
                })?;
            total += shares * price;
        }
        Ok(total)
    }

    /// Measurements and summary statistics for every period up to
    /// `through`, including the analytics bundle.
    pub fn calculate_performance(
        &self,
        manager: &mut Manager,
        through: NaiveDate,
    ) -> Result<Performance, PortfolioError> {
        performance::calculate(self, manager, through)
    }

    pub(crate) fn initial_deposit(&self) -> f64 {
        self.initial_deposit
    }

    pub(crate) fn total_deposited(&self) -> f64 {
        self.total_deposited
    }

    pub(crate) fn total_withdrawn(&self) -> f64 {
        self.total_withdrawn
    }

    pub(crate) fn valuations_through(&self, through: NaiveDate) -> Vec<(NaiveDate, f64, &str)> {
        self.valuations
            .iter()
            .filter(|v| v.date <= through)
            .map(|v| (v.date, v.value, v.holding.as_str()))
            .collect()
    }

    /// Fetch an adjusted-close lookup table for every symbol the signal
    /// sequence mentions, covering the full signal range at the manager's
    /// frequency.
    fn load_prices(
        &self,
        manager: &mut Manager,
        targets: &[TargetAllocation],
        first: NaiveDate,
        last: NaiveDate,
    ) -> Result<HashMap<String, HashMap<NaiveDate, f64>>, PortfolioError> {
        let mut prices = HashMap::new();
        for target in targets {
            if prices.contains_key(&target.symbol) {
                continue;
            }
            let frame = manager.get_data_for_period(
                &target.symbol,
                Metric::AdjustedClose,
                manager.frequency,
                Some(first),
                Some(last),
            )?;
            let dates = frame.dates()?;
            let values = frame.floats(&target.symbol)?;
            let by_date: HashMap<NaiveDate, f64> = dates
                .iter()
                .zip(values)
                .filter(|(_, v)| v.is_finite())
                .map(|(&d, &v)| (d, v))
                .collect();
            prices.insert(target.symbol.clone(), by_date);
        }
        Ok(prices)
    }

    fn price_at(
        prices: &HashMap<String, HashMap<NaiveDate, f64>>,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<f64, PortfolioError> {
        prices
            .get(symbol)
            .and_then(|by_date| by_date.get(&date))
            .copied()
            .ok_or_else(|| PortfolioError::PriceUnavailable { symbol: symbol.to_string(), date })
    }

    fn sell_all(
        &mut self,
        prices: &HashMap<String, HashMap<NaiveDate, f64>>,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<(), PortfolioError> {
        let shares = self.holdings.remove(symbol).ok_or_else(|| {
            PortfolioError::Invariant(format!("selling {symbol} which is not held"))
        })?;
        let price = Self::price_at(prices, symbol, date)?;
        let proceeds = shares * price;
        self.cash += proceeds;
        self.transactions.push(Transaction {
            date,
            kind: TransactionKind::Sell,
            symbol: symbol.to_string(),
            shares,
            price_per_share: price,
            total_value: proceeds,
        });
        Ok(())
    }

    fn buy_with_all_cash(
        &mut self,
        prices: &HashMap<String, HashMap<NaiveDate, f64>>,
        symbol: &str,
        date: NaiveDate,
    ) -> Result<(), PortfolioError> {
        let price = Self::price_at(prices, symbol, date)?;
        let shares = self.cash / price;
        let cost = shares * price;
        self.cash -= cost;
        self.holdings.insert(symbol.to_string(), shares);
        self.transactions.push(Transaction {
            date,
            kind: TransactionKind::Buy,
            symbol: symbol.to_string(),
            shares,
            price_per_share: price,
            total_value: cost,
        });
        Ok(())
    }

    fn mark(
        &self,
        prices: &HashMap<String, HashMap<NaiveDate, f64>>,
        date: NaiveDate,
    ) -> Result<f64, PortfolioError> {
        let mut value = self.cash;
        for (symbol, shares) in &self.holdings {
            value += shares * Self::price_at(prices, symbol, date)?;
        }
        Ok(value)
    }
}
