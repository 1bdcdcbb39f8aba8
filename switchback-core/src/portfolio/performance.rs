//! Per-period measurements and the performance bundle returned to callers.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::Manager;

use super::metrics::{self, MetricsBundle};
use super::{Portfolio, PortfolioError};

/// One aligned period of the simulated equity curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    /// Period date as seconds since the Unix epoch (UTC midnight).
    pub time: i64,
    pub value: f64,
    pub percent_return: f64,
    pub holdings: String,
    /// Cumulative growth of one unit compounded monthly at the risk-free rate.
    pub risk_free_value: f64,
}

impl Measurement {
    pub fn date(&self) -> NaiveDate {
        chrono::DateTime::from_timestamp(self.time, 0)
            .map(|dt| dt.naive_utc().date())
            .unwrap_or(NaiveDate::MIN)
    }
}

/// The full result bundle for one simulated portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Performance {
    pub period_start: i64,
    pub period_end: i64,
    pub current_asset: String,
    pub total_deposited: f64,
    pub total_withdrawn: f64,
    pub ytd_return: f64,
    pub cagr_since_inception: f64,
    pub measurements: Vec<Measurement>,
    pub metrics: MetricsBundle,
}

impl Performance {
    /// Period returns in excess of the risk-free return.
    pub fn excess_returns(&self) -> Vec<f64> {
        metrics::excess_returns(&self.measurements)
    }

    /// Systematic risk relative to a benchmark's measurement series.
    pub fn beta(&self, benchmark: &Performance) -> f64 {
        metrics::beta(&self.measurements, &benchmark.measurements)
    }

    /// Mean excess return per unit of beta against `benchmark`.
    pub fn treynor_ratio(&self, benchmark: &Performance) -> f64 {
        metrics::treynor_ratio(&self.measurements, &benchmark.measurements)
    }

    /// Total profit earned over everything deposited.
    pub fn net_profit(&self) -> f64 {
        match self.measurements.last() {
            Some(last) => last.value - self.total_deposited + self.total_withdrawn,
            None => 0.0,
        }
    }

    pub fn net_profit_percent(&self) -> f64 {
        if self.total_deposited == 0.0 {
            return 0.0;
        }
        self.net_profit() / self.total_deposited
    }

    /// Return over the day before `for_date`, marking through the portfolio.
    pub fn one_day_return(
        &self,
        manager: &mut Manager,
        portfolio: &Portfolio,
        for_date: NaiveDate,
    ) -> Result<f64, PortfolioError> {
        self.lookback_return(manager, portfolio, for_date - chrono::Duration::days(1))
    }

    /// Return over the week before `for_date`.
    pub fn one_week_return(
        &self,
        manager: &mut Manager,
        portfolio: &Portfolio,
        for_date: NaiveDate,
    ) -> Result<f64, PortfolioError> {
        self.lookback_return(manager, portfolio, for_date - chrono::Duration::days(7))
    }

    /// The measured period return recorded for `for_date`, or 0 when no
    /// measurement matches.
    pub fn one_month_return(&self, for_date: NaiveDate) -> f64 {
        for m in self.measurements.iter().rev() {
            if m.date() == for_date {
                return m.percent_return;
            }
        }
        warn!(%for_date, "no measurement for requested one-month return");
        0.0
    }

    fn lookback_return(
        &self,
        manager: &mut Manager,
        portfolio: &Portfolio,
        as_of: NaiveDate,
    ) -> Result<f64, PortfolioError> {
        let today = match self.measurements.last() {
            Some(m) => m.value,
            None => return Ok(0.0),
        };
        let then = portfolio.value_as_of(manager, as_of)?;
        if then > 0.0 {
            Ok(today / then - 1.0)
        } else {
            Ok(0.0)
        }
    }
}

fn epoch(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or(0)
}

/// Build the performance bundle for every recorded period up to `through`.
pub(super) fn calculate(
    portfolio: &Portfolio,
    manager: &mut Manager,
    through: NaiveDate,
) -> Result<Performance, PortfolioError> {
    let marks = portfolio.valuations_through(through);
    let (first, last) = match (marks.first(), marks.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(PortfolioError::NoMeasurements(through)),
    };

    let mut measurements = Vec::with_capacity(marks.len());
    let mut risk_free_value = 1.0;
    let mut prev_value: Option<f64> = None;
    for (date, value, holding) in &marks {
        let rate = manager.risk_free_rate(*date)?;
        if prev_value.is_some() {
            risk_free_value *= 1.0 + rate / 12.0 / 100.0;
        }
        let percent_return = match prev_value {
            Some(prev) => value / prev - 1.0,
            None => 0.0,
        };
        measurements.push(Measurement {
            time: epoch(*date),
            value: *value,
            percent_return,
            holdings: holding.to_string(),
            risk_free_value,
        });
        prev_value = Some(*value);
    }

    let ytd_return = marks
        .iter()
        .find(|(date, _, _)| date.year() == last.0.year())
        .map(|(_, first_value, _)| last.1 / first_value - 1.0)
        .unwrap_or(0.0);

    let years = (last.0 - first.0).num_days() as f64 / 365.25;
    let cagr_since_inception = if years > 0.0 && portfolio.initial_deposit() > 0.0 {
        (last.1 / portfolio.initial_deposit()).powf(1.0 / years) - 1.0
    } else {
        0.0
    };

    let metrics = MetricsBundle::compute(&measurements);
    Ok(Performance {
        period_start: epoch(first.0),
        period_end: epoch(last.0),
        current_asset: last.2.to_string(),
        total_deposited: portfolio.total_deposited(),
        total_withdrawn: portfolio.total_withdrawn(),
        ytd_return,
        cagr_since_inception,
        measurements,
        metrics,
    })
}
