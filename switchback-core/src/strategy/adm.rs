//! Accelerating Dual Momentum.
//!
//! A market-timing strategy by Chris Ludlow and Steve Hanly that scores a
//! small set of risk assets on blended 1-, 3-, and 6-month momentum net of
//! the T-Bill return, holds the best scorer, and steps aside into an
//! out-of-market asset when every score is negative. An evolution of Gary
//! Antonacci's Dual Momentum.

use chrono::{Datelike, Months, NaiveDate};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::warn;

use crate::data::{Frequency, Manager, Metric, ProviderError};
use crate::frame::{self, Cell, Column, Frame, DATE_IDX};
use crate::portfolio::{Portfolio, TargetAllocation};

use super::{parse_argument, Params, Strategy, StrategyDescriptor, StrategyError, StrategyInfo};

const RISK_FREE_SYMBOL: &str = "$RATE.TB3MS";
const RISK_FREE_COLUMN: &str = "TB3MS";

/// Momentum lookbacks, in months; the longest also sets the warmup.
const LOOKBACK_MONTHS: [usize; 3] = [1, 3, 6];

const INITIAL_DEPOSIT: f64 = 10_000.0;

/// Registry entry for this strategy.
pub fn descriptor() -> StrategyDescriptor {
    StrategyDescriptor { info: info(), factory: new_from_params }
}

fn info() -> StrategyInfo {
    let mut arguments = BTreeMap::new();
    arguments.insert(
        "inTickers".to_string(),
        super::Argument {
            name: "Tickers".to_string(),
            description: "List of ETF, Mutual Fund, or Stock tickers to invest in".to_string(),
            typecode: "[]string".to_string(),
            default_val: json!(["VFINX", "PRIDX"]),
        },
    );
    arguments.insert(
        "outTicker".to_string(),
        super::Argument {
            name: "Out-of-Market Ticker".to_string(),
            description: "Ticker to use when model scores are all below 0".to_string(),
            typecode: "string".to_string(),
            default_val: json!("VUSTX"),
        },
    );

    let mut suggested = BTreeMap::new();
    suggested.insert(
        "Engineered Portfolio".to_string(),
        BTreeMap::from([
            ("inTickers".to_string(), json!(["VFINX", "VINEX"])),
            ("outTicker".to_string(), json!("VUSTX")),
        ]),
    );
    suggested.insert(
        "PRIDX".to_string(),
        BTreeMap::from([
            ("inTickers".to_string(), json!(["VFINX", "PRIDX"])),
            ("outTicker".to_string(), json!("VUSTX")),
        ]),
    );
    suggested.insert(
        "All ETF".to_string(),
        BTreeMap::from([
            ("inTickers".to_string(), json!(["SPY", "SCZ"])),
            ("outTicker".to_string(), json!("TLT")),
        ]),
    );

    StrategyInfo {
        shortcode: "adm".to_string(),
        name: "Accelerating Dual Momentum".to_string(),
        description:
            "A market timing strategy that uses a 1-, 3-, and 6-month momentum score to select assets."
                .to_string(),
        source: "https://engineeredportfolio.com/2018/05/02/accelerating-dual-momentum-investing/"
            .to_string(),
        version: "1.0.0".to_string(),
        arguments,
        suggested_parameters: suggested,
    }
}

fn new_from_params(params: &Params) -> Result<Box<dyn Strategy>, StrategyError> {
    let info = info();
    let mut in_tickers: Vec<String> = parse_argument(params, &info, "inTickers")?;
    for ticker in &mut in_tickers {
        *ticker = ticker.to_uppercase();
    }
    let out_ticker: String = parse_argument::<String>(params, &info, "outTicker")?.to_uppercase();

    Ok(Box::new(AcceleratingDualMomentum {
        info,
        in_tickers,
        out_ticker,
        current_symbol: None,
    }))
}

pub struct AcceleratingDualMomentum {
    info: StrategyInfo,
    in_tickers: Vec<String>,
    out_ticker: String,
    current_symbol: Option<String>,
}

impl AcceleratingDualMomentum {
    /// Fetch monthly adjusted closes for all tickers plus the risk-free
    /// series, inner-join the equity series, and stretch the risk-free
    /// frame to cover the aligned range exactly.
    fn download_price_data(
        &self,
        manager: &mut Manager,
    ) -> Result<(Frame, Frame), StrategyError> {
        let mut symbols: Vec<&str> = self.in_tickers.iter().map(String::as_str).collect();
        symbols.push(&self.out_ticker);
        symbols.push(RISK_FREE_SYMBOL);

        let (mut frames, errors) = manager.get_multiple_data(&symbols);
        if let Some((symbol, err)) = errors.into_iter().next() {
            warn!(symbol = %symbol, %err, "failed to download data for ticker");
            return Err(StrategyError::Data(err));
        }

        let mut equity = Vec::new();
        for ticker in self.in_tickers.iter().chain(std::iter::once(&self.out_ticker)) {
            let frame = frames.remove(ticker.as_str()).ok_or_else(|| {
                StrategyError::Data(ProviderError::NoData { symbol: ticker.clone() })
            })?;
            equity.push(frame);
        }

        let refs: Vec<&Frame> = equity.iter().collect();
        let prices = frame::merge_and_time_align(DATE_IDX, &refs)?;
        if prices.nrows() == 0 {
            return Err(StrategyError::NoOverlap);
        }
        if prices.nrows() <= LOOKBACK_MONTHS[2] {
            return Err(StrategyError::InsufficientHistory(format!(
                "{} aligned months, need more than {}",
                prices.nrows(),
                LOOKBACK_MONTHS[2],
            )));
        }

        let risk_free = frames.remove(RISK_FREE_SYMBOL).ok_or_else(|| {
            StrategyError::Data(ProviderError::NoData { symbol: RISK_FREE_SYMBOL.to_string() })
        })?;
        let aligned_dates = prices.dates()?;
        let (start, end) = (aligned_dates[0], aligned_dates[aligned_dates.len() - 1]);
        let risk_free = align_risk_free(risk_free, start, end)?;

        if risk_free.nrows() != prices.nrows() {
            return Err(StrategyError::Invariant(format!(
                "risk-free series has {} rows against {} aligned price rows",
                risk_free.nrows(),
                prices.nrows(),
            )));
        }
        Ok((prices, risk_free))
    }

    /// Blend the per-lookback momenta into one score column per ticker:
    /// `mom_p = ((px_t / px_{t-p}) − 1) × 100 − rfSum_p / 12`, averaged
    /// over the three lookbacks. Warmup rows stay NaN.
    fn compute_scores(&self, prices: &Frame, risk_free: &Frame) -> Result<Frame, StrategyError> {
        let n = prices.nrows();
        let rf = risk_free.floats(RISK_FREE_COLUMN)?;
        let rf_sums: Vec<Vec<f64>> = LOOKBACK_MONTHS
            .iter()
            .map(|&p| frame::rolling(p, rf, |w| w.iter().sum::<f64>()))
            .collect();

        let mut columns = vec![
            Column::date(DATE_IDX, prices.dates()?.to_vec()),
            Column::float(self.out_ticker.clone(), vec![0.0; n]),
        ];
        for ticker in &self.in_tickers {
            let px = prices.floats(ticker)?;
            let mut score = vec![0.0; n];
            for (&p, rf_sum) in LOOKBACK_MONTHS.iter().zip(&rf_sums) {
                for i in 0..n {
                    let lagged = if i >= p { px[i - p] } else { f64::NAN };
                    score[i] += ((px[i] / lagged) - 1.0) * 100.0 - rf_sum[i] / 12.0;
                }
            }
            for v in &mut score {
                *v /= LOOKBACK_MONTHS.len() as f64;
            }
            columns.push(Column::float(ticker.clone(), score));
        }
        Ok(Frame::new(columns)?)
    }
}

impl Strategy for AcceleratingDualMomentum {
    fn info(&self) -> &StrategyInfo {
        &self.info
    }

    fn current_symbol(&self) -> Option<&str> {
        self.current_symbol.as_deref()
    }

    fn compute(&mut self, manager: &mut Manager) -> Result<Portfolio, StrategyError> {
        // Stretch the window back six months so the longest lookback has
        // data on the caller's first requested period.
        let end = manager.end.unwrap_or_else(|| chrono::Utc::now().date_naive());
        let begin = match manager.begin {
            Some(b) => b.checked_sub_months(Months::new(6)).unwrap_or(b),
            None => end.checked_sub_months(Months::new(50 * 12)).unwrap_or(end),
        };
        manager.begin = Some(begin);
        manager.end = Some(end);
        manager.frequency = Frequency::Monthly;
        manager.metric = Metric::AdjustedClose;

        let (prices, risk_free) = self.download_price_data(manager)?;
        let scores = self.compute_scores(&prices, &risk_free)?.drop_na();
        if scores.nrows() == 0 {
            return Err(StrategyError::InsufficientHistory(
                "no complete periods after momentum warmup".to_string(),
            ));
        }

        let winners = scores.arg_max_label()?;
        let targets: Vec<TargetAllocation> = scores
            .dates()?
            .iter()
            .zip(&winners)
            .map(|(&date, symbol)| TargetAllocation { date, symbol: symbol.clone() })
            .collect();
        self.current_symbol = targets.last().map(|t| t.symbol.clone());

        let mut portfolio = Portfolio::new(self.info.name.clone());
        portfolio.target_portfolio(manager, INITIAL_DEPOSIT, &targets)?;
        Ok(portfolio)
    }
}

/// Stretch the risk-free series onto the aligned equity range: repeat the
/// last observation forward when the final month is missing, trim to the
/// range, and repeat the first observation backward when it starts late.
fn align_risk_free(
    risk_free: Frame,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Frame, StrategyError> {
    let mut risk_free = risk_free;
    let dates = risk_free.dates()?;
    let values = risk_free.floats(RISK_FREE_COLUMN)?;
    let (last_date, last_value) = match (dates.last(), values.last()) {
        (Some(&d), Some(&v)) => (d, v),
        _ => {
            return Err(StrategyError::Data(ProviderError::NoData {
                symbol: RISK_FREE_SYMBOL.to_string(),
            }))
        }
    };

    if (last_date.year(), last_date.month()) != (end.year(), end.month()) {
        risk_free.push_row(&[Cell::Date(end), Cell::Float(last_value)])?;
    }

    let mut risk_free = risk_free.time_trim(start, end, true)?;
    let starts_late = risk_free.dates()?.first().map_or(true, |&d| start < d);
    if starts_late {
        let first_value = risk_free
            .floats(RISK_FREE_COLUMN)?
            .first()
            .copied()
            .unwrap_or(last_value);
        risk_free.insert_row(0, &[Cell::Date(start), Cell::Float(first_value)])?;
    }
    Ok(risk_free)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn factory_uppercases_parameters() {
        let mut params = Map::new();
        params.insert("inTickers".into(), json!(["vfinx", "pridx"]));
        params.insert("outTicker".into(), json!("vustx"));
        let strategy = new_from_params(&params).unwrap();
        assert_eq!(strategy.info().shortcode, "adm");
        assert!(strategy.current_symbol().is_none());
    }

    #[test]
    fn factory_fills_missing_arguments_from_defaults() {
        let strategy = new_from_params(&Map::new()).unwrap();
        assert_eq!(strategy.info().arguments.len(), 2);
    }

    #[test]
    fn factory_rejects_mistyped_arguments() {
        let mut params = Map::new();
        params.insert("inTickers".into(), json!("VFINX"));
        let result = new_from_params(&params);
        assert!(matches!(
            result,
            Err(StrategyError::InvalidArgument { name, .. }) if name == "inTickers"
        ));
    }

    #[test]
    fn risk_free_alignment_stretches_both_ends() {
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        // Monthly first-of-month stamps, one month short at both ends of
        // the aligned July..November month-end range.
        let rf = Frame::new(vec![
            Column::date(
                DATE_IDX,
                vec![day(2020, 8, 1), day(2020, 9, 1), day(2020, 10, 1)],
            ),
            Column::float(RISK_FREE_COLUMN, vec![0.10, 0.11, 0.09]),
        ])
        .unwrap();

        let aligned = align_risk_free(rf, day(2020, 7, 31), day(2020, 11, 30)).unwrap();
        assert_eq!(aligned.nrows(), 5);
        let values = aligned.floats(RISK_FREE_COLUMN).unwrap();
        assert_eq!(values[0], 0.10); // first value repeated backward
        assert_eq!(values[4], 0.09); // last value repeated forward
        let dates = aligned.dates().unwrap();
        assert_eq!(dates[0], day(2020, 7, 31));
        assert_eq!(dates[4], day(2020, 11, 30));
    }
}
