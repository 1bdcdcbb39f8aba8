//! Performance metrics — pure functions over the measurement series.
//!
//! Every metric takes measurements (or value slices) in and produces a
//! scalar or list out; nothing here touches the manager or providers.
//! Ratios that compound monthly are annualized by √12.

use serde::{Deserialize, Serialize};

use super::performance::Measurement;

/// One peak-to-trough decline. Times are epoch seconds; `recovery` is 0
/// while the drawdown has not yet recovered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawDown {
    pub begin: i64,
    pub end: i64,
    pub recovery: i64,
    pub loss_percent: f64,
}

/// Trailing compound annual growth rates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cagr {
    #[serde(rename = "1-yr")]
    pub one_year: f64,
    #[serde(rename = "3-yr")]
    pub three_year: f64,
    #[serde(rename = "5-yr")]
    pub five_year: f64,
    #[serde(rename = "10-yr")]
    pub ten_year: f64,
}

/// The standard statistics bundle attached to every performance result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsBundle {
    pub cagrs: Cagr,
    pub draw_downs: Vec<DrawDown>,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub std_dev: f64,
    pub ulcer_index_avg: f64,
}

impl MetricsBundle {
    /// Compute the full bundle from a measurement series.
    pub fn compute(measurements: &[Measurement]) -> Self {
        Self {
            cagrs: Cagr {
                one_year: period_cagr(measurements, 1),
                three_year: period_cagr(measurements, 3),
                five_year: period_cagr(measurements, 5),
                ten_year: period_cagr(measurements, 10),
            },
            draw_downs: draw_downs(measurements, 10),
            sharpe_ratio: sharpe_ratio(measurements),
            sortino_ratio: sortino_ratio(measurements),
            std_dev: std_dev(measurements),
            ulcer_index_avg: avg_ulcer_index(measurements, 14),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// The `top` deepest drawdowns, most negative first.
///
/// A single pass tracks the running peak: a drawdown opens when value dips
/// below the peak, deepens its `end` on every deeper trough, and closes
/// with a `recovery` stamp when a new peak prints.
pub fn draw_downs(measurements: &[Measurement], top: usize) -> Vec<DrawDown> {
    let Some(first) = measurements.first() else {
        return Vec::new();
    };

    let mut all = Vec::new();
    let mut peak = first.value;
    let mut open: Option<DrawDown> = None;

    for m in measurements {
        peak = peak.max(m.value);
        let loss = m.value / peak - 1.0;
        if loss < 0.0 {
            match open.as_mut() {
                None => {
                    open = Some(DrawDown {
                        begin: m.time,
                        end: m.time,
                        recovery: 0,
                        loss_percent: loss,
                    });
                }
                Some(dd) if loss < dd.loss_percent => {
                    dd.end = m.time;
                    dd.loss_percent = loss;
                }
                Some(_) => {}
            }
        } else if let Some(mut dd) = open.take() {
            dd.recovery = m.time;
            all.push(dd);
        }
    }
    // An unrecovered drawdown still counts, with recovery left at 0.
    if let Some(dd) = open {
        all.push(dd);
    }

    all.sort_by(|a, b| a.loss_percent.total_cmp(&b.loss_percent));
    all.truncate(top);
    all
}

/// `(final/initial)^(1/years) − 1`, where `initial` is the measurement at
/// or immediately before `years` before the final date. Returns 0 when the
/// series does not reach back that far.
pub fn period_cagr(measurements: &[Measurement], years: u32) -> f64 {
    let Some(last) = measurements.last() else {
        return 0.0;
    };
    let cutoff = match last.date().checked_sub_months(chrono::Months::new(12 * years)) {
        Some(d) => d,
        None => return 0.0,
    };
    let initial = measurements
        .iter()
        .rev()
        .find(|m| m.date() <= cutoff)
        .map(|m| m.value);
    match initial {
        Some(initial) if initial > 0.0 => {
            (last.value / initial).powf(1.0 / f64::from(years)) - 1.0
        }
        _ => 0.0,
    }
}

/// Annualized standard deviation of the period returns.
///
/// Population form (divide by N, not N-1); the other dispersion metrics
/// stay on the sample estimators.
pub fn std_dev(measurements: &[Measurement]) -> f64 {
    let returns: Vec<f64> = measurements.iter().map(|m| m.percent_return).collect();
    population_std(&returns) * 12.0_f64.sqrt()
}

/// Period returns in excess of the risk-free return implied by the
/// compounded risk-free column.
pub fn excess_returns(measurements: &[Measurement]) -> Vec<f64> {
    let Some(first) = measurements.first() else {
        return Vec::new();
    };
    let mut prev = first.risk_free_value;
    measurements
        .iter()
        .map(|m| {
            let risk_free_return = m.risk_free_value / prev - 1.0;
            prev = m.risk_free_value;
            m.percent_return - risk_free_return
        })
        .collect()
}

/// Annualized Sharpe ratio: mean excess return per unit of its volatility.
///
/// Returns 0 when the excess-return deviation is 0 (a constant-return
/// series has no defined ratio).
pub fn sharpe_ratio(measurements: &[Measurement]) -> f64 {
    let excess = excess_returns(measurements);
    let std = sample_std(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    mean(&excess) / std * 12.0_f64.sqrt()
}

/// Annualized Sortino ratio: mean excess return per unit of downside
/// deviation. Returns 0 when there is no downside.
pub fn sortino_ratio(measurements: &[Measurement]) -> f64 {
    let excess = excess_returns(measurements);
    if excess.is_empty() {
        return 0.0;
    }
    let downside = excess
        .iter()
        .map(|&r| if r < 0.0 { r * r } else { 0.0 })
        .sum::<f64>()
        / excess.len() as f64;
    if downside == 0.0 {
        return 0.0;
    }
    mean(&excess) / downside.sqrt() * 12.0_f64.sqrt()
}

/// Rolling Ulcer Index: RMS of the percent drawdown from the window high.
///
/// One entry per full window after the first; `[0.0]` when the series is
/// shorter than the window.
pub fn ulcer_index(measurements: &[Measurement], period: usize) -> Vec<f64> {
    let n = measurements.len();
    if n < period || period == 0 {
        return vec![0.0];
    }

    let mut out = Vec::with_capacity(n - period);
    for i in period..n {
        let window = &measurements[i + 1 - period..=i];
        let max = window.iter().map(|m| m.value).fold(f64::MIN, f64::max);
        let sq_sum: f64 = window
            .iter()
            .map(|m| {
                let dd = (m.value - max) / max * 100.0;
                dd * dd
            })
            .sum();
        out.push((sq_sum / period as f64).sqrt());
    }
    out
}

/// Mean of the rolling Ulcer Index series.
pub fn avg_ulcer_index(measurements: &[Measurement], period: usize) -> f64 {
    mean(&ulcer_index(measurements, period))
}

/// Portfolio beta against a benchmark's measurement values.
pub fn beta(measurements: &[Measurement], benchmark: &[Measurement]) -> f64 {
    let ours: Vec<f64> = measurements.iter().map(|m| m.value).collect();
    let theirs: Vec<f64> = benchmark.iter().map(|m| m.value).collect();
    let var = sample_var(&theirs);
    if var == 0.0 {
        return 0.0;
    }
    sample_cov(&ours, &theirs) / var
}

/// Treynor ratio: mean excess return per unit of systematic risk.
pub fn treynor_ratio(measurements: &[Measurement], benchmark: &[Measurement]) -> f64 {
    let b = beta(measurements, benchmark);
    if b == 0.0 {
        return 0.0;
    }
    mean(&excess_returns(measurements)) / b
}

// ─── Helpers ────────────────────────────────────────────────────────

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn sample_var(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

fn sample_std(values: &[f64]) -> f64 {
    sample_var(values).sqrt()
}

fn sample_cov(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len().min(b.len());
    if n < 2 {
        return 0.0;
    }
    let (ma, mb) = (mean(&a[..n]), mean(&b[..n]));
    a[..n]
        .iter()
        .zip(&b[..n])
        .map(|(x, y)| (x - ma) * (y - mb))
        .sum::<f64>()
        / (n - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn epoch(y: i32, m: u32, d: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp()
    }

    /// Monthly measurements from a value series starting 2020-01, with a
    /// constant risk-free column.
    fn series(values: &[f64]) -> Vec<Measurement> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let month = (i % 12) as u32 + 1;
                let year = 2020 + (i / 12) as i32;
                Measurement {
                    time: epoch(year, month, 28),
                    value,
                    percent_return: if i == 0 { 0.0 } else { value / values[i - 1] - 1.0 },
                    holdings: "SPY".to_string(),
                    risk_free_value: 1.0,
                }
            })
            .collect()
    }

    #[test]
    fn drawdowns_sorted_most_negative_first() {
        // Two dips: -20% from 110, -10% from 120.
        let ms = series(&[100.0, 110.0, 88.0, 120.0, 108.0, 130.0]);
        let dds = draw_downs(&ms, 10);
        assert_eq!(dds.len(), 2);
        assert!((dds[0].loss_percent - (88.0 / 110.0 - 1.0)).abs() < 1e-12);
        assert!((dds[1].loss_percent - (108.0 / 120.0 - 1.0)).abs() < 1e-12);
        for dd in &dds {
            assert!(dd.loss_percent < 0.0);
            assert!(dd.begin <= dd.end);
            assert!(dd.recovery == 0 || dd.end <= dd.recovery);
        }
    }

    #[test]
    fn unrecovered_drawdown_has_zero_recovery() {
        let ms = series(&[100.0, 110.0, 90.0, 85.0]);
        let dds = draw_downs(&ms, 10);
        assert_eq!(dds.len(), 1);
        assert_eq!(dds[0].recovery, 0);
        assert_eq!(dds[0].end, ms[3].time);
    }

    #[test]
    fn drawdowns_empty_series() {
        assert!(draw_downs(&[], 10).is_empty());
    }

    #[test]
    fn drawdowns_truncated_to_top() {
        // Alternating dips produce three drawdowns; keep the deepest two.
        let ms = series(&[100.0, 90.0, 101.0, 80.0, 102.0, 95.0, 103.0]);
        let dds = draw_downs(&ms, 2);
        assert_eq!(dds.len(), 2);
        assert!(dds[0].loss_percent <= dds[1].loss_percent);
    }

    #[test]
    fn period_cagr_known_doubling() {
        // 13 monthly marks: exactly one year from first to last, value doubles.
        let mut values = vec![100.0; 13];
        for (i, v) in values.iter_mut().enumerate() {
            *v = 100.0 * (1.0 + i as f64 / 12.0);
        }
        values[12] = 200.0;
        let ms = series(&values);
        let c = period_cagr(&ms, 1);
        assert!((c - 1.0).abs() < 1e-9, "expected 100% CAGR, got {c}");
    }

    #[test]
    fn period_cagr_short_series_is_zero() {
        let ms = series(&[100.0, 101.0, 102.0]);
        assert_eq!(period_cagr(&ms, 10), 0.0);
    }

    #[test]
    fn sharpe_zero_for_constant_excess() {
        // A perfectly constant monthly return above the risk-free rate has
        // zero excess-return deviation; the ratio is defined to be 0 here.
        let mut ms = series(&[100.0; 24]);
        for m in &mut ms {
            m.percent_return = 0.01;
        }
        assert_eq!(sharpe_ratio(&ms), 0.0);
    }

    #[test]
    fn sharpe_positive_for_mostly_up_series() {
        let mut values = vec![100.0];
        for i in 1..36 {
            let r = if i % 3 == 0 { 0.998 } else { 1.015 };
            values.push(values[i - 1] * r);
        }
        let ms = series(&values);
        assert!(sharpe_ratio(&ms) > 0.0);
    }

    #[test]
    fn sortino_zero_without_downside() {
        let mut values = vec![100.0];
        for i in 1..12 {
            values.push(values[i - 1] * (1.0 + 0.001 * i as f64));
        }
        let ms = series(&values);
        assert_eq!(sortino_ratio(&ms), 0.0);
    }

    #[test]
    fn sortino_positive_with_small_downside() {
        let mut values = vec![100.0];
        for i in 1..36 {
            let r = if i % 6 == 0 { 0.997 } else { 1.012 };
            values.push(values[i - 1] * r);
        }
        let ms = series(&values);
        let s = sortino_ratio(&ms);
        assert!(s > 0.0, "sortino should be positive, got {s}");
    }

    #[test]
    fn excess_returns_subtract_risk_free_growth() {
        let mut ms = series(&[100.0, 101.0, 102.01]);
        // 1% monthly risk-free growth exactly cancels the portfolio return.
        ms[0].risk_free_value = 1.0;
        ms[1].risk_free_value = 1.01;
        ms[2].risk_free_value = 1.0201;
        let excess = excess_returns(&ms);
        for e in excess {
            assert!(e.abs() < 1e-12);
        }
    }

    #[test]
    fn ulcer_index_zero_for_monotonic_rise() {
        let values: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let ms = series(&values);
        let ui = ulcer_index(&ms, 14);
        assert_eq!(ui.len(), 30 - 14);
        for v in ui {
            assert_eq!(v, 0.0);
        }
        assert_eq!(avg_ulcer_index(&ms, 14), 0.0);
    }

    #[test]
    fn ulcer_index_short_series_is_zero() {
        let ms = series(&[100.0, 99.0]);
        assert_eq!(ulcer_index(&ms, 14), vec![0.0]);
    }

    #[test]
    fn ulcer_index_positive_under_drawdown() {
        let mut values: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        values.extend((0..10).map(|i| 119.0 - 2.0 * i as f64));
        let ms = series(&values);
        let avg = avg_ulcer_index(&ms, 14);
        assert!(avg > 0.0, "expected positive ulcer index, got {avg}");
    }

    #[test]
    fn beta_of_identical_series_is_one() {
        let ms = series(&[100.0, 104.0, 99.0, 107.0, 103.0]);
        let b = beta(&ms, &ms);
        assert!((b - 1.0).abs() < 1e-12);
    }

    #[test]
    fn beta_scales_with_amplitude() {
        let bench = series(&[100.0, 110.0, 95.0, 105.0]);
        // Portfolio moves twice as far around the same midpoint.
        let ours = series(&[100.0, 120.0, 90.0, 110.0]);
        let b = beta(&ours, &bench);
        assert!((b - 2.0).abs() < 1e-9, "expected beta 2, got {b}");
    }

    #[test]
    fn treynor_uses_mean_excess_over_beta() {
        let bench = series(&[100.0, 102.0, 104.0, 106.0]);
        let ours = series(&[100.0, 103.0, 106.0, 109.0]);
        let t = treynor_ratio(&ours, &bench);
        let expected = mean(&excess_returns(&ours)) / beta(&ours, &bench);
        assert!((t - expected).abs() < 1e-12);
    }

    #[test]
    fn std_dev_is_population_variance_annualized() {
        let mut ms = series(&[100.0; 4]);
        for (m, r) in ms.iter_mut().zip([0.0, 0.02, -0.01, 0.03]) {
            m.percent_return = r;
        }
        // Hand-computed: mean 0.01, squared deviations 1e-4 + 1e-4 + 4e-4
        // + 4e-4 = 1e-3, population variance 1e-3 / 4 = 2.5e-4.
        let expected = 2.5e-4_f64.sqrt() * 12.0_f64.sqrt();
        assert!((std_dev(&ms) - expected).abs() < 1e-12);
    }
}
