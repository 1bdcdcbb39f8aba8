//! Series operations over frames: NaN filtering, lagging, rolling windows,
//! row-wise argmax, inner-join time alignment, and range trimming.

use chrono::NaiveDate;
use std::collections::HashMap;

use super::{Column, Frame, FrameError, Values, DATE_IDX};

impl Frame {
    /// Remove every row in which any float column is NaN.
    ///
    /// The date column never counts as NaN. An empty result is not an error.
    pub fn drop_na(&self) -> Frame {
        let n = self.nrows();
        let keep: Vec<usize> = (0..n)
            .filter(|&i| {
                self.columns.iter().all(|c| match c.as_float() {
                    Some(v) => !v[i].is_nan(),
                    None => true,
                })
            })
            .collect();
        self.take_rows(&keep)
    }

    /// Shift every float column forward by `k` rows.
    ///
    /// Row `i` of the result holds row `i - k` of the input; the first `k`
    /// rows become NaN. The date column is unchanged.
    pub fn lag(&self, k: usize) -> Frame {
        let columns = self
            .columns
            .iter()
            .map(|c| match &c.values {
                Values::Date(_) => c.clone(),
                Values::Float(v) => {
                    let mut shifted = vec![f64::NAN; v.len()];
                    for i in k..v.len() {
                        shifted[i] = v[i - k];
                    }
                    Column::float(c.name.clone(), shifted)
                }
            })
            .collect();
        Frame { columns }
    }

    /// Restrict rows to `start..=end` on the date axis (strict bounds when
    /// `inclusive` is false).
    pub fn time_trim(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        inclusive: bool,
    ) -> Result<Frame, FrameError> {
        let dates = self.dates()?;
        let keep: Vec<usize> = dates
            .iter()
            .enumerate()
            .filter(|(_, &d)| {
                if inclusive {
                    start <= d && d <= end
                } else {
                    start < d && d < end
                }
            })
            .map(|(i, _)| i)
            .collect();
        Ok(self.take_rows(&keep))
    }

    /// Per row, the name of the float column holding the maximal value.
    ///
    /// Ties break to the lexicographically smallest column name, and NaN
    /// never wins against a finite value.
    pub fn arg_max_label(&self) -> Result<Vec<String>, FrameError> {
        let mut floats: Vec<(&str, &[f64])> = self
            .columns
            .iter()
            .filter_map(|c| c.as_float().map(|v| (c.name(), v)))
            .collect();
        if floats.is_empty() {
            return Err(FrameError::Empty);
        }
        floats.sort_by_key(|(name, _)| *name);

        let labels = (0..self.nrows())
            .map(|i| {
                let (mut best_name, mut best) = (floats[0].0, floats[0].1[i]);
                for &(name, values) in &floats[1..] {
                    if values[i] > best || best.is_nan() {
                        best_name = name;
                        best = values[i];
                    }
                }
                best_name.to_string()
            })
            .collect();
        Ok(labels)
    }
}

/// Apply `agg` over a sliding window of `window` values.
///
/// Rows before the window fills produce NaN.
pub fn rolling<F>(window: usize, values: &[f64], agg: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let mut out = vec![f64::NAN; values.len()];
    if window == 0 {
        return out;
    }
    for i in (window - 1)..values.len() {
        out[i] = agg(&values[i + 1 - window..=i]);
    }
    out
}

/// Inner-join frames on their shared date column.
///
/// Output rows are the dates present in *every* input, in order; non-date
/// columns are carried through without reinterpolation.
pub fn merge_and_time_align(date_key: &str, frames: &[&Frame]) -> Result<Frame, FrameError> {
    let first = frames.first().ok_or(FrameError::Empty)?;

    fn key_dates<'a>(f: &'a Frame, date_key: &str) -> Result<&'a [NaiveDate], FrameError> {
        f.column(date_key)?
            .as_date()
            .ok_or_else(|| FrameError::TypeMismatch(date_key.to_string()))
    }

    // Dates of the first frame that survive membership in every other frame.
    let mut shared: Vec<NaiveDate> = key_dates(first, date_key)?.to_vec();
    for f in &frames[1..] {
        let theirs: std::collections::HashSet<NaiveDate> =
            key_dates(f, date_key)?.iter().copied().collect();
        shared.retain(|d| theirs.contains(d));
    }

    let mut columns = vec![Column::date(DATE_IDX, shared.clone())];
    for f in frames {
        let index: HashMap<NaiveDate, usize> = key_dates(f, date_key)?
            .iter()
            .enumerate()
            .map(|(i, &d)| (d, i))
            .collect();
        let rows: Vec<usize> = shared.iter().map(|d| index[d]).collect();
        for c in f.columns() {
            if c.name() != date_key {
                columns.push(c.take_rows(&rows));
            }
        }
    }
    Frame::new(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::DATE_IDX;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn months(n: usize) -> Vec<NaiveDate> {
        (0..n)
            .map(|i| {
                let month = (i % 12) as u32 + 1;
                let year = 2020 + (i / 12) as i32;
                // Last day of month is enough approximation for tests: use the 28th.
                day(year, month, 28)
            })
            .collect()
    }

    fn frame(values: Vec<(&str, Vec<f64>)>) -> Frame {
        let n = values[0].1.len();
        let mut cols = vec![Column::date(DATE_IDX, months(n))];
        for (name, v) in values {
            cols.push(Column::float(name, v));
        }
        Frame::new(cols).unwrap()
    }

    #[test]
    fn drop_na_removes_only_nan_rows_in_order() {
        let f = frame(vec![
            ("A", vec![1.0, f64::NAN, 3.0, 4.0]),
            ("B", vec![10.0, 20.0, f64::NAN, 40.0]),
        ]);
        let out = f.drop_na();
        assert_eq!(out.nrows(), 2);
        assert_eq!(out.floats("A").unwrap(), &[1.0, 4.0]);
        assert_eq!(out.floats("B").unwrap(), &[10.0, 40.0]);
    }

    #[test]
    fn drop_na_empty_result_is_ok() {
        let f = frame(vec![("A", vec![f64::NAN, f64::NAN])]);
        assert_eq!(f.drop_na().nrows(), 0);
    }

    #[test]
    fn lag_shifts_and_pads_with_nan() {
        let f = frame(vec![("A", vec![1.0, 2.0, 3.0, 4.0])]);
        let lagged = f.lag(2);
        let a = lagged.floats("A").unwrap();
        assert!(a[0].is_nan() && a[1].is_nan());
        assert_eq!(&a[2..], &[1.0, 2.0]);
        // date axis untouched
        assert_eq!(lagged.dates().unwrap(), f.dates().unwrap());
    }

    #[test]
    fn rolling_sum_with_leading_nan() {
        let out = rolling(3, &[1.0, 2.0, 3.0, 4.0], |w| w.iter().sum());
        assert!(out[0].is_nan() && out[1].is_nan());
        assert_eq!(out[2], 6.0);
        assert_eq!(out[3], 9.0);
    }

    #[test]
    fn rolling_window_one_is_identity() {
        let out = rolling(1, &[1.5, 2.5], |w| w.iter().sum());
        assert_eq!(out, vec![1.5, 2.5]);
    }

    #[test]
    fn argmax_breaks_ties_lexicographically() {
        let f = frame(vec![
            ("C", vec![0.5]),
            ("A", vec![1.0]),
            ("B", vec![1.0]),
        ]);
        assert_eq!(f.arg_max_label().unwrap(), vec!["A".to_string()]);
    }

    #[test]
    fn argmax_ignores_nan_values() {
        let f = frame(vec![("A", vec![f64::NAN]), ("B", vec![-2.0])]);
        assert_eq!(f.arg_max_label().unwrap(), vec!["B".to_string()]);
    }

    #[test]
    fn merge_keeps_only_shared_dates() {
        let a = Frame::new(vec![
            Column::date(DATE_IDX, vec![day(2020, 1, 31), day(2020, 2, 29), day(2020, 3, 31)]),
            Column::float("A", vec![1.0, 2.0, 3.0]),
        ])
        .unwrap();
        let b = Frame::new(vec![
            Column::date(DATE_IDX, vec![day(2020, 2, 29), day(2020, 3, 31), day(2020, 4, 30)]),
            Column::float("B", vec![20.0, 30.0, 40.0]),
        ])
        .unwrap();

        let merged = merge_and_time_align(DATE_IDX, &[&a, &b]).unwrap();
        assert_eq!(merged.dates().unwrap(), &[day(2020, 2, 29), day(2020, 3, 31)]);
        assert_eq!(merged.floats("A").unwrap(), &[2.0, 3.0]);
        assert_eq!(merged.floats("B").unwrap(), &[20.0, 30.0]);
    }

    #[test]
    fn merge_with_no_overlap_is_empty() {
        let a = Frame::new(vec![
            Column::date(DATE_IDX, vec![day(2020, 1, 31)]),
            Column::float("A", vec![1.0]),
        ])
        .unwrap();
        let b = Frame::new(vec![
            Column::date(DATE_IDX, vec![day(2021, 1, 31)]),
            Column::float("B", vec![2.0]),
        ])
        .unwrap();
        let merged = merge_and_time_align(DATE_IDX, &[&a, &b]).unwrap();
        assert_eq!(merged.nrows(), 0);
    }

    #[test]
    fn time_trim_inclusive_bounds() {
        let f = frame(vec![("A", vec![1.0, 2.0, 3.0, 4.0])]);
        let dates = f.dates().unwrap().to_vec();
        let out = f.time_trim(dates[1], dates[2], true).unwrap();
        assert_eq!(out.nrows(), 2);
        assert_eq!(out.floats("A").unwrap(), &[2.0, 3.0]);

        let strict = f.time_trim(dates[1], dates[3], false).unwrap();
        assert_eq!(strict.floats("A").unwrap(), &[3.0]);
    }
}
