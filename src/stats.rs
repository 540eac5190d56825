//! Statistics helpers for leaderboard roll-ups.
//!
//! Every function is pure and total. "Insufficient data" is `None`, never
//! NaN and never a silent zero.

use statrs::statistics::Statistics;

/// Running sum over the present values of an optional column.
/// `count` is the number of non-null values seen, which is what separates
/// "no data" from "sums to zero".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tally {
    pub sum: f64,
    pub count: usize,
}

impl Tally {
    #[inline]
    pub fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value.filter(|v| v.is_finite()) {
            self.sum += v;
            self.count += 1;
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl FromIterator<Option<f64>> for Tally {
    fn from_iter<I: IntoIterator<Item = Option<f64>>>(iter: I) -> Self {
        let mut tally = Tally::default();
        for v in iter {
            tally.push(v);
        }
        tally
    }
}

/// numerator / denominator, or `None` when the denominator is zero or the
/// quotient is not a finite number.
#[inline]
pub fn safe_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    let r = numerator / denominator;
    r.is_finite().then_some(r)
}

/// Ratio of two column sums. `None` if either column had no values at all.
#[inline]
pub fn ratio_of_sums(numerator: &Tally, denominator: &Tally) -> Option<f64> {
    if numerator.is_empty() || denominator.is_empty() {
        return None;
    }
    safe_ratio(numerator.sum, denominator.sum)
}

/// part / whole for tallies; `None` when there is nothing to take a share of.
#[inline]
pub fn count_ratio(part: usize, whole: usize) -> Option<f64> {
    if whole == 0 {
        return None;
    }
    safe_ratio(part as f64, whole as f64)
}

#[inline]
pub fn count<T>(items: &[T], predicate: impl Fn(&T) -> bool) -> usize {
    items.iter().filter(|item| predicate(item)).count()
}

/// Arithmetic mean over the present values. Nulls are skipped, not
/// zero-weighted: the denominator is the count of present values.
pub fn mean<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let present: Vec<f64> = values.into_iter().flatten().filter(|v| v.is_finite()).collect();
    if present.is_empty() {
        return None;
    }
    let m = present.iter().mean();
    m.is_finite().then_some(m)
}

/// Median as the continuous 50th percentile.
pub fn median<I>(values: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    percentile_cont(values, 0.5)
}

/// Continuous percentile with linear interpolation between order statistics.
///
/// For sorted x[0..n] the position is p = q * (n - 1); the result is
/// x[floor(p)] + (p - floor(p)) * (x[ceil(p)] - x[floor(p)]).
pub fn percentile_cont<I>(values: I, q: f64) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    if !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted: Vec<f64> = values.into_iter().flatten().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(f64::total_cmp);

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + frac * (sorted[hi] - sorted[lo]))
}
