//! Rolling statistics over plain `f64` slices.
//!
//! Every function is total: degenerate inputs (too short, zero variance)
//! resolve to a safe default instead of NaN.

/// Variance below this is treated as zero.
pub const VARIANCE_EPSILON: f64 = 1e-15;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance.
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Simple returns `(p[i] - p[i-1]) / p[i-1]`; one shorter than the input.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    prices
        .windows(2)
        .map(|w| if w[0] != 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Successive differences `p[i] - p[i-1]`; one shorter than the input.
pub fn differences(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] - w[0]).collect()
}

/// The last `n` elements (or all of them when shorter).
pub fn tail(values: &[f64], n: usize) -> &[f64] {
    &values[values.len().saturating_sub(n)..]
}

/// Pearson correlation of two equally long series. 0 when either variance is zero.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    if n < 2 {
        return 0.0;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mx = mean(x);
    let my = mean(y);
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }
    let nf = n as f64;
    if vx / nf < VARIANCE_EPSILON || vy / nf < VARIANCE_EPSILON {
        return 0.0;
    }
    (cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0)
}

/// OLS slope of `y` regressed on `x`. `None` when `x` has no variance.
pub fn ols_slope(y: &[f64], x: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let mx = mean(x);
    let my = mean(y);
    let mut cov = 0.0;
    let mut vx = 0.0;
    for i in 0..n {
        let dx = x[i] - mx;
        cov += dx * (y[i] - my);
        vx += dx * dx;
    }
    if vx / (n as f64) < VARIANCE_EPSILON {
        return None;
    }
    Some(cov / vx)
}

/// Z-score of the last element against the whole slice. 0 when std is zero.
pub fn z_score_of_last(values: &[f64]) -> f64 {
    let Some(&current) = values.last() else {
        return 0.0;
    };
    let sd = std_dev(values);
    if sd * sd < VARIANCE_EPSILON {
        return 0.0;
    }
    (current - mean(values)) / sd
}

/// Linear-interpolated percentile, `q` in [0, 1]. 0 for an empty slice.
pub fn percentile(values: &[f64], q: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn constant_series_has_zero_z_and_correlation() {
        let flat = vec![100.0; 30];
        let returns = simple_returns(&flat);
        assert_eq!(pearson(&returns, &returns), 0.0);
        assert_eq!(z_score_of_last(&differences(&flat)), 0.0);
        assert_eq!(ols_slope(&returns, &returns), None);
    }

    #[test]
    fn self_correlation_is_one() {
        let returns = simple_returns(&[100.0, 101.0, 99.0, 102.0, 104.0, 103.0]);
        assert_approx(pearson(&returns, &returns), 1.0, 1e-12);
    }

    #[test]
    fn anti_correlated_series() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [4.0, 3.0, 2.0, 1.0];
        assert_approx(pearson(&x, &y), -1.0, DEFAULT_EPSILON);
    }

    #[test]
    fn slope_known_value() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert_approx(ols_slope(&y, &x).unwrap(), 2.0, DEFAULT_EPSILON);
    }

    #[test]
    fn slope_of_near_constant_regressor_is_none() {
        let x = [1.0, 1.0 + 1e-10, 1.0, 1.0 - 1e-10];
        let y = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(ols_slope(&y, &x), None);
        assert_eq!(ols_slope(&y, &[5.0]), None);
    }

    #[test]
    fn z_score_single_jump() {
        // 19 zeros then a 1: mean 0.05, population std sqrt(0.0475)
        let mut diffs = vec![0.0; 19];
        diffs.push(1.0);
        let expected = 0.95 / 0.0475_f64.sqrt();
        assert_approx(z_score_of_last(&diffs), expected, 1e-9);
    }

    #[test]
    fn percentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_approx(percentile(&values, 0.5), 3.0, DEFAULT_EPSILON);
        assert_approx(percentile(&values, 0.05), 1.2, DEFAULT_EPSILON);
        assert_eq!(percentile(&[], 0.05), 0.0);
    }

    #[test]
    fn tail_clamps_to_length() {
        let values = [1.0, 2.0, 3.0];
        assert_eq!(tail(&values, 2), &[2.0, 3.0]);
        assert_eq!(tail(&values, 10), &values);
    }
}
