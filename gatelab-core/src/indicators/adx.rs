//! ADX: Average Directional Index (Wilder), used as the trend-strength index.
//!
//! Steps:
//! 1. Compute true range, +DM and -DM from consecutive candles
//! 2. Smooth +DM, -DM, and TR using Wilder smoothing (alpha = 1/period)
//! 3. +DI = 100 * smoothed(+DM) / smoothed(TR)
//! 4. -DI = 100 * smoothed(-DM) / smoothed(TR)
//! 5. DX = 100 * |+DI - -DI| / (+DI + -DI)
//! 6. ADX = Wilder-smoothed DX
//!
//! Warm-up: 2 * period candles.

/// Candles needed before the first ADX value.
pub fn adx_warm_up(period: usize) -> usize {
    2 * period
}

/// True range; index 0 has no previous close and is NaN.
pub fn true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    let n = highs.len().min(lows.len()).min(closes.len());
    let mut tr = vec![f64::NAN; n];
    for i in 1..n {
        let (h, l, pc) = (highs[i], lows[i], closes[i - 1]);
        tr[i] = (h - l).max((h - pc).abs()).max((l - pc).abs());
    }
    tr
}

/// Wilder smoothing seeded with the mean of the first `period` non-NaN values.
pub fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 {
        return result;
    }

    let Some(seed_start) = values.iter().position(|v| !v.is_nan()) else {
        return result;
    };
    let seed_end = seed_start + period;
    if seed_end > n || values[seed_start..seed_end].iter().any(|v| v.is_nan()) {
        return result;
    }

    let seed = values[seed_start..seed_end].iter().sum::<f64>() / period as f64;
    result[seed_end - 1] = seed;

    let alpha = 1.0 / period as f64;
    let mut prev = seed;
    for i in seed_end..n {
        if values[i].is_nan() {
            return result;
        }
        let smoothed = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = smoothed;
        prev = smoothed;
    }
    result
}

/// ADX series over the given OHLC columns. NaN during warm-up.
pub fn adx_series(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    let n = highs.len().min(lows.len()).min(closes.len());
    if n < 2 || period == 0 {
        return vec![f64::NAN; n];
    }

    let mut plus_dm = vec![f64::NAN; n];
    let mut minus_dm = vec![f64::NAN; n];
    for i in 1..n {
        let up = highs[i] - highs[i - 1];
        let down = lows[i - 1] - lows[i];
        plus_dm[i] = if up > down && up > 0.0 { up } else { 0.0 };
        minus_dm[i] = if down > up && down > 0.0 { down } else { 0.0 };
    }

    let tr = true_range(highs, lows, closes);
    let smooth_tr = wilder_smooth(&tr, period);
    let smooth_plus = wilder_smooth(&plus_dm, period);
    let smooth_minus = wilder_smooth(&minus_dm, period);

    let mut dx = vec![f64::NAN; n];
    for i in 0..n {
        if smooth_tr[i].is_nan() || smooth_tr[i] == 0.0 {
            continue;
        }
        let plus_di = 100.0 * smooth_plus[i] / smooth_tr[i];
        let minus_di = 100.0 * smooth_minus[i] / smooth_tr[i];
        let di_sum = plus_di + minus_di;
        dx[i] = if di_sum == 0.0 {
            0.0
        } else {
            100.0 * (plus_di - minus_di).abs() / di_sum
        };
    }

    wilder_smooth(&dx, period)
}

/// ADX at the last candle, `None` until warmed up.
pub fn latest_adx(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Option<f64> {
    adx_series(highs, lows, closes, period)
        .last()
        .copied()
        .filter(|v| !v.is_nan())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trending(n: usize, step: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64 * step).collect();
        let highs = closes.iter().map(|c| c + 1.0).collect();
        let lows = closes.iter().map(|c| c - 1.0).collect();
        (highs, lows, closes)
    }

    #[test]
    fn adx_bounds() {
        let closes = [102.0, 106.0, 99.0, 101.0, 105.0, 108.0, 110.0, 105.0, 107.0, 112.0];
        let highs: Vec<f64> = closes.iter().map(|c| c + 3.0).collect();
        let lows: Vec<f64> = closes.iter().map(|c| c - 4.0).collect();
        for v in adx_series(&highs, &lows, &closes, 3) {
            if !v.is_nan() {
                assert!((0.0..=100.0).contains(&v), "ADX out of bounds: {v}");
            }
        }
    }

    #[test]
    fn pure_uptrend_saturates() {
        let (h, l, c) = trending(40, 2.0);
        let adx = latest_adx(&h, &l, &c, 5).unwrap();
        assert!((adx - 100.0).abs() < 1e-9, "got {adx}");
    }

    #[test]
    fn flat_series_has_zero_strength() {
        let (h, l, c) = trending(40, 0.0);
        let adx = latest_adx(&h, &l, &c, 5).unwrap();
        assert_eq!(adx, 0.0);
    }

    #[test]
    fn warm_up_respected() {
        let (h, l, c) = trending(9, 1.0);
        assert_eq!(latest_adx(&h, &l, &c, 5), None);
        let (h, l, c) = trending(10, 1.0);
        assert!(latest_adx(&h, &l, &c, 5).is_some());
        assert_eq!(adx_warm_up(14), 28);
    }
}
