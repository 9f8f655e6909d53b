//! Indicator Engine: rolling statistical features from a bounded window.
//!
//! A snapshot is a pure function of the window contents at one step: no
//! state is carried between calls, so the value at step t can never see a
//! candle from t+1.

pub mod adx;
pub mod ema;
pub mod stats;

use crate::config::{CorrelationMode, IndicatorParams};
use crate::domain::RollingWindow;
use serde::{Deserialize, Serialize};

pub use adx::{adx_series, latest_adx};
pub use ema::{ema_of_series, latest_ema};

/// Hedge ratios with a smaller magnitude fall back to 1.
pub const HEDGE_RATIO_FLOOR: f64 = 1e-8;

/// Indicator values computed for one evaluation step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub correlation: f64,
    pub z_score: f64,
    pub hedge_ratio: f64,
    /// EMA of closes; `None` until warmed up.
    pub moving_average: Option<f64>,
    /// ADX; `None` until warmed up.
    pub trend_strength: Option<f64>,
    /// Close of the candle the snapshot was taken at.
    pub close: f64,
}

impl IndicatorSnapshot {
    /// Name of the first non-finite field, if any.
    pub fn non_finite_field(&self) -> Option<&'static str> {
        let fields = [
            ("correlation", Some(self.correlation)),
            ("z_score", Some(self.z_score)),
            ("hedge_ratio", Some(self.hedge_ratio)),
            ("moving_average", self.moving_average),
            ("trend_strength", self.trend_strength),
            ("close", Some(self.close)),
        ];
        fields
            .into_iter()
            .find(|(_, v)| v.is_some_and(|v| !v.is_finite()))
            .map(|(name, _)| name)
    }
}

/// Result of asking the engine for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    Ready(IndicatorSnapshot),
    InsufficientHistory { have: usize, need: usize },
    /// Cross-series mode without a secondary window of matching length.
    MissingSecondary,
}

/// Computes [`IndicatorSnapshot`]s from a primary (and optional secondary) window.
#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    params: IndicatorParams,
    lookback: usize,
}

impl IndicatorEngine {
    pub fn new(params: IndicatorParams, lookback: usize) -> Self {
        Self { params, lookback }
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    pub fn params(&self) -> &IndicatorParams {
        &self.params
    }

    pub fn evaluate(
        &self,
        primary: &RollingWindow,
        secondary: Option<&RollingWindow>,
    ) -> Evaluation {
        if primary.len() < self.lookback {
            return Evaluation::InsufficientHistory {
                have: primary.len(),
                need: self.lookback,
            };
        }

        let closes = primary.closes();
        let (correlation, z_score, hedge_ratio) = match self.params.correlation_mode {
            CorrelationMode::SelfSeries => self.self_series(&closes),
            CorrelationMode::CrossSeries => {
                let Some(secondary) = secondary.filter(|w| w.len() == primary.len()) else {
                    return Evaluation::MissingSecondary;
                };
                self.cross_series(&closes, &secondary.closes())
            }
        };

        let period = self.params.trend_period;
        let moving_average = latest_ema(&closes, period);
        let trend_strength = latest_adx(&primary.highs(), &primary.lows(), &closes, period);

        Evaluation::Ready(IndicatorSnapshot {
            correlation,
            z_score,
            hedge_ratio,
            moving_average,
            trend_strength,
            close: closes.last().copied().unwrap_or(f64::NAN),
        })
    }

    /// Returns `(correlation, z_score, hedge_ratio)` from the primary series alone.
    fn self_series(&self, closes: &[f64]) -> (f64, f64, f64) {
        let p = &self.params;

        let returns = stats::simple_returns(stats::tail(closes, p.correlation_period + 1));
        let correlation = stats::pearson(&returns, &returns);

        let spreads = stats::differences(stats::tail(closes, p.z_score_period + 1));
        let z_score = stats::z_score_of_last(&spreads);

        let hedge_returns = stats::simple_returns(stats::tail(closes, p.hedge_ratio_period + 1));
        let hedge_ratio = floor_hedge(stats::ols_slope(&hedge_returns, &hedge_returns));

        (correlation, z_score, hedge_ratio)
    }

    /// Returns `(correlation, z_score, hedge_ratio)` from primary vs secondary.
    fn cross_series(&self, primary: &[f64], secondary: &[f64]) -> (f64, f64, f64) {
        let p = &self.params;

        let pr = stats::simple_returns(stats::tail(primary, p.correlation_period + 1));
        let sr = stats::simple_returns(stats::tail(secondary, p.correlation_period + 1));
        let correlation = stats::pearson(&pr, &sr);

        let hp = stats::simple_returns(stats::tail(primary, p.hedge_ratio_period + 1));
        let hs = stats::simple_returns(stats::tail(secondary, p.hedge_ratio_period + 1));
        let hedge_ratio = floor_hedge(stats::ols_slope(&hp, &hs));

        let zp = stats::tail(primary, p.z_score_period);
        let zs = stats::tail(secondary, p.z_score_period);
        let spreads: Vec<f64> = zp
            .iter()
            .zip(zs)
            .map(|(a, b)| a - hedge_ratio * b)
            .collect();
        let z_score = stats::z_score_of_last(&spreads);

        (correlation, z_score, hedge_ratio)
    }
}

fn floor_hedge(slope: Option<f64>) -> f64 {
    match slope {
        Some(h) if h.is_finite() && h.abs() >= HEDGE_RATIO_FLOOR => h,
        _ => 1.0,
    }
}

/// Create a chronological hourly candle series from close prices for testing.
///
/// open = previous close (or close for the first candle),
/// high = max(open, close) + 1.0, low = max(min(open, close) - 1.0, 0.01).
#[cfg(test)]
pub fn make_candles(closes: &[f64]) -> Vec<crate::domain::Candle> {
    use chrono::{Duration, TimeZone, Utc};
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            crate::domain::Candle::new(
                start + Duration::hours(i as i64),
                open,
                open.max(close) + 1.0,
                (open.min(close) - 1.0).max(0.01),
                close,
                1000.0,
            )
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
