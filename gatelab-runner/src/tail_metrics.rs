//! Tail risk metrics: daily VaR, expected shortfall, streaks, recovery.
//!
//! Daily returns are taken from the last equity point of each UTC day, so an
//! hourly stress scenario and a daily backtest are judged on the same horizon.

use chrono::NaiveDate;
use gatelab_core::domain::{EquityPoint, Trade};
use gatelab_core::engine::BacktestOutcome;
use gatelab_core::indicators::stats::{mean, percentile};
use serde::{Deserialize, Serialize};

use crate::metrics::{max_consecutive_losses, period_returns};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TailMetrics {
    /// 95% one-day VaR as a positive loss fraction (0.04 = 4%).
    pub var_95: f64,
    pub var_99: f64,
    /// Mean loss on days at or beyond the 95% VaR cutoff, positive.
    pub expected_shortfall_95: f64,
    pub longest_losing_streak: usize,
    /// Steps from the max-drawdown trough back to the prior peak; `None`
    /// if equity never recovered.
    pub recovery_periods: Option<usize>,
    /// Number of daily returns the VaR figures rest on.
    pub sample_size: usize,
}

impl TailMetrics {
    pub fn compute(outcome: &BacktestOutcome) -> Self {
        let returns = daily_returns(&outcome.equity_curve);
        Self::from_parts(&returns, &outcome.equity_values(), &outcome.trades)
    }

    pub fn from_parts(daily: &[f64], equity: &[f64], trades: &[Trade]) -> Self {
        Self {
            var_95: value_at_risk(daily, 0.95),
            var_99: value_at_risk(daily, 0.99),
            expected_shortfall_95: expected_shortfall(daily, 0.95),
            longest_losing_streak: max_consecutive_losses(trades),
            recovery_periods: recovery_periods(equity),
            sample_size: daily.len(),
        }
    }
}

/// Returns between UTC-day closing equities, with the first point as the opening mark.
pub fn daily_returns(curve: &[EquityPoint]) -> Vec<f64> {
    let Some(first) = curve.first() else {
        return Vec::new();
    };
    let mut closes: Vec<f64> = vec![first.equity];
    let mut current_day: Option<NaiveDate> = None;
    for point in curve {
        let day = point.timestamp.date_naive();
        if current_day == Some(day) {
            if let Some(last) = closes.last_mut() {
                *last = point.equity;
            }
        } else {
            closes.push(point.equity);
            current_day = Some(day);
        }
    }
    period_returns(&closes)
}

/// Historical VaR: the loss at the `1 - confidence` quantile of `returns`.
///
/// Linear interpolation between order statistics; reported as a positive
/// magnitude and floored at zero. Empty input gives 0.
pub fn value_at_risk(returns: &[f64], confidence: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let cutoff = percentile(returns, 1.0 - confidence);
    (-cutoff).max(0.0)
}

/// Mean loss over returns at or below the VaR cutoff, positive magnitude.
pub fn expected_shortfall(returns: &[f64], confidence: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let cutoff = percentile(returns, 1.0 - confidence);
    let tail: Vec<f64> = returns.iter().copied().filter(|&r| r <= cutoff).collect();
    if tail.is_empty() {
        return 0.0;
    }
    (-mean(&tail)).max(0.0)
}

/// Steps from the deepest trough back to the peak that preceded it.
pub fn recovery_periods(equity: &[f64]) -> Option<usize> {
    let first = *equity.first()?;
    let mut peak = first;
    let mut peak_at_trough = first;
    let mut trough_idx = 0;
    let mut max_dd = 0.0_f64;
    for (i, &eq) in equity.iter().enumerate() {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            let dd = (peak - eq) / peak;
            if dd > max_dd {
                max_dd = dd;
                trough_idx = i;
                peak_at_trough = peak;
            }
        }
    }
    if max_dd == 0.0 {
        return Some(0);
    }
    equity[trough_idx..]
        .iter()
        .position(|&eq| eq >= peak_at_trough)
}
