//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! `PerformanceMetrics::compute` bundles them for one finished run.

use gatelab_core::domain::Trade;
use gatelab_core::engine::BacktestOutcome;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Annualization factor applied to per-step Sharpe and Sortino.
pub const PERIODS_PER_YEAR: f64 = 252.0;

/// Profit factor reported when there are profits but no losses.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub win_rate: f64,
    pub avg_correlation: f64,
    pub trade_count: usize,
    pub profit_factor: f64,
    pub sharpe: f64,
    pub sortino: f64,
    /// Largest peak-to-trough decline as a positive fraction.
    pub max_drawdown: f64,
    pub max_consecutive_losses: usize,
    pub avg_trade_pnl: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub total_fees: f64,
}

impl PerformanceMetrics {
    pub fn compute(outcome: &BacktestOutcome) -> Self {
        let equity = outcome.equity_values();
        let trades = &outcome.trades;
        Self {
            total_return: total_return(&equity),
            win_rate: win_rate(trades),
            avg_correlation: outcome.avg_correlation,
            trade_count: trades.len(),
            profit_factor: profit_factor(trades),
            sharpe: sharpe_ratio(&equity),
            sortino: sortino_ratio(&equity),
            max_drawdown: max_drawdown(&equity),
            max_consecutive_losses: max_consecutive_losses(trades),
            avg_trade_pnl: avg_trade_pnl(trades),
            largest_win: largest_win(trades),
            largest_loss: largest_loss(trades),
            total_fees: outcome.fees_paid,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    match (equity_curve.first(), equity_curve.last()) {
        (Some(&initial), Some(&last)) if equity_curve.len() >= 2 && initial > 0.0 => {
            (last - initial) / initial
        }
        _ => 0.0,
    }
}

/// Annualized Sharpe ratio from per-step returns, zero risk-free rate.
///
/// Returns 0.0 if variance is zero or there are fewer than 2 returns.
pub fn sharpe_ratio(equity_curve: &[f64]) -> f64 {
    let returns = period_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().mean();
    let std = returns.iter().std_dev();
    if !std.is_finite() || std < 1e-15 {
        return 0.0;
    }
    (mean / std) * PERIODS_PER_YEAR.sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
///
/// Returns 0.0 if there is no downside or fewer than 2 returns.
pub fn sortino_ratio(equity_curve: &[f64]) -> f64 {
    let returns = period_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().mean();

    let downside_sq: f64 = returns.iter().filter(|&&r| r < 0.0).map(|r| r * r).sum();
    if downside_sq <= 0.0 {
        return 0.0;
    }
    let downside_std = (downside_sq / returns.len() as f64).sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    (mean / downside_std) * PERIODS_PER_YEAR.sqrt()
}

/// Largest peak-to-trough decline as a positive fraction (0.15 = 15%).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = match equity_curve.first() {
        Some(&first) => first,
        None => return 0.0,
    };
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    max_dd
}

/// Win rate: fraction of trades that were winners.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// Profit factor: gross profits / gross losses, capped at `PROFIT_FACTOR_CAP`.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let gross_profit: f64 = trades
        .iter()
        .filter(|t| t.realized_pnl > 0.0)
        .map(|t| t.realized_pnl)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.realized_pnl < 0.0)
        .map(|t| t.realized_pnl.abs())
        .sum();

    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 {
            PROFIT_FACTOR_CAP
        } else {
            0.0
        };
    }
    (gross_profit / gross_loss).min(PROFIT_FACTOR_CAP)
}

/// Longest run of consecutive losing trades. Break-even trades end a run.
pub fn max_consecutive_losses(trades: &[Trade]) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_loser() {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

pub fn avg_trade_pnl(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.realized_pnl).sum::<f64>() / trades.len() as f64
}

/// Best winning trade, 0.0 when there are no winners.
pub fn largest_win(trades: &[Trade]) -> f64 {
    trades
        .iter()
        .map(|t| t.realized_pnl)
        .filter(|&p| p > 0.0)
        .fold(0.0, f64::max)
}

/// Worst losing trade as a negative number, 0.0 when there are no losers.
pub fn largest_loss(trades: &[Trade]) -> f64 {
    trades
        .iter()
        .map(|t| t.realized_pnl)
        .filter(|&p| p < 0.0)
        .fold(0.0, f64::min)
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Simple returns between consecutive equity points.
pub fn period_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gatelab_core::domain::{ExitReason, PositionSide};

    pub(crate) fn make_trade(realized_pnl: f64) -> Trade {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Trade {
            side: PositionSide::Long,
            entry_step: 0,
            entry_time: t,
            entry_price: 100.0,
            secondary_entry_price: None,
            exit_step: 5,
            exit_time: t,
            exit_price: 100.0 + realized_pnl / 10.0,
            secondary_exit_price: None,
            exit_reason: ExitReason::Signal,
            primary_size: 10.0,
            secondary_size: 0.0,
            hedge_ratio: 1.0,
            gross_pnl: realized_pnl,
            fees: 0.0,
            realized_pnl,
        }
    }

    #[test]
    fn total_return_basic() {
        assert!((total_return(&[100.0, 110.0]) - 0.1).abs() < 1e-12);
        assert_eq!(total_return(&[100.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
    }

    #[test]
    fn drawdown_is_positive_fraction() {
        let curve = [100.0, 120.0, 90.0, 130.0, 104.0];
        // Peak 130 to 104 is 20%; peak 120 to 90 is 25%.
        assert!((max_drawdown(&curve) - 0.25).abs() < 1e-12);
        assert_eq!(max_drawdown(&[100.0, 101.0, 102.0]), 0.0);
    }

    #[test]
    fn drawdown_half_is_exact() {
        assert_eq!(max_drawdown(&[100.0, 50.0]), 0.5);
    }

    #[test]
    fn sharpe_zero_for_constant_equity() {
        assert_eq!(sharpe_ratio(&[100.0; 10]), 0.0);
        assert_eq!(sortino_ratio(&[100.0; 10]), 0.0);
    }

    #[test]
    fn sharpe_positive_for_noisy_uptrend() {
        let curve = [100.0, 101.0, 100.5, 102.0, 101.8, 103.0];
        assert!(sharpe_ratio(&curve) > 0.0);
        assert!(sortino_ratio(&curve) > 0.0);
    }

    #[test]
    fn win_rate_and_profit_factor() {
        let trades = vec![make_trade(100.0), make_trade(-50.0), make_trade(50.0)];
        assert!((win_rate(&trades) - 2.0 / 3.0).abs() < 1e-12);
        assert!((profit_factor(&trades) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn profit_factor_caps_without_losses() {
        let trades = vec![make_trade(10.0), make_trade(20.0)];
        assert_eq!(profit_factor(&trades), PROFIT_FACTOR_CAP);
        assert_eq!(profit_factor(&[]), 0.0);
    }

    #[test]
    fn losing_streaks() {
        let trades: Vec<Trade> = [-1.0, -2.0, 3.0, -1.0, -1.0, -1.0, 0.0, -1.0]
            .iter()
            .map(|&p| make_trade(p))
            .collect();
        assert_eq!(max_consecutive_losses(&trades), 3);
    }

    #[test]
    fn trade_extremes() {
        let trades = vec![make_trade(30.0), make_trade(-40.0), make_trade(10.0)];
        assert_eq!(largest_win(&trades), 30.0);
        assert_eq!(largest_loss(&trades), -40.0);
        assert!((avg_trade_pnl(&trades) - 0.0).abs() < 1e-12);
        assert_eq!(largest_loss(&[make_trade(5.0)]), 0.0);
    }

    proptest::proptest! {
        #[test]
        fn drawdown_stays_in_unit_interval(
            curve in proptest::collection::vec(0.01f64..1e6, 1..200),
        ) {
            let dd = max_drawdown(&curve);
            proptest::prop_assert!((0.0..1.0).contains(&dd));
        }
    }
}
