//! Trade: a closed round trip, immutable once recorded.

use super::position::PositionSide;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Pair exit signal (spread reverted inside the exit band).
    Signal,
    /// Opposite trend signal while a trend position was open.
    OppositeSignal,
    StopLoss,
    TakeProfit,
    /// Closed at the last candle of the run.
    EndOfData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: PositionSide,

    // ── Entry ──
    pub entry_step: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub secondary_entry_price: Option<f64>,

    // ── Exit ──
    pub exit_step: usize,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub secondary_exit_price: Option<f64>,
    pub exit_reason: ExitReason,

    // ── Size ──
    pub primary_size: f64,
    pub secondary_size: f64,
    pub hedge_ratio: f64,

    // ── PnL ──
    pub gross_pnl: f64,
    pub fees: f64,
    /// Realized P&L net of entry and exit fees.
    pub realized_pnl: f64,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.realized_pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.realized_pnl < 0.0
    }

    /// Return on the trade as a fraction of entry notional.
    pub fn return_pct(&self) -> f64 {
        let notional = self.entry_price * self.primary_size
            + self.secondary_entry_price.unwrap_or(0.0) * self.secondary_size;
        if notional <= 0.0 {
            return 0.0;
        }
        self.realized_pnl / notional
    }

    pub fn steps_held(&self) -> usize {
        self.exit_step.saturating_sub(self.entry_step)
    }
}
