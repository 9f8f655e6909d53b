//! Position: the single open exposure a strategy instance may hold.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of an open position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    /// Long the primary leg, short the hedge-scaled secondary leg.
    LongPair,
    /// Short the primary leg, long the hedge-scaled secondary leg.
    ShortPair,
    Long,
    Short,
}

impl PositionSide {
    pub fn is_pair(self) -> bool {
        matches!(self, PositionSide::LongPair | PositionSide::ShortPair)
    }

    /// +1 for the long-primary sides, -1 for the short-primary sides.
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::LongPair | PositionSide::Long => 1.0,
            PositionSide::ShortPair | PositionSide::Short => -1.0,
        }
    }
}

/// Open position. Converted into a [`Trade`](super::Trade) on close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    pub primary_entry: f64,
    /// Secondary leg entry price; `None` for single-asset positions.
    pub secondary_entry: Option<f64>,
    pub hedge_ratio: f64,
    pub primary_size: f64,
    pub secondary_size: f64,
    pub opened_at: DateTime<Utc>,
    pub opened_step: usize,
    pub entry_fees: f64,
}

impl Position {
    /// Gross notional committed at entry across both legs.
    pub fn entry_notional(&self) -> f64 {
        let secondary = self
            .secondary_entry
            .map(|p| p * self.secondary_size)
            .unwrap_or(0.0);
        self.primary_entry * self.primary_size + secondary
    }

    /// Mark-to-market P&L before fees at the given prices.
    pub fn unrealized_pnl(&self, primary_price: f64, secondary_price: f64) -> f64 {
        match self.secondary_entry {
            Some(secondary_entry) if self.side.is_pair() => pair_pnl(
                self.side,
                PairLegs {
                    primary_entry: self.primary_entry,
                    primary_exit: primary_price,
                    secondary_entry,
                    secondary_exit: secondary_price,
                    primary_size: self.primary_size,
                    secondary_size: self.secondary_size,
                },
            ),
            _ => self.side.sign() * (primary_price - self.primary_entry) * self.primary_size,
        }
    }
}

/// Entry/exit prices and sizes of both legs of a pair position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairLegs {
    pub primary_entry: f64,
    pub primary_exit: f64,
    pub secondary_entry: f64,
    pub secondary_exit: f64,
    pub primary_size: f64,
    /// Already scaled by the hedge ratio at sizing time.
    pub secondary_size: f64,
}

/// Side-symmetric pair P&L.
///
/// Long pair earns the primary move and pays the secondary move; short pair is
/// the exact negation, so `pair_pnl(LongPair, legs) == -pair_pnl(ShortPair, legs)`.
pub fn pair_pnl(side: PositionSide, legs: PairLegs) -> f64 {
    let primary = (legs.primary_exit - legs.primary_entry) * legs.primary_size;
    let secondary = (legs.secondary_exit - legs.secondary_entry) * legs.secondary_size;
    side.sign() * (primary - secondary)
}
