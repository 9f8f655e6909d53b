//! PortfolioLedger: cash, the single open position, realized trades, equity curve.
//!
//! Owned exclusively by one simulation run. Mutated only through the
//! simulator's step function.

use super::position::Position;
use super::trade::{ExitReason, Trade};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One mark-to-market observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("a position opened at step {opened_step} is still open")]
    PositionAlreadyOpen { opened_step: usize },

    #[error("no open position to close")]
    NoOpenPosition,
}

/// Prices and fee rate used to close the open position.
#[derive(Debug, Clone, Copy)]
pub struct ExitFill {
    pub step: usize,
    pub time: DateTime<Utc>,
    pub primary_price: f64,
    pub secondary_price: f64,
    pub fee_rate: f64,
}

#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    initial_capital: f64,
    cash: f64,
    position: Option<Position>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    fees_paid: f64,
}

impl PortfolioLedger {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            fees_paid: 0.0,
        }
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Capital the sizer may commit. Zero while a position is open.
    pub fn available_capital(&self) -> f64 {
        if self.position.is_some() {
            0.0
        } else {
            self.cash.max(0.0)
        }
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn fees_paid(&self) -> f64 {
        self.fees_paid
    }

    /// Open a position, charging its entry fees against cash.
    pub fn open(&mut self, position: Position) -> Result<(), LedgerError> {
        if let Some(existing) = &self.position {
            return Err(LedgerError::PositionAlreadyOpen {
                opened_step: existing.opened_step,
            });
        }
        self.cash -= position.entry_fees;
        self.fees_paid += position.entry_fees;
        self.position = Some(position);
        Ok(())
    }

    /// Close the open position and append the resulting trade.
    pub fn close(&mut self, fill: ExitFill, reason: ExitReason) -> Result<&Trade, LedgerError> {
        let position = self.position.take().ok_or(LedgerError::NoOpenPosition)?;

        let secondary_exit = position.secondary_entry.map(|_| fill.secondary_price);
        let exit_notional = fill.primary_price * position.primary_size
            + secondary_exit.unwrap_or(0.0) * position.secondary_size;
        let exit_fee = exit_notional * fill.fee_rate;
        let gross_pnl = position.unrealized_pnl(fill.primary_price, fill.secondary_price);

        self.cash += gross_pnl - exit_fee;
        self.fees_paid += exit_fee;

        self.trades.push(Trade {
            side: position.side,
            entry_step: position.opened_step,
            entry_time: position.opened_at,
            entry_price: position.primary_entry,
            secondary_entry_price: position.secondary_entry,
            exit_step: fill.step,
            exit_time: fill.time,
            exit_price: fill.primary_price,
            secondary_exit_price: secondary_exit,
            exit_reason: reason,
            primary_size: position.primary_size,
            secondary_size: position.secondary_size,
            hedge_ratio: position.hedge_ratio,
            gross_pnl,
            fees: position.entry_fees + exit_fee,
            realized_pnl: gross_pnl - position.entry_fees - exit_fee,
        });

        // Just pushed.
        Ok(&self.trades[self.trades.len() - 1])
    }

    /// Equity = cash + unrealized P&L of the open position.
    pub fn equity(&self, primary_price: f64, secondary_price: f64) -> f64 {
        let unrealized = self
            .position
            .as_ref()
            .map(|p| p.unrealized_pnl(primary_price, secondary_price))
            .unwrap_or(0.0);
        self.cash + unrealized
    }

    /// Append an equity observation and return it.
    pub fn mark(&mut self, timestamp: DateTime<Utc>, primary_price: f64, secondary_price: f64) -> f64 {
        let equity = self.equity(primary_price, secondary_price);
        self.equity_curve.push(EquityPoint { timestamp, equity });
        equity
    }

    /// Repeat the previous equity observation at a new timestamp.
    pub fn carry_forward(&mut self, timestamp: DateTime<Utc>) -> f64 {
        let equity = self
            .equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.cash);
        self.equity_curve.push(EquityPoint { timestamp, equity });
        equity
    }

    /// Overwrite the most recent equity observation with the flat-book value.
    ///
    /// Used after the end-of-data close so the curve ends net of exit fees.
    pub fn restate_last_flat(&mut self) {
        if self.position.is_some() {
            return;
        }
        let cash = self.cash;
        if let Some(last) = self.equity_curve.last_mut() {
            last.equity = cash;
        }
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.cash)
    }

    pub fn into_parts(self) -> (Vec<Trade>, Vec<EquityPoint>) {
        (self.trades, self.equity_curve)
    }
}
