//! Order intents handed to the execution collaborator.
//!
//! Emission is fire-and-forget: the simulator never waits for a fill.

use crate::domain::{Position, PositionSide, StrategyId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Sender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    Primary,
    Secondary,
}

/// `{symbol, side, size, orderType}` plus routing context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub strategy: StrategyId,
    pub step: usize,
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub side: OrderSide,
    pub size: f64,
    pub order_type: OrderType,
    pub leg: Leg,
    /// True when the intent closes existing exposure.
    pub reduce_only: bool,
}

/// Receives order intents. Implementations must not block on a response.
pub trait IntentSink {
    fn emit(&mut self, intent: OrderIntent);
}

/// Drops every intent. Used by backtests and stress runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl IntentSink for NullSink {
    fn emit(&mut self, _intent: OrderIntent) {}
}

/// Keeps every intent in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub intents: Vec<OrderIntent>,
}

impl IntentSink for RecordingSink {
    fn emit(&mut self, intent: OrderIntent) {
        self.intents.push(intent);
    }
}

/// Forwards intents over a channel to an execution worker.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Sender<OrderIntent>,
    undelivered: usize,
}

impl ChannelSink {
    pub fn new(tx: Sender<OrderIntent>) -> Self {
        Self { tx, undelivered: 0 }
    }

    /// Intents that could not be sent because the receiver hung up.
    pub fn undelivered(&self) -> usize {
        self.undelivered
    }
}

impl IntentSink for ChannelSink {
    fn emit(&mut self, intent: OrderIntent) {
        if self.tx.send(intent).is_err() {
            self.undelivered += 1;
            tracing::warn!(undelivered = self.undelivered, "execution receiver disconnected");
        }
    }
}

/// Symbols and context shared by the intents of one position change.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IntentContext<'a> {
    pub strategy: StrategyId,
    pub step: usize,
    pub timestamp: DateTime<Utc>,
    pub symbol: &'a str,
    pub hedge_symbol: &'a str,
}

/// Intents that establish (or, with `closing`, flatten) a position.
pub(crate) fn position_intents(
    ctx: IntentContext<'_>,
    position: &Position,
    closing: bool,
) -> Vec<OrderIntent> {
    let primary_side = match position.side {
        PositionSide::LongPair | PositionSide::Long => OrderSide::Buy,
        PositionSide::ShortPair | PositionSide::Short => OrderSide::Sell,
    };
    let primary_side = if closing {
        primary_side.opposite()
    } else {
        primary_side
    };

    let make = |symbol: &str, side, size, leg| OrderIntent {
        strategy: ctx.strategy,
        step: ctx.step,
        timestamp: ctx.timestamp,
        symbol: symbol.to_string(),
        side,
        size,
        order_type: OrderType::Market,
        leg,
        reduce_only: closing,
    };

    let mut intents = vec![make(ctx.symbol, primary_side, position.primary_size, Leg::Primary)];
    if position.side.is_pair() && position.secondary_size > 0.0 {
        intents.push(make(
            ctx.hedge_symbol,
            primary_side.opposite(),
            position.secondary_size,
            Leg::Secondary,
        ));
    }
    intents
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::mpsc;

    fn pair_position() -> Position {
        Position {
            side: PositionSide::ShortPair,
            primary_entry: 100.0,
            secondary_entry: Some(50.0),
            hedge_ratio: 1.2,
            primary_size: 5.0,
            secondary_size: 12.0,
            opened_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            opened_step: 3,
            entry_fees: 0.0,
        }
    }

    fn ctx() -> IntentContext<'static> {
        IntentContext {
            strategy: StrategyId(0),
            step: 3,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            symbol: "ETH",
            hedge_symbol: "BTC",
        }
    }

    #[test]
    fn short_pair_sells_primary_and_buys_hedge() {
        let intents = position_intents(ctx(), &pair_position(), false);
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[0].symbol, "ETH");
        assert_eq!(intents[0].side, OrderSide::Sell);
        assert_eq!(intents[1].symbol, "BTC");
        assert_eq!(intents[1].side, OrderSide::Buy);
        assert_eq!(intents[1].size, 12.0);
        assert!(!intents[0].reduce_only);
    }

    #[test]
    fn closing_reverses_sides() {
        let intents = position_intents(ctx(), &pair_position(), true);
        assert_eq!(intents[0].side, OrderSide::Buy);
        assert_eq!(intents[1].side, OrderSide::Sell);
        assert!(intents.iter().all(|i| i.reduce_only));
    }

    #[test]
    fn channel_sink_counts_undelivered() {
        let (tx, rx) = mpsc::channel();
        let mut sink = ChannelSink::new(tx);
        let intent = position_intents(ctx(), &pair_position(), false).remove(0);
        sink.emit(intent.clone());
        assert_eq!(rx.recv().unwrap(), intent);
        drop(rx);
        sink.emit(intent);
        assert_eq!(sink.undelivered(), 1);
    }
}
