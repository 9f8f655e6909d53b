//! RollingWindow: bounded, append-only candle history for one strategy instance.

use super::candle::{Candle, CandleError};
use std::collections::VecDeque;

/// Bounded ordered sequence of candles, oldest evicted first.
///
/// Candles are validated on the way in; a rejected candle never enters the
/// window, so every indicator downstream sees finite positive prices in
/// strictly increasing timestamp order.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    capacity: usize,
    candles: VecDeque<Candle>,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            candles: VecDeque::with_capacity(capacity.max(1)),
        }
    }

    /// Whether `candle` would be accepted by [`push`](Self::push).
    pub fn check(&self, candle: &Candle) -> Result<(), CandleError> {
        candle.validate()?;
        match self.candles.back() {
            Some(last) if candle.timestamp <= last.timestamp => Err(CandleError::OutOfOrder {
                previous: last.timestamp,
                timestamp: candle.timestamp,
            }),
            _ => Ok(()),
        }
    }

    /// Validate and append a candle, evicting the oldest once full.
    pub fn push(&mut self, candle: Candle) -> Result<(), CandleError> {
        self.check(&candle)?;
        if self.candles.len() == self.capacity {
            self.candles.pop_front();
        }
        self.candles.push_back(candle);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_full(&self) -> bool {
        self.candles.len() == self.capacity
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.iter()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.low).collect()
    }
}
