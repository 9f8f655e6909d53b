//! Candle: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV candle. Immutable once appended to a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleError {
    #[error("non-finite {field} at {timestamp}")]
    NonFinite {
        field: &'static str,
        timestamp: DateTime<Utc>,
    },

    #[error("non-positive {field} ({value}) at {timestamp}")]
    NonPositive {
        field: &'static str,
        value: f64,
        timestamp: DateTime<Utc>,
    },

    #[error("inconsistent range at {timestamp}: high {high} low {low} open {open} close {close}")]
    InconsistentRange {
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },

    #[error("candle at {timestamp} does not follow {previous}")]
    OutOfOrder {
        previous: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
}

impl Candle {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Reject non-finite or non-positive prices and volume, and ranges where
    /// `low <= min(open, close)` and `max(open, close) <= high` do not hold.
    pub fn validate(&self) -> Result<(), CandleError> {
        let fields = [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ];
        for (field, value) in fields {
            if !value.is_finite() {
                return Err(CandleError::NonFinite {
                    field,
                    timestamp: self.timestamp,
                });
            }
            if value <= 0.0 {
                return Err(CandleError::NonPositive {
                    field,
                    value,
                    timestamp: self.timestamp,
                });
            }
        }
        if !self.is_sane() {
            return Err(CandleError::InconsistentRange {
                timestamp: self.timestamp,
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        Ok(())
    }

    /// OHLC ordering: low <= open, close <= high.
    pub fn is_sane(&self) -> bool {
        self.low <= self.open.min(self.close) && self.open.max(self.close) <= self.high
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
