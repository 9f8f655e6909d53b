//! Position Sizer: converts an entry signal and available capital into leg sizes.
//!
//! Sizers are portfolio-aware (they read available capital) but never decide
//! entry or exit; that belongs to the signal machine.

use crate::config::PortfolioConfig;
use crate::signals::SignalKind;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    #[error("{leg} entry price must be positive and finite, got {price}")]
    InvalidPrice { leg: &'static str, price: f64 },

    #[error("hedge ratio must be finite and non-zero, got {0}")]
    InvalidHedgeRatio(f64),

    #[error("sized notional {notional:.2} exceeds available capital {available:.2}")]
    ExceedsCapital { notional: f64, available: f64 },
}

/// Leg sizes for one entry. All zero means "do nothing".
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sizing {
    pub notional: f64,
    pub primary_size: f64,
    pub secondary_size: f64,
}

impl Sizing {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.primary_size == 0.0 && self.secondary_size == 0.0
    }
}

/// Prices and hedge ratio at the entry candle.
#[derive(Debug, Clone, Copy)]
pub struct EntryQuote {
    pub primary_price: f64,
    pub secondary_price: f64,
    pub hedge_ratio: f64,
}

#[derive(Debug, Clone)]
pub struct PositionSizer {
    risk_per_trade: f64,
    min_notional: f64,
}

impl PositionSizer {
    pub fn new(risk_per_trade: f64, min_notional: f64) -> Self {
        Self {
            risk_per_trade,
            min_notional,
        }
    }

    pub fn from_config(config: &PortfolioConfig) -> Self {
        Self::new(config.risk_per_trade, config.min_notional)
    }

    pub fn size(
        &self,
        kind: SignalKind,
        available_capital: f64,
        quote: EntryQuote,
    ) -> Result<Sizing, SizingError> {
        if !kind.is_entry() || available_capital < self.min_notional {
            return Ok(Sizing::zero());
        }

        let notional = available_capital * self.risk_per_trade;
        check_price("primary", quote.primary_price)?;

        let sizing = match kind {
            SignalKind::LongPair | SignalKind::ShortPair => {
                check_price("secondary", quote.secondary_price)?;
                let h = quote.hedge_ratio;
                if !h.is_finite() || h == 0.0 {
                    return Err(SizingError::InvalidHedgeRatio(h));
                }
                let half = notional / 2.0;
                Sizing {
                    notional,
                    primary_size: half / quote.primary_price,
                    secondary_size: half * h.abs() / quote.secondary_price,
                }
            }
            _ => Sizing {
                notional,
                primary_size: notional / quote.primary_price,
                secondary_size: 0.0,
            },
        };

        if notional > available_capital * (1.0 + 1e-12) {
            return Err(SizingError::ExceedsCapital {
                notional,
                available: available_capital,
            });
        }
        Ok(sizing)
    }
}

fn check_price(leg: &'static str, price: f64) -> Result<(), SizingError> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(SizingError::InvalidPrice { leg, price })
    }
}
