//! Single-asset trend rules: trend strength gate plus price vs moving average.

use super::{Signal, SignalKind, SignalMachine};
use crate::domain::PositionSide;
use crate::indicators::IndicatorSnapshot;

#[derive(Debug, Clone)]
pub struct TrendMachine {
    strength_threshold: f64,
}

impl TrendMachine {
    pub fn new(strength_threshold: f64) -> Self {
        Self { strength_threshold }
    }
}

impl SignalMachine for TrendMachine {
    fn name(&self) -> &str {
        "trend"
    }

    /// Open positions are handled by the simulator: a same-side signal is
    /// ignored and an opposite-side signal closes the position.
    fn evaluate(&self, snap: &IndicatorSnapshot, _open: Option<PositionSide>) -> Signal {
        let (Some(ma), Some(strength)) = (snap.moving_average, snap.trend_strength) else {
            return Signal::hold("trend indicators warming up", Some(*snap));
        };
        let values = format!("close={:.4}, ema={ma:.4}, adx={strength:.2}", snap.close);

        if strength <= self.strength_threshold {
            return Signal::hold(
                format!("trend strength at or below {:.1} ({values})", self.strength_threshold),
                Some(*snap),
            );
        }

        let confidence = (strength / 100.0).clamp(0.0, 1.0);
        let kind = if snap.close > ma {
            SignalKind::OpenLong
        } else if snap.close < ma {
            SignalKind::OpenShort
        } else {
            return Signal::hold(format!("price on moving average ({values})"), Some(*snap));
        };

        Signal {
            kind,
            confidence,
            reason: format!("strong trend ({values})"),
            snapshot: Some(*snap),
        }
    }
}
