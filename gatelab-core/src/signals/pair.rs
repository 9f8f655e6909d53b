//! Pair (spread mean-reversion) rules with entry/exit hysteresis.

use super::{Signal, SignalKind, SignalMachine};
use crate::domain::PositionSide;
use crate::indicators::IndicatorSnapshot;

pub const ENTRY_CONFIDENCE: f64 = 0.9;
pub const EXIT_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone)]
pub struct PairMachine {
    entry_threshold: f64,
    exit_threshold: f64,
    min_correlation: f64,
}

impl PairMachine {
    pub fn new(entry_threshold: f64, exit_threshold: f64, min_correlation: f64) -> Self {
        Self {
            entry_threshold,
            exit_threshold,
            min_correlation,
        }
    }
}

impl SignalMachine for PairMachine {
    fn name(&self) -> &str {
        "pair"
    }

    fn evaluate(&self, snap: &IndicatorSnapshot, open: Option<PositionSide>) -> Signal {
        let z = snap.z_score;
        let corr = snap.correlation;
        let values = format!("z={z:.4}, corr={corr:.4}, hedge={:.4}", snap.hedge_ratio);

        let signal = |kind, confidence, reason: String| Signal {
            kind,
            confidence,
            reason,
            snapshot: Some(*snap),
        };

        match open {
            None => {
                if corr < self.min_correlation {
                    return Signal::hold(
                        format!("correlation below {:.2} ({values})", self.min_correlation),
                        Some(*snap),
                    );
                }
                if z < -self.entry_threshold {
                    signal(
                        SignalKind::LongPair,
                        ENTRY_CONFIDENCE,
                        format!("spread below -{:.2} ({values})", self.entry_threshold),
                    )
                } else if z > self.entry_threshold {
                    signal(
                        SignalKind::ShortPair,
                        ENTRY_CONFIDENCE,
                        format!("spread above {:.2} ({values})", self.entry_threshold),
                    )
                } else {
                    Signal::hold(format!("spread inside entry band ({values})"), Some(*snap))
                }
            }
            Some(_) if z.abs() < self.exit_threshold => signal(
                SignalKind::ExitPair,
                EXIT_CONFIDENCE,
                format!("spread reverted inside {:.2} ({values})", self.exit_threshold),
            ),
            Some(_) => Signal::hold(format!("holding position ({values})"), Some(*snap)),
        }
    }
}
