//! Signal State Machine: one discrete trade signal per evaluation step.
//!
//! Machines are stateless: the "state" is re-derived every step from the
//! indicator snapshot plus the side of the currently open position, if any.

pub mod pair;
pub mod trend;

use crate::config::SignalRules;
use crate::domain::PositionSide;
use crate::indicators::IndicatorSnapshot;
use serde::{Deserialize, Serialize};

pub use pair::PairMachine;
pub use trend::TrendMachine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalKind {
    Hold,
    LongPair,
    ShortPair,
    ExitPair,
    OpenLong,
    OpenShort,
}

impl SignalKind {
    pub fn is_entry(self) -> bool {
        matches!(
            self,
            SignalKind::LongPair | SignalKind::ShortPair | SignalKind::OpenLong | SignalKind::OpenShort
        )
    }

    /// Position side an entry signal opens.
    pub fn entry_side(self) -> Option<PositionSide> {
        match self {
            SignalKind::LongPair => Some(PositionSide::LongPair),
            SignalKind::ShortPair => Some(PositionSide::ShortPair),
            SignalKind::OpenLong => Some(PositionSide::Long),
            SignalKind::OpenShort => Some(PositionSide::Short),
            SignalKind::Hold | SignalKind::ExitPair => None,
        }
    }
}

/// A signal together with the indicator values that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    /// In [0, 1].
    pub confidence: f64,
    pub reason: String,
    pub snapshot: Option<IndicatorSnapshot>,
}

impl Signal {
    pub fn hold(reason: impl Into<String>, snapshot: Option<IndicatorSnapshot>) -> Self {
        Self {
            kind: SignalKind::Hold,
            confidence: 0.0,
            reason: reason.into(),
            snapshot,
        }
    }

    pub fn insufficient_history(have: usize, need: usize) -> Self {
        Self::hold(format!("insufficient history ({have}/{need} candles)"), None)
    }

    pub fn is_hold(&self) -> bool {
        self.kind == SignalKind::Hold
    }
}

/// Maps a snapshot and the open position's side to a signal.
pub trait SignalMachine: Send + Sync {
    fn name(&self) -> &str;

    fn evaluate(&self, snapshot: &IndicatorSnapshot, open: Option<PositionSide>) -> Signal;
}

/// Build the machine configured by `rules`.
pub fn build_machine(rules: &SignalRules) -> Box<dyn SignalMachine> {
    match *rules {
        SignalRules::Pair {
            entry_threshold,
            exit_threshold,
            min_correlation,
        } => Box::new(PairMachine::new(entry_threshold, exit_threshold, min_correlation)),
        SignalRules::Trend { strength_threshold } => Box::new(TrendMachine::new(strength_threshold)),
    }
}
