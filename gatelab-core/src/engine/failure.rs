//! Per-step computation failures recorded on a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepFailureKind {
    /// Candle rejected by validation; the step became a no-signal step.
    MalformedCandle { reason: String },
    /// An indicator came out NaN/infinite; the step was forced to HOLD.
    NonFiniteIndicator { field: String },
    /// The sizer refused an entry.
    SizingViolation { reason: String },
    /// Equity became NaN/infinite; the run stopped.
    NonFiniteEquity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: StepFailureKind,
    /// False when the run could not continue past this step.
    pub recovered: bool,
}

impl StepFailure {
    pub fn is_sizing_violation(&self) -> bool {
        matches!(self.kind, StepFailureKind::SizingViolation { .. })
    }
}
