use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a strategy instance in a [`StrategyDesk`](crate::engine::StrategyDesk) arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StrategyId(pub usize);

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "strategy-{}", self.0)
    }
}
