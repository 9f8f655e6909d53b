//! Domain types for gatelab

pub mod candle;
pub mod ids;
pub mod ledger;
pub mod position;
pub mod trade;
pub mod window;

pub use candle::{Candle, CandleError};
pub use ids::StrategyId;
pub use ledger::{EquityPoint, ExitFill, LedgerError, PortfolioLedger};
pub use position::{pair_pnl, PairLegs, Position, PositionSide};
pub use trade::{ExitReason, Trade};
pub use window::RollingWindow;
