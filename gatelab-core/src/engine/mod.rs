//! Backtest engine: step function, drivers, and order-intent emission.

pub mod backtest;
pub mod desk;
pub mod failure;
pub mod intent;
pub mod simulation;

pub use backtest::{backtest, run_backtest, SimulationError};
pub use desk::{DeskError, FeedTick, StrategyDesk};
pub use failure::{StepFailure, StepFailureKind};
pub use intent::{
    ChannelSink, IntentSink, Leg, NullSink, OrderIntent, OrderSide, OrderType, RecordingSink,
};
pub use simulation::{BacktestOutcome, RunState, SignalRecord, Simulation};
