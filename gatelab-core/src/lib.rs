//! gatelab core: candles, indicators, signal state machine, sizing, backtest simulator.
//!
//! This crate contains the strictly sequential part of the system:
//! - Domain types (candles, rolling window, positions, trades, ledger)
//! - Indicator engine (correlation, spread z-score, hedge ratio, EMA, ADX)
//! - Pair and trend signal machines
//! - Position sizer with a minimum notional floor
//! - Step-function simulator, backtest driver and multi-instance desk
//! - Order-intent sinks and the deterministic RNG hierarchy

pub mod config;
pub mod domain;
pub mod engine;
pub mod indicators;
pub mod rng;
pub mod signals;
pub mod sizers;

pub use config::{
    ConfigError, CorrelationMode, IndicatorParams, PortfolioConfig, SignalRules, StrategyConfig,
};
