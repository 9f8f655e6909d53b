//! Backtest driver: replays a materialized candle sequence through a fresh simulation.

use super::intent::{IntentSink, NullSink};
use super::simulation::{BacktestOutcome, Simulation};
use crate::config::{ConfigError, StrategyConfig};
use crate::domain::Candle;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("invalid strategy config: {0}")]
    Config(#[from] ConfigError),

    #[error("cross-series correlation requires a secondary candle series")]
    MissingSecondary,

    #[error("secondary series has {secondary} candles but primary has {primary}")]
    LengthMismatch { primary: usize, secondary: usize },

    #[error("run cancelled before step {step}")]
    Cancelled { step: usize },
}

/// Run `config` over `candles` in chronological order.
///
/// `secondary` must be supplied (and aligned by index) when the config uses
/// cross-series correlation; it is ignored otherwise. The cancellation flag
/// is checked between steps.
pub fn run_backtest(
    config: &StrategyConfig,
    candles: &[Candle],
    secondary: Option<&[Candle]>,
    cancel: Option<&AtomicBool>,
    sink: &mut dyn IntentSink,
) -> Result<BacktestOutcome, SimulationError> {
    let mut sim = Simulation::new(config.clone())?;

    let secondary = if config.requires_secondary() {
        let series = secondary.ok_or(SimulationError::MissingSecondary)?;
        if series.len() != candles.len() {
            return Err(SimulationError::LengthMismatch {
                primary: candles.len(),
                secondary: series.len(),
            });
        }
        Some(series)
    } else {
        None
    };

    for (i, candle) in candles.iter().enumerate() {
        if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            debug!(step = i, "backtest cancelled");
            return Err(SimulationError::Cancelled { step: i });
        }
        let paired = secondary.map(|series| series[i]);
        sim.step(*candle, paired, sink);
        if sim.state().is_halted() {
            break;
        }
    }

    Ok(sim.finish(sink))
}

/// [`run_backtest`] without cancellation, discarding order intents.
pub fn backtest(
    config: &StrategyConfig,
    candles: &[Candle],
    secondary: Option<&[Candle]>,
) -> Result<BacktestOutcome, SimulationError> {
    run_backtest(config, candles, secondary, None, &mut NullSink)
}
