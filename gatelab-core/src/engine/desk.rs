//! StrategyDesk: an arena of live strategy instances fed by an external candle producer.
//!
//! Each slot owns its immutable config and its run state. Slots are indexed
//! by [`StrategyId`]; a slot holds at most one open position because its
//! ledger does.

use super::intent::IntentSink;
use super::simulation::{BacktestOutcome, Simulation};
use crate::config::{ConfigError, StrategyConfig};
use crate::domain::{Candle, Position, StrategyId};
use crate::signals::Signal;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("unknown strategy {0}")]
    UnknownStrategy(StrategyId),

    #[error("invalid config for {id}: {source}")]
    Config {
        id: StrategyId,
        #[source]
        source: ConfigError,
    },
}

/// One pushed observation: the symbol's candle plus the aligned hedge candle, if any.
#[derive(Debug, Clone, Copy)]
pub struct FeedTick<'a> {
    pub symbol: &'a str,
    pub primary: Candle,
    pub secondary: Option<Candle>,
}

pub struct StrategyDesk<S: IntentSink> {
    slots: Vec<Option<Simulation>>,
    sink: S,
}

impl<S: IntentSink> StrategyDesk<S> {
    pub fn new(sink: S) -> Self {
        Self {
            slots: Vec::new(),
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Validate `config` and start a fresh run for it in a new slot.
    pub fn add(&mut self, config: StrategyConfig) -> Result<StrategyId, ConfigError> {
        let id = StrategyId(self.slots.len());
        let sim = Simulation::with_id(id, config)?;
        self.slots.push(Some(sim));
        Ok(id)
    }

    pub fn get(&self, id: StrategyId) -> Option<&Simulation> {
        self.slots.get(id.0).and_then(|slot| slot.as_ref())
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop an instance, closing any open position at its last price.
    pub fn remove(&mut self, id: StrategyId) -> Result<BacktestOutcome, DeskError> {
        let sim = self
            .slots
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or(DeskError::UnknownStrategy(id))?;
        Ok(sim.finish(&mut self.sink))
    }

    /// Finish the current run of `id` and start a fresh one under `config`.
    ///
    /// The old run's outcome is returned; the new run starts with an empty
    /// window and ledger.
    pub fn replace_config(
        &mut self,
        id: StrategyId,
        config: StrategyConfig,
    ) -> Result<BacktestOutcome, DeskError> {
        let fresh = Simulation::with_id(id, config).map_err(|source| DeskError::Config { id, source })?;
        let slot = self
            .slots
            .get_mut(id.0)
            .filter(|slot| slot.is_some())
            .ok_or(DeskError::UnknownStrategy(id))?;
        let previous = slot.replace(fresh).ok_or(DeskError::UnknownStrategy(id))?;
        info!(strategy = %id, "configuration replaced, fresh run started");
        Ok(previous.finish(&mut self.sink))
    }

    /// Step every instance trading `tick.symbol`.
    pub fn push(&mut self, tick: FeedTick<'_>) -> Vec<(StrategyId, Signal)> {
        let mut signals = Vec::new();
        for sim in self.slots.iter_mut().flatten() {
            if sim.config().symbol == tick.symbol {
                let signal = sim.step(tick.primary, tick.secondary, &mut self.sink);
                signals.push((sim.id(), signal));
            }
        }
        signals
    }

    /// Arena view of open positions keyed by instance.
    pub fn open_positions(&self) -> Vec<(StrategyId, &Position)> {
        self.slots
            .iter()
            .flatten()
            .filter_map(|sim| sim.position().map(|p| (sim.id(), p)))
            .collect()
    }
}
