//! Readiness pipeline: baseline backtest, stress survival, then the gate.

use std::sync::atomic::AtomicBool;

use gatelab_core::config::SCHEMA_VERSION;
use gatelab_core::domain::Candle;
use gatelab_core::engine::{run_backtest, BacktestOutcome, NullSink, SimulationError};
use thiserror::Error;
use tracing::info;

use crate::config::{config_hash, RunConfig};
use crate::gate::{evaluate_gate, GateInputs};
use crate::metrics::PerformanceMetrics;
use crate::report::{BacktestReport, ReadinessReport, ScenarioReport};
use crate::survival::{evaluate_survival, SurvivalError, SurvivalOptions, SurvivalSummary};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("baseline backtest failed: {0}")]
    Backtest(#[from] SimulationError),

    #[error("stress evaluation failed: {0}")]
    Survival(#[from] SurvivalError),

    #[error("failed to hash run config: {0}")]
    Hash(#[from] serde_json::Error),
}

/// External inputs to a readiness run. Anything left `None` fails its gate check.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadinessInputs<'a> {
    pub candles: Option<&'a [Candle]>,
    pub secondary: Option<&'a [Candle]>,
    pub tests_passed: Option<bool>,
    /// Coverage fraction in [0, 1].
    pub coverage: Option<f64>,
}

/// Run the configured strategy over historical candles.
pub fn run_baseline(
    config: &RunConfig,
    candles: &[Candle],
    secondary: Option<&[Candle]>,
    cancel: Option<&AtomicBool>,
) -> Result<(BacktestOutcome, BacktestReport), PipelineError> {
    let hash = config_hash(config)?;
    let outcome = run_backtest(&config.strategy, candles, secondary, cancel, &mut NullSink)?;
    let report = BacktestReport::from_outcome(&hash, &outcome);
    info!(
        symbol = %outcome.symbol,
        steps = outcome.steps,
        trades = outcome.trades.len(),
        total_return = report.metrics.total_return,
        "baseline backtest finished"
    );
    Ok((outcome, report))
}

/// Evaluate every configured scenario.
pub fn run_stress(
    config: &RunConfig,
    cancel: Option<&AtomicBool>,
) -> Result<SurvivalSummary, PipelineError> {
    let options = SurvivalOptions {
        threads: config.threads,
    };
    Ok(evaluate_survival(
        &config.strategy,
        &config.scenarios,
        &config.survival,
        &options,
        cancel,
    )?)
}

/// Full readiness run producing the report payload.
pub fn run_readiness(
    config: &RunConfig,
    inputs: &ReadinessInputs<'_>,
    cancel: Option<&AtomicBool>,
) -> Result<ReadinessReport, PipelineError> {
    let hash = config_hash(config)?;

    let backtest = match inputs.candles {
        Some(candles) => {
            let (outcome, _) = run_baseline(config, candles, inputs.secondary, cancel)?;
            Some(PerformanceMetrics::compute(&outcome))
        }
        None => None,
    };

    let survival = if config.scenarios.is_empty() {
        None
    } else {
        Some(run_stress(config, cancel)?)
    };
    let scenarios = survival
        .as_ref()
        .map(|s| ScenarioReport::collect(&config.scenarios, s))
        .unwrap_or_default();
    let survival_rate = survival.as_ref().and_then(|s| s.survival_rate);

    let gate_inputs = GateInputs {
        tests_passed: inputs.tests_passed,
        coverage: inputs.coverage,
        backtest: backtest.clone(),
        survival,
    };
    let decision = evaluate_gate(&gate_inputs, &config.gate);
    info!(
        approved = decision.approved,
        score = decision.score,
        unmet = decision.unmet.len(),
        "readiness decision"
    );

    Ok(ReadinessReport {
        schema_version: SCHEMA_VERSION,
        config_hash: hash,
        strategy: config.strategy.clone(),
        backtest,
        scenarios,
        survival_rate,
        decision,
    })
}
