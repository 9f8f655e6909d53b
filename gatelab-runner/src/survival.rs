//! Survival evaluator: runs the strategy through every stress scenario.
//!
//! Scenarios are independent: each one generates its own candles and runs a
//! fresh simulation, so they fan out over rayon and are joined in input order
//! before the survival rate is computed.

use crate::config::ThresholdError;
use crate::metrics::{max_drawdown, total_return};
use crate::scenario::{generate, ScenarioKind, ScenarioSpec};
use crate::tail_metrics::TailMetrics;
use gatelab_core::engine::{run_backtest, BacktestOutcome, NullSink};
use gatelab_core::StrategyConfig;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::AtomicBool;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum SurvivalError {
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Thresholds a single scenario run must stay within.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalLimits {
    /// Drawdown at or above this fraction fails.
    #[serde(default = "default_max_drawdown")]
    pub max_drawdown: f64,
    /// 95% daily VaR at or above this fraction fails.
    #[serde(default = "default_max_daily_var")]
    pub max_daily_var_95: f64,
    #[serde(default = "default_max_losing_streak")]
    pub max_losing_streak: usize,
    /// Batch eligibility floor; the deployment gate reads the same value.
    #[serde(default = "default_min_survival_rate")]
    pub min_survival_rate: f64,
}

fn default_max_drawdown() -> f64 {
    0.5
}

fn default_max_daily_var() -> f64 {
    0.10
}

fn default_max_losing_streak() -> usize {
    20
}

fn default_min_survival_rate() -> f64 {
    0.8
}

impl Default for SurvivalLimits {
    fn default() -> Self {
        Self {
            max_drawdown: default_max_drawdown(),
            max_daily_var_95: default_max_daily_var(),
            max_losing_streak: default_max_losing_streak(),
            min_survival_rate: default_min_survival_rate(),
        }
    }
}

impl SurvivalLimits {
    pub fn validate(&self) -> Result<(), ThresholdError> {
        for (field, value) in [
            ("survival.max_drawdown", self.max_drawdown),
            ("survival.max_daily_var_95", self.max_daily_var_95),
        ] {
            if !(value.is_finite() && value > 0.0 && value <= 1.0) {
                return Err(ThresholdError::OutOfRange {
                    field,
                    range: "(0, 1]",
                    value,
                });
            }
        }
        if !(0.0..=1.0).contains(&self.min_survival_rate) {
            return Err(ThresholdError::OutOfRange {
                field: "survival.min_survival_rate",
                range: "[0, 1]",
                value: self.min_survival_rate,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SurvivalOptions {
    /// Dedicated pool size; `None` runs on the global rayon pool.
    pub threads: Option<usize>,
}

/// Verdict and risk figures for one completed scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalResult {
    pub scenario: String,
    pub kind: ScenarioKind,
    pub survived: bool,
    pub max_drawdown: f64,
    pub var_95: f64,
    pub var_99: f64,
    pub expected_shortfall_95: f64,
    pub total_return: f64,
    pub trade_count: usize,
    pub longest_losing_streak: usize,
    pub recovery_periods: Option<usize>,
    pub sizing_violations: usize,
    pub unrecovered_failures: usize,
    /// One line per predicate that failed; empty when survived.
    pub failed_checks: Vec<String>,
}

impl SurvivalResult {
    /// Apply the survival predicate to a finished run.
    pub fn assess(
        scenario: &str,
        kind: ScenarioKind,
        outcome: &BacktestOutcome,
        limits: &SurvivalLimits,
    ) -> Self {
        let equity = outcome.equity_values();
        let tail = TailMetrics::compute(outcome);
        let dd = max_drawdown(&equity);
        let sizing_violations = outcome.sizing_violations();
        let unrecovered_failures = outcome.unrecovered_failures();

        let mut failed_checks = Vec::new();
        if dd >= limits.max_drawdown {
            failed_checks.push(format!(
                "max drawdown {:.2}% >= {:.2}%",
                dd * 100.0,
                limits.max_drawdown * 100.0
            ));
        }
        if tail.var_95 >= limits.max_daily_var_95 {
            failed_checks.push(format!(
                "daily VaR(95) {:.2}% >= {:.2}%",
                tail.var_95 * 100.0,
                limits.max_daily_var_95 * 100.0
            ));
        }
        if tail.longest_losing_streak > limits.max_losing_streak {
            failed_checks.push(format!(
                "{} consecutive losing trades > {}",
                tail.longest_losing_streak, limits.max_losing_streak
            ));
        }
        if sizing_violations > 0 {
            failed_checks.push(format!("{sizing_violations} position-sizing violations"));
        }
        if unrecovered_failures > 0 {
            failed_checks.push(format!(
                "{unrecovered_failures} unrecovered computation failures"
            ));
        }

        Self {
            scenario: scenario.to_string(),
            kind,
            survived: failed_checks.is_empty(),
            max_drawdown: dd,
            var_95: tail.var_95,
            var_99: tail.var_99,
            expected_shortfall_95: tail.expected_shortfall_95,
            total_return: total_return(&equity),
            trade_count: outcome.trades.len(),
            longest_losing_streak: tail.longest_losing_streak,
            recovery_periods: tail.recovery_periods,
            sizing_violations,
            unrecovered_failures,
            failed_checks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScenarioOutcome {
    Completed(SurvivalResult),
    /// Generation failed or the run was cancelled; excluded from the rate.
    Incomplete {
        scenario: String,
        kind: ScenarioKind,
        reason: String,
    },
}

impl ScenarioOutcome {
    pub fn scenario(&self) -> &str {
        match self {
            ScenarioOutcome::Completed(r) => &r.scenario,
            ScenarioOutcome::Incomplete { scenario, .. } => scenario,
        }
    }

    pub fn kind(&self) -> ScenarioKind {
        match self {
            ScenarioOutcome::Completed(r) => r.kind,
            ScenarioOutcome::Incomplete { kind, .. } => *kind,
        }
    }

    pub fn result(&self) -> Option<&SurvivalResult> {
        match self {
            ScenarioOutcome::Completed(r) => Some(r),
            ScenarioOutcome::Incomplete { .. } => None,
        }
    }

    pub fn survived(&self) -> bool {
        self.result().is_some_and(|r| r.survived)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurvivalSummary {
    pub outcomes: Vec<ScenarioOutcome>,
    pub survived: usize,
    pub completed: usize,
    pub incomplete: usize,
    /// survived / completed; `None` when nothing completed.
    pub survival_rate: Option<f64>,
    /// Floor the rate was judged against.
    pub min_survival_rate: f64,
    pub eligible: bool,
}

impl SurvivalSummary {
    pub fn from_outcomes(outcomes: Vec<ScenarioOutcome>, limits: &SurvivalLimits) -> Self {
        let completed = outcomes.iter().filter(|o| o.result().is_some()).count();
        let survived = outcomes.iter().filter(|o| o.survived()).count();
        let incomplete = outcomes.len() - completed;
        let survival_rate = (completed > 0).then(|| survived as f64 / completed as f64);
        let eligible = survival_rate.is_some_and(|r| r >= limits.min_survival_rate);
        Self {
            outcomes,
            survived,
            completed,
            incomplete,
            survival_rate,
            min_survival_rate: limits.min_survival_rate,
            eligible,
        }
    }
}

/// Drawdown predicate on a bare equity curve.
pub fn survives_curve(equity: &[f64], limits: &SurvivalLimits) -> bool {
    max_drawdown(equity) < limits.max_drawdown
}

/// Generate one scenario and run `config` through it.
pub fn evaluate_scenario(
    config: &StrategyConfig,
    spec: &ScenarioSpec,
    limits: &SurvivalLimits,
    cancel: Option<&AtomicBool>,
) -> ScenarioOutcome {
    let incomplete = |reason: String| {
        warn!(scenario = %spec.name, kind = %spec.kind, %reason, "scenario incomplete");
        ScenarioOutcome::Incomplete {
            scenario: spec.name.clone(),
            kind: spec.kind,
            reason,
        }
    };

    let candles = match generate(spec) {
        Ok(c) => c,
        Err(e) => return incomplete(e.to_string()),
    };
    if config.requires_secondary() && candles.secondary.is_none() {
        return incomplete("cross-series strategy needs a scenario secondary leg".into());
    }

    let outcome = match run_backtest(
        config,
        &candles.primary,
        candles.secondary.as_deref(),
        cancel,
        &mut NullSink,
    ) {
        Ok(o) => o,
        Err(e) => return incomplete(e.to_string()),
    };

    let result = SurvivalResult::assess(&spec.name, spec.kind, &outcome, limits);
    info!(
        scenario = %spec.name,
        kind = %spec.kind,
        survived = result.survived,
        max_drawdown = result.max_drawdown,
        var_95 = result.var_95,
        trades = result.trade_count,
        "scenario evaluated"
    );
    ScenarioOutcome::Completed(result)
}

/// Run every scenario in parallel and aggregate the survival rate.
pub fn evaluate_survival(
    config: &StrategyConfig,
    scenarios: &[ScenarioSpec],
    limits: &SurvivalLimits,
    options: &SurvivalOptions,
    cancel: Option<&AtomicBool>,
) -> Result<SurvivalSummary, SurvivalError> {
    let run = || -> Vec<ScenarioOutcome> {
        scenarios
            .par_iter()
            .map(|spec| evaluate_scenario(config, spec, limits, cancel))
            .collect()
    };

    let outcomes = match options.threads {
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()?
            .install(run),
        None => run(),
    };

    let summary = SurvivalSummary::from_outcomes(outcomes, limits);
    info!(
        scenarios = scenarios.len(),
        survived = summary.survived,
        completed = summary.completed,
        incomplete = summary.incomplete,
        rate = ?summary.survival_rate,
        eligible = summary.eligible,
        "survival batch finished"
    );
    Ok(summary)
}
