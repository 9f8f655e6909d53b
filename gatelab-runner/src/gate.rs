//! Deployment gate: the approve/reject decision for a strategy.
//!
//! Hard checks:
//! - **Tests:** the external test run passed.
//! - **Coverage:** external code coverage meets the floor.
//! - **Survival:** aggregate stress survival rate meets the `[survival]` floor
//!   the batch was judged against, so `stress` and `gate` always agree.
//! - **Backtest:** a baseline backtest exists; its metrics are hard checks
//!   only when a threshold is configured, informational otherwise.
//!
//! Every input is optional at the type level so that a missing one is
//! visible: it becomes a `Missing` check, which fails the gate.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ThresholdError;
use crate::metrics::PerformanceMetrics;
use crate::survival::SurvivalSummary;

// ─── Configuration ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GateCriteria {
    /// Fraction in [0, 1].
    #[serde(default = "default_min_coverage")]
    pub min_coverage: f64,
    #[serde(default)]
    pub min_win_rate: Option<f64>,
    #[serde(default)]
    pub min_profit_factor: Option<f64>,
    #[serde(default)]
    pub min_sharpe: Option<f64>,
    /// Largest acceptable backtest drawdown fraction.
    #[serde(default)]
    pub max_drawdown: Option<f64>,
}

fn default_min_coverage() -> f64 {
    0.8
}

impl Default for GateCriteria {
    fn default() -> Self {
        Self {
            min_coverage: default_min_coverage(),
            min_win_rate: None,
            min_profit_factor: None,
            min_sharpe: None,
            max_drawdown: None,
        }
    }
}

impl GateCriteria {
    pub fn validate(&self) -> Result<(), ThresholdError> {
        for (field, value) in [
            ("gate.min_coverage", Some(self.min_coverage)),
            ("gate.min_win_rate", self.min_win_rate),
            ("gate.max_drawdown", self.max_drawdown),
        ] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(ThresholdError::OutOfRange {
                        field,
                        range: "[0, 1]",
                        value: v,
                    });
                }
            }
        }
        for (field, value) in [
            ("gate.min_profit_factor", self.min_profit_factor),
            ("gate.min_sharpe", self.min_sharpe),
        ] {
            if let Some(v) = value.filter(|v| !v.is_finite()) {
                return Err(ThresholdError::NonFinite { field, value: v });
            }
        }
        Ok(())
    }
}

/// Everything the gate may be given. `None` means "not available".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GateInputs {
    pub tests_passed: Option<bool>,
    /// Coverage fraction in [0, 1].
    pub coverage: Option<f64>,
    pub backtest: Option<PerformanceMetrics>,
    pub survival: Option<SurvivalSummary>,
}

// ─── Result types ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Fail,
    /// Input unavailable; counts as a failure.
    Missing,
    /// Reported but not gating.
    Informational,
}

impl CheckStatus {
    pub fn is_hard(self) -> bool {
        self != CheckStatus::Informational
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CheckStatus::Pass => "PASS",
            CheckStatus::Fail => "FAIL",
            CheckStatus::Missing => "MISSING",
            CheckStatus::Informational => "INFO",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutcome {
    pub criterion: String,
    pub status: CheckStatus,
    pub observed: Option<f64>,
    pub threshold: Option<f64>,
    pub reason: String,
}

impl CheckOutcome {
    fn new(
        criterion: &str,
        status: CheckStatus,
        observed: Option<f64>,
        threshold: Option<f64>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            criterion: criterion.to_string(),
            status,
            observed,
            threshold,
            reason: reason.into(),
        }
    }

    fn missing(criterion: &str, threshold: Option<f64>, reason: impl Into<String>) -> Self {
        Self::new(criterion, CheckStatus::Missing, None, threshold, reason)
    }

    fn passed(&self) -> bool {
        self.status == CheckStatus::Pass
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessDecision {
    pub approved: bool,
    pub checks: Vec<CheckOutcome>,
    /// Passed hard checks over total hard checks.
    pub score: f64,
    /// `criterion: reason` for every hard check that did not pass.
    pub unmet: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ReadinessDecision {
    /// Process exit status: 0 to deploy, 1 to block.
    pub fn exit_code(&self) -> u8 {
        if self.approved {
            0
        } else {
            1
        }
    }
}

// ─── Evaluation ──────────────────────────────────────────────────────

pub fn evaluate_gate(inputs: &GateInputs, criteria: &GateCriteria) -> ReadinessDecision {
    let mut checks = vec![
        tests_check(inputs.tests_passed),
        coverage_check(inputs.coverage, criteria.min_coverage),
        survival_check(inputs.survival.as_ref()),
    ];
    checks.extend(backtest_checks(inputs.backtest.as_ref(), criteria));

    let hard: Vec<&CheckOutcome> = checks.iter().filter(|c| c.status.is_hard()).collect();
    let passed = hard.iter().filter(|c| c.passed()).count();
    let score = if hard.is_empty() {
        0.0
    } else {
        passed as f64 / hard.len() as f64
    };
    let failing: Vec<&CheckOutcome> = hard.into_iter().filter(|c| !c.passed()).collect();
    let unmet = failing
        .iter()
        .map(|c| format!("{}: {}", c.criterion, c.reason))
        .collect();
    let recommendations = failing.iter().map(|c| recommendation(c)).collect();

    ReadinessDecision {
        approved: failing.is_empty() && passed > 0,
        checks,
        score,
        unmet,
        recommendations,
    }
}

fn tests_check(tests_passed: Option<bool>) -> CheckOutcome {
    match tests_passed {
        None => CheckOutcome::missing("tests", None, "test results not provided"),
        Some(true) => CheckOutcome::new("tests", CheckStatus::Pass, None, None, "all tests passed"),
        Some(false) => CheckOutcome::new("tests", CheckStatus::Fail, None, None, "test run failed"),
    }
}

fn coverage_check(coverage: Option<f64>, min: f64) -> CheckOutcome {
    match coverage {
        Some(c) if c.is_finite() => {
            let status = if c >= min {
                CheckStatus::Pass
            } else {
                CheckStatus::Fail
            };
            let op = if c >= min { ">=" } else { "<" };
            CheckOutcome::new(
                "coverage",
                status,
                Some(c),
                Some(min),
                format!("{:.1}% {op} {:.1}%", c * 100.0, min * 100.0),
            )
        }
        Some(c) => CheckOutcome::missing("coverage", Some(min), format!("coverage value {c} is not a number")),
        None => CheckOutcome::missing("coverage", Some(min), "coverage not provided"),
    }
}

fn survival_check(survival: Option<&SurvivalSummary>) -> CheckOutcome {
    let Some(summary) = survival else {
        return CheckOutcome::missing("survival_rate", None, "stress tests not run");
    };
    let min = summary.min_survival_rate;
    let Some(rate) = summary.survival_rate else {
        return CheckOutcome::missing(
            "survival_rate",
            Some(min),
            format!("no scenario completed ({} incomplete)", summary.incomplete),
        );
    };
    let status = if summary.eligible {
        CheckStatus::Pass
    } else {
        CheckStatus::Fail
    };
    let mut reason = format!(
        "{}/{} scenarios survived ({:.1}% vs {:.1}%)",
        summary.survived,
        summary.completed,
        rate * 100.0,
        min * 100.0
    );
    if summary.incomplete > 0 {
        reason.push_str(&format!(", {} incomplete", summary.incomplete));
    }
    CheckOutcome::new("survival_rate", status, Some(rate), Some(min), reason)
}

/// At-least / at-most comparison for one backtest metric.
fn metric_check(
    criterion: &str,
    observed: f64,
    threshold: Option<f64>,
    higher_is_better: bool,
) -> CheckOutcome {
    let Some(t) = threshold else {
        return CheckOutcome::new(
            criterion,
            CheckStatus::Informational,
            Some(observed),
            None,
            format!("{observed:.4} (no threshold)"),
        );
    };
    if !observed.is_finite() {
        return CheckOutcome::missing(criterion, Some(t), "metric is not a number");
    }
    let ok = if higher_is_better {
        observed >= t
    } else {
        observed <= t
    };
    let op = match (higher_is_better, ok) {
        (true, true) => ">=",
        (true, false) => "<",
        (false, true) => "<=",
        (false, false) => ">",
    };
    let status = if ok { CheckStatus::Pass } else { CheckStatus::Fail };
    CheckOutcome::new(
        criterion,
        status,
        Some(observed),
        Some(t),
        format!("{observed:.4} {op} {t:.4}"),
    )
}

fn backtest_checks(metrics: Option<&PerformanceMetrics>, criteria: &GateCriteria) -> Vec<CheckOutcome> {
    let Some(m) = metrics else {
        let mut checks = vec![CheckOutcome::missing("backtest", None, "baseline backtest not run")];
        for (name, threshold) in [
            ("win_rate", criteria.min_win_rate),
            ("profit_factor", criteria.min_profit_factor),
            ("sharpe", criteria.min_sharpe),
            ("max_drawdown", criteria.max_drawdown),
        ] {
            if threshold.is_some() {
                checks.push(CheckOutcome::missing(name, threshold, "baseline backtest not run"));
            }
        }
        return checks;
    };
    vec![
        CheckOutcome::new(
            "backtest",
            CheckStatus::Pass,
            Some(m.trade_count as f64),
            None,
            format!("{} trades, total return {:.2}%", m.trade_count, m.total_return * 100.0),
        ),
        metric_check("win_rate", m.win_rate, criteria.min_win_rate, true),
        metric_check("profit_factor", m.profit_factor, criteria.min_profit_factor, true),
        metric_check("sharpe", m.sharpe, criteria.min_sharpe, true),
        metric_check("max_drawdown", m.max_drawdown, criteria.max_drawdown, false),
    ]
}

fn recommendation(check: &CheckOutcome) -> String {
    let missing = check.status == CheckStatus::Missing;
    match (check.criterion.as_str(), missing) {
        ("tests", true) => "Run the test suite and pass its result to the gate.".into(),
        ("tests", false) => "Fix failing tests before deployment.".into(),
        ("coverage", true) => "Collect code coverage and pass it to the gate.".into(),
        ("coverage", false) => "Add tests for uncovered paths to raise coverage.".into(),
        ("survival_rate", true) => {
            "Configure stress scenarios and make sure at least one completes.".into()
        }
        ("survival_rate", false) => {
            "Reduce risk per trade or add stop-losses to survive stress scenarios.".into()
        }
        ("backtest", _) => "Supply candle data so the baseline backtest can run.".into(),
        ("win_rate", false) => "Tighten entry thresholds to improve the win rate.".into(),
        ("profit_factor", false) => "Cut losing trades earlier or let winners run longer.".into(),
        ("sharpe", false) => "Reduce return volatility relative to mean return.".into(),
        ("max_drawdown", false) => "Lower position size or add a stop-loss to limit drawdown.".into(),
        (name, _) => format!("Provide data for {name}."),
    }
}
