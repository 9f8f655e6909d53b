//! Reports: JSON payloads for CI consumers, Markdown for humans, CSV tapes.
//!
//! Report payloads carry a `schema_version` and the run config's hash but no
//! wall-clock time, so identical inputs serialize to identical bytes.
//! Unknown (newer) schema versions are rejected on load.

use std::path::Path;

use anyhow::{bail, Context, Result};
use gatelab_core::config::SCHEMA_VERSION;
use gatelab_core::domain::{EquityPoint, Trade};
use gatelab_core::engine::BacktestOutcome;
use gatelab_core::StrategyConfig;
use serde::{Deserialize, Serialize};

use crate::gate::{CheckStatus, ReadinessDecision};
use crate::metrics::PerformanceMetrics;
use crate::scenario::{ScenarioKind, ScenarioSpec};
use crate::survival::{ScenarioOutcome, SurvivalSummary};
use crate::tail_metrics::TailMetrics;

// ─── Payloads ───────────────────────────────────────────────────────

/// Scenario parameters alongside what happened when the strategy ran on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub name: String,
    pub kind: ScenarioKind,
    pub seed: u64,
    pub severity: f64,
    pub duration_periods: usize,
    pub outcome: ScenarioOutcome,
}

impl ScenarioReport {
    /// Pair specs with their outcomes; both are in input order.
    pub fn collect(specs: &[ScenarioSpec], summary: &SurvivalSummary) -> Vec<Self> {
        specs
            .iter()
            .zip(&summary.outcomes)
            .map(|(spec, outcome)| Self {
                name: spec.name.clone(),
                kind: spec.kind,
                seed: spec.seed,
                severity: spec.effective_severity(),
                duration_periods: spec.duration_periods,
                outcome: outcome.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadinessReport {
    pub schema_version: u32,
    pub config_hash: String,
    pub strategy: StrategyConfig,
    pub backtest: Option<PerformanceMetrics>,
    pub scenarios: Vec<ScenarioReport>,
    pub survival_rate: Option<f64>,
    pub decision: ReadinessDecision,
}

/// Baseline backtest payload for the `backtest` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub schema_version: u32,
    pub config_hash: String,
    pub symbol: String,
    pub steps: usize,
    pub evaluated_steps: usize,
    pub step_failures: usize,
    pub final_equity: f64,
    pub metrics: PerformanceMetrics,
    pub tail: TailMetrics,
}

impl BacktestReport {
    pub fn from_outcome(config_hash: &str, outcome: &BacktestOutcome) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            config_hash: config_hash.to_string(),
            symbol: outcome.symbol.clone(),
            steps: outcome.steps,
            evaluated_steps: outcome.evaluated_steps,
            step_failures: outcome.failures.len(),
            final_equity: outcome.final_equity(),
            metrics: PerformanceMetrics::compute(outcome),
            tail: TailMetrics::compute(outcome),
        }
    }
}

/// Survival batch payload for the `stress` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StressReport {
    pub schema_version: u32,
    pub config_hash: String,
    pub survival_rate: Option<f64>,
    pub survived: usize,
    pub completed: usize,
    pub incomplete: usize,
    pub eligible: bool,
    pub scenarios: Vec<ScenarioReport>,
}

impl StressReport {
    pub fn from_summary(
        config_hash: &str,
        specs: &[ScenarioSpec],
        summary: &SurvivalSummary,
    ) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            config_hash: config_hash.to_string(),
            survival_rate: summary.survival_rate,
            survived: summary.survived,
            completed: summary.completed,
            incomplete: summary.incomplete,
            eligible: summary.eligible,
            scenarios: ScenarioReport::collect(specs, summary),
        }
    }
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(report: &ReadinessReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize readiness report to JSON")
}

pub fn import_json(json: &str) -> Result<ReadinessReport> {
    let report: ReadinessReport =
        serde_json::from_str(json).context("failed to deserialize readiness report from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

/// Write the JSON report and, if asked, its Markdown rendering.
pub fn save_report(
    report: &ReadinessReport,
    json_path: &Path,
    markdown_path: Option<&Path>,
) -> Result<()> {
    let json = export_json(report)?;
    std::fs::write(json_path, json)
        .with_context(|| format!("failed to write {}", json_path.display()))?;
    if let Some(md_path) = markdown_path {
        std::fs::write(md_path, render_markdown(report))
            .with_context(|| format!("failed to write {}", md_path.display()))?;
    }
    Ok(())
}

// ─── CSV ────────────────────────────────────────────────────────────

/// Trade tape with both legs' prices.
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "side",
        "entry_step",
        "entry_time",
        "entry_price",
        "secondary_entry_price",
        "exit_step",
        "exit_time",
        "exit_price",
        "secondary_exit_price",
        "exit_reason",
        "primary_size",
        "secondary_size",
        "hedge_ratio",
        "gross_pnl",
        "fees",
        "realized_pnl",
    ])?;
    let opt = |v: Option<f64>| v.map(|p| format!("{p:.6}")).unwrap_or_default();
    for t in trades {
        wtr.write_record([
            format!("{:?}", t.side),
            t.entry_step.to_string(),
            t.entry_time.to_rfc3339(),
            format!("{:.6}", t.entry_price),
            opt(t.secondary_entry_price),
            t.exit_step.to_string(),
            t.exit_time.to_rfc3339(),
            format!("{:.6}", t.exit_price),
            opt(t.secondary_exit_price),
            format!("{:?}", t.exit_reason),
            format!("{:.6}", t.primary_size),
            format!("{:.6}", t.secondary_size),
            format!("{:.6}", t.hedge_ratio),
            format!("{:.2}", t.gross_pnl),
            format!("{:.2}", t.fees),
            format!("{:.2}", t.realized_pnl),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_equity_csv(curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["step", "timestamp", "equity"])?;
    for (i, p) in curve.iter().enumerate() {
        wtr.write_record([
            i.to_string(),
            p.timestamp.to_rfc3339(),
            format!("{:.2}", p.equity),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Markdown ───────────────────────────────────────────────────────

pub fn render_markdown(report: &ReadinessReport) -> String {
    let mut md = String::with_capacity(4096);
    let d = &report.decision;

    md.push_str("# Deployment Readiness Report\n\n");
    md.push_str(&format!(
        "**Decision: {}** (score {:.0}%)\n\n",
        if d.approved { "APPROVED" } else { "REJECTED" },
        d.score * 100.0
    ));

    md.push_str("## Metadata\n\n");
    md.push_str("| Field | Value |\n");
    md.push_str("| --- | --- |\n");
    md.push_str(&format!("| Symbol | {} |\n", report.strategy.symbol));
    if report.strategy.is_pair() {
        md.push_str(&format!("| Hedge Symbol | {} |\n", report.strategy.hedge_symbol()));
    }
    md.push_str(&format!(
        "| Strategy | {} |\n",
        if report.strategy.is_pair() { "pair" } else { "trend" }
    ));
    md.push_str(&format!(
        "| Lookback | {} |\n",
        report.strategy.lookback_period
    ));
    md.push_str(&format!(
        "| Initial Capital | ${:.0} |\n",
        report.strategy.portfolio.initial_capital
    ));
    md.push_str(&format!("| Config Hash | {} |\n", report.config_hash));
    md.push('\n');

    md.push_str("## Gate Checks\n\n");
    md.push_str("| Criterion | Status | Observed | Threshold | Detail |\n");
    md.push_str("| --- | --- | --- | --- | --- |\n");
    for c in &d.checks {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            c.criterion,
            c.status,
            fmt_opt(c.observed),
            fmt_opt(c.threshold),
            c.reason
        ));
    }
    md.push('\n');

    if !d.unmet.is_empty() {
        md.push_str("## Unmet Criteria\n\n");
        for (unmet, rec) in d.unmet.iter().zip(&d.recommendations) {
            md.push_str(&format!("- {unmet}. {rec}\n"));
        }
        md.push('\n');
    }

    if let Some(m) = &report.backtest {
        md.push_str("## Baseline Backtest\n\n");
        md.push_str("| Metric | Value |\n");
        md.push_str("| --- | --- |\n");
        md.push_str(&format!("| Total Return | {:.2}% |\n", m.total_return * 100.0));
        md.push_str(&format!("| Trades | {} |\n", m.trade_count));
        md.push_str(&format!("| Win Rate | {:.1}% |\n", m.win_rate * 100.0));
        md.push_str(&format!("| Profit Factor | {:.2} |\n", m.profit_factor));
        md.push_str(&format!("| Sharpe | {:.3} |\n", m.sharpe));
        md.push_str(&format!("| Sortino | {:.3} |\n", m.sortino));
        md.push_str(&format!("| Max Drawdown | {:.2}% |\n", m.max_drawdown * 100.0));
        md.push_str(&format!("| Avg Correlation | {:.3} |\n", m.avg_correlation));
        md.push_str(&format!(
            "| Max Consecutive Losses | {} |\n",
            m.max_consecutive_losses
        ));
        md.push_str(&format!("| Fees | ${:.2} |\n", m.total_fees));
        md.push('\n');
    }

    md.push_str("## Stress Scenarios\n\n");
    match report.survival_rate {
        Some(rate) => md.push_str(&format!("Survival rate: **{:.1}%**\n\n", rate * 100.0)),
        None => md.push_str("Survival rate: **n/a** (no scenario completed)\n\n"),
    }
    if report.scenarios.is_empty() {
        md.push_str("_No scenarios configured._\n");
        return md;
    }
    md.push_str("| Scenario | Kind | Severity | Result | Max DD | VaR 95 | Trades | Notes |\n");
    md.push_str("| --- | --- | --- | --- | --- | --- | --- | --- |\n");
    for s in &report.scenarios {
        match &s.outcome {
            ScenarioOutcome::Completed(r) => md.push_str(&format!(
                "| {} | {} | {} | {} | {:.2}% | {:.2}% | {} | {} |\n",
                s.name,
                s.kind,
                s.severity,
                if r.survived { "survived" } else { "failed" },
                r.max_drawdown * 100.0,
                r.var_95 * 100.0,
                r.trade_count,
                r.failed_checks.join("; ")
            )),
            ScenarioOutcome::Incomplete { reason, .. } => md.push_str(&format!(
                "| {} | {} | {} | incomplete | - | - | - | {} |\n",
                s.name, s.kind, s.severity, reason
            )),
        }
    }
    md
}

/// Short gate summary for terminal output.
pub fn render_summary(decision: &ReadinessDecision) -> String {
    let mut out = String::new();
    for c in &decision.checks {
        let marker = match c.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Informational => "--",
            CheckStatus::Fail | CheckStatus::Missing => "!!",
        };
        out.push_str(&format!("[{marker}] {:<14} {}\n", c.criterion, c.reason));
    }
    out.push_str(if decision.approved {
        "APPROVED\n"
    } else {
        "REJECTED\n"
    });
    out
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.4}")).unwrap_or_else(|| "-".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{evaluate_gate, GateCriteria, GateInputs};

    fn sample_report() -> ReadinessReport {
        let decision = evaluate_gate(&GateInputs::default(), &GateCriteria::default());
        ReadinessReport {
            schema_version: SCHEMA_VERSION,
            config_hash: "abc123".into(),
            strategy: StrategyConfig::pair("ETH"),
            backtest: None,
            scenarios: vec![ScenarioReport {
                name: "flash".into(),
                kind: ScenarioKind::FlashCrash,
                seed: 1,
                severity: 0.2,
                duration_periods: 10,
                outcome: ScenarioOutcome::Incomplete {
                    scenario: "flash".into(),
                    kind: ScenarioKind::FlashCrash,
                    reason: "too short".into(),
                },
            }],
            survival_rate: None,
            decision,
        }
    }

    #[test]
    fn json_round_trip_preserves_report() {
        let report = sample_report();
        let json = export_json(&report).unwrap();
        assert_eq!(import_json(&json).unwrap(), report);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let mut report = sample_report();
        report.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&report).unwrap();
        assert!(import_json(&json).is_err());
    }

    #[test]
    fn markdown_itemizes_checks_and_scenarios() {
        let md = render_markdown(&sample_report());
        assert!(md.contains("**Decision: REJECTED**"));
        assert!(md.contains("| tests | MISSING |"));
        assert!(md.contains("| flash | flash_crash | 0.2 | incomplete |"));
        assert!(md.contains("## Unmet Criteria"));
        assert!(md.contains("n/a"));
    }

    #[test]
    fn summary_marks_failures() {
        let text = render_summary(&sample_report().decision);
        assert!(text.contains("[!!] tests"));
        assert!(text.ends_with("REJECTED\n"));
    }

    #[test]
    fn trade_csv_has_header_only_when_empty() {
        let csv = export_trades_csv(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("side,entry_step"));
    }
}
