use chrono::{Duration, TimeZone, Utc};
use gatelab_core::domain::{EquityPoint, ExitReason, PositionSide, StrategyId, Trade};
use gatelab_core::engine::{BacktestOutcome, StepFailure, StepFailureKind};
use gatelab_core::{CorrelationMode, StrategyConfig};
use gatelab_runner::{
    evaluate_survival, ScenarioKind, ScenarioOutcome, ScenarioSpec, SecondaryLeg, SurvivalLimits,
    SurvivalOptions, SurvivalResult,
};
use std::sync::atomic::AtomicBool;

/// One equity point per day, so each point is also a daily close.
fn daily_outcome(equity: &[f64], trades: Vec<Trade>) -> BacktestOutcome {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    BacktestOutcome {
        strategy: StrategyId(0),
        symbol: "TEST".into(),
        initial_capital: equity[0],
        trades,
        equity_curve: equity
            .iter()
            .enumerate()
            .map(|(i, &e)| EquityPoint {
                timestamp: start + Duration::days(i as i64),
                equity: e,
            })
            .collect(),
        signals: Vec::new(),
        failures: Vec::new(),
        avg_correlation: 0.0,
        steps: equity.len(),
        evaluated_steps: equity.len(),
        fees_paid: 0.0,
        halted: false,
    }
}

fn trade(realized_pnl: f64) -> Trade {
    let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    Trade {
        side: PositionSide::Long,
        entry_step: 0,
        entry_time: t,
        entry_price: 100.0,
        secondary_entry_price: None,
        exit_step: 1,
        exit_time: t,
        exit_price: 100.0,
        secondary_exit_price: None,
        exit_reason: ExitReason::Signal,
        primary_size: 1.0,
        secondary_size: 0.0,
        hedge_ratio: 1.0,
        gross_pnl: realized_pnl,
        fees: 0.0,
        realized_pnl,
    }
}

/// Linear slide from 100 to `last` in steps of 5, keeping each daily loss under 10%.
fn slide_to(last: f64) -> Vec<f64> {
    let mut curve: Vec<f64> = (0..10).map(|i| 100.0 - 5.0 * i as f64).collect();
    curve.push(last);
    curve
}

fn assess(outcome: &BacktestOutcome) -> SurvivalResult {
    SurvivalResult::assess(
        "synthetic",
        ScenarioKind::MarketCrash,
        outcome,
        &SurvivalLimits::default(),
    )
}

#[test]
fn exactly_fifty_percent_drawdown_fails() {
    let result = assess(&daily_outcome(&slide_to(50.0), Vec::new()));
    assert_eq!(result.max_drawdown, 0.5);
    assert!(result.var_95 < 0.10, "var {}", result.var_95);
    assert!(!result.survived);
    assert_eq!(result.failed_checks.len(), 1);
    assert!(result.failed_checks[0].contains("drawdown"));
}

#[test]
fn just_under_fifty_percent_drawdown_survives() {
    let result = assess(&daily_outcome(&slide_to(50.1), Vec::new()));
    assert!(result.max_drawdown < 0.5);
    assert!((result.max_drawdown - 0.499).abs() < 1e-12);
    assert!(result.survived, "failed: {:?}", result.failed_checks);
}

#[test]
fn large_daily_loss_fails_var() {
    let result = assess(&daily_outcome(&[100.0, 100.0, 80.0, 81.0], Vec::new()));
    assert!(result.var_95 >= 0.10);
    assert!(!result.survived);
    assert!(result.failed_checks.iter().any(|c| c.contains("VaR")));
}

#[test]
fn losing_streak_limit_is_inclusive() {
    let flat = [100.0; 5];
    let twenty: Vec<Trade> = (0..20).map(|_| trade(-1.0)).collect();
    assert!(assess(&daily_outcome(&flat, twenty)).survived);

    let twenty_one: Vec<Trade> = (0..21).map(|_| trade(-1.0)).collect();
    let result = assess(&daily_outcome(&flat, twenty_one));
    assert!(!result.survived);
    assert_eq!(result.longest_losing_streak, 21);
}

#[test]
fn sizing_violation_and_unrecovered_failure_fail() {
    let mut outcome = daily_outcome(&[100.0; 5], Vec::new());
    let t = outcome.equity_curve[0].timestamp;
    outcome.failures.push(StepFailure {
        step: 1,
        timestamp: t,
        kind: StepFailureKind::SizingViolation {
            reason: "exceeds capital".into(),
        },
        recovered: true,
    });
    outcome.failures.push(StepFailure {
        step: 2,
        timestamp: t,
        kind: StepFailureKind::NonFiniteEquity,
        recovered: false,
    });
    let result = assess(&outcome);
    assert_eq!(result.sizing_violations, 1);
    assert_eq!(result.unrecovered_failures, 1);
    assert_eq!(result.failed_checks.len(), 2);
    assert!(!result.survived);
}

#[test]
fn recovered_malformed_candle_does_not_fail() {
    let mut outcome = daily_outcome(&[100.0; 5], Vec::new());
    let t = outcome.equity_curve[0].timestamp;
    outcome.failures.push(StepFailure {
        step: 1,
        timestamp: t,
        kind: StepFailureKind::MalformedCandle {
            reason: "close is NaN".into(),
        },
        recovered: true,
    });
    assert!(assess(&outcome).survived);
}

fn batch() -> Vec<ScenarioSpec> {
    ScenarioKind::ALL
        .iter()
        .enumerate()
        .map(|(i, &kind)| ScenarioSpec::new(kind.label(), kind, 100.0, 240, 1000 + i as u64))
        .collect()
}

#[test]
fn parallel_matches_serial() {
    let config = StrategyConfig::pair("TEST");
    let limits = SurvivalLimits::default();
    let scenarios = batch();

    let serial = evaluate_survival(
        &config,
        &scenarios,
        &limits,
        &SurvivalOptions { threads: Some(1) },
        None,
    )
    .unwrap();
    let parallel = evaluate_survival(
        &config,
        &scenarios,
        &limits,
        &SurvivalOptions { threads: Some(4) },
        None,
    )
    .unwrap();
    let global = evaluate_survival(&config, &scenarios, &limits, &SurvivalOptions::default(), None)
        .unwrap();

    assert_eq!(serial, parallel);
    assert_eq!(serial, global);
    assert_eq!(serial.completed, 5);
    let names: Vec<&str> = serial.outcomes.iter().map(|o| o.scenario()).collect();
    assert_eq!(
        names,
        vec!["market_crash", "flash_crash", "high_volatility", "liquidity_crisis", "black_swan"]
    );
}

#[test]
fn failed_generation_is_incomplete_and_excluded() {
    let config = StrategyConfig::trend("TEST");
    let mut scenarios = batch();
    scenarios.push(ScenarioSpec::new("too-short", ScenarioKind::FlashCrash, 100.0, 10, 1));

    let summary = evaluate_survival(
        &config,
        &scenarios,
        &SurvivalLimits::default(),
        &SurvivalOptions::default(),
        None,
    )
    .unwrap();

    assert_eq!(summary.completed, 5);
    assert_eq!(summary.incomplete, 1);
    assert!(matches!(
        &summary.outcomes[5],
        ScenarioOutcome::Incomplete { reason, .. } if reason.contains("minimum")
    ));
    let rate = summary.survival_rate.unwrap();
    assert!((rate - summary.survived as f64 / 5.0).abs() < 1e-12);
    assert_eq!(summary.eligible, rate >= 0.8);
}

#[test]
fn cancelled_batch_is_all_incomplete() {
    let cancel = AtomicBool::new(true);
    let summary = evaluate_survival(
        &StrategyConfig::pair("TEST"),
        &batch(),
        &SurvivalLimits::default(),
        &SurvivalOptions::default(),
        Some(&cancel),
    )
    .unwrap();

    assert_eq!(summary.completed, 0);
    assert_eq!(summary.incomplete, 5);
    assert_eq!(summary.survival_rate, None);
    assert!(!summary.eligible);
    for outcome in &summary.outcomes {
        assert!(matches!(
            outcome,
            ScenarioOutcome::Incomplete { reason, .. } if reason.contains("cancelled")
        ));
    }
}

#[test]
fn cross_series_strategy_needs_secondary_leg() {
    let mut config = StrategyConfig::pair("ETH");
    config.secondary_symbol = Some("BTC".into());
    config.indicators.correlation_mode = CorrelationMode::CrossSeries;

    let without = ScenarioSpec::new("plain", ScenarioKind::HighVolatility, 100.0, 240, 3);
    let with = without
        .clone()
        .with_secondary(SecondaryLeg::default());
    let with = ScenarioSpec {
        name: "paired".into(),
        ..with
    };

    let summary = evaluate_survival(
        &config,
        &[without, with],
        &SurvivalLimits::default(),
        &SurvivalOptions::default(),
        None,
    )
    .unwrap();

    assert!(matches!(
        &summary.outcomes[0],
        ScenarioOutcome::Incomplete { reason, .. } if reason.contains("secondary")
    ));
    assert!(matches!(&summary.outcomes[1], ScenarioOutcome::Completed(_)));
    assert_eq!(summary.completed, 1);
}
