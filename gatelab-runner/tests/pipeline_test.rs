use gatelab_runner::{
    export_json, generate, import_json, load_candles, run_baseline, run_readiness, save_report,
    write_candles, CheckStatus, ReadinessInputs, RunConfig, ScenarioKind, ScenarioSpec,
};
use std::path::Path;

const RUN_TOML: &str = r#"
[strategy]
symbol = "SOL"
lookback_period = 60

[strategy.indicators]
trend_period = 14

[strategy.signal]
type = "TREND"
strength_threshold = 20.0

[strategy.portfolio]
initial_capital = 25000.0
risk_per_trade = 0.05
stop_loss = 0.1

[[scenarios]]
name = "crash"
kind = "market_crash"
initial_price = 150.0
duration_periods = 480
seed = 11

[[scenarios]]
name = "flash"
kind = "flash_crash"
initial_price = 150.0
duration_periods = 96
seed = 12

[[scenarios]]
name = "broken"
kind = "liquidity_crisis"
initial_price = 150.0
duration_periods = 96
severity = 0.5
seed = 13

[survival]
min_survival_rate = 0.0
"#;

fn write_config(dir: &Path) -> RunConfig {
    let path = dir.join("run.toml");
    std::fs::write(&path, RUN_TOML).unwrap();
    RunConfig::load(&path).unwrap()
}

fn write_history(dir: &Path) -> std::path::PathBuf {
    let history = ScenarioSpec::new("history", ScenarioKind::HighVolatility, 150.0, 600, 77)
        .with_severity(1.0);
    let candles = generate(&history).unwrap().primary;
    let path = dir.join("sol.csv");
    let file = std::fs::File::create(&path).unwrap();
    write_candles(file, &candles).unwrap();
    path
}

#[test]
fn config_and_candles_load_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    assert_eq!(config.strategy.symbol, "SOL");
    assert_eq!(config.scenarios.len(), 3);

    let candles = load_candles(&write_history(dir.path())).unwrap();
    assert_eq!(candles.len(), 600);

    let (outcome, report) = run_baseline(&config, &candles, None, None).unwrap();
    assert_eq!(outcome.equity_curve.len(), 600);
    assert_eq!(report.steps, 600);
    assert_eq!(report.metrics.trade_count, outcome.trades.len());
}

#[test]
fn readiness_report_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let candles = load_candles(&write_history(dir.path())).unwrap();
    let inputs = ReadinessInputs {
        candles: Some(&candles),
        secondary: None,
        tests_passed: Some(true),
        coverage: Some(0.9),
    };

    let first = run_readiness(&config, &inputs, None).unwrap();
    let second = run_readiness(&config, &inputs, None).unwrap();
    assert_eq!(export_json(&first).unwrap(), export_json(&second).unwrap());
}

#[test]
fn full_run_approves_and_flags_incomplete_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());
    let candles = load_candles(&write_history(dir.path())).unwrap();
    let inputs = ReadinessInputs {
        candles: Some(&candles),
        secondary: None,
        tests_passed: Some(true),
        coverage: Some(0.9),
    };

    let report = run_readiness(&config, &inputs, None).unwrap();
    assert!(report.decision.approved, "unmet: {:?}", report.decision.unmet);
    assert!(report.backtest.is_some());
    assert_eq!(report.scenarios.len(), 3);
    assert_eq!(report.scenarios[2].name, "broken");
    assert!(report.scenarios[2].outcome.result().is_none());
    assert!(report.survival_rate.is_some());

    let json_path = dir.path().join("report.json");
    let md_path = dir.path().join("report.md");
    save_report(&report, &json_path, Some(&md_path)).unwrap();

    let loaded = import_json(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
    assert_eq!(loaded.config_hash, report.config_hash);
    assert_eq!(loaded.decision.approved, report.decision.approved);
    assert_eq!(loaded.scenarios.len(), 3);

    let md = std::fs::read_to_string(&md_path).unwrap();
    assert!(md.contains("**Decision: APPROVED**"));
    assert!(md.contains("| broken | liquidity_crisis | 0.5 | incomplete |"));
}

#[test]
fn missing_external_inputs_reject() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path());

    let report = run_readiness(&config, &ReadinessInputs::default(), None).unwrap();
    let d = &report.decision;
    assert!(!d.approved);
    assert_eq!(d.exit_code(), 1);
    for criterion in ["tests", "coverage", "backtest"] {
        let check = d.checks.iter().find(|c| c.criterion == criterion).unwrap();
        assert_eq!(check.status, CheckStatus::Missing, "{criterion}");
    }
    assert!(report.backtest.is_none());
}

#[test]
fn config_without_scenarios_cannot_pass_survival() {
    let config = RunConfig::from_toml_str("[strategy]\nsymbol = \"SOL\"\n").unwrap();
    let report = run_readiness(
        &config,
        &ReadinessInputs {
            tests_passed: Some(true),
            coverage: Some(1.0),
            ..ReadinessInputs::default()
        },
        None,
    )
    .unwrap();
    let survival = report
        .decision
        .checks
        .iter()
        .find(|c| c.criterion == "survival_rate")
        .unwrap();
    assert_eq!(survival.status, CheckStatus::Missing);
    assert!(report.scenarios.is_empty());
    assert!(!report.decision.approved);
}
