//! gatelab runner: stress scenarios, survival evaluation, deployment gate, reports.
//!
//! This crate builds on `gatelab-core` to provide:
//! - TOML run configuration and CSV candle loading
//! - Performance and tail-risk metrics over a finished run
//! - Deterministic stress scenario generation
//! - Parallel survival evaluation with cooperative cancellation
//! - The fail-closed deployment gate
//! - JSON and Markdown readiness reports

pub mod config;
pub mod feed;
pub mod gate;
pub mod metrics;
pub mod pipeline;
pub mod report;
pub mod scenario;
pub mod survival;
pub mod tail_metrics;

pub use config::{config_hash, RunConfig, RunConfigError, ThresholdError};
pub use feed::{load_candles, read_candles, write_candles, FeedError};
pub use gate::{
    evaluate_gate, CheckOutcome, CheckStatus, GateCriteria, GateInputs, ReadinessDecision,
};
pub use metrics::PerformanceMetrics;
pub use pipeline::{run_baseline, run_readiness, run_stress, PipelineError, ReadinessInputs};
pub use report::{
    export_equity_csv, export_json, export_trades_csv, import_json, render_markdown,
    render_summary, save_report, BacktestReport, ReadinessReport, ScenarioReport, StressReport,
};
pub use scenario::{
    generate, ScenarioCandles, ScenarioError, ScenarioKind, ScenarioSpec, SecondaryLeg,
};
pub use survival::{
    evaluate_scenario, evaluate_survival, survives_curve, ScenarioOutcome, SurvivalError,
    SurvivalLimits, SurvivalOptions, SurvivalResult, SurvivalSummary,
};
pub use tail_metrics::TailMetrics;
