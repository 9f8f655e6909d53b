//! gatelab CLI: backtest, stress and deployment-gate commands.
//!
//! Commands:
//! - `backtest`: run the configured strategy over a candle CSV
//! - `stress`: run every configured stress scenario and report survival
//! - `gate`: baseline backtest + stress + external inputs → approve/reject
//!
//! Reports go to stdout (or `--output`); logs go to stderr. `gate` exits 0 on
//! approve and 1 on reject.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gatelab_core::domain::Candle;
use gatelab_runner::{
    config_hash, export_equity_csv, export_trades_csv, generate, load_candles, render_summary,
    run_baseline, run_readiness, run_stress, save_report, write_candles, ReadinessInputs,
    RunConfig, StressReport,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "gatelab",
    about = "gatelab: pair/trend strategy backtests, stress survival and deployment gate"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured strategy over historical candles.
    Backtest {
        /// Path to the TOML run config.
        #[arg(long)]
        config: PathBuf,

        /// Primary candle CSV (timestamp,open,high,low,close,volume).
        #[arg(long)]
        candles: PathBuf,

        /// Secondary candle CSV for cross-series correlation.
        #[arg(long)]
        secondary: Option<PathBuf>,

        /// Write the metrics JSON here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write the trade tape as CSV.
        #[arg(long)]
        trades: Option<PathBuf>,

        /// Write the equity curve as CSV.
        #[arg(long)]
        equity: Option<PathBuf>,
    },
    /// Run every configured stress scenario.
    Stress {
        /// Path to the TOML run config.
        #[arg(long)]
        config: PathBuf,

        /// Worker threads for scenario fan-out (overrides the config).
        #[arg(long)]
        threads: Option<usize>,

        /// Write the survival JSON here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also write each scenario's generated candles as CSV into this directory.
        #[arg(long)]
        candles_dir: Option<PathBuf>,
    },
    /// Decide deployment readiness.
    Gate {
        /// Path to the TOML run config.
        #[arg(long)]
        config: PathBuf,

        /// Primary candle CSV for the baseline backtest.
        #[arg(long)]
        candles: Option<PathBuf>,

        /// Secondary candle CSV for cross-series correlation.
        #[arg(long)]
        secondary: Option<PathBuf>,

        /// Result of the external test run.
        #[arg(long)]
        tests_passed: Option<bool>,

        /// External code coverage in percent (0-100).
        #[arg(long)]
        coverage_pct: Option<f64>,

        /// Number of worker threads for scenario fan-out (overrides the config).
        #[arg(long)]
        threads: Option<usize>,

        /// Write the report JSON here instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Also write a Markdown rendering of the report.
        #[arg(long)]
        markdown: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Backtest {
            config,
            candles,
            secondary,
            output,
            trades,
            equity,
        } => run_backtest_cmd(&config, &candles, secondary.as_deref(), output, trades, equity),
        Commands::Stress {
            config,
            threads,
            output,
            candles_dir,
        } => run_stress_cmd(&config, threads, output, candles_dir),
        Commands::Gate {
            config,
            candles,
            secondary,
            tests_passed,
            coverage_pct,
            threads,
            output,
            markdown,
        } => run_gate_cmd(
            &config,
            candles.as_deref(),
            secondary.as_deref(),
            tests_passed,
            coverage_pct,
            threads,
            output,
            markdown,
        ),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: &Path, threads: Option<usize>) -> Result<RunConfig> {
    let mut config = RunConfig::load(path)
        .with_context(|| format!("failed to load run config {}", path.display()))?;
    if let Some(n) = threads {
        if n == 0 {
            bail!("--threads must be at least 1");
        }
        config.threads = Some(n);
    }
    Ok(config)
}

fn load_series(path: &Path) -> Result<Vec<Candle>> {
    let candles =
        load_candles(path).with_context(|| format!("failed to load candles {}", path.display()))?;
    info!(path = %path.display(), candles = candles.len(), "loaded candles");
    Ok(candles)
}

fn load_secondary(path: Option<&Path>) -> Result<Option<Vec<Candle>>> {
    path.map(load_series).transpose()
}

/// Write `text` to `path`, or print it when no path is given.
fn emit(text: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            std::fs::write(p, text).with_context(|| format!("failed to write {}", p.display()))?;
            info!(path = %p.display(), "wrote report");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn run_backtest_cmd(
    config_path: &Path,
    candles_path: &Path,
    secondary_path: Option<&Path>,
    output: Option<PathBuf>,
    trades: Option<PathBuf>,
    equity: Option<PathBuf>,
) -> Result<ExitCode> {
    let config = load_config(config_path, None)?;
    let candles = load_series(candles_path)?;
    let secondary = load_secondary(secondary_path)?;

    let (outcome, report) = run_baseline(&config, &candles, secondary.as_deref(), None)?;

    let json = serde_json::to_string_pretty(&report).context("failed to serialize metrics")?;
    emit(&json, output.as_deref())?;
    if let Some(path) = trades {
        emit(&export_trades_csv(&outcome.trades)?, Some(&path))?;
    }
    if let Some(path) = equity {
        emit(&export_equity_csv(&outcome.equity_curve)?, Some(&path))?;
    }
    Ok(ExitCode::SUCCESS)
}

fn run_stress_cmd(
    config_path: &Path,
    threads: Option<usize>,
    output: Option<PathBuf>,
    candles_dir: Option<PathBuf>,
) -> Result<ExitCode> {
    let config = load_config(config_path, threads)?;
    if config.scenarios.is_empty() {
        bail!("{} defines no [[scenarios]]", config_path.display());
    }

    if let Some(dir) = &candles_dir {
        dump_scenarios(&config, dir)?;
    }

    let summary = run_stress(&config, None)?;
    let hash = config_hash(&config).context("failed to hash run config")?;
    let report = StressReport::from_summary(&hash, &config.scenarios, &summary);
    let json =
        serde_json::to_string_pretty(&report).context("failed to serialize survival report")?;
    emit(&json, output.as_deref())?;

    if summary.eligible {
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(rate = ?summary.survival_rate, "survival rate below the deployment floor");
        Ok(ExitCode::from(1))
    }
}

fn dump_scenarios(config: &RunConfig, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    for spec in &config.scenarios {
        let out = match generate(spec) {
            Ok(out) => out,
            Err(e) => {
                warn!(scenario = %spec.name, error = %e, "skipping candle dump");
                continue;
            }
        };
        let path = dir.join(format!("{}.csv", spec.name));
        let file = std::fs::File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        write_candles(file, &out.primary)?;
        if let Some(secondary) = &out.secondary {
            let path = dir.join(format!("{}.secondary.csv", spec.name));
            let file = std::fs::File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            write_candles(file, secondary)?;
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_gate_cmd(
    config_path: &Path,
    candles_path: Option<&Path>,
    secondary_path: Option<&Path>,
    tests_passed: Option<bool>,
    coverage_pct: Option<f64>,
    threads: Option<usize>,
    output: Option<PathBuf>,
    markdown: Option<PathBuf>,
) -> Result<ExitCode> {
    let config = load_config(config_path, threads)?;
    let coverage = match coverage_pct {
        Some(pct) if !(0.0..=100.0).contains(&pct) => {
            bail!("--coverage-pct must be between 0 and 100, got {pct}")
        }
        Some(pct) => Some(pct / 100.0),
        None => None,
    };
    let candles = candles_path.map(load_series).transpose()?;
    let secondary = load_secondary(secondary_path)?;

    let inputs = ReadinessInputs {
        candles: candles.as_deref(),
        secondary: secondary.as_deref(),
        tests_passed,
        coverage,
    };
    let report = run_readiness(&config, &inputs, None)?;

    match &output {
        Some(path) => save_report(&report, path, markdown.as_deref())?,
        None => {
            emit(&gatelab_runner::export_json(&report)?, None)?;
            if let Some(md) = &markdown {
                emit(&gatelab_runner::render_markdown(&report), Some(md))?;
            }
        }
    }

    eprint!("{}", render_summary(&report.decision));
    for unmet in &report.decision.unmet {
        eprintln!("unmet: {unmet}");
    }
    Ok(ExitCode::from(report.decision.exit_code()))
}
