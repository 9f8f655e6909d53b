//! Integration tests for the backtest simulator.
//!
//! Tests:
//! 1. Flat-then-ramp fixture: exact transition index and side
//! 2. Warm-up: HOLD with confidence 0 before the window fills
//! 3. Malformed candles: rejected, recorded, run continues
//! 4. Trend strategy: entry, end-of-data close, stop-loss, commission
//! 5. Cross-series input validation and cooperative cancellation
//! 6. Order intents emitted on open and close

use chrono::{DateTime, Duration, TimeZone, Utc};
use gatelab_core::config::{CorrelationMode, StrategyConfig};
use gatelab_core::domain::{Candle, ExitReason, PositionSide};
use gatelab_core::engine::{
    backtest, run_backtest, NullSink, OrderSide, RecordingSink, SimulationError, StepFailureKind,
};
use gatelab_core::signals::SignalKind;
use std::sync::atomic::AtomicBool;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

/// Hourly candles from closes; open = previous close.
fn candles(closes: &[f64]) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Candle::new(
                start() + Duration::hours(i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
                1000.0,
            )
        })
        .collect()
}

fn flat_then_ramp() -> Vec<f64> {
    let mut closes = vec![100.0; 100];
    closes.extend((1..=30).map(|i| 100.0 + i as f64));
    closes
}

fn ramp(n: usize) -> Vec<f64> {
    (0..n).map(|i| 100.0 + i as f64).collect()
}

// ── 1. Flat then ramp ────────────────────────────────────────────────

#[test]
fn flat_then_ramp_transitions_at_first_ramp_candle() {
    let config = StrategyConfig::pair("TEST");
    let outcome = backtest(&config, &candles(&flat_then_ramp()), None).unwrap();

    assert_eq!(outcome.signals.len(), 130);
    for record in &outcome.signals[..100] {
        assert_eq!(record.kind, SignalKind::Hold, "step {}", record.step);
        assert_eq!(record.confidence, 0.0);
    }
    for record in &outcome.signals[..99] {
        assert!(record.reason.contains("insufficient history"), "step {}", record.step);
    }

    // Step 100: 19 zero differences and one +1 give z = sqrt(19), correlation 1.
    let transition = outcome.first_action().unwrap();
    assert_eq!(transition.step, 100);
    assert_eq!(transition.kind, SignalKind::ShortPair);
    assert_eq!(transition.confidence, 0.9);
}

#[test]
fn flat_then_ramp_exits_once_spread_normalizes() {
    let config = StrategyConfig::pair("TEST");
    let outcome = backtest(&config, &candles(&flat_then_ramp()), None).unwrap();

    let exit = outcome
        .signals
        .iter()
        .find(|s| s.kind == SignalKind::ExitPair)
        .unwrap();
    assert!((115..=116).contains(&exit.step), "exit at {}", exit.step);

    assert_eq!(outcome.trades.len(), 1);
    let trade = &outcome.trades[0];
    assert_eq!(trade.side, PositionSide::ShortPair);
    assert_eq!(trade.entry_step, 100);
    assert_eq!(trade.exit_reason, ExitReason::Signal);
    // Self-series hedge leg mirrors the primary leg.
    assert!(trade.realized_pnl.abs() < 1e-6);
    assert!((outcome.final_equity() - 100_000.0).abs() < 1e-6);
}

// ── 2. Warm-up ───────────────────────────────────────────────────────

#[test]
fn sequence_shorter_than_lookback_is_all_hold() {
    let closes: Vec<f64> = (0..99).map(|i| 100.0 + (i as f64 * 0.9).sin() * 5.0).collect();
    let outcome = backtest(&StrategyConfig::pair("TEST"), &candles(&closes), None).unwrap();

    assert!(outcome
        .signals
        .iter()
        .all(|s| s.kind == SignalKind::Hold && s.confidence == 0.0));
    assert!(outcome.trades.is_empty());
    assert_eq!(outcome.evaluated_steps, 0);
    assert_eq!(outcome.equity_curve.len(), 99);
}

#[test]
fn constant_prices_never_trade() {
    let outcome = backtest(&StrategyConfig::pair("TEST"), &candles(&[100.0; 200]), None).unwrap();
    assert!(outcome.signals.iter().all(|s| s.kind == SignalKind::Hold));
    assert!(outcome.trades.is_empty());
    assert_eq!(outcome.avg_correlation, 0.0);
    assert!(outcome.equity_values().iter().all(|&e| e == 100_000.0));
}

// ── 3. Malformed candles ─────────────────────────────────────────────

#[test]
fn malformed_candle_is_rejected_and_run_continues() {
    let mut series = candles(&flat_then_ramp());
    series[50].close = f64::NAN;
    series[60].volume = 0.0;
    let outcome = backtest(&StrategyConfig::pair("TEST"), &series, None).unwrap();

    assert_eq!(outcome.failures.len(), 2);
    assert!(outcome.failures.iter().all(|f| f.recovered));
    assert_eq!(outcome.failures[0].step, 50);
    assert!(outcome.signals[50].reason.contains("malformed"));
    assert_eq!(outcome.signals.len(), 130);
    assert_eq!(outcome.equity_curve.len(), 130);
    assert_eq!(outcome.unrecovered_failures(), 0);
    // Two rejected candles delay the first full window from step 99 to 101.
    let first = outcome.first_action().unwrap();
    assert_eq!(first.step, 101);
    assert_eq!(first.kind, SignalKind::ShortPair);
}

#[test]
fn reordered_and_duplicate_timestamps_are_rejected() {
    let mut series = candles(&ramp(120));
    series.swap(50, 51);
    series[60].timestamp = series[59].timestamp;
    let outcome = backtest(&StrategyConfig::trend("TEST"), &series, None).unwrap();

    let steps: Vec<usize> = outcome.failures.iter().map(|f| f.step).collect();
    assert_eq!(steps, vec![51, 60]);
    for failure in &outcome.failures {
        assert!(failure.recovered);
        assert!(matches!(
            &failure.kind,
            StepFailureKind::MalformedCandle { reason } if reason.contains("does not follow")
        ));
    }
    assert!(outcome.signals[51].reason.contains("malformed"));
    assert_eq!(outcome.equity_curve.len(), 120);
}

#[test]
fn inverted_candle_range_is_rejected() {
    let mut series = candles(&ramp(120));
    series[30].high = series[30].low - 1.0;
    let outcome = backtest(&StrategyConfig::trend("TEST"), &series, None).unwrap();

    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].step, 30);
    assert!(outcome.signals[30].reason.contains("inconsistent range"));
}

#[test]
fn rejected_secondary_candle_keeps_windows_aligned() {
    let mut config = StrategyConfig::pair("ETH");
    config.secondary_symbol = Some("BTC".into());
    config.indicators.correlation_mode = CorrelationMode::CrossSeries;
    let primary = candles(&flat_then_ramp());
    let mut secondary = primary.clone();
    secondary[40].timestamp = secondary[39].timestamp;

    let outcome = backtest(&config, &primary, Some(&secondary)).unwrap();
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].step, 40);
    assert!(outcome.signals[40].reason.contains("secondary"));
    // One step lost on both legs: the first full window moves from 99 to 100.
    assert!(outcome.signals[99].reason.contains("insufficient history"));
    assert!(!outcome.signals[100].reason.contains("insufficient history"));
}

// ── 4. Trend strategy ────────────────────────────────────────────────

#[test]
fn trend_long_is_closed_at_end_of_data() {
    let config = StrategyConfig::trend("TEST");
    let outcome = backtest(&config, &candles(&ramp(150)), None).unwrap();

    let first = outcome.first_action().unwrap();
    assert_eq!(first.step, 99);
    assert_eq!(first.kind, SignalKind::OpenLong);

    assert_eq!(outcome.trades.len(), 1);
    let trade = &outcome.trades[0];
    assert_eq!(trade.side, PositionSide::Long);
    assert_eq!(trade.exit_reason, ExitReason::EndOfData);
    assert_eq!(trade.exit_step, 149);
    assert!(trade.realized_pnl > 0.0);
    let expected = 100_000.0 + trade.realized_pnl;
    assert!((outcome.final_equity() - expected).abs() < 1e-6);
}

#[test]
fn stop_loss_closes_before_signal_evaluation() {
    let mut closes = ramp(150);
    closes.push(180.0);
    closes.push(181.0);
    let mut config = StrategyConfig::trend("TEST");
    config.portfolio.stop_loss = Some(0.05);

    let outcome = backtest(&config, &candles(&closes), None).unwrap();
    let trade = &outcome.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::StopLoss);
    assert_eq!(trade.exit_step, 150);
    assert!(trade.realized_pnl < 0.0);
}

#[test]
fn take_profit_closes_winning_trend() {
    let mut config = StrategyConfig::trend("TEST");
    config.portfolio.take_profit = Some(0.1);
    let outcome = backtest(&config, &candles(&ramp(150)), None).unwrap();

    let trade = &outcome.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
    // Entry at 199; first close at or above 218.9 is 219.
    assert_eq!(trade.exit_price, 219.0);
}

#[test]
fn limit_exit_step_records_hold() {
    let mut config = StrategyConfig::trend("TEST");
    config.portfolio.take_profit = Some(0.1);
    let outcome = backtest(&config, &candles(&ramp(150)), None).unwrap();

    let exit_step = outcome.trades[0].exit_step;
    let record = &outcome.signals[exit_step];
    assert_eq!(record.kind, SignalKind::Hold);
    assert_eq!(record.confidence, 0.0);
    assert!(record.reason.contains("closed by limit (take profit)"));
    // The machine still wants long; the entry happens on the next step.
    assert_eq!(outcome.signals[exit_step + 1].kind, SignalKind::OpenLong);
    assert_eq!(outcome.trades[1].entry_step, exit_step + 1);
}

#[test]
fn commission_is_charged_on_both_sides() {
    let mut config = StrategyConfig::trend("TEST");
    config.portfolio.commission_rate = 0.001;
    let outcome = backtest(&config, &candles(&ramp(150)), None).unwrap();

    let trade = &outcome.trades[0];
    assert!(trade.fees > 0.0);
    assert!((trade.realized_pnl - (trade.gross_pnl - trade.fees)).abs() < 1e-9);
    assert!((outcome.fees_paid - trade.fees).abs() < 1e-9);
}

// ── 5. Input validation and cancellation ─────────────────────────────

#[test]
fn cross_series_without_secondary_is_rejected() {
    let mut config = StrategyConfig::pair("ETH");
    config.indicators.correlation_mode = CorrelationMode::CrossSeries;
    let primary = candles(&ramp(120));

    assert!(matches!(
        backtest(&config, &primary, None),
        Err(SimulationError::MissingSecondary)
    ));
    assert!(matches!(
        backtest(&config, &primary, Some(&primary[..50])),
        Err(SimulationError::LengthMismatch {
            primary: 120,
            secondary: 50
        })
    ));
}

#[test]
fn invalid_config_fails_before_any_step() {
    let mut config = StrategyConfig::pair("TEST");
    config.lookback_period = 10;
    assert!(matches!(
        backtest(&config, &candles(&ramp(20)), None),
        Err(SimulationError::Config(_))
    ));
}

#[test]
fn cancelled_flag_stops_run() {
    let cancel = AtomicBool::new(true);
    let result = run_backtest(
        &StrategyConfig::pair("TEST"),
        &candles(&ramp(120)),
        None,
        Some(&cancel),
        &mut NullSink,
    );
    assert!(matches!(result, Err(SimulationError::Cancelled { step: 0 })));
}

// ── 6. Order intents ─────────────────────────────────────────────────

#[test]
fn intents_emitted_on_open_and_close() {
    let mut sink = RecordingSink::default();
    let outcome = run_backtest(
        &StrategyConfig::trend("TEST"),
        &candles(&ramp(150)),
        None,
        None,
        &mut sink,
    )
    .unwrap();

    assert_eq!(outcome.trades.len(), 1);
    assert_eq!(sink.intents.len(), 2);
    assert_eq!(sink.intents[0].side, OrderSide::Buy);
    assert!(!sink.intents[0].reduce_only);
    assert_eq!(sink.intents[1].side, OrderSide::Sell);
    assert!(sink.intents[1].reduce_only);
    assert_eq!(sink.intents[0].size, sink.intents[1].size);
    assert_eq!(sink.intents[0].symbol, "TEST");
}

#[test]
fn pair_entry_emits_both_legs() {
    let mut sink = RecordingSink::default();
    let mut config = StrategyConfig::pair("ETH");
    config.secondary_symbol = Some("BTC".into());
    run_backtest(&config, &candles(&flat_then_ramp()), None, None, &mut sink).unwrap();

    let entry: Vec<_> = sink.intents.iter().filter(|i| i.step == 100).collect();
    assert_eq!(entry.len(), 2);
    assert_eq!(entry[0].symbol, "ETH");
    assert_eq!(entry[0].side, OrderSide::Sell);
    assert_eq!(entry[1].symbol, "BTC");
    assert_eq!(entry[1].side, OrderSide::Buy);
}
