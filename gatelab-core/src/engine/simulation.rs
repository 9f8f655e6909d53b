//! Simulation: the step function that drives one strategy instance.
//!
//! Per step:
//! 1. Validate the candle(s) and append to the rolling window(s)
//! 2. Apply stop-loss / take-profit to an open position
//! 3. Compute the indicator snapshot from the window ending at this candle
//! 4. Evaluate the signal machine
//! 5. Size and open on entry signals, close on exit signals
//! 6. Mark equity to market
//!
//! The configuration is fixed for the life of a `Simulation`; all mutable
//! state lives in [`RunState`] and is discarded with it.

use super::failure::{StepFailure, StepFailureKind};
use super::intent::{position_intents, IntentContext, IntentSink};
use crate::config::{ConfigError, StrategyConfig};
use crate::domain::{
    Candle, EquityPoint, ExitFill, ExitReason, PortfolioLedger, Position, RollingWindow,
    StrategyId, Trade,
};
use crate::indicators::{Evaluation, IndicatorEngine};
use crate::signals::{build_machine, Signal, SignalKind, SignalMachine};
use crate::sizers::{EntryQuote, PositionSizer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

/// Compact per-step record of the signal that was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalRecord {
    pub step: usize,
    pub timestamp: DateTime<Utc>,
    pub kind: SignalKind,
    pub confidence: f64,
    pub reason: String,
}

/// Last accepted prices, used to close at end of data.
#[derive(Debug, Clone, Copy)]
struct Quote {
    step: usize,
    timestamp: DateTime<Utc>,
    primary: f64,
    secondary: f64,
}

/// Mutable state scoped to one run.
#[derive(Debug, Clone)]
pub struct RunState {
    window: RollingWindow,
    secondary_window: Option<RollingWindow>,
    ledger: PortfolioLedger,
    step: usize,
    signals: Vec<SignalRecord>,
    failures: Vec<StepFailure>,
    correlation_sum: f64,
    evaluated_steps: usize,
    last_quote: Option<Quote>,
    halted: bool,
}

impl RunState {
    fn new(config: &StrategyConfig) -> Self {
        Self {
            window: RollingWindow::new(config.lookback_period),
            secondary_window: config
                .requires_secondary()
                .then(|| RollingWindow::new(config.lookback_period)),
            ledger: PortfolioLedger::new(config.portfolio.initial_capital),
            step: 0,
            signals: Vec::new(),
            failures: Vec::new(),
            correlation_sum: 0.0,
            evaluated_steps: 0,
            last_quote: None,
            halted: false,
        }
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    pub fn window(&self) -> &RollingWindow {
        &self.window
    }

    pub fn steps(&self) -> usize {
        self.step
    }

    pub fn failures(&self) -> &[StepFailure] {
        &self.failures
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Number of open positions: 0 or 1 by construction.
    pub fn open_positions(&self) -> usize {
        usize::from(self.ledger.has_position())
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestOutcome {
    pub strategy: StrategyId,
    pub symbol: String,
    pub initial_capital: f64,
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub signals: Vec<SignalRecord>,
    pub failures: Vec<StepFailure>,
    /// Mean correlation over steps with a valid snapshot; 0 when none.
    pub avg_correlation: f64,
    pub steps: usize,
    pub evaluated_steps: usize,
    pub fees_paid: f64,
    pub halted: bool,
}

impl BacktestOutcome {
    pub fn equity_values(&self) -> Vec<f64> {
        self.equity_curve.iter().map(|p| p.equity).collect()
    }

    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(self.initial_capital)
    }

    pub fn sizing_violations(&self) -> usize {
        self.failures.iter().filter(|f| f.is_sizing_violation()).count()
    }

    pub fn unrecovered_failures(&self) -> usize {
        self.failures.iter().filter(|f| !f.recovered).count()
    }

    /// First step whose signal was not HOLD.
    pub fn first_action(&self) -> Option<&SignalRecord> {
        self.signals.iter().find(|s| s.kind != SignalKind::Hold)
    }
}

/// One strategy instance: immutable config plus its run state.
pub struct Simulation {
    id: StrategyId,
    config: StrategyConfig,
    engine: IndicatorEngine,
    machine: Box<dyn SignalMachine>,
    sizer: PositionSizer,
    state: RunState,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("id", &self.id)
            .field("machine", &self.machine.name())
            .field("step", &self.state.step)
            .finish()
    }
}

impl Simulation {
    pub fn new(config: StrategyConfig) -> Result<Self, ConfigError> {
        Self::with_id(StrategyId(0), config)
    }

    pub fn with_id(id: StrategyId, config: StrategyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            id,
            engine: IndicatorEngine::new(config.indicators.clone(), config.lookback_period),
            machine: build_machine(&config.signal),
            sizer: PositionSizer::from_config(&config.portfolio),
            state: RunState::new(&config),
            config,
        })
    }

    pub fn id(&self) -> StrategyId {
        self.id
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn position(&self) -> Option<&Position> {
        self.state.ledger.position()
    }

    /// Process one candle (plus the aligned secondary candle in cross-series mode).
    pub fn step(
        &mut self,
        primary: Candle,
        secondary: Option<Candle>,
        sink: &mut dyn IntentSink,
    ) -> Signal {
        let step = self.state.step;
        self.state.step += 1;

        let signal = if self.state.halted {
            Signal::hold("run halted", None)
        } else {
            self.advance(step, primary, secondary, sink)
        };

        self.state.signals.push(SignalRecord {
            step,
            timestamp: primary.timestamp,
            kind: signal.kind,
            confidence: signal.confidence,
            reason: signal.reason.clone(),
        });
        signal
    }

    /// Close any open position at the last accepted prices and hand back the results.
    pub fn finish(mut self, sink: &mut dyn IntentSink) -> BacktestOutcome {
        if let Some(quote) = self.state.last_quote {
            if self.state.ledger.has_position() && !self.state.halted {
                self.close(
                    quote.step,
                    quote.timestamp,
                    quote.primary,
                    quote.secondary,
                    ExitReason::EndOfData,
                    sink,
                );
                self.state.ledger.restate_last_flat();
            }
        }

        let state = self.state;
        let avg_correlation = if state.evaluated_steps > 0 {
            state.correlation_sum / state.evaluated_steps as f64
        } else {
            0.0
        };
        let fees_paid = state.ledger.fees_paid();
        let initial_capital = state.ledger.initial_capital();
        let (trades, equity_curve) = state.ledger.into_parts();

        BacktestOutcome {
            strategy: self.id,
            symbol: self.config.symbol,
            initial_capital,
            trades,
            equity_curve,
            signals: state.signals,
            failures: state.failures,
            avg_correlation,
            steps: state.step,
            evaluated_steps: state.evaluated_steps,
            fees_paid,
            halted: state.halted,
        }
    }

    // ─── Step phases ────────────────────────────────────────────────

    fn advance(
        &mut self,
        step: usize,
        primary: Candle,
        secondary: Option<Candle>,
        sink: &mut dyn IntentSink,
    ) -> Signal {
        let ts = primary.timestamp;

        let (p, s) = match self.accept(primary, secondary) {
            Ok(prices) => prices,
            Err(reason) => {
                warn!(step, %ts, %reason, "rejected malformed candle");
                self.record(step, ts, StepFailureKind::MalformedCandle { reason: reason.clone() }, true);
                self.state.ledger.carry_forward(ts);
                return Signal::hold(format!("malformed candle: {reason}"), None);
            }
        };
        self.state.last_quote = Some(Quote {
            step,
            timestamp: ts,
            primary: p,
            secondary: s,
        });

        let closed_by_limit = self.apply_limits(step, ts, p, s, sink);

        let evaluation = self
            .engine
            .evaluate(&self.state.window, self.state.secondary_window.as_ref());
        let signal = match evaluation {
            Evaluation::InsufficientHistory { have, need } => Signal::insufficient_history(have, need),
            Evaluation::MissingSecondary => Signal::hold("secondary series unavailable", None),
            Evaluation::Ready(snapshot) => match snapshot.non_finite_field() {
                Some(field) => {
                    warn!(step, field, "non-finite indicator, forcing HOLD");
                    self.record(
                        step,
                        ts,
                        StepFailureKind::NonFiniteIndicator {
                            field: field.to_string(),
                        },
                        true,
                    );
                    Signal::hold(format!("non-finite {field}"), Some(snapshot))
                }
                None => {
                    self.state.correlation_sum += snapshot.correlation;
                    self.state.evaluated_steps += 1;
                    let open_side = self.state.ledger.position().map(|pos| pos.side);
                    self.machine.evaluate(&snapshot, open_side)
                }
            },
        };

        let signal = match closed_by_limit {
            Some(reason) => Signal::hold(
                format!("position closed by limit ({})", limit_label(reason)),
                signal.snapshot,
            ),
            None => {
                self.act(step, ts, &signal, p, s, sink);
                signal
            }
        };

        let equity = self.state.ledger.mark(ts, p, s);
        if !equity.is_finite() {
            error!(step, "equity became non-finite, halting run");
            self.record(step, ts, StepFailureKind::NonFiniteEquity, false);
            self.state.halted = true;
        }
        signal
    }

    /// Validate and append; returns `(primary close, secondary close)`.
    ///
    /// Both candles are checked before either window changes, so the windows
    /// stay aligned when one side is rejected.
    fn accept(&mut self, primary: Candle, secondary: Option<Candle>) -> Result<(f64, f64), String> {
        self.state.window.check(&primary).map_err(|e| e.to_string())?;

        match self.state.secondary_window.as_mut() {
            Some(secondary_window) => {
                let secondary = secondary.ok_or_else(|| "missing secondary candle".to_string())?;
                secondary_window
                    .check(&secondary)
                    .map_err(|e| format!("secondary {e}"))?;
                self.state.window.push(primary).map_err(|e| e.to_string())?;
                secondary_window
                    .push(secondary)
                    .map_err(|e| format!("secondary {e}"))?;
                Ok((primary.close, secondary.close))
            }
            None => {
                self.state.window.push(primary).map_err(|e| e.to_string())?;
                Ok((primary.close, primary.close))
            }
        }
    }

    /// Close on stop-loss / take-profit breach. Returns the exit reason if a position was closed.
    fn apply_limits(
        &mut self,
        step: usize,
        ts: DateTime<Utc>,
        p: f64,
        s: f64,
        sink: &mut dyn IntentSink,
    ) -> Option<ExitReason> {
        let pf = &self.config.portfolio;
        let position = self.state.ledger.position()?;
        let notional = position.entry_notional();
        if notional <= 0.0 {
            return None;
        }
        let ret = position.unrealized_pnl(p, s) / notional;

        let reason = if pf.stop_loss.is_some_and(|sl| ret <= -sl) {
            ExitReason::StopLoss
        } else if pf.take_profit.is_some_and(|tp| ret >= tp) {
            ExitReason::TakeProfit
        } else {
            return None;
        };
        self.close(step, ts, p, s, reason, sink);
        Some(reason)
    }

    fn act(
        &mut self,
        step: usize,
        ts: DateTime<Utc>,
        signal: &Signal,
        p: f64,
        s: f64,
        sink: &mut dyn IntentSink,
    ) {
        let open_side = self.state.ledger.position().map(|pos| pos.side);
        match (signal.kind, open_side) {
            (SignalKind::ExitPair, Some(side)) if side.is_pair() => {
                self.close(step, ts, p, s, ExitReason::Signal, sink);
            }
            (kind, Some(side)) if kind.is_entry() => {
                let opposite_trend = kind
                    .entry_side()
                    .is_some_and(|new| !new.is_pair() && !side.is_pair() && new != side);
                if opposite_trend {
                    self.close(step, ts, p, s, ExitReason::OppositeSignal, sink);
                } else {
                    debug!(step, ?kind, "entry ignored while a position is open");
                }
            }
            (kind, None) if kind.is_entry() => self.open(step, ts, signal, p, s, sink),
            _ => {}
        }
    }

    fn open(
        &mut self,
        step: usize,
        ts: DateTime<Utc>,
        signal: &Signal,
        p: f64,
        s: f64,
        sink: &mut dyn IntentSink,
    ) {
        let Some(side) = signal.kind.entry_side() else {
            return;
        };
        let hedge_ratio = signal.snapshot.map(|snap| snap.hedge_ratio).unwrap_or(1.0);
        let quote = EntryQuote {
            primary_price: p,
            secondary_price: s,
            hedge_ratio,
        };

        let sizing = match self
            .sizer
            .size(signal.kind, self.state.ledger.available_capital(), quote)
        {
            Ok(sizing) => sizing,
            Err(e) => {
                warn!(step, error = %e, "sizing violation");
                self.record(step, ts, StepFailureKind::SizingViolation { reason: e.to_string() }, true);
                return;
            }
        };
        if sizing.is_zero() {
            debug!(step, "available capital below minimum notional, skipping entry");
            return;
        }

        let mut position = Position {
            side,
            primary_entry: p,
            secondary_entry: side.is_pair().then_some(s),
            hedge_ratio,
            primary_size: sizing.primary_size,
            secondary_size: sizing.secondary_size,
            opened_at: ts,
            opened_step: step,
            entry_fees: 0.0,
        };
        position.entry_fees = position.entry_notional() * self.config.portfolio.commission_rate;

        let intents = position_intents(self.intent_context(step, ts), &position, false);
        if let Err(e) = self.state.ledger.open(position) {
            self.record(step, ts, StepFailureKind::SizingViolation { reason: e.to_string() }, true);
            return;
        }
        debug!(step, ?side, size = sizing.primary_size, "opened position");
        for intent in intents {
            sink.emit(intent);
        }
    }

    fn close(
        &mut self,
        step: usize,
        ts: DateTime<Utc>,
        p: f64,
        s: f64,
        reason: ExitReason,
        sink: &mut dyn IntentSink,
    ) {
        let Some(position) = self.state.ledger.position().cloned() else {
            return;
        };
        let fill = ExitFill {
            step,
            time: ts,
            primary_price: p,
            secondary_price: s,
            fee_rate: self.config.portfolio.commission_rate,
        };
        match self.state.ledger.close(fill, reason) {
            Ok(trade) => debug!(step, ?reason, pnl = trade.realized_pnl, "closed position"),
            Err(e) => {
                warn!(step, error = %e, "close failed");
                return;
            }
        }
        for intent in position_intents(self.intent_context(step, ts), &position, true) {
            sink.emit(intent);
        }
    }

    fn intent_context(&self, step: usize, timestamp: DateTime<Utc>) -> IntentContext<'_> {
        IntentContext {
            strategy: self.id,
            step,
            timestamp,
            symbol: &self.config.symbol,
            hedge_symbol: self.config.hedge_symbol(),
        }
    }

    fn record(&mut self, step: usize, timestamp: DateTime<Utc>, kind: StepFailureKind, recovered: bool) {
        self.state.failures.push(StepFailure {
            step,
            timestamp,
            kind,
            recovered,
        });
    }
}

fn limit_label(reason: ExitReason) -> &'static str {
    match reason {
        ExitReason::StopLoss => "stop loss",
        ExitReason::TakeProfit => "take profit",
        _ => "limit",
    }
}
