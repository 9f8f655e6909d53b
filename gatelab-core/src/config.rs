//! Strategy configuration: an immutable value handed to a run at creation.
//!
//! Changing parameters means building a new `StrategyConfig` and starting a
//! fresh run; nothing here is mutated once a simulation owns it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Current schema version for serialized configurations.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be at least 1")]
    ZeroPeriod { field: &'static str },

    #[error("lookback_period {lookback} is shorter than the {required} candles required by {field}")]
    LookbackTooShort {
        lookback: usize,
        required: usize,
        field: &'static str,
    },

    #[error("{field} must be finite and non-negative, got {value}")]
    NegativeThreshold { field: &'static str, value: f64 },

    #[error("exit_threshold {exit} must be below entry_threshold {entry}")]
    InvertedThresholds { entry: f64, exit: f64 },

    #[error("{field} must lie in {range}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        range: &'static str,
    },

    #[error("symbol must not be empty")]
    EmptySymbol,
}

/// How the pair indicators obtain their second series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationMode {
    /// Correlation and hedge ratio of the primary return series against
    /// itself; spread is the successive price difference.
    #[default]
    SelfSeries,
    /// Correlation and hedge ratio of primary vs secondary returns; spread is
    /// `primary - hedge * secondary`. Requires a secondary candle series.
    CrossSeries,
}

/// Periods used by the indicator engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    #[serde(default = "default_correlation_period")]
    pub correlation_period: usize,
    #[serde(default = "default_z_score_period")]
    pub z_score_period: usize,
    #[serde(default = "default_hedge_ratio_period")]
    pub hedge_ratio_period: usize,
    /// EMA and ADX period.
    #[serde(default = "default_trend_period")]
    pub trend_period: usize,
    #[serde(default)]
    pub correlation_mode: CorrelationMode,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            correlation_period: default_correlation_period(),
            z_score_period: default_z_score_period(),
            hedge_ratio_period: default_hedge_ratio_period(),
            trend_period: default_trend_period(),
            correlation_mode: CorrelationMode::default(),
        }
    }
}

/// Signal rules: pair (spread mean reversion) or trend (single asset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalRules {
    Pair {
        #[serde(default = "default_entry_threshold")]
        entry_threshold: f64,
        #[serde(default = "default_exit_threshold")]
        exit_threshold: f64,
        #[serde(default = "default_min_correlation")]
        min_correlation: f64,
    },
    Trend {
        #[serde(default = "default_strength_threshold")]
        strength_threshold: f64,
    },
}

impl Default for SignalRules {
    fn default() -> Self {
        SignalRules::Pair {
            entry_threshold: default_entry_threshold(),
            exit_threshold: default_exit_threshold(),
            min_correlation: default_min_correlation(),
        }
    }
}

/// Capital, sizing and cost parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioConfig {
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    /// Fraction of available capital committed per entry.
    #[serde(default = "default_risk_per_trade")]
    pub risk_per_trade: f64,
    #[serde(default = "default_min_notional")]
    pub min_notional: f64,
    /// Fee as a fraction of traded notional, charged on entry and exit.
    #[serde(default)]
    pub commission_rate: f64,
    /// Close when unrealized P&L / entry notional falls to `-stop_loss`.
    #[serde(default)]
    pub stop_loss: Option<f64>,
    /// Close when unrealized P&L / entry notional reaches `take_profit`.
    #[serde(default)]
    pub take_profit: Option<f64>,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            initial_capital: default_initial_capital(),
            risk_per_trade: default_risk_per_trade(),
            min_notional: default_min_notional(),
            commission_rate: 0.0,
            stop_loss: None,
            take_profit: None,
        }
    }
}

/// Complete configuration of one strategy instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Symbol of the hedge leg. Defaults to `symbol` in self-series mode.
    #[serde(default)]
    pub secondary_symbol: Option<String>,
    /// Minimum window length before indicators are considered valid; also
    /// the window capacity.
    #[serde(default = "default_lookback_period")]
    pub lookback_period: usize,
    #[serde(default)]
    pub indicators: IndicatorParams,
    #[serde(default)]
    pub signal: SignalRules,
    #[serde(default)]
    pub portfolio: PortfolioConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            symbol: default_symbol(),
            secondary_symbol: None,
            lookback_period: default_lookback_period(),
            indicators: IndicatorParams::default(),
            signal: SignalRules::default(),
            portfolio: PortfolioConfig::default(),
        }
    }
}

impl StrategyConfig {
    /// Default pair configuration with the given symbol.
    pub fn pair(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Self::default()
        }
    }

    /// Default trend configuration with the given symbol.
    pub fn trend(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            signal: SignalRules::Trend {
                strength_threshold: default_strength_threshold(),
            },
            ..Self::default()
        }
    }

    pub fn is_pair(&self) -> bool {
        matches!(self.signal, SignalRules::Pair { .. })
    }

    pub fn requires_secondary(&self) -> bool {
        self.is_pair() && self.indicators.correlation_mode == CorrelationMode::CrossSeries
    }

    /// Symbol the hedge leg trades under.
    pub fn hedge_symbol(&self) -> &str {
        self.secondary_symbol.as_deref().unwrap_or(&self.symbol)
    }

    /// Reject configurations no run may start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol);
        }

        let ind = &self.indicators;
        for (field, period) in [
            ("correlation_period", ind.correlation_period),
            ("z_score_period", ind.z_score_period),
            ("hedge_ratio_period", ind.hedge_ratio_period),
            ("trend_period", ind.trend_period),
            ("lookback_period", self.lookback_period),
        ] {
            if period == 0 {
                return Err(ConfigError::ZeroPeriod { field });
            }
        }

        // Return- and difference-based indicators consume one extra candle.
        let requirements: Vec<(&'static str, usize)> = match &self.signal {
            SignalRules::Pair { .. } => vec![
                ("correlation_period", ind.correlation_period + 1),
                ("z_score_period", ind.z_score_period + 1),
                ("hedge_ratio_period", ind.hedge_ratio_period + 1),
            ],
            SignalRules::Trend { .. } => vec![("trend_period", 2 * ind.trend_period + 1)],
        };
        for (field, required) in requirements {
            if self.lookback_period < required {
                return Err(ConfigError::LookbackTooShort {
                    lookback: self.lookback_period,
                    required,
                    field,
                });
            }
        }

        match &self.signal {
            SignalRules::Pair {
                entry_threshold,
                exit_threshold,
                min_correlation,
            } => {
                non_negative("entry_threshold", *entry_threshold)?;
                non_negative("exit_threshold", *exit_threshold)?;
                if exit_threshold >= entry_threshold {
                    return Err(ConfigError::InvertedThresholds {
                        entry: *entry_threshold,
                        exit: *exit_threshold,
                    });
                }
                in_range("min_correlation", *min_correlation, -1.0, 1.0, "[-1, 1]")?;
            }
            SignalRules::Trend { strength_threshold } => {
                in_range("strength_threshold", *strength_threshold, 0.0, 100.0, "[0, 100]")?;
            }
        }

        let pf = &self.portfolio;
        if !(pf.initial_capital.is_finite() && pf.initial_capital > 0.0) {
            return Err(ConfigError::OutOfRange {
                field: "initial_capital",
                value: pf.initial_capital,
                range: "(0, inf)",
            });
        }
        if !(pf.risk_per_trade.is_finite() && pf.risk_per_trade > 0.0 && pf.risk_per_trade <= 1.0)
        {
            return Err(ConfigError::OutOfRange {
                field: "risk_per_trade",
                value: pf.risk_per_trade,
                range: "(0, 1]",
            });
        }
        non_negative("min_notional", pf.min_notional)?;
        in_range("commission_rate", pf.commission_rate, 0.0, 1.0, "[0, 1]")?;
        for (field, value) in [("stop_loss", pf.stop_loss), ("take_profit", pf.take_profit)] {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(ConfigError::OutOfRange {
                        field,
                        value: v,
                        range: "(0, inf)",
                    });
                }
            }
        }

        Ok(())
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NegativeThreshold { field, value })
    }
}

fn in_range(
    field: &'static str,
    value: f64,
    lo: f64,
    hi: f64,
    range: &'static str,
) -> Result<(), ConfigError> {
    if value.is_finite() && value >= lo && value <= hi {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { field, value, range })
    }
}

// ─── Defaults ───────────────────────────────────────────────────────

fn default_symbol() -> String {
    "PRIMARY".to_string()
}

fn default_lookback_period() -> usize {
    100
}

fn default_correlation_period() -> usize {
    50
}

fn default_z_score_period() -> usize {
    20
}

fn default_hedge_ratio_period() -> usize {
    50
}

fn default_trend_period() -> usize {
    14
}

fn default_entry_threshold() -> f64 {
    2.0
}

fn default_exit_threshold() -> f64 {
    0.5
}

fn default_min_correlation() -> f64 {
    0.7
}

fn default_strength_threshold() -> f64 {
    25.0
}

fn default_initial_capital() -> f64 {
    100_000.0
}

fn default_risk_per_trade() -> f64 {
    0.1
}

fn default_min_notional() -> f64 {
    10.0
}
