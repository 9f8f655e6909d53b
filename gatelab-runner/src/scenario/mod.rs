//! Stress scenario generator.
//!
//! A scenario is a pure function of its declarative spec: the same kind,
//! parameters and seed always give the same hourly candle sequence.

mod paths;

use chrono::{DateTime, Duration, TimeZone, Utc};
use gatelab_core::domain::Candle;
use gatelab_core::rng::RngHierarchy;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScenarioError {
    #[error("scenario '{name}': duration {duration} is below the minimum of {minimum} periods")]
    TooShort {
        name: String,
        duration: usize,
        minimum: usize,
    },

    #[error("scenario '{name}': initial price {price} must be positive and finite")]
    InvalidPrice { name: String, price: f64 },

    #[error("scenario '{name}': severity {severity} outside {range} for {kind}")]
    SeverityOutOfRange {
        name: String,
        kind: ScenarioKind,
        severity: f64,
        range: &'static str,
    },

    #[error("scenario '{name}': secondary leg {reason}")]
    InvalidSecondary { name: String, reason: String },

    #[error("scenario '{name}': distribution error: {reason}")]
    Distribution { name: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKind {
    MarketCrash,
    FlashCrash,
    HighVolatility,
    LiquidityCrisis,
    BlackSwan,
}

impl ScenarioKind {
    pub const ALL: [ScenarioKind; 5] = [
        ScenarioKind::MarketCrash,
        ScenarioKind::FlashCrash,
        ScenarioKind::HighVolatility,
        ScenarioKind::LiquidityCrisis,
        ScenarioKind::BlackSwan,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ScenarioKind::MarketCrash => "market_crash",
            ScenarioKind::FlashCrash => "flash_crash",
            ScenarioKind::HighVolatility => "high_volatility",
            ScenarioKind::LiquidityCrisis => "liquidity_crisis",
            ScenarioKind::BlackSwan => "black_swan",
        }
    }

    /// Headline move used when a spec leaves severity unset.
    ///
    /// Crash and shock kinds: fractional decline. High volatility: multiplier
    /// on baseline volatility. Liquidity crisis: volume as a fraction of baseline.
    pub fn default_severity(self) -> f64 {
        match self {
            ScenarioKind::MarketCrash => 0.5,
            ScenarioKind::FlashCrash => 0.2,
            ScenarioKind::HighVolatility => 3.0,
            ScenarioKind::LiquidityCrisis => 0.05,
            ScenarioKind::BlackSwan => 0.3,
        }
    }

    /// Fewest periods that still hold the kind's full structure.
    pub fn min_duration(self) -> usize {
        match self {
            ScenarioKind::MarketCrash | ScenarioKind::HighVolatility => 2,
            ScenarioKind::FlashCrash | ScenarioKind::LiquidityCrisis => 24,
            ScenarioKind::BlackSwan => 48,
        }
    }

    fn severity_in_range(self, severity: f64) -> Result<(), &'static str> {
        let ok = match self {
            ScenarioKind::MarketCrash | ScenarioKind::BlackSwan => {
                severity > 0.0 && severity <= 0.95
            }
            ScenarioKind::FlashCrash => severity > 0.0 && severity <= 0.9,
            ScenarioKind::HighVolatility => (1.0..=20.0).contains(&severity),
            ScenarioKind::LiquidityCrisis => severity > 0.0 && severity < 0.1,
        };
        if ok && severity.is_finite() {
            return Ok(());
        }
        Err(match self {
            ScenarioKind::MarketCrash | ScenarioKind::BlackSwan => "(0, 0.95]",
            ScenarioKind::FlashCrash => "(0, 0.9]",
            ScenarioKind::HighVolatility => "[1, 20]",
            ScenarioKind::LiquidityCrisis => "(0, 0.1)",
        })
    }
}

impl fmt::Display for ScenarioKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A companion series for cross-series stress runs.
///
/// Each period's log return is `beta` times the primary's plus Gaussian
/// noise with standard deviation `noise`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecondaryLeg {
    #[serde(default = "default_beta")]
    pub beta: f64,
    #[serde(default = "default_noise")]
    pub noise: f64,
}

fn default_beta() -> f64 {
    1.0
}

fn default_noise() -> f64 {
    0.002
}

impl Default for SecondaryLeg {
    fn default() -> Self {
        Self {
            beta: default_beta(),
            noise: default_noise(),
        }
    }
}

/// Declarative description of one stress scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    pub kind: ScenarioKind,
    pub initial_price: f64,
    pub duration_periods: usize,
    #[serde(default)]
    pub severity: Option<f64>,
    pub seed: u64,
    #[serde(default = "default_start")]
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub secondary: Option<SecondaryLeg>,
}

fn default_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

impl ScenarioSpec {
    pub fn new(
        name: impl Into<String>,
        kind: ScenarioKind,
        initial_price: f64,
        duration_periods: usize,
        seed: u64,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            initial_price,
            duration_periods,
            severity: None,
            seed,
            start: default_start(),
            secondary: None,
        }
    }

    pub fn with_severity(mut self, severity: f64) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_secondary(mut self, leg: SecondaryLeg) -> Self {
        self.secondary = Some(leg);
        self
    }

    pub fn effective_severity(&self) -> f64 {
        self.severity.unwrap_or_else(|| self.kind.default_severity())
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        let minimum = self.kind.min_duration();
        if self.duration_periods < minimum {
            return Err(ScenarioError::TooShort {
                name: self.name.clone(),
                duration: self.duration_periods,
                minimum,
            });
        }
        if !(self.initial_price.is_finite() && self.initial_price > 0.0) {
            return Err(ScenarioError::InvalidPrice {
                name: self.name.clone(),
                price: self.initial_price,
            });
        }
        let severity = self.effective_severity();
        if let Err(range) = self.kind.severity_in_range(severity) {
            return Err(ScenarioError::SeverityOutOfRange {
                name: self.name.clone(),
                kind: self.kind,
                severity,
                range,
            });
        }
        if let Some(leg) = &self.secondary {
            if !leg.beta.is_finite() {
                return Err(self.secondary_error("beta must be finite"));
            }
            if !(leg.noise.is_finite() && leg.noise >= 0.0) {
                return Err(self.secondary_error("noise must be finite and non-negative"));
            }
        }
        Ok(())
    }

    fn secondary_error(&self, reason: &str) -> ScenarioError {
        ScenarioError::InvalidSecondary {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn distribution_error(&self, reason: impl fmt::Display) -> ScenarioError {
        ScenarioError::Distribution {
            name: self.name.clone(),
            reason: reason.to_string(),
        }
    }

    fn timestamp(&self, period: usize) -> DateTime<Utc> {
        self.start + Duration::hours(period as i64)
    }
}

/// Candles for one scenario; `secondary` is present when the spec asks for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioCandles {
    pub primary: Vec<Candle>,
    pub secondary: Option<Vec<Candle>>,
}

/// Generate the candle sequence(s) for `spec`.
pub fn generate(spec: &ScenarioSpec) -> Result<ScenarioCandles, ScenarioError> {
    spec.validate()?;
    let rngs = RngHierarchy::new(spec.seed);
    let severity = spec.effective_severity();

    let path = match spec.kind {
        ScenarioKind::MarketCrash => paths::market_crash(spec, &rngs, severity)?,
        ScenarioKind::FlashCrash => paths::flash_crash(spec, &rngs, severity)?,
        ScenarioKind::HighVolatility => paths::high_volatility(spec, &rngs, severity)?,
        ScenarioKind::LiquidityCrisis => paths::liquidity_crisis(spec, &rngs, severity)?,
        ScenarioKind::BlackSwan => paths::black_swan(spec, &rngs, severity)?,
    };

    let secondary = match spec.secondary {
        Some(leg) => Some(paths::companion(spec, &rngs, &path, leg)?),
        None => None,
    };

    Ok(ScenarioCandles {
        primary: path.into_candles(spec),
        secondary,
    })
}
