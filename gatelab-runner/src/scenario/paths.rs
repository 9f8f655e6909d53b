//! Price paths for each scenario kind.
//!
//! Every kind draws from its own RNG streams (path, wicks, volume) so adding
//! draws to one stream never shifts another. Prices move multiplicatively and
//! stay strictly positive.

use super::{ScenarioError, ScenarioSpec, SecondaryLeg};
use gatelab_core::domain::Candle;
use gatelab_core::rng::RngHierarchy;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::Rng;
use statrs::distribution::Normal;

const STREAM_PATH: u64 = 0;
const STREAM_WICKS: u64 = 1;
const STREAM_VOLUME: u64 = 2;
const STREAM_SECONDARY: u64 = 3;

/// Hour at which flash crashes and liquidity crises begin.
const EVENT_START: usize = 12;
const FLASH_CRASH_HOURS: usize = 2;
const FLASH_RECOVERY_HOURS: usize = 6;
const FLASH_VOLUME_SPIKE: f64 = 10.0;
const LIQUIDITY_CRISIS_HOURS: usize = 12;
const LIQUIDITY_BASELINE_VOLUME: f64 = 3000.0;
const BLACK_SWAN_SHOCK_HOUR: usize = 120;
const BLACK_SWAN_VOLUME_SPIKE: f64 = 20.0;
const BASE_HOURLY_VOL: f64 = 0.02;

/// Closes plus per-candle wick fractions and volumes, before timestamps are attached.
pub(super) struct PricePath {
    initial_price: f64,
    closes: Vec<f64>,
    upper_wicks: Vec<f64>,
    lower_wicks: Vec<f64>,
    volumes: Vec<f64>,
}

impl PricePath {
    /// Opens at the previous close; wicks extend beyond both.
    pub(super) fn into_candles(self, spec: &ScenarioSpec) -> Vec<Candle> {
        let mut prev = self.initial_price;
        let mut candles = Vec::with_capacity(self.closes.len());
        for (i, &close) in self.closes.iter().enumerate() {
            let open = prev;
            let high = open.max(close) * (1.0 + self.upper_wicks[i]);
            let low = open.min(close) * (1.0 - self.lower_wicks[i]);
            candles.push(Candle::new(
                spec.timestamp(i),
                open,
                high,
                low,
                close,
                self.volumes[i],
            ));
            prev = close;
        }
        candles
    }

    fn log_returns(&self) -> Vec<f64> {
        let mut prev = self.initial_price;
        self.closes
            .iter()
            .map(|&c| {
                let r = (c / prev).ln();
                prev = c;
                r
            })
            .collect()
    }
}

struct Streams {
    path: StdRng,
    wicks: StdRng,
    volume: StdRng,
    z: Normal,
}

impl Streams {
    fn new(spec: &ScenarioSpec, rngs: &RngHierarchy) -> Result<Self, ScenarioError> {
        let label = spec.kind.label();
        Ok(Self {
            path: rngs.rng_for(label, STREAM_PATH),
            wicks: rngs.rng_for(label, STREAM_WICKS),
            volume: rngs.rng_for(label, STREAM_VOLUME),
            z: standard_normal(spec)?,
        })
    }

    fn gaussian(&mut self, sd: f64) -> f64 {
        sd * self.z.sample(&mut self.path)
    }

    fn wick(&mut self, lo: f64, hi: f64) -> f64 {
        self.wicks.gen_range(lo..hi)
    }

    fn volume(&mut self, lo: f64, hi: f64) -> f64 {
        self.volume.gen_range(lo..hi)
    }
}

fn standard_normal(spec: &ScenarioSpec) -> Result<Normal, ScenarioError> {
    Normal::new(0.0, 1.0).map_err(|e| spec.distribution_error(e))
}

fn initial(spec: &ScenarioSpec) -> PricePath {
    let n = spec.duration_periods;
    PricePath {
        initial_price: spec.initial_price,
        closes: Vec::with_capacity(n),
        upper_wicks: Vec::with_capacity(n),
        lower_wicks: Vec::with_capacity(n),
        volumes: Vec::with_capacity(n),
    }
}

/// Gradual decline of `depth` over the whole window with rising volatility.
pub(super) fn market_crash(
    spec: &ScenarioSpec,
    rngs: &RngHierarchy,
    depth: f64,
) -> Result<PricePath, ScenarioError> {
    let mut s = Streams::new(spec, rngs)?;
    let mut path = initial(spec);
    let n = spec.duration_periods;
    for i in 0..n {
        let progress = (i + 1) as f64 / n as f64;
        let level = 1.0 - progress * depth;
        let vol = 0.005 + 0.025 * progress;
        let close = if i + 1 == n {
            spec.initial_price * (1.0 - depth)
        } else {
            spec.initial_price * level * s.gaussian(vol).exp()
        };
        path.closes.push(close);
        path.upper_wicks.push(s.wick(0.001, 0.05));
        path.lower_wicks.push(s.wick(0.001, 0.05));
        path.volumes
            .push(s.volume(1000.0, 10000.0) * (2.0 + depth * 3.0));
    }
    Ok(path)
}

/// Drop of `depth` over two hours from hour 12, linear recovery over six.
pub(super) fn flash_crash(
    spec: &ScenarioSpec,
    rngs: &RngHierarchy,
    depth: f64,
) -> Result<PricePath, ScenarioError> {
    let mut s = Streams::new(spec, rngs)?;
    let mut path = initial(spec);
    let trough = 1.0 - depth;
    let per_hour = trough.powf(1.0 / FLASH_CRASH_HOURS as f64);
    let crash_end = EVENT_START + FLASH_CRASH_HOURS;
    let recovery_end = crash_end + FLASH_RECOVERY_HOURS;

    let mut level = 1.0;
    for i in 0..spec.duration_periods {
        if (EVENT_START..crash_end).contains(&i) {
            level *= per_hour;
        } else if (crash_end..recovery_end).contains(&i) {
            let done = (i + 1 - crash_end) as f64 / FLASH_RECOVERY_HOURS as f64;
            level = trough + (1.0 - trough) * done;
        }
        path.closes
            .push(spec.initial_price * level * s.gaussian(0.005).exp());
        path.upper_wicks.push(s.wick(0.0, 0.02));
        path.lower_wicks.push(s.wick(0.0, 0.02));
        let mut volume = s.volume(1000.0, 5000.0);
        if (EVENT_START..=crash_end).contains(&i) {
            volume *= FLASH_VOLUME_SPIKE;
        }
        path.volumes.push(volume);
    }
    Ok(path)
}

/// Zero-drift log returns at `multiplier` times baseline hourly volatility.
pub(super) fn high_volatility(
    spec: &ScenarioSpec,
    rngs: &RngHierarchy,
    multiplier: f64,
) -> Result<PricePath, ScenarioError> {
    let mut s = Streams::new(spec, rngs)?;
    let mut path = initial(spec);
    let vol = BASE_HOURLY_VOL * multiplier;
    let mut log_price = spec.initial_price.ln();
    for _ in 0..spec.duration_periods {
        log_price += s.gaussian(vol);
        path.closes.push(log_price.exp());
        path.upper_wicks.push(s.wick(0.02, 0.08));
        path.lower_wicks.push(s.wick(0.02, 0.08));
        path.volumes
            .push(s.volume(2000.0, 15000.0) * multiplier);
    }
    Ok(path)
}

/// Twelve hours from hour 12 with volume at `volume_fraction` of baseline
/// and a wide synthetic spread as extra price noise.
pub(super) fn liquidity_crisis(
    spec: &ScenarioSpec,
    rngs: &RngHierarchy,
    volume_fraction: f64,
) -> Result<PricePath, ScenarioError> {
    let mut s = Streams::new(spec, rngs)?;
    let mut path = initial(spec);
    let crisis = EVENT_START..EVENT_START + LIQUIDITY_CRISIS_HOURS;
    let mut log_price = spec.initial_price.ln();
    for i in 0..spec.duration_periods {
        log_price += s.gaussian(0.01);
        if crisis.contains(&i) {
            let spread_noise = s.gaussian(0.02);
            path.closes.push((log_price + spread_noise).exp());
            path.upper_wicks.push(s.wick(0.05, 0.15));
            path.lower_wicks.push(s.wick(0.05, 0.15));
            path.volumes.push(
                LIQUIDITY_BASELINE_VOLUME * volume_fraction * s.volume(0.5, 1.0),
            );
        } else {
            path.closes.push(log_price.exp());
            path.upper_wicks.push(s.wick(0.001, 0.01));
            path.lower_wicks.push(s.wick(0.001, 0.01));
            path.volumes.push(s.volume(1000.0, 5000.0));
        }
    }
    Ok(path)
}

/// Quiet market, an instantaneous drop of `shock`, then elevated volatility
/// to the end of the window.
pub(super) fn black_swan(
    spec: &ScenarioSpec,
    rngs: &RngHierarchy,
    shock: f64,
) -> Result<PricePath, ScenarioError> {
    let mut s = Streams::new(spec, rngs)?;
    let mut path = initial(spec);
    let n = spec.duration_periods;
    let shock_at = BLACK_SWAN_SHOCK_HOUR.min(n / 4);
    let mut log_level = spec.initial_price.ln();
    for i in 0..n {
        let close = if i < shock_at {
            (log_level + s.gaussian(0.005)).exp()
        } else if i == shock_at {
            log_level += (1.0 - shock).ln();
            log_level.exp()
        } else {
            log_level += s.gaussian(0.05);
            log_level.exp()
        };
        path.closes.push(close);
        let (lo, hi) = if i < shock_at { (0.005, 0.02) } else { (0.02, 0.1) };
        path.upper_wicks.push(s.wick(lo, hi));
        path.lower_wicks.push(s.wick(lo, hi));
        let mut volume = s.volume(1000.0, 8000.0);
        if (shock_at..shock_at + 24).contains(&i) {
            volume *= BLACK_SWAN_VOLUME_SPIKE;
        }
        path.volumes.push(volume);
    }
    Ok(path)
}

/// Correlated companion series built from the primary's log returns.
pub(super) fn companion(
    spec: &ScenarioSpec,
    rngs: &RngHierarchy,
    primary: &PricePath,
    leg: SecondaryLeg,
) -> Result<Vec<Candle>, ScenarioError> {
    let z = standard_normal(spec)?;
    let mut rng = rngs.rng_for(spec.kind.label(), STREAM_SECONDARY);
    let mut log_price = spec.initial_price.ln();
    let closes = primary
        .log_returns()
        .into_iter()
        .map(|r| {
            log_price += leg.beta * r + leg.noise * z.sample(&mut rng);
            log_price.exp()
        })
        .collect();
    let path = PricePath {
        initial_price: spec.initial_price,
        closes,
        upper_wicks: primary.upper_wicks.clone(),
        lower_wicks: primary.lower_wicks.clone(),
        volumes: primary.volumes.clone(),
    };
    Ok(path.into_candles(spec))
}
