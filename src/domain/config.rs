//! Typed engine configuration built from an INI source.
//!
//! Sections: `[engine]`, `[signal]`, `[feed]`, `[lifecycle]`, `[session]`. Storage and
//! venue sections (`[sqlite]`, `[paper]`, `[logging]`) are read by the adapters and
//! the binary. Every field is validated here; a bad value is `ConfigInvalid`.

use std::collections::HashSet;

use chrono::Weekday;

use crate::domain::clock::SessionConfig;
use crate::domain::error::SwingtraderError;
use crate::domain::indicator::frame::FrameConfig;
use crate::domain::ledger::PayoffConfig;
use crate::domain::ohlcv::Timeframe;
use crate::domain::signal::SignalConfig;
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct FeedConfig {
    pub execution_timeframe: Timeframe,
    pub execution_bars: usize,
    pub bias_timeframe: Timeframe,
    pub bias_bars: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            execution_timeframe: Timeframe::H1,
            execution_bars: 100,
            bias_timeframe: Timeframe::D1,
            bias_bars: 250,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleConfig {
    /// Favourable move, in initial-risk units, that triggers the partial close.
    pub partial_r_multiple: f64,
    /// Share of the position closed at the venue on the partial.
    pub partial_close_fraction: f64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        LifecycleConfig {
            partial_r_multiple: 2.0,
            partial_close_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub symbols: Vec<String>,
    pub initial_balance: f64,
    pub risk_fraction: f64,
    pub signal: SignalConfig,
    pub feed: FeedConfig,
    pub lifecycle: LifecycleConfig,
    pub payoff: PayoffConfig,
    pub session: SessionConfig,
}

impl EngineConfig {
    pub fn new(symbols: Vec<String>) -> Self {
        EngineConfig {
            symbols,
            initial_balance: 10_000.0,
            risk_fraction: 0.005,
            signal: SignalConfig::default(),
            feed: FeedConfig::default(),
            lifecycle: LifecycleConfig::default(),
            payoff: PayoffConfig::default(),
            session: SessionConfig::default(),
        }
    }

    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SwingtraderError> {
        let symbols_str = config
            .get_string("engine", "symbols")
            .ok_or_else(|| SwingtraderError::ConfigMissing {
                section: "engine".into(),
                key: "symbols".into(),
            })?;
        let defaults = EngineConfig::new(parse_symbols(&symbols_str)?);

        let execution = FrameConfig {
            fast_span: get_usize(config, "signal", "fast_span", 20)?,
            slow_span: get_usize(config, "signal", "slow_span", 50)?,
            atr_window: get_usize(config, "signal", "atr_window", 14)?,
            baseline_window: get_usize(config, "signal", "baseline_window", 20)?,
            trend_window: get_usize(config, "signal", "trend_window", 14)?,
            structure_lookback: get_usize(config, "signal", "structure_lookback", 10)?,
        };
        let bias = FrameConfig {
            slow_span: get_usize(config, "signal", "bias_slow_span", 200)?,
            ..execution.clone()
        };
        let sig = &defaults.signal;
        let signal = SignalConfig {
            execution,
            bias,
            trend_override: config.get_double("signal", "trend_override", sig.trend_override),
            value_atr_multiple: config.get_double(
                "signal",
                "value_atr_multiple",
                sig.value_atr_multiple,
            ),
            stop_multiplier: config.get_double("signal", "stop_multiplier", sig.stop_multiplier),
            reward_ratio: config.get_double("signal", "reward_ratio", sig.reward_ratio),
            dominant_wick_ratio: config.get_double(
                "signal",
                "dominant_wick_ratio",
                sig.dominant_wick_ratio,
            ),
        };

        let feed = FeedConfig {
            execution_timeframe: get_timeframe(
                config,
                "execution_timeframe",
                defaults.feed.execution_timeframe,
            )?,
            execution_bars: get_usize(config, "feed", "execution_bars", defaults.feed.execution_bars)?,
            bias_timeframe: get_timeframe(config, "bias_timeframe", defaults.feed.bias_timeframe)?,
            bias_bars: get_usize(config, "feed", "bias_bars", defaults.feed.bias_bars)?,
        };

        let lifecycle = LifecycleConfig {
            partial_r_multiple: config.get_double(
                "lifecycle",
                "partial_r_multiple",
                defaults.lifecycle.partial_r_multiple,
            ),
            partial_close_fraction: config.get_double(
                "lifecycle",
                "partial_close_fraction",
                defaults.lifecycle.partial_close_fraction,
            ),
        };

        let payoff = PayoffConfig {
            win_fraction: config.get_double("lifecycle", "win_fraction", defaults.payoff.win_fraction),
            loss_fraction: config.get_double(
                "lifecycle",
                "loss_fraction",
                defaults.payoff.loss_fraction,
            ),
            partial_fraction: config.get_double(
                "lifecycle",
                "partial_fraction",
                defaults.payoff.partial_fraction,
            ),
        };

        let session = SessionConfig {
            close_weekday: get_weekday(config, "close_weekday", defaults.session.close_weekday)?,
            close_hour: get_hour(config, "close_hour", defaults.session.close_hour)?,
            reopen_weekday: get_weekday(config, "reopen_weekday", defaults.session.reopen_weekday)?,
            reopen_hour: get_hour(config, "reopen_hour", defaults.session.reopen_hour)?,
        };

        let engine = EngineConfig {
            initial_balance: config.get_double("engine", "initial_balance", defaults.initial_balance),
            risk_fraction: config.get_double("engine", "risk_fraction", defaults.risk_fraction),
            signal,
            feed,
            lifecycle,
            payoff,
            session,
            ..defaults
        };
        engine.validate()?;
        Ok(engine)
    }

    pub fn validate(&self) -> Result<(), SwingtraderError> {
        if self.symbols.is_empty() {
            return Err(invalid("engine", "symbols", "at least one symbol is required"));
        }
        validate_positive("engine", "initial_balance", self.initial_balance)?;
        validate_fraction("engine", "risk_fraction", self.risk_fraction)?;

        validate_frame(&self.signal.execution)?;
        if self.signal.bias.slow_span == 0 {
            return Err(invalid("signal", "bias_slow_span", "must be positive"));
        }
        validate_positive("signal", "value_atr_multiple", self.signal.value_atr_multiple)?;
        validate_positive("signal", "stop_multiplier", self.signal.stop_multiplier)?;
        validate_positive("signal", "reward_ratio", self.signal.reward_ratio)?;
        validate_fraction("signal", "dominant_wick_ratio", self.signal.dominant_wick_ratio)?;
        if !(0.0..=100.0).contains(&self.signal.trend_override) {
            return Err(invalid("signal", "trend_override", "must be between 0 and 100"));
        }

        validate_bars("execution_bars", self.feed.execution_bars, &self.signal.execution)?;
        validate_bars("bias_bars", self.feed.bias_bars, &self.signal.bias)?;

        validate_positive("lifecycle", "partial_r_multiple", self.lifecycle.partial_r_multiple)?;
        validate_fraction(
            "lifecycle",
            "partial_close_fraction",
            self.lifecycle.partial_close_fraction,
        )?;
        validate_fraction("lifecycle", "win_fraction", self.payoff.win_fraction)?;
        validate_fraction("lifecycle", "loss_fraction", self.payoff.loss_fraction)?;
        validate_fraction("lifecycle", "partial_fraction", self.payoff.partial_fraction)?;
        Ok(())
    }
}

/// Checks the whole configuration without keeping the result.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), SwingtraderError> {
    EngineConfig::from_config(config).map(|_| ())
}

/// Comma-separated symbol list, upper-cased; empty tokens and duplicates are errors.
pub fn parse_symbols(input: &str) -> Result<Vec<String>, SwingtraderError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(invalid("engine", "symbols", "empty token in symbol list"));
        }
        let symbol = trimmed.to_uppercase();
        if !seen.insert(symbol.clone()) {
            return Err(invalid("engine", "symbols", &format!("duplicate symbol {symbol}")));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}

fn invalid(section: &str, key: &str, reason: &str) -> SwingtraderError {
    SwingtraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn get_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, SwingtraderError> {
    let value = config.get_int(section, key, default as i64);
    usize::try_from(value).map_err(|_| invalid(section, key, "must be non-negative"))
}

fn get_timeframe(
    config: &dyn ConfigPort,
    key: &str,
    default: Timeframe,
) -> Result<Timeframe, SwingtraderError> {
    match config.get_string("feed", key) {
        Some(raw) => raw.trim().parse().map_err(|e: String| invalid("feed", key, &e)),
        None => Ok(default),
    }
}

fn get_weekday(
    config: &dyn ConfigPort,
    key: &str,
    default: Weekday,
) -> Result<Weekday, SwingtraderError> {
    match config.get_string("session", key) {
        Some(raw) => raw
            .trim()
            .parse::<Weekday>()
            .map_err(|_| invalid("session", key, &format!("unknown weekday '{raw}'"))),
        None => Ok(default),
    }
}

fn get_hour(config: &dyn ConfigPort, key: &str, default: u32) -> Result<u32, SwingtraderError> {
    let value = config.get_int("session", key, default as i64);
    match u32::try_from(value) {
        Ok(hour) if hour < 24 => Ok(hour),
        _ => Err(invalid("session", key, "hour must be between 0 and 23")),
    }
}

fn validate_positive(section: &str, key: &str, value: f64) -> Result<(), SwingtraderError> {
    if !(value.is_finite() && value > 0.0) {
        return Err(invalid(section, key, &format!("{key} must be positive")));
    }
    Ok(())
}

fn validate_fraction(section: &str, key: &str, value: f64) -> Result<(), SwingtraderError> {
    if !(value > 0.0 && value < 1.0) {
        return Err(invalid(
            section,
            key,
            &format!("{key} must be strictly between 0 and 1"),
        ));
    }
    Ok(())
}

fn validate_frame(frame: &FrameConfig) -> Result<(), SwingtraderError> {
    let spans = [
        ("fast_span", frame.fast_span),
        ("slow_span", frame.slow_span),
        ("atr_window", frame.atr_window),
        ("baseline_window", frame.baseline_window),
        ("trend_window", frame.trend_window),
        ("structure_lookback", frame.structure_lookback),
    ];
    for (key, value) in spans {
        if value == 0 {
            return Err(invalid("signal", key, "must be positive"));
        }
    }
    Ok(())
}

fn validate_bars(key: &str, bars: usize, frame: &FrameConfig) -> Result<(), SwingtraderError> {
    let needed = frame.warmup();
    if bars < needed {
        return Err(invalid(
            "feed",
            key,
            &format!("{bars} bars cannot cover the {needed}-bar indicator warm-up"),
        ));
    }
    Ok(())
}
