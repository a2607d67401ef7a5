//! Multi-filter signal pipeline.
//!
//! The engine reads the two most recent closed bars of an execution timeframe and a
//! bias timeframe and runs, in order: bias, regime, value, structure, trigger. The
//! first failing filter ends the evaluation with a [`Rejection`]. The engine keeps no
//! state between calls; everything it knows comes from the series it is handed.

use std::fmt;

use super::indicator::frame::{FrameConfig, FramePoint, IndicatorFrame};
use super::ohlcv::{Bar, Series};
use super::position::Side;

#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    pub execution: FrameConfig,
    pub bias: FrameConfig,
    /// Trend strength at or above this lets the bias pass without a rising slow EMA.
    pub trend_override: f64,
    /// Maximum distance of the close from the fast EMA, in ATRs.
    pub value_atr_multiple: f64,
    pub stop_multiplier: f64,
    pub reward_ratio: f64,
    /// Opposite wick below this share of the bar range marks a dominant close.
    pub dominant_wick_ratio: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        SignalConfig {
            execution: FrameConfig::execution_default(),
            bias: FrameConfig::bias_default(),
            trend_override: 30.0,
            value_atr_multiple: 0.5,
            stop_multiplier: 1.5,
            reward_ratio: 2.0,
            dominant_wick_ratio: 0.382,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalDecision {
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk_distance: f64,
}

/// First filter that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    InsufficientHistory,
    Bias,
    Regime,
    Value,
    Structure,
    Trigger,
    Degenerate,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Rejection::InsufficientHistory => "insufficient history",
            Rejection::Bias => "bias filter",
            Rejection::Regime => "regime filter",
            Rejection::Value => "value filter",
            Rejection::Structure => "structure filter",
            Rejection::Trigger => "no trigger",
            Rejection::Degenerate => "degenerate input",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Signal(SignalDecision),
    NoSignal(Rejection),
}

impl Verdict {
    pub fn decision(&self) -> Option<&SignalDecision> {
        match self {
            Verdict::Signal(d) => Some(d),
            Verdict::NoSignal(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignalEngine {
    config: SignalConfig,
}

impl SignalEngine {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Computes both frames and evaluates.
    pub fn evaluate_series(&self, execution: &Series, bias: &Series) -> Verdict {
        let execution_frame = IndicatorFrame::compute(execution, &self.config.execution);
        let bias_frame = IndicatorFrame::compute(bias, &self.config.bias);
        self.evaluate(execution, &execution_frame, bias, &bias_frame)
    }

    pub fn evaluate(
        &self,
        execution: &Series,
        execution_frame: &IndicatorFrame,
        bias: &Series,
        bias_frame: &IndicatorFrame,
    ) -> Verdict {
        match self.run_pipeline(execution, execution_frame, bias, bias_frame) {
            Ok(decision) => Verdict::Signal(decision),
            Err(rejection) => Verdict::NoSignal(rejection),
        }
    }

    fn run_pipeline(
        &self,
        execution: &Series,
        execution_frame: &IndicatorFrame,
        bias: &Series,
        bias_frame: &IndicatorFrame,
    ) -> Result<SignalDecision, Rejection> {
        if execution.len() < self.config.execution.warmup()
            || bias.len() < self.config.bias.warmup()
            || execution_frame.len() != execution.len()
            || bias_frame.len() != bias.len()
        {
            return Err(Rejection::InsufficientHistory);
        }

        let (_, bias_bar) = bias.last_pair().ok_or(Rejection::InsufficientHistory)?;
        let (bias_prev, bias_curr) = bias_frame
            .last_pair()
            .ok_or(Rejection::InsufficientHistory)?;
        let (prev_bar, bar) = execution.last_pair().ok_or(Rejection::InsufficientHistory)?;
        let (_, point) = execution_frame
            .last_pair()
            .ok_or(Rejection::InsufficientHistory)?;

        let side = self.bias_filter(bias_bar.close, bias_prev, bias_curr)?;
        let atr = regime_filter(point)?;
        self.value_filter(bar.close, point, atr)?;
        structure_filter(side, point)?;
        self.trigger(side, prev_bar, bar)?;
        self.decision(side, bar.close, atr)
    }

    fn bias_filter(&self, close: f64, prev: &FramePoint, curr: &FramePoint) -> Result<Side, Rejection> {
        let (slow, prev_slow) = match (curr.slow_ema, prev.slow_ema) {
            (Some(s), Some(p)) => (s, p),
            _ => return Err(Rejection::Bias),
        };
        let strong = curr
            .trend_strength
            .is_some_and(|t| t >= self.config.trend_override);

        if close > slow && (slow > prev_slow || strong) {
            Ok(Side::Buy)
        } else if close < slow && (slow < prev_slow || strong) {
            Ok(Side::Sell)
        } else {
            Err(Rejection::Bias)
        }
    }

    fn value_filter(&self, close: f64, point: &FramePoint, atr: f64) -> Result<(), Rejection> {
        let fast = point.fast_ema.ok_or(Rejection::Value)?;
        if (close - fast).abs() < self.config.value_atr_multiple * atr {
            Ok(())
        } else {
            Err(Rejection::Value)
        }
    }

    fn trigger(&self, side: Side, prev: &Bar, bar: &Bar) -> Result<(), Rejection> {
        let range = bar.range();
        if !(range > 0.0) {
            return Err(Rejection::Trigger);
        }

        let fired = match side {
            Side::Buy => {
                let momentum = bar.close > prev.high;
                let dominant = (bar.high - bar.close) / range < self.config.dominant_wick_ratio;
                let engulfing = prev.is_bearish()
                    && bar.is_bullish()
                    && bar.close > prev.open
                    && bar.open <= prev.close;
                momentum || dominant || engulfing
            }
            Side::Sell => {
                let momentum = bar.close < prev.low;
                let dominant = (bar.close - bar.low) / range < self.config.dominant_wick_ratio;
                let engulfing = prev.is_bullish()
                    && bar.is_bearish()
                    && bar.close < prev.open
                    && bar.open >= prev.close;
                momentum || dominant || engulfing
            }
        };

        if fired { Ok(()) } else { Err(Rejection::Trigger) }
    }

    fn decision(&self, side: Side, close: f64, atr: f64) -> Result<SignalDecision, Rejection> {
        let stop_distance = atr * self.config.stop_multiplier;
        if !stop_distance.is_finite() || stop_distance <= 0.0 || !close.is_finite() {
            return Err(Rejection::Degenerate);
        }

        let sign = side.sign();
        let stop_loss = close - sign * stop_distance;
        let take_profit = close + sign * stop_distance * self.config.reward_ratio;
        let risk_distance = (close - stop_loss).abs();
        if risk_distance <= 0.0 || take_profit == close {
            return Err(Rejection::Degenerate);
        }

        Ok(SignalDecision {
            side,
            entry_price: close,
            stop_loss,
            take_profit,
            risk_distance,
        })
    }
}

/// ATR must exceed its baseline; an undefined or zero baseline means no expansion.
fn regime_filter(point: &FramePoint) -> Result<f64, Rejection> {
    match (point.atr, point.atr_baseline) {
        (Some(atr), Some(baseline)) if baseline > 0.0 && atr > baseline => Ok(atr),
        _ => Err(Rejection::Regime),
    }
}

fn structure_filter(side: Side, point: &FramePoint) -> Result<(), Rejection> {
    let confirmed = match side {
        Side::Buy => point.structure.higher_low(),
        Side::Sell => point.structure.lower_high(),
    };
    if confirmed { Ok(()) } else { Err(Rejection::Structure) }
}
