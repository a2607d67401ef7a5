//! Indicator frame: every feature the signal pipeline reads, aligned to a series.

use super::atr::{AtrBaselineState, AtrState};
use super::ema::EmaState;
use super::structure::{StructurePoint, StructureState};
use super::trend_strength::TrendStrengthState;
use crate::domain::ohlcv::{Bar, Series};

/// Indicator parameters for one timeframe.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameConfig {
    pub fast_span: usize,
    pub slow_span: usize,
    pub atr_window: usize,
    pub baseline_window: usize,
    pub trend_window: usize,
    pub structure_lookback: usize,
}

impl FrameConfig {
    pub fn execution_default() -> Self {
        FrameConfig {
            fast_span: 20,
            slow_span: 50,
            atr_window: 14,
            baseline_window: 20,
            trend_window: 14,
            structure_lookback: 10,
        }
    }

    pub fn bias_default() -> Self {
        FrameConfig {
            slow_span: 200,
            ..Self::execution_default()
        }
    }

    /// Bars needed before every field is defined at the latest bar and at the one before it.
    pub fn warmup(&self) -> usize {
        let atr_chain = (self.atr_window + self.baseline_window).saturating_sub(1);
        [
            self.fast_span,
            self.slow_span,
            atr_chain,
            2 * self.trend_window,
            2 * self.structure_lookback,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
            + 1
    }
}

/// Snapshot of the frame at one bar index.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FramePoint {
    pub fast_ema: Option<f64>,
    pub slow_ema: Option<f64>,
    pub atr: Option<f64>,
    pub atr_baseline: Option<f64>,
    pub trend_strength: Option<f64>,
    pub structure: StructurePoint,
}

/// Incremental frame computation; one `push` per closed bar.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    fast: EmaState,
    slow: EmaState,
    atr: AtrState,
    baseline: AtrBaselineState,
    trend: TrendStrengthState,
    structure: StructureState,
}

impl FrameBuilder {
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            fast: EmaState::new(config.fast_span),
            slow: EmaState::new(config.slow_span),
            atr: AtrState::new(config.atr_window),
            baseline: AtrBaselineState::new(config.baseline_window),
            trend: TrendStrengthState::new(config.trend_window),
            structure: StructureState::new(config.structure_lookback),
        }
    }

    pub fn push(&mut self, bar: &Bar) -> FramePoint {
        let atr = self.atr.update(bar);
        FramePoint {
            fast_ema: Some(self.fast.update(bar.close)),
            slow_ema: Some(self.slow.update(bar.close)),
            atr,
            atr_baseline: self.baseline.update(atr),
            trend_strength: self.trend.update(bar),
            structure: self.structure.update(bar),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorFrame {
    points: Vec<FramePoint>,
}

impl IndicatorFrame {
    pub fn compute(series: &Series, config: &FrameConfig) -> Self {
        let mut builder = FrameBuilder::new(config);
        Self {
            points: series.bars().iter().map(|b| builder.push(b)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn at(&self, index: usize) -> Option<&FramePoint> {
        self.points.get(index)
    }

    pub fn last(&self) -> Option<&FramePoint> {
        self.points.last()
    }

    /// The two most recent points as (previous, current).
    pub fn last_pair(&self) -> Option<(&FramePoint, &FramePoint)> {
        match self.points.len() {
            n if n >= 2 => Some((&self.points[n - 2], &self.points[n - 1])),
            _ => None,
        }
    }
}
