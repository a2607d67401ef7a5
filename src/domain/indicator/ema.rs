//! Exponential Moving Average indicator.
//!
//! α = 2/(span+1), seeded with the first close, then EMA[i] = α·C[i] + (1-α)·EMA[i-1].
//! Defined from the first bar onward.

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::Series;

#[derive(Debug, Clone)]
pub struct EmaState {
    alpha: f64,
    value: Option<f64>,
}

impl EmaState {
    pub fn new(span: usize) -> Self {
        Self {
            alpha: 2.0 / (span as f64 + 1.0),
            value: None,
        }
    }

    pub fn update(&mut self, close: f64) -> f64 {
        let next = match self.value {
            None => close,
            Some(prev) => self.alpha * close + (1.0 - self.alpha) * prev,
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

pub fn calculate_ema(series: &Series, span: usize) -> IndicatorSeries {
    if span == 0 || series.is_empty() {
        return IndicatorSeries {
            indicator_type: IndicatorType::Ema(span),
            values: Vec::new(),
        };
    }

    let mut state = EmaState::new(span);
    let values = series
        .bars()
        .iter()
        .map(|bar| Some(state.update(bar.close)))
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(span),
        values,
    }
}
