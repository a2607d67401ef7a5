//! Technical indicator implementations.
//!
//! Every indicator has two forms: a streaming state with an `update` method that
//! consumes one bar in O(1) amortized time, and a `calculate_*` function that folds
//! a whole [`Series`](crate::domain::ohlcv::Series) into an [`IndicatorSeries`].
//! Values are causal: the value at index *i* only depends on bars `0..=i`.
//! `None` marks an undefined value (warm-up), which is never the same as zero.

pub mod atr;
pub mod ema;
pub mod frame;
pub mod rolling;
pub mod structure;
pub mod trend_strength;

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Ema(usize),
    Atr(usize),
    AtrBaseline { atr: usize, window: usize },
    TrendStrength(usize),
    RecentLow(usize),
    RecentHigh(usize),
    PriorLow(usize),
    PriorHigh(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<Option<f64>>,
}

impl IndicatorSeries {
    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).copied().flatten()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied().flatten()
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Ema(span) => write!(f, "EMA({})", span),
            IndicatorType::Atr(window) => write!(f, "ATR({})", window),
            IndicatorType::AtrBaseline { atr, window } => {
                write!(f, "ATR_BASELINE({},{})", atr, window)
            }
            IndicatorType::TrendStrength(window) => write!(f, "ADX({})", window),
            IndicatorType::RecentLow(n) => write!(f, "RECENT_LOW({})", n),
            IndicatorType::RecentHigh(n) => write!(f, "RECENT_HIGH({})", n),
            IndicatorType::PriorLow(n) => write!(f, "PRIOR_LOW({})", n),
            IndicatorType::PriorHigh(n) => write!(f, "PRIOR_HIGH({})", n),
        }
    }
}
