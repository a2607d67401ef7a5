//! Average True Range and its rolling baseline.
//!
//! TR[0] = high - low, TR[i] = max(H-L, |H-C[i-1]|, |L-C[i-1]|).
//! ATR(n) is the simple mean of the last n true ranges, undefined for the first n-1 bars.
//! The baseline is the simple mean of the last m defined ATR values.

use super::rolling::RollingMean;
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::{Bar, Series};

#[derive(Debug, Clone)]
pub struct AtrState {
    prev_close: Option<f64>,
    mean: RollingMean,
}

impl AtrState {
    pub fn new(window: usize) -> Self {
        Self {
            prev_close: None,
            mean: RollingMean::new(window),
        }
    }

    pub fn update(&mut self, bar: &Bar) -> Option<f64> {
        let tr = match self.prev_close {
            None => bar.range(),
            Some(prev) => bar.true_range(prev),
        };
        self.prev_close = Some(bar.close);
        self.mean.push(tr.max(0.0))
    }
}

/// Rolling mean over the defined values of an ATR stream.
#[derive(Debug, Clone)]
pub struct AtrBaselineState {
    mean: RollingMean,
}

impl AtrBaselineState {
    pub fn new(window: usize) -> Self {
        Self {
            mean: RollingMean::new(window),
        }
    }

    pub fn update(&mut self, atr: Option<f64>) -> Option<f64> {
        match atr {
            Some(v) => self.mean.push(v),
            None => None,
        }
    }
}

pub fn calculate_atr(series: &Series, window: usize) -> IndicatorSeries {
    let mut state = AtrState::new(window);
    IndicatorSeries {
        indicator_type: IndicatorType::Atr(window),
        values: series.bars().iter().map(|b| state.update(b)).collect(),
    }
}

pub fn calculate_atr_baseline(atr: &IndicatorSeries, window: usize) -> IndicatorSeries {
    let atr_window = match atr.indicator_type {
        IndicatorType::Atr(w) => w,
        _ => 0,
    };
    let mut state = AtrBaselineState::new(window);
    IndicatorSeries {
        indicator_type: IndicatorType::AtrBaseline {
            atr: atr_window,
            window,
        },
        values: atr.values.iter().map(|&v| state.update(v)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::{series_from_closes, series_from_ohlc};

    #[test]
    fn atr_undefined_before_window() {
        let series = series_from_ohlc(&[(100.0, 110.0, 90.0, 100.0); 5]);
        let atr = calculate_atr(&series, 3);

        assert_eq!(atr.values.len(), 5);
        assert_eq!(atr.get(0), None);
        assert_eq!(atr.get(1), None);
        assert_eq!(atr.get(2), Some(20.0));
        assert_eq!(atr.get(4), Some(20.0));
    }

    #[test]
    fn atr_is_simple_mean_of_true_range() {
        let series = series_from_ohlc(&[
            (105.0, 110.0, 100.0, 105.0),
            (125.0, 130.0, 120.0, 125.0),
            (115.0, 120.0, 110.0, 115.0),
        ]);
        let atr = calculate_atr(&series, 2);

        // TR: 10, max(10, 25, 15) = 25, max(10, 5, 15) = 15
        assert_eq!(atr.get(0), None);
        assert!((atr.get(1).unwrap() - 17.5).abs() < 1e-12);
        assert!((atr.get(2).unwrap() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn atr_of_flat_series_is_zero() {
        let atr = calculate_atr(&series_from_closes(&[1.1; 30]), 14);
        assert_eq!(atr.last(), Some(0.0));
    }

    #[test]
    fn atr_insufficient_bars() {
        let atr = calculate_atr(&series_from_closes(&[1.0, 2.0]), 5);
        assert!(atr.values.iter().all(Option::is_none));
    }

    #[test]
    fn baseline_skips_undefined_atr() {
        let atr = IndicatorSeries {
            indicator_type: IndicatorType::Atr(3),
            values: vec![None, None, Some(2.0), Some(4.0), Some(6.0)],
        };
        let baseline = calculate_atr_baseline(&atr, 2);
        assert_eq!(
            baseline.values,
            vec![None, None, None, Some(3.0), Some(5.0)]
        );
        assert_eq!(
            baseline.indicator_type,
            IndicatorType::AtrBaseline { atr: 3, window: 2 }
        );
    }
}
