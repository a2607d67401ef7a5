//! Swing structure: rolling lows/highs of the current window versus the window before it.
//!
//! recent_low/high = min/max of the last `lookback` bars.
//! prior_low/high  = min/max of the `lookback` bars immediately preceding that window.
//! Recent values are defined from index lookback-1, prior values from 2*lookback-1.

use std::collections::VecDeque;

use super::rolling::{Extreme, RollingExtreme};
use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::{Bar, Series};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StructurePoint {
    pub recent_low: Option<f64>,
    pub recent_high: Option<f64>,
    pub prior_low: Option<f64>,
    pub prior_high: Option<f64>,
}

impl StructurePoint {
    /// Higher low: the current window's low sits above the previous window's low.
    pub fn higher_low(&self) -> bool {
        matches!((self.recent_low, self.prior_low), (Some(r), Some(p)) if r > p)
    }

    /// Lower high: the current window's high sits below the previous window's high.
    pub fn lower_high(&self) -> bool {
        matches!((self.recent_high, self.prior_high), (Some(r), Some(p)) if r < p)
    }
}

#[derive(Debug, Clone)]
pub struct StructureState {
    lookback: usize,
    pending: VecDeque<(f64, f64)>,
    recent_low: RollingExtreme,
    recent_high: RollingExtreme,
    prior_low: RollingExtreme,
    prior_high: RollingExtreme,
}

impl StructureState {
    pub fn new(lookback: usize) -> Self {
        Self {
            lookback,
            pending: VecDeque::with_capacity(lookback + 1),
            recent_low: RollingExtreme::new(Extreme::Min, lookback),
            recent_high: RollingExtreme::new(Extreme::Max, lookback),
            prior_low: RollingExtreme::new(Extreme::Min, lookback),
            prior_high: RollingExtreme::new(Extreme::Max, lookback),
        }
    }

    pub fn update(&mut self, bar: &Bar) -> StructurePoint {
        if self.lookback == 0 {
            return StructurePoint::default();
        }

        let recent_low = self.recent_low.push(bar.low);
        let recent_high = self.recent_high.push(bar.high);

        // A bar leaves the recent window exactly when it enters the prior one.
        self.pending.push_back((bar.low, bar.high));
        if self.pending.len() > self.lookback {
            if let Some((low, high)) = self.pending.pop_front() {
                self.prior_low.push(low);
                self.prior_high.push(high);
            }
        }

        StructurePoint {
            recent_low,
            recent_high,
            prior_low: self.prior_low.current(),
            prior_high: self.prior_high.current(),
        }
    }
}

/// Returns (recent_low, recent_high, prior_low, prior_high) series.
pub fn calculate_structure(
    series: &Series,
    lookback: usize,
) -> (IndicatorSeries, IndicatorSeries, IndicatorSeries, IndicatorSeries) {
    let mut state = StructureState::new(lookback);
    let points: Vec<StructurePoint> = series.bars().iter().map(|b| state.update(b)).collect();

    let column = |indicator_type: IndicatorType, pick: fn(&StructurePoint) -> Option<f64>| {
        IndicatorSeries {
            indicator_type,
            values: points.iter().map(pick).collect(),
        }
    };

    (
        column(IndicatorType::RecentLow(lookback), |p| p.recent_low),
        column(IndicatorType::RecentHigh(lookback), |p| p.recent_high),
        column(IndicatorType::PriorLow(lookback), |p| p.prior_low),
        column(IndicatorType::PriorHigh(lookback), |p| p.prior_high),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::series_from_ohlc;

    fn bars_with_lows(lows: &[f64]) -> Series {
        let data: Vec<_> = lows.iter().map(|&l| (l + 1.0, l + 2.0, l, l + 1.0)).collect();
        series_from_ohlc(&data)
    }

    #[test]
    fn windows_are_adjacent_and_disjoint() {
        let series = bars_with_lows(&[5.0, 3.0, 4.0, 8.0, 6.0, 7.0]);
        let (recent_low, recent_high, prior_low, prior_high) = calculate_structure(&series, 3);

        assert_eq!(recent_low.get(1), None);
        assert_eq!(recent_low.get(2), Some(3.0));
        assert_eq!(prior_low.get(4), None);
        // Index 5: recent = [8, 6, 7], prior = [5, 3, 4]
        assert_eq!(recent_low.get(5), Some(6.0));
        assert_eq!(prior_low.get(5), Some(3.0));
        assert_eq!(recent_high.get(5), Some(10.0));
        assert_eq!(prior_high.get(5), Some(7.0));
    }

    #[test]
    fn higher_low_detected() {
        let series = bars_with_lows(&[5.0, 3.0, 4.0, 8.0, 6.0, 7.0]);
        let mut state = StructureState::new(3);
        let last = series
            .bars()
            .iter()
            .map(|b| state.update(b))
            .last()
            .unwrap();
        assert!(last.higher_low());
        assert!(!last.lower_high());
    }

    #[test]
    fn undefined_prior_window_is_not_structure() {
        let point = StructurePoint {
            recent_low: Some(2.0),
            recent_high: Some(3.0),
            prior_low: None,
            prior_high: None,
        };
        assert!(!point.higher_low());
        assert!(!point.lower_high());
    }

    #[test]
    fn zero_lookback_is_undefined() {
        let series = bars_with_lows(&[1.0, 2.0, 3.0]);
        let (recent_low, _, prior_low, _) = calculate_structure(&series, 0);
        assert!(recent_low.values.iter().all(Option::is_none));
        assert!(prior_low.values.iter().all(Option::is_none));
    }
}
