//! Trend strength: Wilder's Average Directional Index.
//!
//! 1. +DM / -DM from consecutive highs and lows
//! 2. Wilder-smooth +DM, -DM and TR over `window` (seeded with the plain mean)
//! 3. DI± = 100 * DM± / TR, DX = 100 * |DI+ - DI-| / (DI+ + DI-)
//! 4. ADX = Wilder-smoothed DX
//!
//! First defined at index 2*window - 1. Range is [0, 100].

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::ohlcv::{Bar, Series};

#[derive(Debug, Clone, Copy)]
struct Directional {
    tr: f64,
    plus_dm: f64,
    minus_dm: f64,
}

/// Wilder smoothing seeded with the mean of the first `window` samples.
#[derive(Debug, Clone)]
struct Wilder {
    window: usize,
    count: usize,
    seed_sum: f64,
    value: Option<f64>,
}

impl Wilder {
    fn new(window: usize) -> Self {
        Self {
            window,
            count: 0,
            seed_sum: 0.0,
            value: None,
        }
    }

    fn push(&mut self, x: f64) -> Option<f64> {
        let n = self.window as f64;
        self.value = match self.value {
            Some(prev) => Some(prev + (x - prev) / n),
            None => {
                self.count += 1;
                self.seed_sum += x;
                (self.count == self.window).then(|| self.seed_sum / n)
            }
        };
        self.value
    }
}

#[derive(Debug, Clone)]
pub struct TrendStrengthState {
    window: usize,
    prev: Option<(f64, f64, f64)>,
    tr: Wilder,
    plus_dm: Wilder,
    minus_dm: Wilder,
    adx: Wilder,
}

impl TrendStrengthState {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            prev: None,
            tr: Wilder::new(window),
            plus_dm: Wilder::new(window),
            minus_dm: Wilder::new(window),
            adx: Wilder::new(window),
        }
    }

    fn directional(bar: &Bar, prev: (f64, f64, f64)) -> Directional {
        let (prev_high, prev_low, prev_close) = prev;
        let up = bar.high - prev_high;
        let down = prev_low - bar.low;
        Directional {
            tr: bar.true_range(prev_close),
            plus_dm: if up > down && up > 0.0 { up } else { 0.0 },
            minus_dm: if down > up && down > 0.0 { down } else { 0.0 },
        }
    }

    pub fn update(&mut self, bar: &Bar) -> Option<f64> {
        if self.window == 0 {
            return None;
        }
        let prev = self.prev.replace((bar.high, bar.low, bar.close));
        let dm = Self::directional(bar, prev?);

        let tr = self.tr.push(dm.tr);
        let plus = self.plus_dm.push(dm.plus_dm);
        let minus = self.minus_dm.push(dm.minus_dm);

        let (tr, plus, minus) = match (tr, plus, minus) {
            (Some(t), Some(p), Some(m)) => (t, p, m),
            _ => return None,
        };

        let dx = if tr <= 0.0 {
            0.0
        } else {
            let plus_di = 100.0 * plus / tr;
            let minus_di = 100.0 * minus / tr;
            let sum = plus_di + minus_di;
            if sum == 0.0 {
                0.0
            } else {
                100.0 * (plus_di - minus_di).abs() / sum
            }
        };

        self.adx.push(dx).map(|v| v.clamp(0.0, 100.0))
    }
}

pub fn calculate_trend_strength(series: &Series, window: usize) -> IndicatorSeries {
    let mut state = TrendStrengthState::new(window);
    IndicatorSeries {
        indicator_type: IndicatorType::TrendStrength(window),
        values: series.bars().iter().map(|b| state.update(b)).collect(),
    }
}
