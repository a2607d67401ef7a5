#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};
use swingtrader::domain::error::SwingtraderError;
pub use swingtrader::domain::ohlcv::{Bar, Series, Timeframe};
use swingtrader::domain::position::{Position, PositionStatus, Side};
use swingtrader::ports::broker_port::{BrokerGateway, OrderRequest};
use swingtrader::ports::data_feed::DataFeed;

/// Wednesday 14:00 UTC: market open, last H1 bar of the setups closes exactly now.
pub fn trading_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 6, 14, 0, 0).unwrap()
}

pub fn saturday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()
}

pub fn friday_late() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 8, 22, 0, 0).unwrap()
}

fn bars_ending(
    data: &[(f64, f64, f64, f64)],
    last_start: DateTime<Utc>,
    step: Duration,
) -> Vec<Bar> {
    let start = last_start - step * (data.len() as i32 - 1);
    data.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            timestamp: start + step * i as i32,
            open,
            high,
            low,
            close,
            volume: None,
        })
        .collect()
}

/// 100 H1 bars: slow uptrend, volatility expansion over the last dozen bars, and a
/// final bar closing near its high. Together with [`bullish_bias_bars`] this passes
/// every entry filter for a BUY at 101.98 with ATR 0.85.
pub fn bullish_execution_bars() -> Vec<Bar> {
    let data: Vec<_> = (0..100)
        .map(|i| {
            let c = 100.0 + 0.02 * i as f64;
            match i {
                0..=87 => (c - 0.02, c + 0.1, c - 0.1, c),
                88..=98 => (c - 0.3, c + 0.5, c - 0.5, c),
                _ => (c - 0.3, c + 0.1, c - 0.4, c),
            }
        })
        .collect();
    bars_ending(
        &data,
        Utc.with_ymd_and_hms(2024, 3, 6, 13, 0, 0).unwrap(),
        Duration::hours(1),
    )
}

/// 250 D1 bars in a steady uptrend.
pub fn bullish_bias_bars() -> Vec<Bar> {
    let data: Vec<_> = (0..250)
        .map(|i| {
            let c = 50.0 + 0.1 * i as f64;
            (c - 0.05, c + 0.1, c - 0.1, c)
        })
        .collect();
    bars_ending(
        &data,
        Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap(),
        Duration::days(1),
    )
}

/// Reflects prices around 100 so a bullish setup becomes a bearish one.
pub fn mirrored(bars: &[Bar]) -> Vec<Bar> {
    bars.iter()
        .map(|b| Bar {
            open: 200.0 - b.open,
            high: 200.0 - b.low,
            low: 200.0 - b.high,
            close: 200.0 - b.close,
            ..b.clone()
        })
        .collect()
}

pub fn flat_bars(count: usize, price: f64, step: Duration, last_start: DateTime<Utc>) -> Vec<Bar> {
    bars_ending(&vec![(price, price, price, price); count], last_start, step)
}

pub fn live_long(symbol: &str) -> Position {
    Position {
        symbol: symbol.to_string(),
        side: Side::Buy,
        entry_price: 1.1000,
        stop_loss: 1.0950,
        take_profit: 1.1100,
        size: 10_000,
        status: PositionStatus::Live,
        opened_at: Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap(),
        initial_risk: 0.0050,
    }
}

pub struct MockDataFeed {
    pub data: HashMap<(String, Timeframe), Vec<Bar>>,
    pub errors: HashSet<String>,
}

impl MockDataFeed {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashSet::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, timeframe: Timeframe, bars: Vec<Bar>) -> Self {
        self.data.insert((symbol.to_string(), timeframe), bars);
        self
    }

    /// Execution (H1) and bias (D1) bars for a BUY setup.
    pub fn with_bullish_setup(self, symbol: &str) -> Self {
        self.with_bars(symbol, Timeframe::H1, bullish_execution_bars())
            .with_bars(symbol, Timeframe::D1, bullish_bias_bars())
    }

    pub fn with_bearish_setup(self, symbol: &str) -> Self {
        self.with_bars(symbol, Timeframe::H1, mirrored(&bullish_execution_bars()))
            .with_bars(symbol, Timeframe::D1, mirrored(&bullish_bias_bars()))
    }

    pub fn with_error(mut self, symbol: &str) -> Self {
        self.errors.insert(symbol.to_string());
        self
    }
}

impl DataFeed for MockDataFeed {
    fn get_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Series, SwingtraderError> {
        let unavailable = |reason: &str| SwingtraderError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        };
        if self.errors.contains(symbol) {
            return Err(unavailable("feed down"));
        }
        match self.data.get(&(symbol.to_string(), timeframe)) {
            Some(bars) if !bars.is_empty() => Ok(Series::from_unsorted(bars.clone()).tail(count)),
            _ => Err(unavailable("no data")),
        }
    }
}

#[derive(Default)]
pub struct MockBroker {
    pub open: RefCell<BTreeSet<String>>,
    pub prices: RefCell<HashMap<String, f64>>,
    pub rejected: HashSet<String>,
    pub snapshot_down: bool,
    pub close_all_fails: bool,
    pub orders: RefCell<Vec<OrderRequest>>,
    pub closes: RefCell<Vec<(String, Side, u64)>>,
    pub close_all_calls: Cell<usize>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_open(self, symbol: &str) -> Self {
        self.open.borrow_mut().insert(symbol.to_string());
        self
    }

    pub fn with_price(self, symbol: &str, price: f64) -> Self {
        self.prices.borrow_mut().insert(symbol.to_string(), price);
        self
    }

    pub fn rejecting(mut self, symbol: &str) -> Self {
        self.rejected.insert(symbol.to_string());
        self
    }

    pub fn with_snapshot_down(mut self) -> Self {
        self.snapshot_down = true;
        self
    }

    pub fn with_failing_close_all(mut self) -> Self {
        self.close_all_fails = true;
        self
    }
}

impl BrokerGateway for MockBroker {
    fn place_order(&self, order: &OrderRequest) -> Result<(), SwingtraderError> {
        if self.rejected.contains(&order.symbol) {
            return Err(SwingtraderError::BrokerRejected {
                symbol: order.symbol.clone(),
                reason: "insufficient margin".into(),
            });
        }
        self.orders.borrow_mut().push(order.clone());
        self.open.borrow_mut().insert(order.symbol.clone());
        Ok(())
    }

    fn get_open_positions(&self) -> Result<BTreeSet<String>, SwingtraderError> {
        if self.snapshot_down {
            return Err(SwingtraderError::BrokerUnavailable {
                reason: "timeout".into(),
            });
        }
        Ok(self.open.borrow().clone())
    }

    fn get_last_price(&self, symbol: &str) -> Result<f64, SwingtraderError> {
        self.prices
            .borrow()
            .get(symbol)
            .copied()
            .ok_or_else(|| SwingtraderError::BrokerUnavailable {
                reason: format!("no quote for {symbol}"),
            })
    }

    fn close_position(&self, symbol: &str, side: Side, size: u64) -> Result<(), SwingtraderError> {
        self.closes
            .borrow_mut()
            .push((symbol.to_string(), side, size));
        Ok(())
    }

    fn close_all(&self) -> Result<(), SwingtraderError> {
        if self.close_all_fails {
            return Err(SwingtraderError::BrokerUnavailable {
                reason: "session expired".into(),
            });
        }
        self.close_all_calls.set(self.close_all_calls.get() + 1);
        self.open.borrow_mut().clear();
        Ok(())
    }
}
