//! Simulated execution venue.
//!
//! The book is a JSON object stored under `paper_positions`. Prices come from the
//! latest bar of the data feed; a position whose stop or target lies inside that bar's
//! range is treated as filled and disappears from the open set.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::error::SwingtraderError;
use crate::domain::ohlcv::{Bar, Timeframe};
use crate::domain::position::Side;
use crate::ports::broker_port::{BrokerGateway, OrderRequest};
use crate::ports::data_feed::DataFeed;
use crate::ports::store_port::PersistentStore;

pub const BOOK_KEY: &str = "paper_positions";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperPosition {
    pub side: Side,
    pub size: u64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

impl PaperPosition {
    fn exit_hit(&self, bar: &Bar) -> bool {
        match self.side {
            Side::Buy => bar.low <= self.stop_loss || bar.high >= self.take_profit,
            Side::Sell => bar.high >= self.stop_loss || bar.low <= self.take_profit,
        }
    }
}

pub struct PaperBroker<'a> {
    store: &'a dyn PersistentStore,
    feed: &'a dyn DataFeed,
    timeframe: Timeframe,
}

impl<'a> PaperBroker<'a> {
    pub fn new(store: &'a dyn PersistentStore, feed: &'a dyn DataFeed, timeframe: Timeframe) -> Self {
        Self {
            store,
            feed,
            timeframe,
        }
    }

    pub fn book(&self) -> Result<BTreeMap<String, PaperPosition>, SwingtraderError> {
        match self.store.get(BOOK_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(BTreeMap::new()),
        }
    }

    fn save_book(&self, book: &BTreeMap<String, PaperPosition>) -> Result<(), SwingtraderError> {
        self.store.set(BOOK_KEY, &serde_json::to_string(book)?)
    }

    fn latest_bar(&self, symbol: &str) -> Result<Bar, SwingtraderError> {
        let unavailable = |reason: String| SwingtraderError::BrokerUnavailable {
            reason: format!("{symbol}: {reason}"),
        };
        let series = self
            .feed
            .get_series(symbol, self.timeframe, 1)
            .map_err(|e| unavailable(e.to_string()))?;
        series
            .last()
            .cloned()
            .ok_or_else(|| unavailable("no price".into()))
    }
}

impl BrokerGateway for PaperBroker<'_> {
    fn place_order(&self, order: &OrderRequest) -> Result<(), SwingtraderError> {
        let rejected = |reason: &str| SwingtraderError::BrokerRejected {
            symbol: order.symbol.clone(),
            reason: reason.to_string(),
        };

        if order.size == 0 {
            return Err(rejected("zero size"));
        }
        let mut book = self.book()?;
        if book.contains_key(&order.symbol) {
            return Err(rejected("position already open"));
        }
        self.latest_bar(&order.symbol)
            .map_err(|_| rejected("no price available"))?;

        book.insert(
            order.symbol.clone(),
            PaperPosition {
                side: order.side,
                size: order.size,
                stop_loss: order.stop_loss,
                take_profit: order.take_profit,
            },
        );
        self.save_book(&book)?;
        info!(symbol = %order.symbol, side = %order.side, size = order.size, "paper order filled");
        Ok(())
    }

    fn get_open_positions(&self) -> Result<BTreeSet<String>, SwingtraderError> {
        let mut book = self.book()?;
        let before = book.len();

        book.retain(|symbol, position| match self.latest_bar(symbol) {
            Ok(bar) => !position.exit_hit(&bar),
            Err(_) => true,
        });

        if book.len() != before {
            self.save_book(&book)?;
        }
        Ok(book.into_keys().collect())
    }

    fn get_last_price(&self, symbol: &str) -> Result<f64, SwingtraderError> {
        Ok(self.latest_bar(symbol)?.close)
    }

    fn close_position(&self, symbol: &str, side: Side, size: u64) -> Result<(), SwingtraderError> {
        let mut book = self.book()?;
        let position = book
            .get_mut(symbol)
            .filter(|p| p.side == side)
            .ok_or_else(|| SwingtraderError::BrokerRejected {
                symbol: symbol.to_string(),
                reason: format!("no {side} position"),
            })?;

        position.size = position.size.saturating_sub(size);
        if position.size == 0 {
            book.remove(symbol);
        }
        self.save_book(&book)
    }

    fn close_all(&self) -> Result<(), SwingtraderError> {
        self.store.delete(BOOK_KEY)
    }
}
