//! Market data port.

use crate::domain::error::SwingtraderError;
use crate::domain::ohlcv::{Series, Timeframe};

pub trait DataFeed {
    /// Up to `count` most recent fully-closed bars, oldest first.
    ///
    /// An empty or unreachable source is `SwingtraderError::DataUnavailable`.
    fn get_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Series, SwingtraderError>;
}
