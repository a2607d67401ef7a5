//! CSV bar feed: one file per symbol and timeframe.
//!
//! Files live at `{base}/{SYMBOL}_{TIMEFRAME}.csv` with the header
//! `timestamp,open,high,low,close[,volume]` and RFC 3339 timestamps.

use crate::domain::error::SwingtraderError;
use crate::domain::ohlcv::{Bar, Series, Timeframe};
use crate::ports::data_feed::DataFeed;
use chrono::{DateTime, Utc};
use std::fs;
use std::path::PathBuf;

pub struct CsvDataFeed {
    base_path: PathBuf,
    cutoff: Option<DateTime<Utc>>,
}

impl CsvDataFeed {
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            cutoff: None,
        }
    }

    /// Only bars whose bucket has ended by `cutoff` are served.
    pub fn with_cutoff(mut self, cutoff: DateTime<Utc>) -> Self {
        self.cutoff = Some(cutoff);
        self
    }

    fn csv_path(&self, symbol: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", symbol, timeframe))
    }

    fn read_bars(&self, symbol: &str, timeframe: Timeframe) -> Result<Vec<Bar>, SwingtraderError> {
        let unavailable = |reason: String| SwingtraderError::DataUnavailable {
            symbol: symbol.to_string(),
            reason,
        };

        let path = self.csv_path(symbol, timeframe);
        let content = fs::read_to_string(&path)
            .map_err(|e| unavailable(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| unavailable(format!("CSV parse error: {}", e)))?;

            let field = |idx: usize, name: &str| -> Result<f64, SwingtraderError> {
                record
                    .get(idx)
                    .ok_or_else(|| unavailable(format!("missing {} column", name)))?
                    .parse()
                    .map_err(|e| unavailable(format!("invalid {} value: {}", name, e)))
            };

            let ts_str = record
                .get(0)
                .ok_or_else(|| unavailable("missing timestamp column".into()))?;
            let timestamp = DateTime::parse_from_rfc3339(ts_str)
                .map_err(|e| unavailable(format!("invalid timestamp '{}': {}", ts_str, e)))?
                .with_timezone(&Utc);

            let volume = match record.get(5) {
                Some(v) if !v.is_empty() => Some(field(5, "volume")?),
                _ => None,
            };

            bars.push(Bar {
                timestamp,
                open: field(1, "open")?,
                high: field(2, "high")?,
                low: field(3, "low")?,
                close: field(4, "close")?,
                volume,
            });
        }

        Ok(bars)
    }
}

impl DataFeed for CsvDataFeed {
    fn get_series(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Series, SwingtraderError> {
        let mut series = Series::from_unsorted(self.read_bars(symbol, timeframe)?);
        if let Some(cutoff) = self.cutoff {
            series = series.closed_as_of(cutoff, timeframe);
        }
        let series = series.tail(count);

        if series.is_empty() {
            return Err(SwingtraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("no closed {} bars", timeframe),
            });
        }
        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        // out of order, with a corrected duplicate of 10:00
        let csv_content = "timestamp,open,high,low,close,volume\n\
            2024-03-06T11:00:00Z,1.1010,1.1030,1.1000,1.1020,1200\n\
            2024-03-06T09:00:00Z,1.0990,1.1005,1.0985,1.1000,900\n\
            2024-03-06T10:00:00Z,1.1000,1.1015,1.0995,1.1008,\n\
            2024-03-06T10:00:00Z,1.1000,1.1015,1.0995,1.1010,1000\n";

        fs::write(path.join("EUR_USD_H1.csv"), csv_content).unwrap();
        fs::write(path.join("GBP_USD_H1.csv"), "timestamp,open,high,low,close\n").unwrap();
        fs::write(
            path.join("USD_JPY_H1.csv"),
            "timestamp,open,high,low,close\n2024-03-06 09:00,150.0,150.2,149.9,150.1\n",
        )
        .unwrap();

        (dir, path)
    }

    #[test]
    fn get_series_sorts_and_deduplicates() {
        let (_dir, path) = setup_test_data();
        let feed = CsvDataFeed::new(path);
        let series = feed.get_series("EUR_USD", Timeframe::H1, 10).unwrap();

        assert_eq!(series.len(), 3);
        let bars = series.bars();
        assert_eq!(bars[0].timestamp, Utc.with_ymd_and_hms(2024, 3, 6, 9, 0, 0).unwrap());
        assert_eq!(bars[1].close, 1.1010);
        assert_eq!(bars[1].volume, Some(1000.0));
        assert_eq!(bars[2].close, 1.1020);
    }

    #[test]
    fn get_series_keeps_most_recent_count() {
        let (_dir, path) = setup_test_data();
        let feed = CsvDataFeed::new(path);
        let series = feed.get_series("EUR_USD", Timeframe::H1, 2).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().close, 1.1020);
    }

    #[test]
    fn cutoff_drops_unfinished_bars() {
        let (_dir, path) = setup_test_data();
        let cutoff = Utc.with_ymd_and_hms(2024, 3, 6, 11, 30, 0).unwrap();
        let feed = CsvDataFeed::new(path).with_cutoff(cutoff);
        let series = feed.get_series("EUR_USD", Timeframe::H1, 10).unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.last().unwrap().close, 1.1010);
    }

    #[test]
    fn missing_or_empty_file_is_unavailable() {
        let (_dir, path) = setup_test_data();
        let feed = CsvDataFeed::new(path);
        for symbol in ["XAU_USD", "GBP_USD"] {
            assert!(matches!(
                feed.get_series(symbol, Timeframe::H1, 10),
                Err(SwingtraderError::DataUnavailable { .. })
            ));
        }
    }

    #[test]
    fn bad_timestamp_is_unavailable() {
        let (_dir, path) = setup_test_data();
        let feed = CsvDataFeed::new(path);
        assert!(matches!(
            feed.get_series("USD_JPY", Timeframe::H1, 10),
            Err(SwingtraderError::DataUnavailable { .. })
        ));
    }
}
