//! Weekly market session gate.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use std::fmt;

const MINUTES_PER_DAY: u32 = 24 * 60;
const MINUTES_PER_WEEK: u32 = 7 * MINUTES_PER_DAY;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketSession {
    Open,
    /// Between the weekly close and the end of that day: positions get flattened.
    Closing,
    Closed,
}

impl MarketSession {
    pub fn as_str(self) -> &'static str {
        match self {
            MarketSession::Open => "OPEN",
            MarketSession::Closing => "CLOSING",
            MarketSession::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for MarketSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weekly close and reopen instants, UTC.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub close_weekday: Weekday,
    pub close_hour: u32,
    pub reopen_weekday: Weekday,
    pub reopen_hour: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            close_weekday: Weekday::Fri,
            close_hour: 21,
            reopen_weekday: Weekday::Sun,
            reopen_hour: 21,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketClock {
    close_at: u32,
    closing_len: u32,
    closed_len: u32,
}

impl MarketClock {
    pub fn new(config: SessionConfig) -> Self {
        let close_at = minute_of_week(config.close_weekday, config.close_hour, 0);
        let reopen_at = minute_of_week(config.reopen_weekday, config.reopen_hour, 0);
        let closed_len = (reopen_at + MINUTES_PER_WEEK - close_at) % MINUTES_PER_WEEK;
        let closing_len = MINUTES_PER_DAY.saturating_sub(config.close_hour.min(24) * 60);

        Self {
            close_at,
            closing_len: closing_len.min(closed_len),
            closed_len,
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> MarketSession {
        let now_at = minute_of_week(now.weekday(), now.hour(), now.minute());
        let since_close = (now_at + MINUTES_PER_WEEK - self.close_at) % MINUTES_PER_WEEK;

        if since_close < self.closing_len {
            MarketSession::Closing
        } else if since_close < self.closed_len {
            MarketSession::Closed
        } else {
            MarketSession::Open
        }
    }
}

impl Default for MarketClock {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

fn minute_of_week(day: Weekday, hour: u32, minute: u32) -> u32 {
    (day.num_days_from_monday() * MINUTES_PER_DAY + hour * 60 + minute) % MINUTES_PER_WEEK
}
