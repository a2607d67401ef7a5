//! Position records and the per-position lifecycle rules.
//!
//! A position moves LIVE → PARTIAL → CLOSED. The record is what gets encoded into the
//! persistent store, so its JSON shape is part of the storage contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::SwingtraderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    /// +1 for longs, -1 for shorts.
    pub fn sign(self) -> f64 {
        match self {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionStatus {
    Live,
    Partial,
    Closed,
}

/// How a closed position is classified for ledger settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Win,
    Loss,
    BreakEven,
}

/// Next lifecycle step suggested by the live price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LifecycleAction {
    Hold,
    TakePartial,
    ExitExhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub size: u64,
    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    /// Distance between entry and the original stop; fixes the R unit after break-even.
    pub initial_risk: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == Side::Buy
    }

    /// Price movement in the position's favour (negative when adverse).
    pub fn favourable_move(&self, price: f64) -> f64 {
        self.side.sign() * (price - self.entry_price)
    }

    /// Outcome if the position were closed at `price`. After the partial the stop sits
    /// at entry, so an adverse exit counts as break-even rather than a loss.
    pub fn outcome_at(&self, price: f64) -> Outcome {
        if self.favourable_move(price) > 0.0 {
            Outcome::Win
        } else if self.status == PositionStatus::Partial {
            Outcome::BreakEven
        } else {
            Outcome::Loss
        }
    }

    pub fn next_action(&self, price: f64, fast_ema: Option<f64>, partial_r: f64) -> LifecycleAction {
        match self.status {
            PositionStatus::Live => {
                if self.initial_risk > 0.0
                    && self.favourable_move(price) >= partial_r * self.initial_risk
                {
                    LifecycleAction::TakePartial
                } else {
                    LifecycleAction::Hold
                }
            }
            PositionStatus::Partial => {
                let crossed = match fast_ema {
                    Some(ema) if self.is_long() => price < ema,
                    Some(ema) => price > ema,
                    None => false,
                };
                if crossed {
                    LifecycleAction::ExitExhausted
                } else {
                    LifecycleAction::Hold
                }
            }
            PositionStatus::Closed => LifecycleAction::Hold,
        }
    }

    pub fn encode(&self) -> Result<String, SwingtraderError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Position, SwingtraderError> {
        Ok(serde_json::from_str(raw)?)
    }
}
