//! Account ledger: cash balance plus the set of active positions.
//!
//! Every balance change goes through a `&mut self` method that updates the balance and
//! the position set together, so a settlement is never half-applied.

use std::collections::BTreeMap;

use super::error::SwingtraderError;
use super::position::{Outcome, Position, PositionStatus};

/// Fixed payoffs, each a fraction of the balance at settlement time.
#[derive(Debug, Clone, PartialEq)]
pub struct PayoffConfig {
    pub win_fraction: f64,
    pub loss_fraction: f64,
    pub partial_fraction: f64,
}

impl Default for PayoffConfig {
    fn default() -> Self {
        PayoffConfig {
            win_fraction: 0.01,
            loss_fraction: 0.005,
            partial_fraction: 0.005,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementReason {
    TrendExhaustion,
    VenueClosed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub position: Position,
    pub outcome: Outcome,
    pub reason: SettlementReason,
    /// Signed balance change.
    pub amount: f64,
    pub balance_after: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    cash_balance: f64,
    risk_fraction: f64,
    positions: BTreeMap<String, Position>,
}

impl Ledger {
    pub fn new(cash_balance: f64, risk_fraction: f64) -> Self {
        Ledger {
            cash_balance,
            risk_fraction,
            positions: BTreeMap::new(),
        }
    }

    pub fn balance(&self) -> f64 {
        self.cash_balance
    }

    pub fn risk_fraction(&self) -> f64 {
        self.risk_fraction
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn position_count(&self) -> usize {
        self.positions.len()
    }

    /// Active positions ordered by symbol.
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.positions.keys().cloned().collect()
    }

    pub fn open_position(&mut self, position: Position) -> Result<(), SwingtraderError> {
        if self.has_position(&position.symbol) {
            return Err(SwingtraderError::PositionExists {
                symbol: position.symbol,
            });
        }
        self.positions.insert(position.symbol.clone(), position);
        Ok(())
    }

    /// Books the partial profit on a LIVE position: credits the balance, moves the stop
    /// to entry and reduces the size by `units_closed`. Returns the credited amount, or
    /// `None` when the symbol has no LIVE position.
    pub fn take_partial(
        &mut self,
        symbol: &str,
        units_closed: u64,
        payoff: &PayoffConfig,
    ) -> Option<f64> {
        let position = self.positions.get_mut(symbol)?;
        if position.status != PositionStatus::Live {
            return None;
        }

        let credit = payoff.partial_fraction * self.cash_balance;
        self.cash_balance += credit;
        position.stop_loss = position.entry_price;
        position.size = position.size.saturating_sub(units_closed);
        position.status = PositionStatus::Partial;
        Some(credit)
    }

    /// Closes the runner after the trend turned against it.
    pub fn close_exhausted(
        &mut self,
        symbol: &str,
        price: f64,
        payoff: &PayoffConfig,
    ) -> Option<Settlement> {
        let outcome = {
            let position = self.positions.get(symbol)?;
            if position.favourable_move(price) > 0.0 {
                Outcome::Win
            } else {
                Outcome::BreakEven
            }
        };
        self.settle(symbol, outcome, SettlementReason::TrendExhaustion, payoff)
    }

    /// Settles a position the venue no longer reports as open.
    pub fn settle_external(
        &mut self,
        symbol: &str,
        last_price: f64,
        payoff: &PayoffConfig,
    ) -> Option<Settlement> {
        let outcome = self.positions.get(symbol)?.outcome_at(last_price);
        self.settle(symbol, outcome, SettlementReason::VenueClosed, payoff)
    }

    /// Drops every active position without touching the balance.
    pub fn flatten_all(&mut self) -> Vec<Position> {
        std::mem::take(&mut self.positions)
            .into_values()
            .map(|mut p| {
                p.status = PositionStatus::Closed;
                p
            })
            .collect()
    }

    fn settle(
        &mut self,
        symbol: &str,
        outcome: Outcome,
        reason: SettlementReason,
        payoff: &PayoffConfig,
    ) -> Option<Settlement> {
        let mut position = self.positions.remove(symbol)?;
        let amount = match outcome {
            Outcome::Win => payoff.win_fraction * self.cash_balance,
            Outcome::Loss => -payoff.loss_fraction * self.cash_balance,
            Outcome::BreakEven => 0.0,
        };
        self.cash_balance += amount;
        position.status = PositionStatus::Closed;

        Some(Settlement {
            position,
            outcome,
            reason,
            amount,
            balance_after: self.cash_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{LifecycleAction, Side};
    use chrono::{TimeZone, Utc};

    fn live(symbol: &str, side: Side) -> Position {
        let (stop, target) = match side {
            Side::Buy => (1.0950, 1.1100),
            Side::Sell => (1.1050, 1.0900),
        };
        Position {
            symbol: symbol.into(),
            side,
            entry_price: 1.1000,
            stop_loss: stop,
            take_profit: target,
            size: 10_000,
            status: PositionStatus::Live,
            opened_at: Utc.with_ymd_and_hms(2024, 3, 6, 14, 0, 0).unwrap(),
            initial_risk: 0.0050,
        }
    }

    #[test]
    fn new_ledger_is_empty() {
        let ledger = Ledger::new(10_000.0, 0.005);
        assert!((ledger.balance() - 10_000.0).abs() < f64::EPSILON);
        assert_eq!(ledger.position_count(), 0);
    }

    #[test]
    fn second_position_for_symbol_is_refused() {
        let mut ledger = Ledger::new(10_000.0, 0.005);
        ledger.open_position(live("EUR_USD", Side::Buy)).unwrap();
        let err = ledger.open_position(live("EUR_USD", Side::Sell)).unwrap_err();
        assert!(matches!(err, SwingtraderError::PositionExists { .. }));
        assert_eq!(ledger.position_count(), 1);
        assert_eq!(ledger.get_position("EUR_USD").unwrap().side, Side::Buy);
    }

    #[test]
    fn two_r_move_takes_partial() {
        let payoff = PayoffConfig::default();
        let mut ledger = Ledger::new(10_000.0, 0.005);
        ledger.open_position(live("EUR_USD", Side::Buy)).unwrap();

        let action = ledger
            .get_position("EUR_USD")
            .unwrap()
            .next_action(1.1101, None, 2.0);
        assert_eq!(action, LifecycleAction::TakePartial);

        let credit = ledger.take_partial("EUR_USD", 5_000, &payoff).unwrap();
        assert!((credit - 50.0).abs() < 1e-9);
        assert!((ledger.balance() - 10_050.0).abs() < 1e-9);

        let pos = ledger.get_position("EUR_USD").unwrap();
        assert_eq!(pos.status, PositionStatus::Partial);
        assert_eq!(pos.stop_loss, pos.entry_price);
        assert_eq!(pos.size, 5_000);
        assert!((pos.initial_risk - 0.0050).abs() < f64::EPSILON);
    }

    #[test]
    fn partial_only_once() {
        let payoff = PayoffConfig::default();
        let mut ledger = Ledger::new(10_000.0, 0.005);
        ledger.open_position(live("EUR_USD", Side::Buy)).unwrap();
        ledger.take_partial("EUR_USD", 5_000, &payoff).unwrap();
        assert!(ledger.take_partial("EUR_USD", 2_500, &payoff).is_none());
        assert!(ledger.take_partial("GBP_USD", 1, &payoff).is_none());
    }

    #[test]
    fn venue_close_below_entry_is_a_loss_for_longs() {
        let payoff = PayoffConfig::default();
        let mut ledger = Ledger::new(10_000.0, 0.005);
        ledger.open_position(live("EUR_USD", Side::Buy)).unwrap();

        let settlement = ledger.settle_external("EUR_USD", 1.0940, &payoff).unwrap();
        assert_eq!(settlement.outcome, Outcome::Loss);
        assert_eq!(settlement.reason, SettlementReason::VenueClosed);
        assert!((settlement.amount + 50.0).abs() < 1e-9);
        assert!((ledger.balance() - 9_950.0).abs() < 1e-9);
        assert_eq!(settlement.position.status, PositionStatus::Closed);
        assert!(!ledger.has_position("EUR_USD"));
    }

    #[test]
    fn venue_close_below_entry_is_a_win_for_shorts() {
        let payoff = PayoffConfig::default();
        let mut ledger = Ledger::new(10_000.0, 0.005);
        ledger.open_position(live("EUR_USD", Side::Sell)).unwrap();

        let settlement = ledger.settle_external("EUR_USD", 1.0900, &payoff).unwrap();
        assert_eq!(settlement.outcome, Outcome::Win);
        assert!((ledger.balance() - 10_100.0).abs() < 1e-9);
    }

    #[test]
    fn adverse_venue_close_after_partial_is_break_even() {
        let payoff = PayoffConfig::default();
        let mut ledger = Ledger::new(10_000.0, 0.005);
        ledger.open_position(live("EUR_USD", Side::Buy)).unwrap();
        ledger.take_partial("EUR_USD", 5_000, &payoff).unwrap();

        let settlement = ledger.settle_external("EUR_USD", 1.0990, &payoff).unwrap();
        assert_eq!(settlement.outcome, Outcome::BreakEven);
        assert_eq!(settlement.amount, 0.0);
        assert!((ledger.balance() - 10_050.0).abs() < 1e-9);
    }

    #[test]
    fn exhaustion_exit_in_profit_wins() {
        let payoff = PayoffConfig::default();
        let mut ledger = Ledger::new(10_000.0, 0.005);
        ledger.open_position(live("EUR_USD", Side::Buy)).unwrap();
        ledger.take_partial("EUR_USD", 5_000, &payoff).unwrap();

        let settlement = ledger.close_exhausted("EUR_USD", 1.1080, &payoff).unwrap();
        assert_eq!(settlement.outcome, Outcome::Win);
        assert_eq!(settlement.reason, SettlementReason::TrendExhaustion);
        assert!((settlement.amount - 100.5).abs() < 1e-9);
        assert!((settlement.balance_after - 10_150.5).abs() < 1e-9);
    }

    #[test]
    fn exhaustion_exit_at_entry_is_break_even() {
        let payoff = PayoffConfig::default();
        let mut ledger = Ledger::new(10_000.0, 0.005);
        ledger.open_position(live("EUR_USD", Side::Buy)).unwrap();
        let settlement = ledger.close_exhausted("EUR_USD", 1.1000, &payoff).unwrap();
        assert_eq!(settlement.outcome, Outcome::BreakEven);
        assert!((ledger.balance() - 10_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn settling_unknown_symbol_is_noop() {
        let payoff = PayoffConfig::default();
        let mut ledger = Ledger::new(10_000.0, 0.005);
        assert!(ledger.settle_external("XAU_USD", 2000.0, &payoff).is_none());
        assert!(ledger.close_exhausted("XAU_USD", 2000.0, &payoff).is_none());
        assert!((ledger.balance() - 10_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn flatten_clears_without_balance_change() {
        let mut ledger = Ledger::new(10_000.0, 0.005);
        ledger.open_position(live("EUR_USD", Side::Buy)).unwrap();
        ledger.open_position(live("GBP_USD", Side::Sell)).unwrap();

        let closed = ledger.flatten_all();
        assert_eq!(closed.len(), 2);
        assert!(closed.iter().all(|p| p.status == PositionStatus::Closed));
        assert_eq!(ledger.position_count(), 0);
        assert!((ledger.balance() - 10_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn positions_iterate_by_symbol() {
        let mut ledger = Ledger::new(10_000.0, 0.005);
        ledger.open_position(live("USD_JPY", Side::Buy)).unwrap();
        ledger.open_position(live("AUD_USD", Side::Buy)).unwrap();
        assert_eq!(ledger.symbols(), vec!["AUD_USD", "USD_JPY"]);
    }
}
