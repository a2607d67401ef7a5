//! Reconciliation of the local ledger against the venue's open positions.

use std::collections::BTreeSet;

use tracing::{info, warn};

use super::error::SwingtraderError;
use super::ledger::{Ledger, PayoffConfig, Settlement};
use crate::ports::broker_port::BrokerGateway;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconcileReport {
    pub settled: Vec<Settlement>,
    /// Symbols closed at the venue that could not be priced; left untouched.
    pub ambiguous: Vec<String>,
    /// Symbols the venue reported open; `None` when the snapshot could not be fetched.
    pub venue_open: Option<BTreeSet<String>>,
}

impl ReconcileReport {
    pub fn venue_unavailable(&self) -> bool {
        self.venue_open.is_none()
    }

    /// Whether the venue may hold `symbol`. An unknown snapshot counts as held.
    pub fn venue_holds(&self, symbol: &str) -> bool {
        self.venue_open
            .as_ref()
            .is_none_or(|open| open.contains(symbol))
    }
}

pub fn reconcile(
    ledger: &mut Ledger,
    broker: &dyn BrokerGateway,
    payoff: &PayoffConfig,
) -> ReconcileReport {
    // A no-op callback cannot fail.
    reconcile_each(ledger, broker, payoff, |_, _| Ok(())).unwrap_or_default()
}

/// Like [`reconcile`], calling `on_settled` right after each settlement is applied.
/// An error from the callback stops reconciliation and is returned.
pub fn reconcile_each<F>(
    ledger: &mut Ledger,
    broker: &dyn BrokerGateway,
    payoff: &PayoffConfig,
    mut on_settled: F,
) -> Result<ReconcileReport, SwingtraderError>
where
    F: FnMut(&Ledger, &Settlement) -> Result<(), SwingtraderError>,
{
    let mut report = ReconcileReport::default();

    let open_at_venue = match broker.get_open_positions() {
        Ok(open) => open,
        Err(e) => {
            warn!(error = %e, "venue snapshot unavailable, skipping reconciliation");
            return Ok(report);
        }
    };

    for symbol in ledger.symbols() {
        if open_at_venue.contains(&symbol) {
            continue;
        }

        let price = match broker.get_last_price(&symbol) {
            Ok(p) if p.is_finite() => p,
            Ok(_) | Err(_) => {
                let e = SwingtraderError::ReconciliationAmbiguous {
                    symbol: symbol.clone(),
                };
                warn!(%symbol, "{e}");
                report.ambiguous.push(symbol);
                continue;
            }
        };

        if let Some(settlement) = ledger.settle_external(&symbol, price, payoff) {
            info!(
                %symbol,
                outcome = ?settlement.outcome,
                amount = settlement.amount,
                balance = settlement.balance_after,
                "position closed at venue"
            );
            on_settled(ledger, &settlement)?;
            report.settled.push(settlement);
        }
    }

    report.venue_open = Some(open_at_venue);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::SettlementReason;
    use crate::domain::position::{Outcome, Position, PositionStatus, Side};
    use crate::ports::broker_port::OrderRequest;
    use chrono::{TimeZone, Utc};
    use std::collections::{BTreeMap, BTreeSet};

    struct StubBroker {
        open: Option<BTreeSet<String>>,
        prices: BTreeMap<String, f64>,
    }

    impl StubBroker {
        fn new(open: &[&str]) -> Self {
            Self {
                open: Some(open.iter().map(|s| s.to_string()).collect()),
                prices: BTreeMap::new(),
            }
        }

        fn with_price(mut self, symbol: &str, price: f64) -> Self {
            self.prices.insert(symbol.into(), price);
            self
        }
    }

    impl BrokerGateway for StubBroker {
        fn place_order(&self, _: &OrderRequest) -> Result<(), SwingtraderError> {
            Ok(())
        }

        fn get_open_positions(&self) -> Result<BTreeSet<String>, SwingtraderError> {
            self.open
                .clone()
                .ok_or_else(|| SwingtraderError::BrokerUnavailable {
                    reason: "down".into(),
                })
        }

        fn get_last_price(&self, symbol: &str) -> Result<f64, SwingtraderError> {
            self.prices
                .get(symbol)
                .copied()
                .ok_or_else(|| SwingtraderError::BrokerUnavailable {
                    reason: "no quote".into(),
                })
        }

        fn close_position(&self, _: &str, _: Side, _: u64) -> Result<(), SwingtraderError> {
            Ok(())
        }

        fn close_all(&self) -> Result<(), SwingtraderError> {
            Ok(())
        }
    }

    fn long(symbol: &str) -> Position {
        Position {
            symbol: symbol.into(),
            side: Side::Buy,
            entry_price: 1.1000,
            stop_loss: 1.0950,
            take_profit: 1.1100,
            size: 10_000,
            status: PositionStatus::Live,
            opened_at: Utc.with_ymd_and_hms(2024, 3, 6, 14, 0, 0).unwrap(),
            initial_risk: 0.0050,
        }
    }

    fn ledger_with(symbols: &[&str]) -> Ledger {
        let mut ledger = Ledger::new(10_000.0, 0.005);
        for s in symbols {
            ledger.open_position(long(s)).unwrap();
        }
        ledger
    }

    #[test]
    fn missing_long_below_entry_settles_as_loss() {
        let mut ledger = ledger_with(&["EUR_USD"]);
        let broker = StubBroker::new(&[]).with_price("EUR_USD", 1.0945);

        let report = reconcile(&mut ledger, &broker, &PayoffConfig::default());
        assert_eq!(report.settled.len(), 1);
        let settlement = &report.settled[0];
        assert_eq!(settlement.outcome, Outcome::Loss);
        assert_eq!(settlement.reason, SettlementReason::VenueClosed);
        assert!((ledger.balance() - 9_950.0).abs() < 1e-9);
        assert_eq!(ledger.position_count(), 0);
    }

    #[test]
    fn positions_open_on_both_sides_are_untouched() {
        let mut ledger = ledger_with(&["EUR_USD", "GBP_USD"]);
        let broker = StubBroker::new(&["EUR_USD", "GBP_USD", "USD_JPY"]);

        let report = reconcile(&mut ledger, &broker, &PayoffConfig::default());
        assert!(report.settled.is_empty());
        assert!(report.venue_holds("USD_JPY"));
        assert!(!report.venue_holds("AUD_USD"));
        assert_eq!(ledger.position_count(), 2);
        assert!((ledger.balance() - 10_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unpriced_symbol_is_ambiguous() {
        let mut ledger = ledger_with(&["EUR_USD", "GBP_USD"]);
        let broker = StubBroker::new(&[]).with_price("GBP_USD", 1.2000);

        let report = reconcile(&mut ledger, &broker, &PayoffConfig::default());
        assert_eq!(report.ambiguous, vec!["EUR_USD".to_string()]);
        assert_eq!(report.settled.len(), 1);
        assert!(ledger.has_position("EUR_USD"));
        assert!(!ledger.has_position("GBP_USD"));
    }

    #[test]
    fn unavailable_snapshot_settles_nothing() {
        let mut ledger = ledger_with(&["EUR_USD"]);
        let broker = StubBroker {
            open: None,
            prices: BTreeMap::new(),
        }
        .with_price("EUR_USD", 1.0);

        let report = reconcile(&mut ledger, &broker, &PayoffConfig::default());
        assert!(report.venue_unavailable());
        assert!(report.venue_holds("GBP_USD"));
        assert!(report.settled.is_empty());
        assert!(ledger.has_position("EUR_USD"));
    }

    #[test]
    fn callback_sees_ledger_after_each_settlement() {
        let mut ledger = ledger_with(&["AUD_USD", "EUR_USD"]);
        let broker = StubBroker::new(&[])
            .with_price("AUD_USD", 1.2000)
            .with_price("EUR_USD", 1.2000);

        let mut seen = Vec::new();
        reconcile_each(&mut ledger, &broker, &PayoffConfig::default(), |l, s| {
            seen.push((l.position_count(), s.balance_after));
            Ok(())
        })
        .unwrap();

        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].0, 1);
        assert_eq!(seen[1].0, 0);
        assert!((seen[1].1 - 10_201.0).abs() < 1e-9);
    }

    #[test]
    fn callback_error_stops_reconciliation() {
        let mut ledger = ledger_with(&["AUD_USD", "EUR_USD"]);
        let broker = StubBroker::new(&[])
            .with_price("AUD_USD", 1.2000)
            .with_price("EUR_USD", 1.2000);

        let result = reconcile_each(&mut ledger, &broker, &PayoffConfig::default(), |_, _| {
            Err(SwingtraderError::Database {
                reason: "disk full".into(),
            })
        });
        assert!(result.is_err());
        assert!(ledger.has_position("EUR_USD"));
    }
}
