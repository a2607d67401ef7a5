//! Maps the [`Ledger`] onto the persistent store.
//!
//! Layout:
//! - `balance`: decimal string
//! - `open_trades`: list of JSON-encoded positions, one entry per active symbol
//! - `last_scan_logs`: JSON object, symbol → status text
//!
//! Records that fail to decode are reported and left in the list exactly as found.
//! When a symbol has several records the last one wins and the older ones are removed
//! on the next commit.

use std::collections::BTreeMap;

use tracing::warn;

use super::error::SwingtraderError;
use super::ledger::Ledger;
use super::position::Position;
use crate::ports::store_port::PersistentStore;

pub const BALANCE_KEY: &str = "balance";
pub const POSITIONS_KEY: &str = "open_trades";
pub const SUMMARY_KEY: &str = "last_scan_logs";

pub struct LedgerRepository<'a> {
    store: &'a dyn PersistentStore,
    /// Raw record currently stored for each symbol the ledger owns.
    synced: BTreeMap<String, String>,
    skipped: Vec<String>,
    /// Older records for a symbol that has a newer one; removed on the next commit.
    superseded: Vec<String>,
}

impl<'a> LedgerRepository<'a> {
    pub fn new(store: &'a dyn PersistentStore) -> Self {
        Self {
            store,
            synced: BTreeMap::new(),
            skipped: Vec::new(),
            superseded: Vec::new(),
        }
    }

    /// Undecodable raw records ignored by the last `load`.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn load(
        &mut self,
        initial_balance: f64,
        risk_fraction: f64,
    ) -> Result<Ledger, SwingtraderError> {
        let balance = match self.store.get(BALANCE_KEY)? {
            Some(raw) => parse_balance(&raw)?,
            None => initial_balance,
        };

        self.synced.clear();
        self.skipped.clear();
        self.superseded.clear();

        // List order is append order, so a later record for a symbol is the newer one.
        let mut latest: BTreeMap<String, (String, Position)> = BTreeMap::new();
        for raw in self.store.list(POSITIONS_KEY)? {
            let position = match Position::decode(&raw) {
                Ok(p) => p,
                Err(e) => {
                    warn!(record = %raw, error = %e, "skipping undecodable position record");
                    self.skipped.push(raw);
                    continue;
                }
            };
            if let Some((older, _)) = latest.insert(position.symbol.clone(), (raw, position)) {
                warn!(record = %older, "dropping superseded position record");
                self.superseded.push(older);
            }
        }

        let mut ledger = Ledger::new(balance, risk_fraction);
        for (symbol, (raw, position)) in latest {
            ledger.open_position(position)?;
            self.synced.insert(symbol, raw);
        }

        Ok(ledger)
    }

    /// Writes the balance and brings the stored position list in line with the ledger.
    pub fn commit(&mut self, ledger: &Ledger) -> Result<(), SwingtraderError> {
        self.store.set(BALANCE_KEY, &ledger.balance().to_string())?;

        for raw in std::mem::take(&mut self.superseded) {
            self.store.remove_value(POSITIONS_KEY, &raw)?;
            // an identical live record went with it and is re-appended below
            self.synced.retain(|_, synced| *synced != raw);
        }

        let mut current = BTreeMap::new();
        for position in ledger.positions() {
            current.insert(position.symbol.clone(), position.encode()?);
        }

        let stale: Vec<(String, String)> = self
            .synced
            .iter()
            .filter(|(symbol, raw)| current.get(*symbol) != Some(*raw))
            .map(|(s, r)| (s.clone(), r.clone()))
            .collect();
        for (symbol, raw) in stale {
            self.store.remove_value(POSITIONS_KEY, &raw)?;
            self.synced.remove(&symbol);
        }

        for (symbol, raw) in current {
            if !self.synced.contains_key(&symbol) {
                self.store.append(POSITIONS_KEY, &raw)?;
                self.synced.insert(symbol, raw);
            }
        }

        Ok(())
    }

    /// Drops every stored position record, including ones `load` could not read.
    pub fn clear_positions(&mut self) -> Result<(), SwingtraderError> {
        self.store.delete(POSITIONS_KEY)?;
        self.synced.clear();
        self.superseded.clear();
        Ok(())
    }

    pub fn save_summary(&self, summary: &BTreeMap<String, String>) -> Result<(), SwingtraderError> {
        let raw = serde_json::to_string(summary)?;
        self.store.set(SUMMARY_KEY, &raw)
    }

    pub fn load_summary(&self) -> Result<BTreeMap<String, String>, SwingtraderError> {
        match self.store.get(SUMMARY_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(BTreeMap::new()),
        }
    }
}

fn parse_balance(raw: &str) -> Result<f64, SwingtraderError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|b| b.is_finite())
        .ok_or_else(|| SwingtraderError::Codec {
            reason: format!("invalid balance '{raw}'"),
        })
}
