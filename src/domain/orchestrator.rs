//! One trading cycle: session gate, reconciliation, position management, entry scan.
//!
//! The venue is always changed first and the ledger second; the ledger is committed to
//! the store right after each confirmed change. An interrupted cycle can therefore leave
//! a venue position with no local record, so entries are only placed for symbols the
//! venue snapshot reports flat.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::clock::{MarketClock, MarketSession};
use super::config::EngineConfig;
use super::error::SwingtraderError;
use super::indicator::frame::IndicatorFrame;
use super::ledger::{Ledger, Settlement};
use super::ohlcv::{Series, Timeframe};
use super::position::{LifecycleAction, Position, PositionStatus, Side};
use super::reconcile::reconcile_each;
use super::repository::LedgerRepository;
use super::signal::{SignalDecision, SignalEngine, Verdict};
use super::sizing;
use crate::ports::broker_port::{BrokerGateway, OrderRequest};
use crate::ports::data_feed::DataFeed;
use crate::ports::store_port::PersistentStore;

/// Summary key used when the whole cycle was decided by the session gate.
pub const SYSTEM_KEY: &str = "System";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolStatus {
    Searching,
    Entered(Side),
    PositionLive,
    PartialTaken,
    Exited,
    DataUnavailable,
    BrokerRejected,
    NoSize,
    VenueUnavailable,
    MarketClosed,
    MarketClosing,
}

impl fmt::Display for SymbolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolStatus::Searching => f.write_str("Searching"),
            SymbolStatus::Entered(side) => write!(f, "Entered {side}"),
            SymbolStatus::PositionLive => f.write_str("Position live"),
            SymbolStatus::PartialTaken => f.write_str("Partial taken"),
            SymbolStatus::Exited => f.write_str("Exited"),
            SymbolStatus::DataUnavailable => f.write_str("Data unavailable"),
            SymbolStatus::BrokerRejected => f.write_str("Broker rejected"),
            SymbolStatus::NoSize => f.write_str("No size"),
            SymbolStatus::VenueUnavailable => f.write_str("Venue unavailable"),
            SymbolStatus::MarketClosed => f.write_str("Market Closed"),
            SymbolStatus::MarketClosing => f.write_str("Market Closing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub session: MarketSession,
    pub settlements: Vec<Settlement>,
    pub entries: Vec<Position>,
    pub statuses: BTreeMap<String, SymbolStatus>,
}

impl CycleReport {
    fn new(session: MarketSession) -> Self {
        CycleReport {
            session,
            settlements: Vec::new(),
            entries: Vec::new(),
            statuses: BTreeMap::new(),
        }
    }
}

pub struct Orchestrator<'a> {
    config: EngineConfig,
    engine: SignalEngine,
    clock: MarketClock,
    feed: &'a dyn DataFeed,
    broker: &'a dyn BrokerGateway,
    store: &'a dyn PersistentStore,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: EngineConfig,
        feed: &'a dyn DataFeed,
        broker: &'a dyn BrokerGateway,
        store: &'a dyn PersistentStore,
    ) -> Self {
        Self {
            engine: SignalEngine::new(config.signal.clone()),
            clock: MarketClock::new(config.session.clone()),
            config,
            feed,
            broker,
            store,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session(&self, now: DateTime<Utc>) -> MarketSession {
        self.clock.status(now)
    }

    pub fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleReport, SwingtraderError> {
        let session = self.clock.status(now);
        info!(%now, %session, "starting cycle");

        match session {
            MarketSession::Closing => self.flatten(),
            MarketSession::Closed => {
                let repo = LedgerRepository::new(self.store);
                repo.save_summary(&system_summary(SymbolStatus::MarketClosed))?;
                let mut report = CycleReport::new(session);
                self.mark_all(&mut report, SymbolStatus::MarketClosed);
                Ok(report)
            }
            MarketSession::Open => self.trade(now),
        }
    }

    /// Flattens the venue unconditionally, then drops every local position record.
    fn flatten(&self) -> Result<CycleReport, SwingtraderError> {
        self.broker.close_all()?;

        let mut repo = LedgerRepository::new(self.store);
        let loaded = self.load(&mut repo);
        repo.clear_positions()?;
        let mut ledger = loaded.inspect_err(|e| {
            warn!(error = %e, "venue flattened but the stored ledger could not be read");
        })?;
        let closed = ledger.flatten_all();
        repo.commit(&ledger)?;
        repo.save_summary(&system_summary(SymbolStatus::MarketClosing))?;
        info!(closed = closed.len(), "market closing, flattened all positions");

        let mut report = CycleReport::new(MarketSession::Closing);
        self.mark_all(&mut report, SymbolStatus::MarketClosing);
        Ok(report)
    }

    fn trade(&self, now: DateTime<Utc>) -> Result<CycleReport, SwingtraderError> {
        let mut repo = LedgerRepository::new(self.store);
        let mut ledger = self.load(&mut repo)?;
        let mut report = CycleReport::new(MarketSession::Open);

        let mut reconciled = reconcile_each(
            &mut ledger,
            self.broker,
            &self.config.payoff,
            |ledger, _| repo.commit(ledger),
        )?;
        for settlement in std::mem::take(&mut reconciled.settled) {
            report
                .statuses
                .insert(settlement.position.symbol.clone(), SymbolStatus::Exited);
            report.settlements.push(settlement);
        }

        for symbol in ledger.symbols() {
            let status = self.manage(&symbol, now, &mut ledger, &mut repo, &mut report)?;
            report.statuses.insert(symbol, status);
        }

        let exited: BTreeSet<String> = report
            .statuses
            .iter()
            .filter(|(_, s)| **s == SymbolStatus::Exited)
            .map(|(symbol, _)| symbol.clone())
            .collect();

        for symbol in &self.config.symbols {
            if ledger.has_position(symbol) || exited.contains(symbol) {
                continue;
            }
            if reconciled.venue_unavailable() {
                report
                    .statuses
                    .insert(symbol.clone(), SymbolStatus::VenueUnavailable);
                continue;
            }
            if reconciled.venue_holds(symbol) {
                warn!(%symbol, "venue holds a position with no local record, not entering");
                report.statuses.insert(symbol.clone(), SymbolStatus::PositionLive);
                continue;
            }
            let status = self.scan(symbol, now, &mut ledger, &mut repo, &mut report)?;
            report.statuses.insert(symbol.clone(), status);
        }

        repo.commit(&ledger)?;
        let summary = report
            .statuses
            .iter()
            .map(|(symbol, status)| (symbol.clone(), status.to_string()))
            .collect();
        repo.save_summary(&summary)?;

        info!(
            balance = ledger.balance(),
            open = ledger.position_count(),
            entries = report.entries.len(),
            settlements = report.settlements.len(),
            "cycle complete"
        );
        Ok(report)
    }

    fn load(&self, repo: &mut LedgerRepository<'_>) -> Result<Ledger, SwingtraderError> {
        repo.load(self.config.initial_balance, self.config.risk_fraction)
    }

    /// Partial profit and trend-exhaustion exit for an active position.
    fn manage(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
        ledger: &mut Ledger,
        repo: &mut LedgerRepository<'_>,
        report: &mut CycleReport,
    ) -> Result<SymbolStatus, SwingtraderError> {
        let Some(position) = ledger.get_position(symbol).cloned() else {
            return Ok(SymbolStatus::Searching);
        };
        let holding = match position.status {
            PositionStatus::Partial => SymbolStatus::PartialTaken,
            _ => SymbolStatus::PositionLive,
        };

        let price = match self.broker.get_last_price(symbol) {
            Ok(p) if p.is_finite() => p,
            Ok(_) | Err(_) => {
                warn!(%symbol, "no live price, holding position");
                return Ok(holding);
            }
        };

        let fast_ema = self
            .fetch(symbol, self.config.feed.execution_timeframe, self.config.feed.execution_bars, now)
            .ok()
            .and_then(|series| {
                IndicatorFrame::compute(&series, &self.config.signal.execution)
                    .last()
                    .and_then(|p| p.fast_ema)
            });

        match position.next_action(price, fast_ema, self.config.lifecycle.partial_r_multiple) {
            LifecycleAction::Hold => Ok(holding),
            LifecycleAction::TakePartial => {
                let units =
                    (position.size as f64 * self.config.lifecycle.partial_close_fraction).floor() as u64;
                if units > 0 {
                    if let Err(e) = self.broker.close_position(symbol, position.side, units) {
                        warn!(%symbol, error = %e, "partial close failed");
                        return Ok(holding);
                    }
                }
                if let Some(credit) = ledger.take_partial(symbol, units, &self.config.payoff) {
                    repo.commit(ledger)?;
                    info!(%symbol, units, credit, price, "partial profit taken, stop at entry");
                }
                Ok(SymbolStatus::PartialTaken)
            }
            LifecycleAction::ExitExhausted => {
                if let Err(e) = self.broker.close_position(symbol, position.side, position.size) {
                    warn!(%symbol, error = %e, "exhaustion exit failed");
                    return Ok(holding);
                }
                match ledger.close_exhausted(symbol, price, &self.config.payoff) {
                    Some(settlement) => {
                        repo.commit(ledger)?;
                        info!(
                            %symbol,
                            outcome = ?settlement.outcome,
                            amount = settlement.amount,
                            "trend exhausted, runner closed"
                        );
                        report.settlements.push(settlement);
                        Ok(SymbolStatus::Exited)
                    }
                    None => Ok(holding),
                }
            }
        }
    }

    /// Entry scan for a symbol with no active position.
    fn scan(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
        ledger: &mut Ledger,
        repo: &mut LedgerRepository<'_>,
        report: &mut CycleReport,
    ) -> Result<SymbolStatus, SwingtraderError> {
        let feed = &self.config.feed;
        let series = self
            .fetch(symbol, feed.execution_timeframe, feed.execution_bars, now)
            .and_then(|exec| {
                self.fetch(symbol, feed.bias_timeframe, feed.bias_bars, now)
                    .map(|bias| (exec, bias))
            });
        let (execution, bias) = match series {
            Ok(pair) => pair,
            Err(e) => {
                warn!(%symbol, error = %e, "skipping symbol");
                return Ok(SymbolStatus::DataUnavailable);
            }
        };

        let decision = match self.engine.evaluate_series(&execution, &bias) {
            Verdict::Signal(decision) => decision,
            Verdict::NoSignal(rejection) => {
                debug!(%symbol, %rejection, "no signal");
                return Ok(SymbolStatus::Searching);
            }
        };

        let units = sizing::size(
            ledger.balance(),
            ledger.risk_fraction(),
            decision.entry_price,
            decision.stop_loss,
        );
        if units == 0 {
            info!(%symbol, balance = ledger.balance(), "signal skipped, risk budget below one unit");
            return Ok(SymbolStatus::NoSize);
        }

        let order = OrderRequest {
            symbol: symbol.to_string(),
            side: decision.side,
            size: units,
            stop_loss: decision.stop_loss,
            take_profit: decision.take_profit,
        };
        if let Err(e) = self.broker.place_order(&order) {
            warn!(%symbol, error = %e, "order not accepted");
            return Ok(SymbolStatus::BrokerRejected);
        }

        let position = open_position(symbol, &decision, units, now);
        ledger.open_position(position.clone())?;
        repo.commit(ledger)?;
        info!(
            %symbol,
            side = %position.side,
            size = units,
            entry = position.entry_price,
            stop = position.stop_loss,
            target = position.take_profit,
            "position opened"
        );
        report.entries.push(position);
        Ok(SymbolStatus::Entered(decision.side))
    }

    fn fetch(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        count: usize,
        now: DateTime<Utc>,
    ) -> Result<Series, SwingtraderError> {
        let series = self
            .feed
            .get_series(symbol, timeframe, count)?
            .closed_as_of(now, timeframe);
        if series.is_empty() {
            return Err(SwingtraderError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("no closed {timeframe} bars as of {now}"),
            });
        }
        Ok(series)
    }

    fn mark_all(&self, report: &mut CycleReport, status: SymbolStatus) {
        for symbol in &self.config.symbols {
            report.statuses.insert(symbol.clone(), status);
        }
    }
}

fn open_position(symbol: &str, decision: &SignalDecision, size: u64, now: DateTime<Utc>) -> Position {
    Position {
        symbol: symbol.to_string(),
        side: decision.side,
        entry_price: decision.entry_price,
        stop_loss: decision.stop_loss,
        take_profit: decision.take_profit,
        size,
        status: PositionStatus::Live,
        opened_at: now,
        initial_risk: decision.risk_distance,
    }
}

fn system_summary(status: SymbolStatus) -> BTreeMap<String, String> {
    BTreeMap::from([(SYSTEM_KEY.to_string(), status.to_string())])
}
