//! CLI definition and dispatch.

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvDataFeed;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::paper_broker::PaperBroker;
use crate::domain::clock::{MarketClock, SessionConfig};
use crate::domain::config::{validate_config, EngineConfig};
use crate::domain::error::SwingtraderError;
use crate::domain::ohlcv::Timeframe;
use crate::domain::orchestrator::{CycleReport, Orchestrator};
use crate::domain::repository::LedgerRepository;
use crate::ports::config_port::ConfigPort;
use crate::ports::store_port::PersistentStore;

#[derive(Parser, Debug)]
#[command(name = "swingtrader", about = "Periodic swing-trading engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one trading cycle
    RunCycle {
        #[arg(short, long)]
        config: PathBuf,
        /// Evaluate as of this instant (RFC 3339) instead of now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the stored ledger and the last per-symbol summary
    Status {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Print the market session state
    Session {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

impl Cli {
    pub fn config_path(&self) -> Option<&PathBuf> {
        match &self.command {
            Command::RunCycle { config, .. }
            | Command::Validate { config }
            | Command::Status { config } => Some(config),
            Command::Session { config, .. } => config.as_ref(),
        }
    }

    /// `[logging]` section of the config file; defaults when there is none or it is unreadable.
    pub fn log_settings(&self) -> LogSettings {
        let Some(adapter) = self
            .config_path()
            .and_then(|path| FileConfigAdapter::from_file(path).ok())
        else {
            return LogSettings::default();
        };
        LogSettings {
            level: adapter.get_string("logging", "level"),
            ansi: adapter.get_bool("logging", "ansi", true),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: Option<String>,
    pub ansi: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            level: None,
            ansi: true,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::RunCycle { config, at } => run_cycle(&config, at),
        Command::Validate { config } => run_validate(&config),
        Command::Status { config } => run_status(&config),
        Command::Session { config, at } => run_session(config.as_ref(), at),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

/// Opens the configured store: SQLite when built with it, otherwise an in-memory store.
pub fn open_store(config: &dyn ConfigPort) -> Result<Box<dyn PersistentStore>, SwingtraderError> {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_adapter::SqliteStore;
        let store = SqliteStore::from_config(config)?;
        store.initialize_schema()?;
        Ok(Box::new(store))
    }

    #[cfg(not(feature = "sqlite"))]
    {
        use crate::adapters::memory_store::MemoryStore;
        let _ = config;
        eprintln!("warning: sqlite feature disabled, state will not persist");
        Ok(Box::new(MemoryStore::new()))
    }
}

pub fn data_dir(config: &dyn ConfigPort) -> Result<PathBuf, SwingtraderError> {
    config
        .get_string("feed", "data_dir")
        .map(PathBuf::from)
        .ok_or_else(|| SwingtraderError::ConfigMissing {
            section: "feed".into(),
            key: "data_dir".into(),
        })
}

/// Timeframe the paper venue prices from; defaults to the execution timeframe.
pub fn paper_timeframe(
    config: &dyn ConfigPort,
    engine: &EngineConfig,
) -> Result<Timeframe, SwingtraderError> {
    match config.get_string("paper", "price_timeframe") {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|reason: String| SwingtraderError::ConfigInvalid {
                section: "paper".into(),
                key: "price_timeframe".into(),
                reason,
            }),
        None => Ok(engine.feed.execution_timeframe),
    }
}

pub fn run_cycle_pipeline(
    adapter: &dyn ConfigPort,
    now: DateTime<Utc>,
) -> Result<CycleReport, SwingtraderError> {
    let config = EngineConfig::from_config(adapter)?;
    let feed = CsvDataFeed::new(data_dir(adapter)?).with_cutoff(now);
    let store = open_store(adapter)?;
    let broker = PaperBroker::new(store.as_ref(), &feed, paper_timeframe(adapter, &config)?);

    Orchestrator::new(config, &feed, &broker, store.as_ref()).run_cycle(now)
}

fn run_cycle(config_path: &PathBuf, at: Option<DateTime<Utc>>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let now = at.unwrap_or_else(Utc::now);

    match run_cycle_pipeline(&adapter, now) {
        Ok(report) => {
            println!("session: {}", report.session);
            for (symbol, status) in &report.statuses {
                println!("  {symbol}: {status}");
            }
            for settlement in &report.settlements {
                println!(
                    "  settled {} {:?} {:+.2} -> {:.2}",
                    settlement.position.symbol,
                    settlement.outcome,
                    settlement.amount,
                    settlement.balance_after
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_config(&adapter) {
        eprintln!("error: {e}");
        return (&e).into();
    }
    let dir = match data_dir(&adapter) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    if !dir.is_dir() {
        eprintln!("warning: data directory {} does not exist", dir.display());
    }

    eprintln!("Config validated successfully");
    ExitCode::SUCCESS
}

fn run_status(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let result = EngineConfig::from_config(&adapter).and_then(|config| {
        let store = open_store(&adapter)?;
        let mut repo = LedgerRepository::new(store.as_ref());
        let ledger = repo.load(config.initial_balance, config.risk_fraction)?;
        let summary = repo.load_summary()?;
        Ok((ledger, summary, repo.skipped().len()))
    });

    match result {
        Ok((ledger, summary, skipped)) => {
            println!("balance: {:.2}", ledger.balance());
            println!("open positions: {}", ledger.position_count());
            for p in ledger.positions() {
                println!(
                    "  {} {} {} @ {} stop {} target {} [{:?}]",
                    p.symbol, p.side, p.size, p.entry_price, p.stop_loss, p.take_profit, p.status
                );
            }
            if skipped > 0 {
                println!("unreadable records: {skipped}");
            }
            println!("last scan:");
            for (symbol, status) in &summary {
                println!("  {symbol}: {status}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_session(config_path: Option<&PathBuf>, at: Option<DateTime<Utc>>) -> ExitCode {
    let session = match config_path {
        Some(path) => {
            let adapter = match load_config(path) {
                Ok(a) => a,
                Err(code) => return code,
            };
            match EngineConfig::from_config(&adapter) {
                Ok(config) => config.session,
                Err(e) => {
                    eprintln!("error: {e}");
                    return (&e).into();
                }
            }
        }
        None => SessionConfig::default(),
    };

    let now = at.unwrap_or_else(Utc::now);
    println!("{}", MarketClock::new(session).status(now));
    ExitCode::SUCCESS
}
