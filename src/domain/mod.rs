//! Core domain types and logic.

pub mod clock;
pub mod config;
pub mod error;
pub mod indicator;
pub mod ledger;
pub mod ohlcv;
pub mod orchestrator;
pub mod position;
pub mod reconcile;
pub mod repository;
pub mod signal;
pub mod sizing;
