//! swingtrader: periodic swing-trading engine.
//!
//! Hexagonal architecture: signal, sizing and position lifecycle logic in [`domain`],
//! port traits in [`ports`], concrete implementations in [`adapters`].

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod ports;
