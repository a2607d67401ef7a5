//! Port traits: the engine's view of everything outside the process.

pub mod broker_port;
pub mod config_port;
pub mod data_feed;
pub mod store_port;
