//! Execution venue port.

use std::collections::BTreeSet;

use crate::domain::error::SwingtraderError;
use crate::domain::position::Side;

#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub size: u64,
    pub stop_loss: f64,
    pub take_profit: f64,
}

/// The venue is authoritative for which positions are open.
pub trait BrokerGateway {
    fn place_order(&self, order: &OrderRequest) -> Result<(), SwingtraderError>;

    fn get_open_positions(&self) -> Result<BTreeSet<String>, SwingtraderError>;

    fn get_last_price(&self, symbol: &str) -> Result<f64, SwingtraderError>;

    /// Closes `size` units of the position held on `side`.
    fn close_position(&self, symbol: &str, side: Side, size: u64) -> Result<(), SwingtraderError>;

    fn close_all(&self) -> Result<(), SwingtraderError>;
}
