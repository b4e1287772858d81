//! Live account state: open positions and resting orders. Never persisted.

use crate::domain::{Address, Decimal, ExchangeKey, Symbol, TimeMs};
use serde::{Deserialize, Serialize};

/// An open position computed from a venue's live account state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub wallet: Address,
    pub coin: Symbol,
    pub exchange: ExchangeKey,
    pub is_long: bool,
    /// Absolute size in coin units.
    pub size: Decimal,
    /// Collateral in USD.
    pub collateral: Decimal,
    pub entry_price: Decimal,
    pub liquidation_price: Option<Decimal>,
}

/// A resting order on a venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub wallet: Address,
    pub coin: Symbol,
    pub exchange: ExchangeKey,
    pub is_buy: bool,
    pub price: Decimal,
    pub size: Decimal,
    pub time: TimeMs,
}
