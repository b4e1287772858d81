//! Trade type representing a single venue execution for a wallet.

use crate::domain::{Address, Decimal, ExchangeKey, Symbol, TimeMs};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// An immutable trade record, identified by its venue-assigned hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    pub hash: String,
    pub wallet: Address,
    pub coin: Symbol,
    pub exchange: ExchangeKey,
    pub time: TimeMs,
    pub price: Decimal,
    pub size: Decimal,
    pub is_buy: bool,
    /// Position size immediately before this trade, when the venue reports it.
    pub start_position: Option<Decimal>,
}

/// Newest first; ties broken by hash so output is stable.
pub fn cmp_newest_first(a: &Trade, b: &Trade) -> Ordering {
    b.time.cmp(&a.time).then_with(|| a.hash.cmp(&b.hash))
}

/// Sort trades newest first, deterministically.
pub fn sort_newest_first(trades: &mut [Trade]) {
    trades.sort_by(cmp_newest_first);
}
