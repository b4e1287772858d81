//! Canonical coin record.

use crate::domain::{ExchangeKey, Symbol};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A tradable asset, unique by symbol across all venues.
///
/// `decimals` is sparse: a venue that never listed the coin has no entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub symbol: Symbol,
    pub decimals: BTreeMap<ExchangeKey, u32>,
}

impl Coin {
    /// A coin as reported by a single venue.
    pub fn listed(symbol: Symbol, exchange: ExchangeKey, decimals: u32) -> Self {
        let mut map = BTreeMap::new();
        map.insert(exchange, decimals);
        Coin {
            symbol,
            decimals: map,
        }
    }

    /// Precision reported by the given venue, if any.
    pub fn decimals_for(&self, exchange: &ExchangeKey) -> Option<u32> {
        self.decimals.get(exchange).copied()
    }
}
