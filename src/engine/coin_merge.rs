//! Coin catalog merge across venues.

use crate::domain::{Coin, ExchangeKey, Symbol};
use std::collections::{BTreeMap, HashSet};

/// Inserts and updates produced by one coin pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoinWritePlan {
    /// Symbols not yet stored: written in full.
    pub inserts: Vec<Coin>,
    /// Stored symbols: their reported `decimals` entries overwrite the stored ones.
    pub updates: Vec<Coin>,
}

impl CoinWritePlan {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }
}

/// Merge per-venue catalogs, given in adapter declaration order.
///
/// The first sighting of a symbol becomes the canonical record. Later sightings only add
/// or overwrite their own venue's entry in `decimals`.
pub fn merge_coins(catalogs: Vec<(ExchangeKey, Vec<Coin>)>) -> Vec<Coin> {
    let mut merged: BTreeMap<Symbol, Coin> = BTreeMap::new();

    for (exchange, coins) in catalogs {
        for coin in coins {
            match merged.get_mut(&coin.symbol) {
                Some(existing) => {
                    if let Some(decimals) = coin.decimals_for(&exchange) {
                        existing.decimals.insert(exchange.clone(), decimals);
                    }
                }
                None => {
                    merged.insert(coin.symbol.clone(), coin);
                }
            }
        }
    }

    merged.into_values().collect()
}

/// Split merged coins into inserts and updates against the stored symbol set.
pub fn plan_coin_writes(merged: Vec<Coin>, stored: &HashSet<Symbol>) -> CoinWritePlan {
    let (updates, inserts) = merged
        .into_iter()
        .partition(|coin| stored.contains(&coin.symbol));
    CoinWritePlan { inserts, updates }
}
