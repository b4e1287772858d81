//! Trade dedup and result assembly for the synchronizer.

use crate::domain::{sort_newest_first, Address, ExchangeKey, Symbol, Trade};
use std::collections::HashSet;

/// Scope of a trade query: one wallet, optionally one venue and/or one coin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeFilter {
    pub wallet: Address,
    pub exchange: Option<ExchangeKey>,
    pub coin: Option<Symbol>,
}

impl TradeFilter {
    pub fn wallet(wallet: Address) -> Self {
        Self {
            wallet,
            exchange: None,
            coin: None,
        }
    }

    pub fn matches(&self, trade: &Trade) -> bool {
        trade.wallet == self.wallet
            && self.exchange.as_ref().map_or(true, |e| &trade.exchange == e)
            && self.coin.as_ref().map_or(true, |c| &trade.coin == c)
    }
}

/// Drop fetched trades whose hash is already known, or repeated within the batch.
///
/// Returned newest first.
pub fn dedup_new_trades(fetched: Vec<Trade>, known: &HashSet<String>) -> Vec<Trade> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut fresh: Vec<Trade> = fetched
        .into_iter()
        .filter(|t| !known.contains(&t.hash) && seen.insert(t.hash.clone()))
        .collect();
    sort_newest_first(&mut fresh);
    fresh
}

/// `stored ∪ new`, filtered, newest first, truncated to `limit`.
pub fn assemble_result(
    stored: Vec<Trade>,
    new: Vec<Trade>,
    filter: &TradeFilter,
    limit: Option<usize>,
) -> Vec<Trade> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut result: Vec<Trade> = stored
        .into_iter()
        .chain(new)
        .filter(|t| filter.matches(t) && seen.insert(t.hash.clone()))
        .collect();
    sort_newest_first(&mut result);
    if let Some(limit) = limit {
        result.truncate(limit);
    }
    result
}
