//! Wallet snapshot merge across venues, gated by the content hash.

use crate::domain::{Address, ExchangeKey, Wallet};
use std::collections::HashMap;

/// Writes produced by one wallet pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletWritePlan {
    pub inserts: Vec<Wallet>,
    /// Stored wallets whose hash changed.
    pub updates: Vec<Wallet>,
    /// Stored wallets whose hash matched; dropped from the write set.
    pub unchanged: usize,
}

impl WalletWritePlan {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }
}

/// Merge per-venue snapshots, given in adapter declaration order.
///
/// The first sighting of an address is canonical; later sightings only add their venue
/// key to `exchanges`. Every merged wallet comes back canonicalized with its hash set.
/// Output keeps first-sighting order.
pub fn merge_wallets(snapshots: Vec<(ExchangeKey, Vec<Wallet>)>) -> Vec<Wallet> {
    let mut index: HashMap<Address, usize> = HashMap::new();
    let mut merged: Vec<Wallet> = Vec::new();

    for (exchange, wallets) in snapshots {
        for wallet in wallets {
            match index.get(&wallet.address) {
                Some(&i) => {
                    let existing = &mut merged[i];
                    if !existing.exchanges.contains(&exchange) {
                        existing.exchanges.push(exchange.clone());
                    }
                }
                None => {
                    index.insert(wallet.address.clone(), merged.len());
                    merged.push(wallet);
                }
            }
        }
    }

    for wallet in &mut merged {
        wallet.canonicalize();
    }
    merged
}

/// Compare merged wallets against stored hashes. A missing stored hash means new.
pub fn plan_wallet_writes(
    merged: Vec<Wallet>,
    stored_hashes: &HashMap<Address, String>,
) -> WalletWritePlan {
    let mut plan = WalletWritePlan::default();

    for wallet in merged {
        match stored_hashes.get(&wallet.address) {
            None => plan.inserts.push(wallet),
            Some(hash) if *hash == wallet.hash => plan.unchanged += 1,
            Some(_) => plan.updates.push(wallet),
        }
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, TimeframeStats, WalletStats};

    fn key(k: &str) -> ExchangeKey {
        ExchangeKey::new(k)
    }

    fn wallet(address: &str, exchange: &str, pnl: i64) -> Wallet {
        let stats = WalletStats {
            all_time: TimeframeStats::new(Decimal::from(pnl), Decimal::from(1000)),
            ..Default::default()
        };
        Wallet::reported(
            Address::new(address.to_string()),
            key(exchange),
            None,
            false,
            stats,
        )
    }

    #[test]
    fn test_first_sighting_wins_and_venues_accumulate() {
        let merged = merge_wallets(vec![
            (key("hl"), vec![wallet("0xa", "hl", 10)]),
            (key("gmx"), vec![wallet("0xA", "gmx", 99), wallet("0xb", "gmx", 5)]),
        ]);

        assert_eq!(merged.len(), 2);
        let a = &merged[0];
        assert_eq!(a.address.as_str(), "0xa");
        assert_eq!(a.stats.all_time.pnl, Decimal::from(10));
        assert_eq!(a.exchanges, vec![key("gmx"), key("hl")]);
        assert_eq!(a.hash, a.content_hash());
        assert!(!merged[1].hash.is_empty());
    }

    #[test]
    fn test_membership_order_does_not_change_hash() {
        let hl_first = merge_wallets(vec![
            (key("hl"), vec![wallet("0xa", "hl", 1)]),
            (key("gmx"), vec![wallet("0xa", "gmx", 1)]),
        ]);
        let gmx_first = merge_wallets(vec![
            (key("gmx"), vec![wallet("0xa", "gmx", 1)]),
            (key("hl"), vec![wallet("0xa", "hl", 1)]),
        ]);
        assert_eq!(hl_first[0].hash, gmx_first[0].hash);
    }

    #[test]
    fn test_plan_hash_gate() {
        let merged = merge_wallets(vec![(
            key("hl"),
            vec![wallet("0xa", "hl", 1), wallet("0xb", "hl", 2), wallet("0xc", "hl", 3)],
        )]);

        let mut stored = HashMap::new();
        stored.insert(merged[0].address.clone(), merged[0].hash.clone());
        stored.insert(merged[1].address.clone(), "stale".to_string());

        let plan = plan_wallet_writes(merged, &stored);
        assert_eq!(plan.unchanged, 1);
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].address.as_str(), "0xb");
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].address.as_str(), "0xc");
    }

    #[test]
    fn test_identical_pass_is_empty_plan() {
        let snapshot = || vec![(key("hl"), vec![wallet("0xa", "hl", 7)])];
        let first = merge_wallets(snapshot());
        let stored: HashMap<Address, String> = first
            .iter()
            .map(|w| (w.address.clone(), w.hash.clone()))
            .collect();

        let plan = plan_wallet_writes(merge_wallets(snapshot()), &stored);
        assert!(plan.is_empty());
        assert_eq!(plan.unchanged, 1);
    }
}
