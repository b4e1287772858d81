//! Canonical wallet record and its change-detection hash.

use crate::domain::{Address, Decimal, ExchangeKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Absolute pnl/volume snapshot for one timeframe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeStats {
    pub pnl: Decimal,
    pub volume: Decimal,
}

impl TimeframeStats {
    pub fn new(pnl: Decimal, volume: Decimal) -> Self {
        Self { pnl, volume }
    }
}

/// Per-timeframe performance as last reported by the venue(s).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletStats {
    pub daily: TimeframeStats,
    pub weekly: TimeframeStats,
    pub monthly: TimeframeStats,
    pub all_time: TimeframeStats,
}

impl WalletStats {
    fn buckets(&self) -> [&TimeframeStats; 4] {
        [&self.daily, &self.weekly, &self.monthly, &self.all_time]
    }
}

/// A trader account, unique by address across all venues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub address: Address,
    pub label: Option<String>,
    pub is_vault: bool,
    /// Venues currently reporting this wallet. Treated as a set.
    pub exchanges: Vec<ExchangeKey>,
    pub stats: WalletStats,
    /// Content digest of the fields above, empty until computed.
    #[serde(default)]
    pub hash: String,
}

impl Wallet {
    /// A wallet as reported by a single venue, hash not yet computed.
    pub fn reported(
        address: Address,
        exchange: ExchangeKey,
        label: Option<String>,
        is_vault: bool,
        stats: WalletStats,
    ) -> Self {
        Wallet {
            address,
            label,
            is_vault,
            exchanges: vec![exchange],
            stats,
            hash: String::new(),
        }
    }

    /// Sort and dedup `exchanges`, then recompute `hash`.
    pub fn canonicalize(&mut self) {
        self.exchanges.sort();
        self.exchanges.dedup();
        self.hash = self.content_hash();
    }

    /// Digest over (sorted exchanges, is_vault, label, stats).
    ///
    /// Independent of the order of `exchanges`; the address is not part of the digest.
    pub fn content_hash(&self) -> String {
        let mut exchanges: Vec<&str> = self.exchanges.iter().map(|e| e.as_str()).collect();
        exchanges.sort_unstable();
        exchanges.dedup();

        let mut hasher = Sha256::new();
        hasher.update((exchanges.len() as u64).to_le_bytes());
        for key in exchanges {
            update_field(&mut hasher, key);
        }
        hasher.update([u8::from(self.is_vault)]);
        match &self.label {
            Some(label) => {
                hasher.update([1u8]);
                update_field(&mut hasher, label);
            }
            None => hasher.update([0u8]),
        }
        for bucket in self.stats.buckets() {
            update_field(&mut hasher, &bucket.pnl.to_canonical_string());
            update_field(&mut hasher, &bucket.volume.to_canonical_string());
        }

        let hash = hasher.finalize();
        hex::encode(&hash[..16])
    }
}

/// Length-prefixed so adjacent fields cannot bleed into each other.
fn update_field(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}
