//! Wallet operations for the repository.

use crate::domain::{Address, ExchangeKey, TimeframeStats, Wallet, WalletStats};
use crate::engine::WalletWritePlan;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::HashMap;
use tracing::warn;

use super::{decimal_column, now_ms, Repository};

const WALLET_COLUMNS: &str = r#"
    address, label, is_vault, exchanges,
    daily_pnl, daily_volume, weekly_pnl, weekly_volume,
    monthly_pnl, monthly_volume, all_time_pnl, all_time_volume, hash
"#;

/// Column values for one wallet, in `WALLET_COLUMNS` order after the address.
struct WalletRow {
    exchanges: String,
    stats: [String; 8],
}

impl WalletRow {
    fn from_wallet(wallet: &Wallet) -> Self {
        let keys: Vec<&str> = wallet.exchanges.iter().map(|e| e.as_str()).collect();
        let s = &wallet.stats;
        Self {
            exchanges: serde_json::to_string(&keys).unwrap_or_else(|_| "[]".to_string()),
            stats: [
                s.daily.pnl.to_canonical_string(),
                s.daily.volume.to_canonical_string(),
                s.weekly.pnl.to_canonical_string(),
                s.weekly.volume.to_canonical_string(),
                s.monthly.pnl.to_canonical_string(),
                s.monthly.volume.to_canonical_string(),
                s.all_time.pnl.to_canonical_string(),
                s.all_time.volume.to_canonical_string(),
            ],
        }
    }
}

fn wallet_from_row(row: &sqlx::sqlite::SqliteRow) -> Wallet {
    let address: String = row.get("address");
    let raw_exchanges: String = row.get("exchanges");
    let exchanges = serde_json::from_str::<Vec<String>>(&raw_exchanges)
        .map(|keys| keys.into_iter().map(ExchangeKey::new).collect())
        .unwrap_or_else(|e| {
            warn!(address = %address, error = %e, "Failed to parse stored exchanges, using empty set");
            Vec::new()
        });

    let bucket = |pnl: &str, volume: &str| {
        TimeframeStats::new(
            decimal_column(&row.get::<String, _>(pnl), pnl),
            decimal_column(&row.get::<String, _>(volume), volume),
        )
    };

    Wallet {
        address: Address::new(address),
        label: row.get("label"),
        is_vault: row.get::<i64, _>("is_vault") != 0,
        exchanges,
        stats: WalletStats {
            daily: bucket("daily_pnl", "daily_volume"),
            weekly: bucket("weekly_pnl", "weekly_volume"),
            monthly: bucket("monthly_pnl", "monthly_volume"),
            all_time: bucket("all_time_pnl", "all_time_volume"),
        },
        hash: row.get("hash"),
    }
}

impl Repository {
    /// Stored content hash per address.
    pub async fn stored_wallet_hashes(&self) -> Result<HashMap<Address, String>, sqlx::Error> {
        let rows = sqlx::query("SELECT address, hash FROM wallets")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| {
                (
                    Address::new(r.get::<String, _>("address")),
                    r.get::<String, _>("hash"),
                )
            })
            .collect())
    }

    pub async fn get_wallet(&self, address: &Address) -> Result<Option<Wallet>, sqlx::Error> {
        let sql = format!("SELECT {} FROM wallets WHERE address = ?", WALLET_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(address.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(wallet_from_row))
    }

    /// Wallets ranked by all-time pnl, best first.
    ///
    /// Only wallets active on at least one of `exchanges` are listed. With `search`, matches
    /// the exact address or a case-insensitive label substring. Without it, only wallets with
    /// weekly volume are listed.
    pub async fn list_wallets(
        &self,
        exchanges: &[ExchangeKey],
        search: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Wallet>, sqlx::Error> {
        if exchanges.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
            "SELECT {} FROM wallets WHERE EXISTS (SELECT 1 FROM json_each(wallets.exchanges) WHERE json_each.value IN (",
            WALLET_COLUMNS
        ));
        let mut separated = builder.separated(", ");
        for exchange in exchanges {
            separated.push_bind(exchange.as_str());
        }
        separated.push_unseparated("))");

        match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => {
                builder
                    .push(" AND (address = ")
                    .push_bind(term.to_lowercase())
                    .push(" OR LOWER(label) LIKE '%' || LOWER(")
                    .push_bind(term)
                    .push(") || '%')");
            }
            None => {
                builder.push(" AND CAST(weekly_volume AS REAL) > 0");
            }
        }

        builder
            .push(" ORDER BY CAST(all_time_pnl AS REAL) DESC, address ASC LIMIT ")
            .push_bind(limit);

        let rows = builder.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(wallet_from_row).collect())
    }

    /// Apply one pass's wallet writes in a single transaction.
    ///
    /// Updates rewrite only membership, flags, label, stats and hash; the address and row
    /// identity are untouched.
    pub async fn apply_wallet_writes(&self, plan: &WalletWritePlan) -> Result<(), sqlx::Error> {
        if plan.is_empty() {
            return Ok(());
        }

        let now = now_ms();
        let mut tx = self.pool.begin().await?;

        for wallet in &plan.inserts {
            let row = WalletRow::from_wallet(wallet);
            sqlx::query(
                r#"
                INSERT INTO wallets (
                    address, label, is_vault, exchanges,
                    daily_pnl, daily_volume, weekly_pnl, weekly_volume,
                    monthly_pnl, monthly_volume, all_time_pnl, all_time_volume,
                    hash, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(address) DO UPDATE SET
                    label = excluded.label,
                    is_vault = excluded.is_vault,
                    exchanges = excluded.exchanges,
                    daily_pnl = excluded.daily_pnl,
                    daily_volume = excluded.daily_volume,
                    weekly_pnl = excluded.weekly_pnl,
                    weekly_volume = excluded.weekly_volume,
                    monthly_pnl = excluded.monthly_pnl,
                    monthly_volume = excluded.monthly_volume,
                    all_time_pnl = excluded.all_time_pnl,
                    all_time_volume = excluded.all_time_volume,
                    hash = excluded.hash,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(wallet.address.as_str())
            .bind(wallet.label.as_deref())
            .bind(wallet.is_vault)
            .bind(&row.exchanges)
            .bind(&row.stats[0])
            .bind(&row.stats[1])
            .bind(&row.stats[2])
            .bind(&row.stats[3])
            .bind(&row.stats[4])
            .bind(&row.stats[5])
            .bind(&row.stats[6])
            .bind(&row.stats[7])
            .bind(&wallet.hash)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        for wallet in &plan.updates {
            let row = WalletRow::from_wallet(wallet);
            sqlx::query(
                r#"
                UPDATE wallets SET
                    label = ?, is_vault = ?, exchanges = ?,
                    daily_pnl = ?, daily_volume = ?, weekly_pnl = ?, weekly_volume = ?,
                    monthly_pnl = ?, monthly_volume = ?, all_time_pnl = ?, all_time_volume = ?,
                    hash = ?, updated_at = ?
                WHERE address = ?
                "#,
            )
            .bind(wallet.label.as_deref())
            .bind(wallet.is_vault)
            .bind(&row.exchanges)
            .bind(&row.stats[0])
            .bind(&row.stats[1])
            .bind(&row.stats[2])
            .bind(&row.stats[3])
            .bind(&row.stats[4])
            .bind(&row.stats[5])
            .bind(&row.stats[6])
            .bind(&row.stats[7])
            .bind(&wallet.hash)
            .bind(now)
            .bind(wallet.address.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::setup_test_db;
    use super::*;
    use crate::domain::Decimal;
    use std::str::FromStr;

    fn wallet(address: &str, label: Option<&str>, all_time_pnl: &str, weekly_volume: i64) -> Wallet {
        let mut w = Wallet::reported(
            Address::new(address.to_string()),
            ExchangeKey::new("hl"),
            label.map(str::to_string),
            false,
            WalletStats {
                weekly: TimeframeStats::new(Decimal::zero(), Decimal::from(weekly_volume)),
                all_time: TimeframeStats::new(
                    Decimal::from_str(all_time_pnl).unwrap(),
                    Decimal::from(10),
                ),
                ..Default::default()
            },
        );
        w.exchanges.push(ExchangeKey::new("gmx"));
        w.canonicalize();
        w
    }

    fn venues() -> Vec<ExchangeKey> {
        vec![ExchangeKey::new("hl"), ExchangeKey::new("gmx")]
    }

    fn inserts(wallets: Vec<Wallet>) -> WalletWritePlan {
        WalletWritePlan {
            inserts: wallets,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let (repo, _temp) = setup_test_db().await;
        let w = wallet("0xa", Some("Alpha"), "12.5", 1);
        repo.apply_wallet_writes(&inserts(vec![w.clone()])).await.unwrap();

        let stored = repo.get_wallet(&w.address).await.unwrap().unwrap();
        assert_eq!(stored, w);
        assert_eq!(stored.hash, stored.content_hash());

        let hashes = repo.stored_wallet_hashes().await.unwrap();
        assert_eq!(hashes.get(&w.address), Some(&w.hash));
    }

    #[tokio::test]
    async fn test_update_rewrites_fields() {
        let (repo, _temp) = setup_test_db().await;
        let w = wallet("0xa", None, "1", 1);
        repo.apply_wallet_writes(&inserts(vec![w])).await.unwrap();

        let changed = wallet("0xa", Some("Renamed"), "2", 1);
        repo.apply_wallet_writes(&WalletWritePlan {
            updates: vec![changed.clone()],
            ..Default::default()
        })
        .await
        .unwrap();

        let stored = repo.get_wallet(&changed.address).await.unwrap().unwrap();
        assert_eq!(stored.label.as_deref(), Some("Renamed"));
        assert_eq!(stored.hash, changed.hash);
    }

    #[tokio::test]
    async fn test_list_wallets_ranking_and_search() {
        let (repo, _temp) = setup_test_db().await;
        repo.apply_wallet_writes(&inserts(vec![
            wallet("0xa", Some("Whale Fund"), "9", 5),
            wallet("0xb", None, "100", 5),
            wallet("0xc", None, "1000", 0),
            wallet("0xd", Some("minnow"), "-3", 2),
        ]))
        .await
        .unwrap();

        let ranked = repo.list_wallets(&venues(), None, 10).await.unwrap();
        let addrs: Vec<&str> = ranked.iter().map(|w| w.address.as_str()).collect();
        assert_eq!(addrs, vec!["0xb", "0xa", "0xd"]);

        let limited = repo.list_wallets(&venues(), None, 1).await.unwrap();
        assert_eq!(limited.len(), 1);

        let by_label = repo.list_wallets(&venues(), Some("whale"), 10).await.unwrap();
        assert_eq!(by_label.len(), 1);
        assert_eq!(by_label[0].address.as_str(), "0xa");

        let by_address = repo.list_wallets(&venues(), Some("0xC"), 10).await.unwrap();
        assert_eq!(by_address.len(), 1);
        assert_eq!(by_address[0].address.as_str(), "0xc");
    }

    #[tokio::test]
    async fn test_list_wallets_only_configured_venues() {
        let (repo, _temp) = setup_test_db().await;
        let mut elsewhere = Wallet::reported(
            Address::new("0xe".to_string()),
            ExchangeKey::new("dydx"),
            Some("Whale Elsewhere".to_string()),
            false,
            WalletStats {
                weekly: TimeframeStats::new(Decimal::zero(), Decimal::from(50)),
                ..Default::default()
            },
        );
        elsewhere.canonicalize();
        repo.apply_wallet_writes(&inserts(vec![
            wallet("0xa", Some("Whale Fund"), "9", 5),
            elsewhere,
        ]))
        .await
        .unwrap();

        let listed = repo.list_wallets(&venues(), None, 10).await.unwrap();
        let addrs: Vec<&str> = listed.iter().map(|w| w.address.as_str()).collect();
        assert_eq!(addrs, vec!["0xa"]);

        let searched = repo.list_wallets(&venues(), Some("whale"), 10).await.unwrap();
        assert_eq!(searched.len(), 1);
        assert_eq!(searched[0].address.as_str(), "0xa");

        let gmx_only = repo
            .list_wallets(&[ExchangeKey::new("gmx")], None, 10)
            .await
            .unwrap();
        assert_eq!(gmx_only.len(), 1);

        assert!(repo.list_wallets(&[], None, 10).await.unwrap().is_empty());
    }
}
