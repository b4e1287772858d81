//! Coin catalog operations for the repository.

use crate::domain::{Coin, ExchangeKey, Symbol};
use crate::engine::CoinWritePlan;
use sqlx::Row;
use std::collections::{BTreeMap, HashSet};
use tracing::warn;

use super::{now_ms, Repository};

fn decimals_json(coin: &Coin) -> String {
    let map: BTreeMap<&str, u32> = coin
        .decimals
        .iter()
        .map(|(k, v)| (k.as_str(), *v))
        .collect();
    serde_json::to_string(&map).unwrap_or_else(|_| "{}".to_string())
}

fn coin_from_row(row: &sqlx::sqlite::SqliteRow) -> Coin {
    let symbol: String = row.get("symbol");
    let raw: String = row.get("decimals");
    let decimals = serde_json::from_str::<BTreeMap<String, u32>>(&raw)
        .map(|m| {
            m.into_iter()
                .map(|(k, v)| (ExchangeKey::new(k), v))
                .collect()
        })
        .unwrap_or_else(|e| {
            warn!(symbol = %symbol, error = %e, "Failed to parse stored decimals, using empty map");
            BTreeMap::new()
        });
    Coin {
        symbol: Symbol::new(symbol),
        decimals,
    }
}

impl Repository {
    /// All stored symbols.
    pub async fn stored_coin_symbols(&self) -> Result<HashSet<Symbol>, sqlx::Error> {
        let rows = sqlx::query("SELECT symbol FROM coins")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .iter()
            .map(|r| Symbol::new(r.get::<String, _>("symbol")))
            .collect())
    }

    /// All stored coins, ordered by symbol.
    pub async fn list_coins(&self) -> Result<Vec<Coin>, sqlx::Error> {
        let rows = sqlx::query("SELECT symbol, decimals FROM coins ORDER BY symbol ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(coin_from_row).collect())
    }

    pub async fn get_coin(&self, symbol: &Symbol) -> Result<Option<Coin>, sqlx::Error> {
        let row = sqlx::query("SELECT symbol, decimals FROM coins WHERE symbol = ?")
            .bind(symbol.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(coin_from_row))
    }

    /// Apply one pass's coin writes in a single transaction.
    ///
    /// Updates patch the stored `decimals` object: reported venues are overwritten, venues
    /// missing from this pass keep their entry. Inserts that race with another pass fall
    /// back to the same patch.
    pub async fn apply_coin_writes(&self, plan: &CoinWritePlan) -> Result<(), sqlx::Error> {
        if plan.is_empty() {
            return Ok(());
        }

        let now = now_ms();
        let mut tx = self.pool.begin().await?;

        for coin in &plan.inserts {
            sqlx::query(
                r#"
                INSERT INTO coins (symbol, decimals, created_at, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(symbol) DO UPDATE SET
                    decimals = json_patch(coins.decimals, excluded.decimals),
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(coin.symbol.as_str())
            .bind(decimals_json(coin))
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        for coin in &plan.updates {
            sqlx::query(
                r#"
                UPDATE coins
                SET decimals = json_patch(decimals, ?), updated_at = ?
                WHERE symbol = ?
                "#,
            )
            .bind(decimals_json(coin))
            .bind(now)
            .bind(coin.symbol.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
