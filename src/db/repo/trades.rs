//! Trade operations for the repository.

use crate::domain::{Address, ExchangeKey, Symbol, TimeMs, Trade};
use crate::engine::TradeFilter;
use sqlx::{QueryBuilder, Row, Sqlite};
use std::collections::HashSet;

use super::{decimal_column, now_ms, Repository};

/// Bound parameters per `IN (...)` lookup, well under SQLite's variable limit.
const HASH_LOOKUP_CHUNK: usize = 500;

fn trade_from_row(row: &sqlx::sqlite::SqliteRow) -> Trade {
    let start_position: Option<String> = row.get("start_position");
    Trade {
        hash: row.get("hash"),
        wallet: Address::new(row.get::<String, _>("wallet")),
        coin: Symbol::new(row.get::<String, _>("coin")),
        exchange: ExchangeKey::new(row.get::<String, _>("exchange")),
        time: TimeMs::new(row.get("time_ms")),
        price: decimal_column(&row.get::<String, _>("price"), "price"),
        size: decimal_column(&row.get::<String, _>("size"), "size"),
        is_buy: row.get::<i64, _>("is_buy") != 0,
        start_position: start_position.map(|s| decimal_column(&s, "start_position")),
    }
}

impl Repository {
    /// Insert trades in a single transaction, skipping hashes already stored.
    ///
    /// Returns the number of newly inserted trades (excludes duplicates).
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn insert_trades_batch(&self, trades: &[Trade]) -> Result<usize, sqlx::Error> {
        if trades.is_empty() {
            return Ok(0);
        }

        let created_at = now_ms();
        let mut total_inserted = 0usize;
        let mut tx = self.pool.begin().await?;

        for trade in trades {
            let result = sqlx::query(
                r#"
                INSERT INTO trades (
                    hash, wallet, coin, exchange, time_ms, price, size, is_buy,
                    start_position, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(hash) DO NOTHING
                "#,
            )
            .bind(&trade.hash)
            .bind(trade.wallet.as_str())
            .bind(trade.coin.as_str())
            .bind(trade.exchange.as_str())
            .bind(trade.time.as_ms())
            .bind(trade.price.to_canonical_string())
            .bind(trade.size.to_canonical_string())
            .bind(trade.is_buy)
            .bind(trade.start_position.map(|d| d.to_canonical_string()))
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                total_inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(total_inserted)
    }

    /// Stored trades matching `filter`, newest first.
    pub async fn query_trades(
        &self,
        filter: &TradeFilter,
        limit: Option<usize>,
    ) -> Result<Vec<Trade>, sqlx::Error> {
        // LIMIT -1 means unbounded in SQLite.
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query(
            r#"
            SELECT hash, wallet, coin, exchange, time_ms, price, size, is_buy, start_position
            FROM trades
            WHERE wallet = ?1
              AND (?2 IS NULL OR exchange = ?2)
              AND (?3 IS NULL OR coin = ?3)
            ORDER BY time_ms DESC, hash ASC
            LIMIT ?4
            "#,
        )
        .bind(filter.wallet.as_str())
        .bind(filter.exchange.as_ref().map(|e| e.as_str()))
        .bind(filter.coin.as_ref().map(|c| c.as_str()))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(trade_from_row).collect())
    }

    /// Which of `hashes` are already stored, regardless of wallet or venue.
    pub async fn existing_trade_hashes(
        &self,
        hashes: &[String],
    ) -> Result<HashSet<String>, sqlx::Error> {
        let mut existing = HashSet::new();

        for chunk in hashes.chunks(HASH_LOOKUP_CHUNK) {
            let mut builder: QueryBuilder<Sqlite> =
                QueryBuilder::new("SELECT hash FROM trades WHERE hash IN (");
            let mut separated = builder.separated(", ");
            for hash in chunk {
                separated.push_bind(hash);
            }
            separated.push_unseparated(")");

            let rows = builder.build().fetch_all(&self.pool).await?;
            existing.extend(rows.iter().map(|r| r.get::<String, _>("hash")));
        }

        Ok(existing)
    }
}
