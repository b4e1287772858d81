//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by collection:
//! - `coins.rs` - Canonical coin catalog
//! - `wallets.rs` - Canonical wallets, hash lookups and ranking
//! - `trades.rs` - Trade inserts, filtered reads and dedup lookups

mod coins;
mod trades;
mod wallets;

use crate::domain::Decimal;
use sqlx::sqlite::SqlitePool;
use std::str::FromStr;
use tracing::warn;

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Round-trip the store; used by readiness checks.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Parse a stored canonical decimal, falling back to zero with a warning.
fn decimal_column(value: &str, column: &str) -> Decimal {
    Decimal::from_str(value).unwrap_or_else(|e| {
        warn!(column = column, value = %value, error = %e, "Failed to parse stored decimal, using default");
        Decimal::default()
    })
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
