//! Passes and on-demand reads that drive the adapters and the store.

pub mod coins;
pub mod live;
pub mod scheduler;
pub mod trades;
pub mod wallets;

pub use coins::{CoinReconciler, CoinReport};
pub use live::LiveReader;
pub use scheduler::{spawn_periodic, Scheduler, SchedulerHandles};
pub use trades::{TradeQuery, TradeSyncResult, TradeSynchronizer};
pub use wallets::{WalletReconciler, WalletReport};

use thiserror::Error;

/// Failure that ends a reconciliation pass. Venue failures never surface here.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Failure of an on-demand read. Venue failures never surface here.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}
