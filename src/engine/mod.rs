//! Pure merge and diff logic for reconciliation passes. Nothing here suspends.

pub mod coin_merge;
pub mod trade_merge;
pub mod wallet_merge;

pub use coin_merge::{merge_coins, plan_coin_writes, CoinWritePlan};
pub use trade_merge::{assemble_result, dedup_new_trades, TradeFilter};
pub use wallet_merge::{merge_wallets, plan_wallet_writes, WalletWritePlan};
