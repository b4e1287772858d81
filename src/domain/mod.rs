//! Domain types shared by adapters, the merge engine and the store.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: TimeMs, Address, Symbol, ExchangeKey
//! - Canonical Coin and Wallet records, with the wallet content hash
//! - Trade records and live Position/Order views
//! - Chart intervals and OHLC candles

pub mod candle;
pub mod coin;
pub mod decimal;
pub mod position;
pub mod primitives;
pub mod trade;
pub mod wallet;

pub use candle::{Candle, ChartInterval};
pub use coin::Coin;
pub use decimal::Decimal;
pub use position::{Order, Position};
pub use primitives::{Address, ExchangeKey, Symbol, TimeMs};
pub use trade::{sort_newest_first, Trade};
pub use wallet::{TimeframeStats, Wallet, WalletStats};
