pub mod api;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod exchange;
pub mod orchestration;

pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    Address, Coin, Decimal, ExchangeKey, Order, Position, Symbol, TimeMs, Trade, Wallet,
    WalletStats,
};
pub use error::AppError;
pub use exchange::{Exchange, ExchangeError, MockExchange, TradePage};
