//! Exchange adapters: one typed implementation per venue behind a common trait.

use crate::config::{Config, ExchangeKind};
use crate::domain::{
    Address, Candle, ChartInterval, Coin, ExchangeKey, Order, Position, TimeMs, Trade, Wallet,
};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

pub mod gmx;
mod http;
pub mod hyperliquid;
pub mod mock;

pub use gmx::GmxExchange;
pub use hyperliquid::HyperliquidExchange;
pub use mock::MockExchange;

/// Venue adapter.
///
/// Implementations are stateless readers: every call goes to the venue, nothing is cached
/// between calls. Rows that cannot be mapped (unknown coin, missing field) are skipped and
/// logged rather than failing the call.
#[async_trait]
pub trait Exchange: Send + Sync + fmt::Debug {
    /// Stable venue identifier.
    fn key(&self) -> ExchangeKey;

    /// Maximum rows the venue returns per `trades` call, if it caps them.
    fn page_size(&self) -> Option<usize> {
        None
    }

    /// Coins currently tradable on the venue, each carrying this venue's precision.
    async fn coins(&self) -> Result<Vec<Coin>, ExchangeError>;

    /// Ranked snapshot of wallets known to the venue, with current stats.
    async fn wallets(&self) -> Result<Vec<Wallet>, ExchangeError>;

    /// Open positions for `wallet`, restricted to `coins`.
    async fn positions(
        &self,
        wallet: &Address,
        coins: &[Coin],
    ) -> Result<Vec<Position>, ExchangeError>;

    /// Open position for a single coin.
    async fn position(
        &self,
        wallet: &Address,
        coin: &Coin,
    ) -> Result<Option<Position>, ExchangeError> {
        let positions = self.positions(wallet, std::slice::from_ref(coin)).await?;
        Ok(positions.into_iter().find(|p| p.coin == coin.symbol))
    }

    /// One page of trades for `wallet` at or after `cursor`.
    ///
    /// The cursor is the first millisecond not yet covered, i.e. one past the newest
    /// stored trade. Results are not guaranteed to be sorted.
    async fn trades(
        &self,
        wallet: &Address,
        coins: &[Coin],
        cursor: TimeMs,
    ) -> Result<TradePage, ExchangeError>;

    /// Resting orders for `wallet`, restricted to `coins`.
    async fn orders(&self, wallet: &Address, coins: &[Coin])
        -> Result<Vec<Order>, ExchangeError>;

    /// Chart intervals the venue serves candles at.
    fn chart_intervals(&self) -> Vec<ChartInterval>;

    /// Candles for `coin` at `interval`, oldest first.
    async fn candles(
        &self,
        coin: &Coin,
        interval: ChartInterval,
    ) -> Result<Vec<Candle>, ExchangeError>;
}

/// A single `trades` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradePage {
    /// Trades that mapped onto known coins.
    pub trades: Vec<Trade>,
    /// Raw rows returned by the venue, including skipped ones.
    pub fetched: usize,
    /// Newest time across the raw rows.
    pub last_time: Option<TimeMs>,
}

impl TradePage {
    /// A page where every raw row mapped to a trade.
    pub fn from_trades(trades: Vec<Trade>) -> Self {
        let last_time = trades.iter().map(|t| t.time).max();
        Self {
            fetched: trades.len(),
            last_time,
            trades,
        }
    }

    /// True when the venue returned as many rows as it ever will in one call.
    pub fn is_full(&self, page_size: Option<usize>) -> bool {
        match page_size {
            Some(size) if size > 0 => self.fetched >= size,
            _ => false,
        }
    }
}

/// Build the adapter list in configured order. Order decides merge precedence.
pub fn build_exchanges(config: &Config) -> Vec<Arc<dyn Exchange>> {
    config
        .exchanges
        .iter()
        .map(|kind| -> Arc<dyn Exchange> {
            match kind {
                ExchangeKind::Hyperliquid => {
                    Arc::new(HyperliquidExchange::new(config.hyperliquid_api_url.clone()))
                }
                ExchangeKind::Gmx => Arc::new(GmxExchange::new(
                    config.gmx_api_url.clone(),
                    config.gmx_squid_url.clone(),
                )),
            }
        })
        .collect()
}

/// Look up an adapter by key.
pub fn find_exchange<'a>(
    exchanges: &'a [Arc<dyn Exchange>],
    key: &ExchangeKey,
) -> Option<&'a Arc<dyn Exchange>> {
    exchanges.iter().find(|e| &e.key() == key)
}

/// Error type for adapter calls.
#[derive(Debug, Clone)]
pub enum ExchangeError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 5xx server error, 4xx rejection)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded after retries
    RateLimited,
    /// Other error
    Other(String),
}

impl fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExchangeError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ExchangeError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            ExchangeError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            ExchangeError::RateLimited => write!(f, "Rate limited"),
            ExchangeError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for ExchangeError {}
