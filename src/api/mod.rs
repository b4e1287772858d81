pub mod candles;
pub mod health;
pub mod orders;
pub mod positions;
pub mod trades;
pub mod wallets;

use crate::config::Config;
use crate::db::Repository;
use crate::domain::{Address, ExchangeKey, Symbol};
use crate::error::AppError;
use crate::exchange::{find_exchange, Exchange};
use crate::orchestration::{LiveReader, TradeSynchronizer};
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub config: Config,
    pub exchanges: Vec<Arc<dyn Exchange>>,
    pub trades: Arc<TradeSynchronizer>,
    pub live: Arc<LiveReader>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config, exchanges: Vec<Arc<dyn Exchange>>) -> Self {
        let trades = Arc::new(TradeSynchronizer::new(
            exchanges.clone(),
            repo.clone(),
            config.trade_page_delay,
        ));
        let live = Arc::new(LiveReader::new(exchanges.clone(), repo.clone()));
        Self {
            repo,
            config,
            exchanges,
            trades,
            live,
        }
    }

    /// Parse a wallet query parameter and require the wallet to be stored.
    async fn known_wallet(&self, raw: &str) -> Result<Address, AppError> {
        let address = parse_wallet_address(raw)?;
        match self.repo.get_wallet(&address).await? {
            Some(wallet) => Ok(wallet.address),
            None => Err(AppError::NotFound(format!("Unknown wallet: {}", address))),
        }
    }

    /// Resolve an optional venue query parameter. Unknown keys are a client error.
    fn exchange_param(&self, raw: Option<&str>) -> Result<Option<ExchangeKey>, AppError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(key) => {
                let key = ExchangeKey::new(key.to_lowercase());
                find_exchange(&self.exchanges, &key)
                    .map(|e| Some(e.key()))
                    .ok_or_else(|| AppError::BadRequest(format!("Unknown exchange: {}", key)))
            }
        }
    }

    /// Resolve an optional coin query parameter against the stored catalog.
    async fn coin_param(&self, raw: Option<&str>) -> Result<Option<Symbol>, AppError> {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => Ok(None),
            Some(symbol) => {
                let symbol = Symbol::new(symbol.to_string());
                match self.repo.get_coin(&symbol).await? {
                    Some(coin) => Ok(Some(coin.symbol)),
                    None => Err(AppError::NotFound(format!("Unknown coin: {}", symbol))),
                }
            }
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/wallets", get(wallets::get_wallets))
        .route("/v1/trades", get(trades::get_trades))
        .route("/v1/positions", get(positions::get_positions))
        .route("/v1/orders", get(orders::get_orders))
        .route("/v1/intervals", get(candles::get_intervals))
        .route("/v1/candles", get(candles::get_candles))
        .layer(cors)
        .with_state(state)
}

fn parse_wallet_address(wallet: &str) -> Result<Address, AppError> {
    let wallet = wallet.trim();
    if !wallet.starts_with("0x") {
        return Err(AppError::BadRequest("Invalid wallet address".into()));
    }
    let hex_part = &wallet[2..];
    if hex_part.is_empty()
        || hex_part.len() > 40
        || !hex_part.chars().all(|c| c.is_ascii_hexdigit())
    {
        return Err(AppError::BadRequest("Invalid wallet address".into()));
    }
    Ok(Address::new(wallet.to_string()))
}
