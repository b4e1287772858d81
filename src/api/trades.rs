use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::Trade;
use crate::engine::TradeFilter;
use crate::error::AppError;
use crate::orchestration::TradeQuery;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 5000;

#[derive(Debug, Deserialize)]
pub struct TradesQuery {
    pub wallet: String,
    pub exchange: Option<String>,
    pub coin: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradesResponse {
    pub trades: Vec<TradeDto>,
    pub fetched: usize,
    pub inserted: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeDto {
    pub hash: String,
    pub coin: String,
    pub exchange: String,
    pub time_ms: i64,
    pub side: String,
    pub price: String,
    pub size: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_position: Option<String>,
}

impl From<Trade> for TradeDto {
    fn from(t: Trade) -> Self {
        Self {
            hash: t.hash,
            coin: t.coin.as_str().to_string(),
            exchange: t.exchange.as_str().to_string(),
            time_ms: t.time.as_ms(),
            side: if t.is_buy { "buy" } else { "sell" }.to_string(),
            price: t.price.to_canonical_string(),
            size: t.size.to_canonical_string(),
            start_position: t.start_position.map(|d| d.to_canonical_string()),
        }
    }
}

/// Sync a wallet's trades from the venues, then return stored and new trades.
pub async fn get_trades(
    Query(params): Query<TradesQuery>,
    State(state): State<AppState>,
) -> Result<Json<TradesResponse>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let exchange = state.exchange_param(params.exchange.as_deref())?;
    let wallet = state.known_wallet(&params.wallet).await?;
    let coin = state.coin_param(params.coin.as_deref()).await?;

    let query = TradeQuery {
        filter: TradeFilter {
            wallet,
            exchange,
            coin,
        },
        limit: Some(limit),
    };
    let result = state.trades.sync(&query).await?;

    Ok(Json(TradesResponse {
        trades: result.trades.into_iter().map(TradeDto::from).collect(),
        fetched: result.fetched,
        inserted: result.inserted,
    }))
}
