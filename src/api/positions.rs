use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::Position;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct PositionsQuery {
    pub wallet: String,
    pub coin: Option<String>,
    pub exchange: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PositionsResponse {
    pub positions: Vec<PositionDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDto {
    pub coin: String,
    pub exchange: String,
    pub side: String,
    pub size: String,
    pub collateral: String,
    pub entry_price: String,
    pub liquidation_price: Option<String>,
}

impl From<Position> for PositionDto {
    fn from(p: Position) -> Self {
        Self {
            coin: p.coin.as_str().to_string(),
            exchange: p.exchange.as_str().to_string(),
            side: if p.is_long { "long" } else { "short" }.to_string(),
            size: p.size.to_canonical_string(),
            collateral: p.collateral.to_canonical_string(),
            entry_price: p.entry_price.to_canonical_string(),
            liquidation_price: p.liquidation_price.map(|d| d.to_canonical_string()),
        }
    }
}

/// Live open positions, read through to the venues.
pub async fn get_positions(
    Query(params): Query<PositionsQuery>,
    State(state): State<AppState>,
) -> Result<Json<PositionsResponse>, AppError> {
    let exchange = state.exchange_param(params.exchange.as_deref())?;
    let wallet = state.known_wallet(&params.wallet).await?;
    let coin = state.coin_param(params.coin.as_deref()).await?;

    let positions = match (&coin, &exchange) {
        (Some(coin), Some(exchange)) => state
            .live
            .position(&wallet, coin, exchange)
            .await?
            .into_iter()
            .collect(),
        _ => {
            state
                .live
                .positions(&wallet, coin.as_ref(), exchange.as_ref())
                .await?
        }
    };

    Ok(Json(PositionsResponse {
        positions: positions.into_iter().map(PositionDto::from).collect(),
    }))
}
