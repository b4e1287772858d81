use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::Order;
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct OrdersQuery {
    pub wallet: String,
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub orders: Vec<OrderDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub id: String,
    pub coin: String,
    pub exchange: String,
    pub side: String,
    pub price: String,
    pub size: String,
    pub time_ms: i64,
}

impl From<Order> for OrderDto {
    fn from(o: Order) -> Self {
        Self {
            id: o.id,
            coin: o.coin.as_str().to_string(),
            exchange: o.exchange.as_str().to_string(),
            side: if o.is_buy { "buy" } else { "sell" }.to_string(),
            price: o.price.to_canonical_string(),
            size: o.size.to_canonical_string(),
            time_ms: o.time.as_ms(),
        }
    }
}

/// Resting orders across venues, read through.
pub async fn get_orders(
    Query(params): Query<OrdersQuery>,
    State(state): State<AppState>,
) -> Result<Json<OrdersResponse>, AppError> {
    let wallet = state.known_wallet(&params.wallet).await?;
    let orders = state.live.orders(&wallet).await?;

    Ok(Json(OrdersResponse {
        orders: orders.into_iter().map(OrderDto::from).collect(),
    }))
}
