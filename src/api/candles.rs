use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::{Candle, ChartInterval};
use crate::error::AppError;

#[derive(Debug, Deserialize)]
pub struct CandlesQuery {
    pub coin: Option<String>,
    pub exchange: Option<String>,
    pub interval: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CandlesResponse {
    pub candles: Vec<CandleDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandleDto {
    pub time_ms: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

impl From<Candle> for CandleDto {
    fn from(c: Candle) -> Self {
        Self {
            time_ms: c.time.as_ms(),
            open: c.open.to_canonical_string(),
            high: c.high.to_canonical_string(),
            low: c.low.to_canonical_string(),
            close: c.close.to_canonical_string(),
            volume: c.volume.to_canonical_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct IntervalsResponse {
    pub exchanges: Vec<VenueIntervalsDto>,
}

#[derive(Debug, Serialize)]
pub struct VenueIntervalsDto {
    pub exchange: String,
    pub intervals: Vec<ChartInterval>,
}

/// Chart intervals each configured venue serves.
pub async fn get_intervals(State(state): State<AppState>) -> Json<IntervalsResponse> {
    Json(IntervalsResponse {
        exchanges: state
            .live
            .chart_intervals()
            .into_iter()
            .map(|(key, intervals)| VenueIntervalsDto {
                exchange: key.as_str().to_string(),
                intervals,
            })
            .collect(),
    })
}

/// Candles for one coin on one venue, oldest first, read through.
pub async fn get_candles(
    Query(params): Query<CandlesQuery>,
    State(state): State<AppState>,
) -> Result<Json<CandlesResponse>, AppError> {
    let exchange = state
        .exchange_param(params.exchange.as_deref())?
        .ok_or_else(|| AppError::BadRequest("exchange is required".into()))?;
    let raw_interval = params
        .interval
        .as_deref()
        .ok_or_else(|| AppError::BadRequest("interval is required".into()))?;
    let interval = ChartInterval::parse(raw_interval)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown interval: {}", raw_interval)))?;
    let supported = state
        .live
        .chart_intervals()
        .into_iter()
        .any(|(key, intervals)| key == exchange && intervals.contains(&interval));
    if !supported {
        return Err(AppError::BadRequest(format!(
            "{} has no {} candles",
            exchange, interval
        )));
    }
    let coin = state
        .coin_param(params.coin.as_deref())
        .await?
        .ok_or_else(|| AppError::BadRequest("coin is required".into()))?;

    let candles = state.live.candles(&coin, &exchange, interval).await?;

    Ok(Json(CandlesResponse {
        candles: candles.into_iter().map(CandleDto::from).collect(),
    }))
}
