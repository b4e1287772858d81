use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::{ExchangeKey, TimeframeStats, Wallet};
use crate::error::AppError;

const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct WalletsQuery {
    pub search: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct WalletsResponse {
    pub wallets: Vec<WalletDto>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDto {
    pub address: String,
    pub label: Option<String>,
    pub is_vault: bool,
    pub exchanges: Vec<String>,
    pub stats: StatsDto,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsDto {
    pub daily: TimeframeDto,
    pub weekly: TimeframeDto,
    pub monthly: TimeframeDto,
    pub all_time: TimeframeDto,
}

#[derive(Debug, Serialize)]
pub struct TimeframeDto {
    pub pnl: String,
    pub volume: String,
}

impl From<&TimeframeStats> for TimeframeDto {
    fn from(stats: &TimeframeStats) -> Self {
        Self {
            pnl: stats.pnl.to_canonical_string(),
            volume: stats.volume.to_canonical_string(),
        }
    }
}

impl From<Wallet> for WalletDto {
    fn from(w: Wallet) -> Self {
        Self {
            address: w.address.as_str().to_string(),
            label: w.label,
            is_vault: w.is_vault,
            exchanges: w.exchanges.iter().map(|e| e.as_str().to_string()).collect(),
            stats: StatsDto {
                daily: (&w.stats.daily).into(),
                weekly: (&w.stats.weekly).into(),
                monthly: (&w.stats.monthly).into(),
                all_time: (&w.stats.all_time).into(),
            },
        }
    }
}

/// Ranked wallet listing, best all-time pnl first.
pub async fn get_wallets(
    Query(params): Query<WalletsQuery>,
    State(state): State<AppState>,
) -> Result<Json<WalletsResponse>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(AppError::BadRequest(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let venues: Vec<ExchangeKey> = state.exchanges.iter().map(|e| e.key()).collect();
    let wallets = state
        .repo
        .list_wallets(&venues, params.search.as_deref(), limit)
        .await?;

    Ok(Json(WalletsResponse {
        wallets: wallets.into_iter().map(WalletDto::from).collect(),
    }))
}
