//! Hyperliquid adapter over the public Info API.

use super::http::{fetch_json, field_array, field_str, field_text};
use super::{Exchange, ExchangeError, TradePage};
use crate::domain::{
    Address, Candle, ChartInterval, Coin, Decimal, ExchangeKey, Order, Position, Symbol, TimeMs,
    TimeframeStats, Trade, Wallet, WalletStats,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::collections::HashMap;
use tracing::{debug, warn};

pub const KEY: &str = "hl";

/// `userFillsByTime` never returns more rows than this.
pub const PAGE_SIZE: usize = 2000;

const CHART_INTERVALS: [ChartInterval; 7] = ChartInterval::ALL;

/// Hyperliquid adapter.
#[derive(Debug, Clone)]
pub struct HyperliquidExchange {
    client: Client,
    base_url: String,
}

impl HyperliquidExchange {
    pub fn new(base_url: String) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post_info(
        &self,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, ExchangeError> {
        let url = format!("{}/info", self.base_url);
        fetch_json(|| self.client.post(&url).json(&payload)).await
    }

    fn key_ref() -> ExchangeKey {
        ExchangeKey::new(KEY)
    }
}

#[async_trait]
impl Exchange for HyperliquidExchange {
    fn key(&self) -> ExchangeKey {
        Self::key_ref()
    }

    fn page_size(&self) -> Option<usize> {
        Some(PAGE_SIZE)
    }

    async fn coins(&self) -> Result<Vec<Coin>, ExchangeError> {
        let response = self.post_info(serde_json::json!({ "type": "meta" })).await?;
        parse_meta(&response)
    }

    async fn wallets(&self) -> Result<Vec<Wallet>, ExchangeError> {
        let (leaderboard, vaults) = tokio::try_join!(
            self.post_info(serde_json::json!({ "type": "leaderboard" })),
            self.post_info(serde_json::json!({ "type": "vaults" })),
        )?;

        let vaults = parse_vaults(&vaults)?;
        let rows = field_array(&leaderboard, "leaderboardRows")?;

        let mut wallets = Vec::with_capacity(rows.len());
        for row in rows {
            match parse_leaderboard_row(row, &vaults) {
                Ok(Some(wallet)) => wallets.push(wallet),
                Ok(None) => {}
                Err(e) => warn!(exchange = KEY, "Failed to parse leaderboard row: {}", e),
            }
        }

        debug!(exchange = KEY, count = wallets.len(), "Fetched wallets");
        Ok(wallets)
    }

    async fn positions(
        &self,
        wallet: &Address,
        coins: &[Coin],
    ) -> Result<Vec<Position>, ExchangeError> {
        let response = self
            .post_info(serde_json::json!({
                "type": "clearinghouseState",
                "user": wallet.as_str(),
            }))
            .await?;

        let mut positions = Vec::new();
        for row in field_array(&response, "assetPositions")? {
            let Some(position) = row.get("position") else {
                warn!(exchange = KEY, "Asset position without position object");
                continue;
            };
            match parse_position(position, wallet, coins) {
                Ok(Some(p)) => positions.push(p),
                Ok(None) => {}
                Err(e) => warn!(exchange = KEY, "Failed to parse position: {}", e),
            }
        }

        Ok(positions)
    }

    async fn trades(
        &self,
        wallet: &Address,
        coins: &[Coin],
        cursor: TimeMs,
    ) -> Result<TradePage, ExchangeError> {
        debug!(
            "Fetching fills for user={}, start_time={}",
            wallet,
            cursor.as_ms()
        );

        let response = self
            .post_info(serde_json::json!({
                "type": "userFillsByTime",
                "user": wallet.as_str(),
                "startTime": cursor.as_ms(),
                "aggregateByTime": true,
            }))
            .await?;

        let rows = response
            .as_array()
            .ok_or_else(|| ExchangeError::ParseError("Expected array response".to_string()))?;

        Ok(parse_fills_page(rows, wallet, coins))
    }

    async fn orders(
        &self,
        wallet: &Address,
        coins: &[Coin],
    ) -> Result<Vec<Order>, ExchangeError> {
        let response = self
            .post_info(serde_json::json!({
                "type": "openOrders",
                "user": wallet.as_str(),
            }))
            .await?;

        let rows = response
            .as_array()
            .ok_or_else(|| ExchangeError::ParseError("Expected array response".to_string()))?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            match parse_order(row, wallet, coins) {
                Ok(Some(order)) => orders.push(order),
                Ok(None) => {}
                Err(e) => warn!(exchange = KEY, "Failed to parse order: {}", e),
            }
        }
        Ok(orders)
    }

    fn chart_intervals(&self) -> Vec<ChartInterval> {
        CHART_INTERVALS.to_vec()
    }

    async fn candles(
        &self,
        coin: &Coin,
        interval: ChartInterval,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let response = self
            .post_info(serde_json::json!({
                "type": "candleSnapshot",
                "req": {
                    "coin": coin.symbol.as_str(),
                    "interval": interval.as_str(),
                    "startTime": 0,
                    "endTime": Utc::now().timestamp_millis(),
                },
            }))
            .await?;

        let rows = response
            .as_array()
            .ok_or_else(|| ExchangeError::ParseError("Expected array response".to_string()))?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in rows {
            match parse_candle(row, interval) {
                Ok(candle) => candles.push(candle),
                Err(e) => {
                    warn!(exchange = KEY, coin = %coin.symbol, "Failed to parse candle: {}", e)
                }
            }
        }
        candles.sort_by_key(|c| c.time);
        Ok(candles)
    }
}

fn parse_decimal(row: &serde_json::Value, name: &str) -> Result<Decimal, ExchangeError> {
    let text = field_text(row, name)?;
    Decimal::from_str_canonical(&text)
        .map_err(|e| ExchangeError::ParseError(format!("Invalid {}: {}", name, e)))
}

fn resolve_coin<'a>(coins: &'a [Coin], symbol: &str) -> Option<&'a Coin> {
    coins.iter().find(|c| c.symbol.as_str() == symbol)
}

fn parse_meta(response: &serde_json::Value) -> Result<Vec<Coin>, ExchangeError> {
    let mut coins = Vec::new();
    for row in field_array(response, "universe")? {
        let name = match field_str(row, "name") {
            Ok(name) => name,
            Err(e) => {
                warn!(exchange = KEY, "Failed to parse meta row: {}", e);
                continue;
            }
        };
        let Some(raw) = row.get("szDecimals").and_then(|v| v.as_u64()) else {
            warn!(exchange = KEY, coin = name, "Missing szDecimals");
            continue;
        };
        let Ok(decimals) = u32::try_from(raw) else {
            warn!(exchange = KEY, coin = name, sz_decimals = raw, "szDecimals out of range");
            continue;
        };
        coins.push(Coin::listed(
            Symbol::new(name.to_string()),
            HyperliquidExchange::key_ref(),
            decimals,
        ));
    }
    Ok(coins)
}

#[derive(Debug, Clone)]
struct VaultMeta {
    name: Option<String>,
    is_parent: bool,
}

fn parse_vaults(response: &serde_json::Value) -> Result<HashMap<Address, VaultMeta>, ExchangeError> {
    let rows = response
        .as_array()
        .ok_or_else(|| ExchangeError::ParseError("Expected array of vaults".to_string()))?;

    let mut vaults = HashMap::with_capacity(rows.len());
    for row in rows {
        let Ok(address) = field_str(row, "vaultAddress") else {
            warn!(exchange = KEY, "Vault without address");
            continue;
        };
        let is_parent = row
            .get("relationship")
            .and_then(|r| r.get("type"))
            .and_then(|t| t.as_str())
            == Some("parent");
        vaults.insert(
            Address::new(address.to_string()),
            VaultMeta {
                name: row.get("name").and_then(|n| n.as_str()).map(str::to_string),
                is_parent,
            },
        );
    }
    Ok(vaults)
}

/// Map one leaderboard row. Parent vaults are dropped (`Ok(None)`).
fn parse_leaderboard_row(
    row: &serde_json::Value,
    vaults: &HashMap<Address, VaultMeta>,
) -> Result<Option<Wallet>, ExchangeError> {
    let address = Address::new(field_str(row, "ethAddress")?.to_string());
    let vault = vaults.get(&address);
    if vault.is_some_and(|v| v.is_parent) {
        return Ok(None);
    }

    let windows = field_array(row, "windowPerformances")?;
    let window = |name: &str| -> Result<TimeframeStats, ExchangeError> {
        let perf = windows
            .iter()
            .find(|w| w.get(0).and_then(|n| n.as_str()) == Some(name))
            .and_then(|w| w.get(1))
            .ok_or_else(|| ExchangeError::ParseError(format!("Missing {} window", name)))?;
        Ok(TimeframeStats::new(
            parse_decimal(perf, "pnl")?,
            parse_decimal(perf, "vlm")?,
        ))
    };

    let stats = WalletStats {
        daily: window("day")?,
        weekly: window("week")?,
        monthly: window("month")?,
        all_time: window("allTime")?,
    };

    let label = match vault {
        Some(v) => v.name.clone(),
        None => row
            .get("displayName")
            .and_then(|n| n.as_str())
            .map(str::to_string),
    };

    Ok(Some(Wallet::reported(
        address,
        HyperliquidExchange::key_ref(),
        label,
        vault.is_some(),
        stats,
    )))
}

fn parse_position(
    row: &serde_json::Value,
    wallet: &Address,
    coins: &[Coin],
) -> Result<Option<Position>, ExchangeError> {
    let symbol = field_str(row, "coin")?;
    let Some(coin) = resolve_coin(coins, symbol) else {
        return Ok(None);
    };

    let signed_size = parse_decimal(row, "szi")?;
    let liquidation_price = match row.get("liquidationPx") {
        None | Some(serde_json::Value::Null) => None,
        Some(_) => Some(parse_decimal(row, "liquidationPx")?).filter(|px| !px.is_zero()),
    };

    Ok(Some(Position {
        wallet: wallet.clone(),
        coin: coin.symbol.clone(),
        exchange: HyperliquidExchange::key_ref(),
        is_long: signed_size.is_positive(),
        size: signed_size.abs(),
        collateral: parse_decimal(row, "marginUsed")?,
        entry_price: parse_decimal(row, "entryPx")?,
        liquidation_price,
    }))
}

/// Map a fills response. `fetched`/`last_time` cover every row, mapped or not.
fn parse_fills_page(rows: &[serde_json::Value], wallet: &Address, coins: &[Coin]) -> TradePage {
    let last_time = rows
        .iter()
        .filter_map(|r| r.get("time").and_then(|t| t.as_i64()))
        .max()
        .map(TimeMs::new);

    let mut trades = Vec::with_capacity(rows.len());
    for row in rows {
        match parse_fill(row, wallet, coins) {
            Ok(Some(trade)) => trades.push(trade),
            Ok(None) => {}
            Err(e) => warn!(exchange = KEY, "Failed to parse fill: {}", e),
        }
    }

    TradePage {
        trades,
        fetched: rows.len(),
        last_time,
    }
}

fn parse_fill(
    row: &serde_json::Value,
    wallet: &Address,
    coins: &[Coin],
) -> Result<Option<Trade>, ExchangeError> {
    let symbol = field_str(row, "coin")?;
    let Some(coin) = resolve_coin(coins, symbol) else {
        debug!(exchange = KEY, coin = symbol, "Skipping fill for unknown coin");
        return Ok(None);
    };

    let time = row
        .get("time")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ExchangeError::ParseError("Missing time field".to_string()))?;

    let is_buy = match field_str(row, "side")? {
        "B" => true,
        "A" => false,
        other => {
            return Err(ExchangeError::ParseError(format!(
                "Invalid side: {}",
                other
            )))
        }
    };

    let start_position = match row.get("startPosition") {
        None | Some(serde_json::Value::Null) => None,
        Some(_) => Some(parse_decimal(row, "startPosition")?),
    };

    Ok(Some(Trade {
        hash: field_str(row, "hash")?.to_string(),
        wallet: wallet.clone(),
        coin: coin.symbol.clone(),
        exchange: HyperliquidExchange::key_ref(),
        time: TimeMs::new(time),
        price: parse_decimal(row, "px")?,
        size: parse_decimal(row, "sz")?,
        is_buy,
        start_position,
    }))
}

fn parse_order(
    row: &serde_json::Value,
    wallet: &Address,
    coins: &[Coin],
) -> Result<Option<Order>, ExchangeError> {
    let symbol = field_str(row, "coin")?;
    let Some(coin) = resolve_coin(coins, symbol) else {
        return Ok(None);
    };

    let time = row
        .get("timestamp")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ExchangeError::ParseError("Missing timestamp field".to_string()))?;

    Ok(Some(Order {
        id: field_text(row, "oid")?,
        wallet: wallet.clone(),
        coin: coin.symbol.clone(),
        exchange: HyperliquidExchange::key_ref(),
        is_buy: field_str(row, "side")? == "B",
        price: parse_decimal(row, "limitPx")?,
        size: parse_decimal(row, "sz")?,
        time: TimeMs::new(time),
    }))
}

fn parse_candle(
    row: &serde_json::Value,
    interval: ChartInterval,
) -> Result<Candle, ExchangeError> {
    let open_time = row
        .get("t")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ExchangeError::ParseError("Missing t field".to_string()))?;

    Ok(Candle {
        time: interval.bucket_start(TimeMs::new(open_time)),
        open: parse_decimal(row, "o")?,
        high: parse_decimal(row, "h")?,
        low: parse_decimal(row, "l")?,
        close: parse_decimal(row, "c")?,
        volume: parse_decimal(row, "v")?,
    })
}
