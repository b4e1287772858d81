//! GMX (Arbitrum synthetics) adapter over the infra REST API and the subsquid indexer.
//!
//! USD amounts are fixed-point integers scaled by 1e30; token prices are scaled by
//! 1e(30 - token decimals).

use super::http::{fetch_json, field_array, field_str, field_text};
use super::{Exchange, ExchangeError, TradePage};
use crate::domain::{
    Address, Candle, ChartInterval, Coin, Decimal, ExchangeKey, Order, Position, Symbol, TimeMs,
    TimeframeStats, Trade, Wallet, WalletStats,
};
use async_trait::async_trait;
use chrono::{DateTime, Days, Months, Utc};
use futures::future::try_join_all;
use reqwest::Client;
use std::collections::HashMap;
use tracing::{debug, warn};

pub const KEY: &str = "gmx";

/// Row cap applied to trade action queries.
pub const PAGE_SIZE: usize = 1000;

const USD_SCALE: u32 = 30;

/// Candle periods served by `prices/candles`. No 30m.
const CHART_INTERVALS: [ChartInterval; 6] = [
    ChartInterval::OneMinute,
    ChartInterval::FiveMinutes,
    ChartInterval::FifteenMinutes,
    ChartInterval::OneHour,
    ChartInterval::FourHours,
    ChartInterval::OneDay,
];

const ACCOUNT_STATS_QUERY: &str = r#"
query PeriodAccountStats($from: Int!) {
  all: periodAccountStats(limit: 100000, where: { from: $from }) {
    id
    volume
    realizedPnl
    realizedFees
    realizedPriceImpact
  }
}"#;

const POSITIONS_QUERY: &str = r#"
query AccountPositions($account: String!) {
  positions(where: { account_eq: $account, sizeInUsd_gt: 0 }) {
    market
    collateralToken
    isLong
    sizeInUsd
    sizeInTokens
    collateralAmount
  }
}"#;

const TRADES_QUERY: &str = r#"
query AccountTrades($account: String!, $from: Int!, $limit: Int!) {
  tradeActions(
    where: { account_eq: $account, eventName_eq: "OrderExecuted", timestamp_gte: $from }
    orderBy: timestamp_ASC
    limit: $limit
  ) {
    id
    timestamp
    marketAddress
    orderType
    isLong
    sizeDeltaUsd
    executionPrice
  }
}"#;

const ORDERS_QUERY: &str = r#"
query AccountOrders($account: String!) {
  orders(where: { account_eq: $account, status_eq: Created }) {
    id
    marketAddress
    orderType
    isLong
    sizeDeltaUsd
    triggerPrice
    acceptablePrice
    createdTxn { timestamp }
  }
}"#;

/// GMX adapter.
#[derive(Debug, Clone)]
pub struct GmxExchange {
    client: Client,
    api_url: String,
    squid_url: String,
}

impl GmxExchange {
    pub fn new(api_url: String, squid_url: String) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            squid_url,
        }
    }

    async fn get_json(&self, path: &str) -> Result<serde_json::Value, ExchangeError> {
        let url = format!("{}/{}", self.api_url, path);
        fetch_json(|| self.client.get(&url)).await
    }

    async fn graphql(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<serde_json::Value, ExchangeError> {
        let body = serde_json::json!({ "query": query, "variables": variables });
        let mut response = fetch_json(|| self.client.post(&self.squid_url).json(&body)).await?;

        if let Some(errors) = response.get("errors").filter(|e| !e.is_null()) {
            return Err(ExchangeError::ParseError(format!("GraphQL errors: {}", errors)));
        }
        response
            .get_mut("data")
            .map(serde_json::Value::take)
            .ok_or_else(|| ExchangeError::ParseError("Missing data".to_string()))
    }

    async fn directory(&self) -> Result<Directory, ExchangeError> {
        let (tokens, markets) = tokio::try_join!(self.get_json("tokens"), self.get_json("markets"))?;
        Directory::parse(&tokens, &markets)
    }

    fn key_ref() -> ExchangeKey {
        ExchangeKey::new(KEY)
    }
}

#[async_trait]
impl Exchange for GmxExchange {
    fn key(&self) -> ExchangeKey {
        Self::key_ref()
    }

    fn page_size(&self) -> Option<usize> {
        Some(PAGE_SIZE)
    }

    async fn coins(&self) -> Result<Vec<Coin>, ExchangeError> {
        let response = self.get_json("tokens").await?;
        let mut coins = Vec::new();
        for row in field_array(&response, "tokens")? {
            match parse_token(row) {
                Ok(token) => coins.push(Coin::listed(
                    Symbol::new(token.symbol),
                    Self::key_ref(),
                    token.decimals,
                )),
                Err(e) => warn!(exchange = KEY, "Failed to parse token: {}", e),
            }
        }
        Ok(coins)
    }

    async fn wallets(&self) -> Result<Vec<Wallet>, ExchangeError> {
        let timelines = timeline_starts(Utc::now());
        let responses = try_join_all(timelines.iter().map(|(_, from)| {
            self.graphql(ACCOUNT_STATS_QUERY, serde_json::json!({ "from": from }))
        }))
        .await?;

        let mut stats_by_address: HashMap<Address, WalletStats> = HashMap::new();
        for ((timeframe, _), response) in timelines.iter().zip(responses.iter()) {
            for row in field_array(response, "all")? {
                match parse_account_stats(row) {
                    Ok((address, bucket)) => {
                        let stats = stats_by_address.entry(address).or_default();
                        *timeframe.bucket_mut(stats) = bucket;
                    }
                    Err(e) => warn!(exchange = KEY, "Failed to parse account stats: {}", e),
                }
            }
        }

        let mut wallets: Vec<Wallet> = stats_by_address
            .into_iter()
            .map(|(address, stats)| Wallet::reported(address, Self::key_ref(), None, false, stats))
            .collect();
        wallets.sort_by(|a, b| {
            b.stats
                .all_time
                .pnl
                .cmp(&a.stats.all_time.pnl)
                .then_with(|| a.address.cmp(&b.address))
        });

        debug!(exchange = KEY, count = wallets.len(), "Fetched wallets");
        Ok(wallets)
    }

    async fn positions(
        &self,
        wallet: &Address,
        coins: &[Coin],
    ) -> Result<Vec<Position>, ExchangeError> {
        let (response, directory, tickers) = tokio::try_join!(
            self.graphql(
                POSITIONS_QUERY,
                serde_json::json!({ "account": wallet.as_str() })
            ),
            self.directory(),
            self.get_json("prices/tickers"),
        )?;
        let prices = parse_min_prices(&tickers)?;

        let mut positions = Vec::new();
        for row in field_array(&response, "positions")? {
            match parse_position(row, wallet, coins, &directory, &prices) {
                Ok(Some(position)) => positions.push(position),
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
        // The indexer works in whole seconds.
        let from_secs = (cursor.as_ms().max(0) + 999) / 1000;
        debug!(
            "Fetching trade actions for user={}, from_secs={}",
            wallet, from_secs
        );

        let (response, directory) = tokio::try_join!(
            self.graphql(
                TRADES_QUERY,
                serde_json::json!({
                    "account": wallet.as_str(),
                    "from": from_secs,
                    "limit": PAGE_SIZE,
                })
            ),
            self.directory(),
        )?;

        let rows = field_array(&response, "tradeActions")?;
        let last_time = rows
            .iter()
            .filter_map(|r| parse_int(r, "timestamp").ok())
            .max()
            .map(|secs| TimeMs::new(secs * 1000));

        let mut trades = Vec::with_capacity(rows.len());
        for row in rows {
            match parse_trade_action(row, wallet, coins, &directory) {
                Ok(Some(trade)) => trades.push(trade),
                Ok(None) => {}
                Err(e) => warn!(exchange = KEY, "Failed to parse trade action: {}", e),
            }
        }

        Ok(TradePage {
            trades,
            fetched: rows.len(),
            last_time,
        })
    }

    async fn orders(
        &self,
        wallet: &Address,
        coins: &[Coin],
    ) -> Result<Vec<Order>, ExchangeError> {
        let (response, directory) = tokio::try_join!(
            self.graphql(
                ORDERS_QUERY,
                serde_json::json!({ "account": wallet.as_str() })
            ),
            self.directory(),
        )?;

        let mut orders = Vec::new();
        for row in field_array(&response, "orders")? {
            match parse_order(row, wallet, coins, &directory) {
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
        let path = format!(
            "prices/candles?tokenSymbol={}&period={}",
            coin.symbol.as_str(),
            interval.as_str()
        );
        let response = self.get_json(&path).await?;
        parse_candles(&response, interval)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timeframe {
    Daily,
    Weekly,
    Monthly,
    AllTime,
}

impl Timeframe {
    fn bucket_mut(self, stats: &mut WalletStats) -> &mut TimeframeStats {
        match self {
            Timeframe::Daily => &mut stats.daily,
            Timeframe::Weekly => &mut stats.weekly,
            Timeframe::Monthly => &mut stats.monthly,
            Timeframe::AllTime => &mut stats.all_time,
        }
    }
}

/// Unix-second start of each window: day-aligned (UTC) one day/week/month back, and 0.
fn timeline_starts(now: DateTime<Utc>) -> [(Timeframe, i64); 4] {
    let start_of_day = |t: Option<DateTime<Utc>>| -> i64 {
        t.unwrap_or(now)
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0)
    };

    [
        (Timeframe::AllTime, 0),
        (
            Timeframe::Monthly,
            start_of_day(now.checked_sub_months(Months::new(1))),
        ),
        (
            Timeframe::Weekly,
            start_of_day(now.checked_sub_days(Days::new(7))),
        ),
        (
            Timeframe::Daily,
            start_of_day(now.checked_sub_days(Days::new(1))),
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TokenInfo {
    symbol: String,
    decimals: u32,
}

/// Token and market metadata keyed by lowercase contract address.
#[derive(Debug, Clone, Default)]
struct Directory {
    tokens: HashMap<String, TokenInfo>,
    market_index_tokens: HashMap<String, String>,
}

impl Directory {
    fn parse(
        tokens: &serde_json::Value,
        markets: &serde_json::Value,
    ) -> Result<Self, ExchangeError> {
        let mut directory = Directory::default();
        for row in field_array(tokens, "tokens")? {
            let Ok(address) = field_str(row, "address") else {
                continue;
            };
            match parse_token(row) {
                Ok(token) => {
                    directory.tokens.insert(address.to_lowercase(), token);
                }
                Err(e) => warn!(exchange = KEY, address = address, "Skipping token: {}", e),
            }
        }
        for row in field_array(markets, "markets")? {
            if let (Ok(market), Ok(index)) =
                (field_str(row, "marketToken"), field_str(row, "indexToken"))
            {
                directory
                    .market_index_tokens
                    .insert(market.to_lowercase(), index.to_lowercase());
            }
        }
        Ok(directory)
    }

    fn token(&self, address: &str) -> Option<&TokenInfo> {
        self.tokens.get(&address.to_lowercase())
    }

    fn index_token(&self, market: &str) -> Option<&TokenInfo> {
        self.market_index_tokens
            .get(&market.to_lowercase())
            .and_then(|index| self.tokens.get(index))
    }
}

fn parse_token(row: &serde_json::Value) -> Result<TokenInfo, ExchangeError> {
    let symbol = field_str(row, "symbol")?.to_string();
    let raw = row
        .get("decimals")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| ExchangeError::ParseError("Missing decimals field".to_string()))?;
    let decimals = u32::try_from(raw)
        .map_err(|_| ExchangeError::ParseError(format!("Decimals out of range: {}", raw)))?;
    Ok(TokenInfo { symbol, decimals })
}

fn parse_int(row: &serde_json::Value, name: &str) -> Result<i64, ExchangeError> {
    field_text(row, name)?
        .parse::<i64>()
        .map_err(|e| ExchangeError::ParseError(format!("Invalid {}: {}", name, e)))
}

fn parse_scaled(row: &serde_json::Value, name: &str, scale: u32) -> Result<Decimal, ExchangeError> {
    let raw = field_text(row, name)?;
    Decimal::from_scaled_int_str(&raw, scale)
        .map_err(|e| ExchangeError::ParseError(format!("Invalid {}: {}", name, e)))
}

fn parse_bool(row: &serde_json::Value, name: &str) -> Result<bool, ExchangeError> {
    row.get(name)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| ExchangeError::ParseError(format!("Missing {} field", name)))
}

/// Rows are `[time_secs, open, high, low, close]`, newest first. No volume is reported.
fn parse_candles(
    response: &serde_json::Value,
    interval: ChartInterval,
) -> Result<Vec<Candle>, ExchangeError> {
    let mut candles = Vec::new();
    for row in field_array(response, "candles")? {
        match parse_candle_row(row, interval) {
            Ok(candle) => candles.push(candle),
            Err(e) => warn!(exchange = KEY, "Failed to parse candle: {}", e),
        }
    }
    candles.sort_by_key(|c| c.time);
    Ok(candles)
}

fn parse_candle_row(
    row: &serde_json::Value,
    interval: ChartInterval,
) -> Result<Candle, ExchangeError> {
    let values = match row.as_array() {
        Some(values) if values.len() >= 5 => values,
        _ => return Err(ExchangeError::ParseError("Expected five-element candle".to_string())),
    };
    let secs = values[0]
        .as_i64()
        .ok_or_else(|| ExchangeError::ParseError("Invalid candle time".to_string()))?;

    Ok(Candle {
        time: interval.bucket_start(TimeMs::new(secs * 1000)),
        open: number_decimal(&values[1])?,
        high: number_decimal(&values[2])?,
        low: number_decimal(&values[3])?,
        close: number_decimal(&values[4])?,
        volume: Decimal::zero(),
    })
}

/// Plain JSON number, which may be rendered in exponent form.
fn number_decimal(value: &serde_json::Value) -> Result<Decimal, ExchangeError> {
    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => return Err(ExchangeError::ParseError(format!("Not a number: {}", value))),
    };
    Decimal::from_str_canonical(&text)
        .or_else(|_| rust_decimal::Decimal::from_scientific(&text).map(Decimal::new))
        .map_err(|e| ExchangeError::ParseError(format!("Invalid number {}: {}", text, e)))
}

fn price_scale(token: &TokenInfo) -> u32 {
    USD_SCALE.saturating_sub(token.decimals)
}

fn resolve_coin<'a>(coins: &'a [Coin], token: &TokenInfo) -> Option<&'a Coin> {
    let coin = coins.iter().find(|c| c.symbol.as_str() == token.symbol);
    if coin.is_none() {
        warn!(exchange = KEY, symbol = %token.symbol, "Unable to resolve coin");
    }
    coin
}

/// `Some(true)` for increase orders, `Some(false)` for decreases, `None` for swaps.
fn is_increase(order_type: i64) -> Option<bool> {
    match order_type {
        2 | 3 => Some(true),
        4..=7 => Some(false),
        _ => None,
    }
}

fn parse_account_stats(
    row: &serde_json::Value,
) -> Result<(Address, TimeframeStats), ExchangeError> {
    let address = Address::new(field_str(row, "id")?.to_string());
    let realized_pnl = parse_scaled(row, "realizedPnl", USD_SCALE)?;
    let realized_fees = parse_scaled(row, "realizedFees", USD_SCALE)?;
    let price_impact = parse_scaled(row, "realizedPriceImpact", USD_SCALE)?;
    let volume = parse_scaled(row, "volume", USD_SCALE)?;
    Ok((
        address,
        TimeframeStats::new(realized_pnl - realized_fees + price_impact, volume),
    ))
}

fn parse_min_prices(
    tickers: &serde_json::Value,
) -> Result<HashMap<String, String>, ExchangeError> {
    let rows = tickers
        .as_array()
        .ok_or_else(|| ExchangeError::ParseError("Expected array of tickers".to_string()))?;
    Ok(rows
        .iter()
        .filter_map(|row| {
            let address = field_str(row, "tokenAddress").ok()?;
            let price = field_text(row, "minPrice").ok()?;
            Some((address.to_lowercase(), price))
        })
        .collect())
}

fn parse_position(
    row: &serde_json::Value,
    wallet: &Address,
    coins: &[Coin],
    directory: &Directory,
    min_prices: &HashMap<String, String>,
) -> Result<Option<Position>, ExchangeError> {
    let Some(index) = directory.index_token(field_str(row, "market")?) else {
        return Ok(None);
    };
    let Some(coin) = resolve_coin(coins, index) else {
        return Ok(None);
    };

    let collateral_address = field_str(row, "collateralToken")?;
    let (Some(collateral_token), Some(raw_price)) = (
        directory.token(collateral_address),
        min_prices.get(&collateral_address.to_lowercase()),
    ) else {
        return Ok(None);
    };

    let size_decimals = coin
        .decimals_for(&GmxExchange::key_ref())
        .unwrap_or(index.decimals);
    let size = parse_scaled(row, "sizeInTokens", size_decimals)?;
    let size_usd = parse_scaled(row, "sizeInUsd", USD_SCALE)?;
    let collateral_amount = parse_scaled(row, "collateralAmount", collateral_token.decimals)?;
    let collateral_price = Decimal::from_scaled_int_str(raw_price, price_scale(collateral_token))
        .map_err(|e| ExchangeError::ParseError(format!("Invalid minPrice: {}", e)))?;

    let Some(entry_price) = size_usd.checked_div(size) else {
        return Ok(None);
    };

    Ok(Some(Position {
        wallet: wallet.clone(),
        coin: coin.symbol.clone(),
        exchange: GmxExchange::key_ref(),
        is_long: parse_bool(row, "isLong")?,
        size,
        collateral: collateral_amount * collateral_price,
        entry_price,
        liquidation_price: None,
    }))
}

fn parse_trade_action(
    row: &serde_json::Value,
    wallet: &Address,
    coins: &[Coin],
    directory: &Directory,
) -> Result<Option<Trade>, ExchangeError> {
    let Some(increase) = is_increase(parse_int(row, "orderType")?) else {
        return Ok(None);
    };
    let Some(index) = directory.index_token(field_str(row, "marketAddress")?) else {
        return Ok(None);
    };
    let Some(coin) = resolve_coin(coins, index) else {
        return Ok(None);
    };

    let is_long = parse_bool(row, "isLong")?;
    let price = parse_scaled(row, "executionPrice", price_scale(index))?;
    let size_usd = parse_scaled(row, "sizeDeltaUsd", USD_SCALE)?;
    let size = size_usd
        .checked_div(price)
        .ok_or_else(|| ExchangeError::ParseError("Zero execution price".to_string()))?;

    Ok(Some(Trade {
        hash: field_str(row, "id")?.to_string(),
        wallet: wallet.clone(),
        coin: coin.symbol.clone(),
        exchange: GmxExchange::key_ref(),
        time: TimeMs::new(parse_int(row, "timestamp")? * 1000),
        price,
        size,
        is_buy: is_long == increase,
        start_position: None,
    }))
}

fn parse_order(
    row: &serde_json::Value,
    wallet: &Address,
    coins: &[Coin],
    directory: &Directory,
) -> Result<Option<Order>, ExchangeError> {
    let Some(increase) = is_increase(parse_int(row, "orderType")?) else {
        return Ok(None);
    };
    let Some(index) = directory.index_token(field_str(row, "marketAddress")?) else {
        return Ok(None);
    };
    let Some(coin) = resolve_coin(coins, index) else {
        return Ok(None);
    };

    let trigger = parse_scaled(row, "triggerPrice", price_scale(index))?;
    let price = if trigger.is_zero() {
        parse_scaled(row, "acceptablePrice", price_scale(index))?
    } else {
        trigger
    };
    let size_usd = parse_scaled(row, "sizeDeltaUsd", USD_SCALE)?;
    let Some(size) = size_usd.checked_div(price) else {
        return Ok(None);
    };

    let created_secs = row
        .get("createdTxn")
        .map(|txn| parse_int(txn, "timestamp"))
        .transpose()?
        .unwrap_or(0);

    Ok(Some(Order {
        id: field_str(row, "id")?.to_string(),
        wallet: wallet.clone(),
        coin: coin.symbol.clone(),
        exchange: GmxExchange::key_ref(),
        is_buy: parse_bool(row, "isLong")? == increase,
        price,
        size,
        time: TimeMs::new(created_secs * 1000),
    }))
}
