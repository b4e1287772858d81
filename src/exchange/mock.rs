//! Mock exchange for testing without network calls.

use super::{Exchange, ExchangeError, TradePage};
use crate::domain::{
    Address, Candle, ChartInterval, Coin, ExchangeKey, Order, Position, Symbol, TimeMs, Trade,
    Wallet,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// Mock exchange that returns predefined test data.
///
/// Trades are served from the stored list filtered by wallet and cursor, unless scripted
/// pages were queued with `with_trade_pages`, in which case those are returned verbatim.
#[derive(Debug)]
pub struct MockExchange {
    key: ExchangeKey,
    coins: Vec<Coin>,
    wallets: Vec<Wallet>,
    positions: Vec<Position>,
    orders: Vec<Order>,
    trades: Vec<Trade>,
    chart_intervals: Vec<ChartInterval>,
    candles: HashMap<(Symbol, ChartInterval), Vec<Candle>>,
    scripted_pages: Mutex<VecDeque<Vec<Trade>>>,
    page_size: Option<usize>,
    failing: bool,
    delay: Option<Duration>,
    trade_cursors: Mutex<Vec<TimeMs>>,
}

impl MockExchange {
    /// Create a new mock exchange with empty data.
    pub fn new(key: &str) -> Self {
        Self {
            key: ExchangeKey::new(key),
            coins: Vec::new(),
            wallets: Vec::new(),
            positions: Vec::new(),
            orders: Vec::new(),
            trades: Vec::new(),
            chart_intervals: ChartInterval::ALL.to_vec(),
            candles: HashMap::new(),
            scripted_pages: Mutex::new(VecDeque::new()),
            page_size: None,
            failing: false,
            delay: None,
            trade_cursors: Mutex::new(Vec::new()),
        }
    }

    /// List coins with this venue's precision.
    pub fn with_coins(mut self, coins: &[(&str, u32)]) -> Self {
        self.coins.extend(coins.iter().map(|(symbol, decimals)| {
            Coin::listed(
                Symbol::new(symbol.to_string()),
                self.key.clone(),
                *decimals,
            )
        }));
        self
    }

    pub fn with_wallets(mut self, wallets: Vec<Wallet>) -> Self {
        self.wallets.extend(wallets);
        self
    }

    pub fn with_positions(mut self, positions: Vec<Position>) -> Self {
        self.positions.extend(positions);
        self
    }

    pub fn with_orders(mut self, orders: Vec<Order>) -> Self {
        self.orders.extend(orders);
        self
    }

    /// Add trades served by cursor-filtered lookups.
    pub fn with_trades(mut self, trades: Vec<Trade>) -> Self {
        self.trades.extend(trades);
        self
    }

    /// Queue pages returned one per `trades` call, ignoring the cursor.
    pub fn with_trade_pages(self, pages: Vec<Vec<Trade>>) -> Self {
        if let Ok(mut queue) = self.scripted_pages.lock() {
            queue.extend(pages);
        }
        self
    }

    /// Serve `candles` for `coin` at `interval`.
    pub fn with_candles(
        mut self,
        coin: &str,
        interval: ChartInterval,
        candles: Vec<Candle>,
    ) -> Self {
        self.candles
            .entry((Symbol::new(coin.to_string()), interval))
            .or_default()
            .extend(candles);
        self
    }

    /// Restrict the advertised chart intervals. All intervals by default.
    pub fn with_chart_intervals(mut self, intervals: &[ChartInterval]) -> Self {
        self.chart_intervals = intervals.to_vec();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Make every call fail with a network error.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Cursors received by `trades`, in call order.
    pub fn trade_cursors(&self) -> Vec<TimeMs> {
        self.trade_cursors
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    async fn respond(&self) -> Result<(), ExchangeError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing {
            return Err(ExchangeError::NetworkError(format!(
                "{} unavailable",
                self.key
            )));
        }
        Ok(())
    }

    fn covers(coins: &[Coin], symbol: &Symbol) -> bool {
        coins.iter().any(|c| &c.symbol == symbol)
    }
}

#[async_trait]
impl Exchange for MockExchange {
    fn key(&self) -> ExchangeKey {
        self.key.clone()
    }

    fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    async fn coins(&self) -> Result<Vec<Coin>, ExchangeError> {
        self.respond().await?;
        Ok(self.coins.clone())
    }

    async fn wallets(&self) -> Result<Vec<Wallet>, ExchangeError> {
        self.respond().await?;
        Ok(self.wallets.clone())
    }

    async fn positions(
        &self,
        wallet: &Address,
        coins: &[Coin],
    ) -> Result<Vec<Position>, ExchangeError> {
        self.respond().await?;
        Ok(self
            .positions
            .iter()
            .filter(|p| &p.wallet == wallet && Self::covers(coins, &p.coin))
            .cloned()
            .collect())
    }

    async fn trades(
        &self,
        wallet: &Address,
        coins: &[Coin],
        cursor: TimeMs,
    ) -> Result<TradePage, ExchangeError> {
        if let Ok(mut cursors) = self.trade_cursors.lock() {
            cursors.push(cursor);
        }
        self.respond().await?;

        let scripted = self
            .scripted_pages
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        if let Some(page) = scripted {
            return Ok(TradePage::from_trades(page));
        }

        let mut rows: Vec<Trade> = self
            .trades
            .iter()
            .filter(|t| &t.wallet == wallet && t.time >= cursor)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.time.cmp(&b.time).then_with(|| a.hash.cmp(&b.hash)));
        if let Some(size) = self.page_size {
            rows.truncate(size);
        }

        let fetched = rows.len();
        let last_time = rows.iter().map(|t| t.time).max();
        let trades = rows
            .into_iter()
            .filter(|t| Self::covers(coins, &t.coin))
            .collect();

        Ok(TradePage {
            trades,
            fetched,
            last_time,
        })
    }

    async fn orders(
        &self,
        wallet: &Address,
        coins: &[Coin],
    ) -> Result<Vec<Order>, ExchangeError> {
        self.respond().await?;
        Ok(self
            .orders
            .iter()
            .filter(|o| &o.wallet == wallet && Self::covers(coins, &o.coin))
            .cloned()
            .collect())
    }

    fn chart_intervals(&self) -> Vec<ChartInterval> {
        self.chart_intervals.clone()
    }

    async fn candles(
        &self,
        coin: &Coin,
        interval: ChartInterval,
    ) -> Result<Vec<Candle>, ExchangeError> {
        self.respond().await?;
        let mut candles = self
            .candles
            .get(&(coin.symbol.clone(), interval))
            .cloned()
            .unwrap_or_default();
        candles.sort_by_key(|c| c.time);
        Ok(candles)
    }
}
