use super::SyncError;
use crate::db::Repository;
use crate::domain::{Address, Candle, ChartInterval, Coin, ExchangeKey, Order, Position, Symbol};
use crate::exchange::{find_exchange, Exchange};
use futures::future::join_all;
use std::sync::Arc;
use tracing::warn;

/// Read-through view of live positions, resting orders and candles. Nothing is persisted.
///
/// A failing venue contributes an empty list while the others still answer.
#[derive(Clone)]
pub struct LiveReader {
    exchanges: Vec<Arc<dyn Exchange>>,
    repo: Arc<Repository>,
}

impl LiveReader {
    pub fn new(exchanges: Vec<Arc<dyn Exchange>>, repo: Arc<Repository>) -> Self {
        Self { exchanges, repo }
    }

    async fn scoped_coins(&self, coin: Option<&Symbol>) -> Result<Vec<Coin>, SyncError> {
        Ok(self
            .repo
            .list_coins()
            .await?
            .into_iter()
            .filter(|c| coin.map_or(true, |s| &c.symbol == s))
            .collect())
    }

    fn scoped_exchanges(&self, exchange: Option<&ExchangeKey>) -> Vec<&Arc<dyn Exchange>> {
        self.exchanges
            .iter()
            .filter(|e| exchange.map_or(true, |k| &e.key() == k))
            .collect()
    }

    /// Open positions across venues, optionally narrowed to one coin and/or venue.
    pub async fn positions(
        &self,
        wallet: &Address,
        coin: Option<&Symbol>,
        exchange: Option<&ExchangeKey>,
    ) -> Result<Vec<Position>, SyncError> {
        let coins = self.scoped_coins(coin).await?;
        if coins.is_empty() {
            return Ok(Vec::new());
        }

        let coins = coins.as_slice();
        let responses = join_all(
            self.scoped_exchanges(exchange)
                .into_iter()
                .map(|e| async move { (e.key(), e.positions(wallet, coins).await) }),
        )
        .await;

        let mut positions = Vec::new();
        for (key, response) in responses {
            match response {
                Ok(found) => positions.extend(found),
                Err(e) => warn!(exchange = %key, wallet = %wallet, error = %e, "Position fetch failed"),
            }
        }
        Ok(positions)
    }

    /// Open position for one coin on one venue. `None` for an unknown venue or coin.
    pub async fn position(
        &self,
        wallet: &Address,
        coin: &Symbol,
        exchange: &ExchangeKey,
    ) -> Result<Option<Position>, SyncError> {
        let Some(venue) = find_exchange(&self.exchanges, exchange) else {
            return Ok(None);
        };
        let Some(coin) = self.repo.get_coin(coin).await? else {
            return Ok(None);
        };

        match venue.position(wallet, &coin).await {
            Ok(position) => Ok(position),
            Err(e) => {
                warn!(exchange = %exchange, wallet = %wallet, error = %e, "Position fetch failed");
                Ok(None)
            }
        }
    }

    /// Resting orders across all venues.
    pub async fn orders(&self, wallet: &Address) -> Result<Vec<Order>, SyncError> {
        let coins = self.scoped_coins(None).await?;
        if coins.is_empty() {
            return Ok(Vec::new());
        }

        let coins = coins.as_slice();
        let responses = join_all(
            self.exchanges
                .iter()
                .map(|e| async move { (e.key(), e.orders(wallet, coins).await) }),
        )
        .await;

        let mut orders = Vec::new();
        for (key, response) in responses {
            match response {
                Ok(found) => orders.extend(found),
                Err(e) => warn!(exchange = %key, wallet = %wallet, error = %e, "Order fetch failed"),
            }
        }
        Ok(orders)
    }

    /// Chart intervals per venue, in configured order.
    pub fn chart_intervals(&self) -> Vec<(ExchangeKey, Vec<ChartInterval>)> {
        self.exchanges
            .iter()
            .map(|e| (e.key(), e.chart_intervals()))
            .collect()
    }

    /// Candles for one coin on one venue, oldest first.
    ///
    /// Empty when the venue is unknown, does not list the coin, does not serve the
    /// interval, or fails.
    pub async fn candles(
        &self,
        coin: &Symbol,
        exchange: &ExchangeKey,
        interval: ChartInterval,
    ) -> Result<Vec<Candle>, SyncError> {
        let Some(venue) = find_exchange(&self.exchanges, exchange) else {
            return Ok(Vec::new());
        };
        if !venue.chart_intervals().contains(&interval) {
            return Ok(Vec::new());
        }
        let Some(coin) = self.repo.get_coin(coin).await? else {
            return Ok(Vec::new());
        };
        if coin.decimals_for(exchange).is_none() {
            return Ok(Vec::new());
        }

        match venue.candles(&coin, interval).await {
            Ok(candles) => Ok(candles),
            Err(e) => {
                warn!(
                    exchange = %exchange,
                    coin = %coin.symbol,
                    interval = %interval,
                    error = %e,
                    "Candle fetch failed"
                );
                Ok(Vec::new())
            }
        }
    }
}
