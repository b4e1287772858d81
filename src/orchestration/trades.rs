use super::SyncError;
use crate::db::Repository;
use crate::domain::{Address, Coin, ExchangeKey, TimeMs, Trade};
use crate::engine::{assemble_result, dedup_new_trades, TradeFilter};
use crate::exchange::Exchange;
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// On-demand trade sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeQuery {
    pub filter: TradeFilter,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TradeSyncResult {
    /// Stored and newly found trades matching the query, newest first.
    pub trades: Vec<Trade>,
    /// Trades returned by venues, before dedup.
    pub fetched: usize,
    /// Trades newly written by this call.
    pub inserted: usize,
}

/// Incrementally pulls trades for one wallet from each venue, paging until caught up.
#[derive(Clone)]
pub struct TradeSynchronizer {
    exchanges: Vec<Arc<dyn Exchange>>,
    repo: Arc<Repository>,
    page_delay: Duration,
}

impl TradeSynchronizer {
    pub fn new(
        exchanges: Vec<Arc<dyn Exchange>>,
        repo: Arc<Repository>,
        page_delay: Duration,
    ) -> Self {
        Self {
            exchanges,
            repo,
            page_delay,
        }
    }

    pub async fn sync(&self, query: &TradeQuery) -> Result<TradeSyncResult, SyncError> {
        let filter = &query.filter;
        // Cursors, fetches and storage span every coin; the coin filter only narrows the result.
        let scope = TradeFilter {
            coin: None,
            ..filter.clone()
        };
        let stored = self.repo.query_trades(&scope, None).await?;

        let mut cursors: HashMap<&ExchangeKey, TimeMs> = HashMap::new();
        for trade in &stored {
            let next = trade.time.next();
            cursors
                .entry(&trade.exchange)
                .and_modify(|c| *c = (*c).max(next))
                .or_insert(next);
        }

        let coins: Vec<Coin> = self.repo.list_coins().await?;

        let venues = self
            .exchanges
            .iter()
            .filter(|e| filter.exchange.as_ref().map_or(true, |k| &e.key() == k));

        let pages = join_all(venues.map(|exchange| {
            let cursor = cursors
                .get(&exchange.key())
                .copied()
                .unwrap_or_default();
            self.paginate(exchange, &filter.wallet, &coins, cursor)
        }))
        .await;
        let fetched: Vec<Trade> = pages.into_iter().flatten().collect();
        let fetched_count = fetched.len();

        let mut known: HashSet<String> = stored.iter().map(|t| t.hash.clone()).collect();
        let unknown: Vec<String> = fetched
            .iter()
            .filter(|t| !known.contains(&t.hash))
            .map(|t| t.hash.clone())
            .collect();
        known.extend(self.repo.existing_trade_hashes(&unknown).await?);

        let new_trades = dedup_new_trades(fetched, &known);
        let inserted = self.repo.insert_trades_batch(&new_trades).await?;

        info!(
            wallet = %filter.wallet,
            fetched = fetched_count,
            new = new_trades.len(),
            inserted,
            "Trade sync complete"
        );

        Ok(TradeSyncResult {
            trades: assemble_result(stored, new_trades, filter, query.limit),
            fetched: fetched_count,
            inserted,
        })
    }

    /// Page one venue from `cursor` until it returns a short page.
    ///
    /// A failing call ends the loop; pages already fetched are kept.
    async fn paginate(
        &self,
        exchange: &Arc<dyn Exchange>,
        wallet: &Address,
        coins: &[Coin],
        mut cursor: TimeMs,
    ) -> Vec<Trade> {
        let key = exchange.key();
        let page_size = exchange.page_size();
        let mut collected = Vec::new();
        let mut pages = 0usize;

        loop {
            let page = match exchange.trades(wallet, coins, cursor).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(exchange = %key, wallet = %wallet, pages, error = %e, "Trade fetch failed");
                    break;
                }
            };
            pages += 1;

            let full = page.is_full(page_size);
            let last_time = page.last_time;
            collected.extend(page.trades);
            if !full {
                break;
            }

            match last_time.map(|t| t.next()) {
                Some(next) if next > cursor => cursor = next,
                _ => {
                    warn!(exchange = %key, wallet = %wallet, cursor = cursor.as_ms(), "Trade cursor did not advance, stopping");
                    break;
                }
            }

            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }

        debug!(exchange = %key, wallet = %wallet, pages, trades = collected.len(), "Venue paging done");
        collected
    }
}
