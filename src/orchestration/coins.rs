use super::ReconcileError;
use crate::db::Repository;
use crate::engine::{merge_coins, plan_coin_writes};
use crate::exchange::Exchange;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Merges every venue's coin catalog into the canonical coin set.
#[derive(Clone)]
pub struct CoinReconciler {
    exchanges: Vec<Arc<dyn Exchange>>,
    repo: Arc<Repository>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoinReport {
    pub venues_failed: usize,
    pub merged: usize,
    pub inserted: usize,
    pub updated: usize,
}

impl CoinReconciler {
    pub fn new(exchanges: Vec<Arc<dyn Exchange>>, repo: Arc<Repository>) -> Self {
        Self { exchanges, repo }
    }

    /// Run one pass: fetch all catalogs concurrently, merge in declaration order, write once.
    pub async fn reconcile(&self) -> Result<CoinReport, ReconcileError> {
        let responses = join_all(
            self.exchanges
                .iter()
                .map(|exchange| async move { (exchange.key(), exchange.coins().await) }),
        )
        .await;

        let mut report = CoinReport::default();
        let mut catalogs = Vec::with_capacity(responses.len());
        for (key, response) in responses {
            match response {
                Ok(coins) => catalogs.push((key, coins)),
                Err(e) => {
                    warn!(exchange = %key, error = %e, "Coin fetch failed, venue skipped this pass");
                    report.venues_failed += 1;
                }
            }
        }

        let merged = merge_coins(catalogs);
        report.merged = merged.len();

        let stored = self.repo.stored_coin_symbols().await?;
        let plan = plan_coin_writes(merged, &stored);
        self.repo.apply_coin_writes(&plan).await?;

        report.inserted = plan.inserts.len();
        report.updated = plan.updates.len();
        info!(
            merged = report.merged,
            inserted = report.inserted,
            updated = report.updated,
            venues_failed = report.venues_failed,
            "Coin pass complete"
        );
        Ok(report)
    }
}
