use super::ReconcileError;
use crate::db::Repository;
use crate::engine::{merge_wallets, plan_wallet_writes};
use crate::exchange::Exchange;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

/// Merges every venue's ranked wallet snapshot into canonical wallets, writing only changes.
#[derive(Clone)]
pub struct WalletReconciler {
    exchanges: Vec<Arc<dyn Exchange>>,
    repo: Arc<Repository>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalletReport {
    pub venues_failed: usize,
    pub merged: usize,
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
}

impl WalletReport {
    pub fn writes(&self) -> usize {
        self.inserted + self.updated
    }
}

impl WalletReconciler {
    pub fn new(exchanges: Vec<Arc<dyn Exchange>>, repo: Arc<Repository>) -> Self {
        Self { exchanges, repo }
    }

    /// Run one pass. Wallets whose content hash matches the stored one are not written.
    pub async fn reconcile(&self) -> Result<WalletReport, ReconcileError> {
        let responses = join_all(
            self.exchanges
                .iter()
                .map(|exchange| async move { (exchange.key(), exchange.wallets().await) }),
        )
        .await;

        let mut report = WalletReport::default();
        let mut snapshots = Vec::with_capacity(responses.len());
        for (key, response) in responses {
            match response {
                Ok(wallets) => snapshots.push((key, wallets)),
                Err(e) => {
                    warn!(exchange = %key, error = %e, "Wallet fetch failed, venue skipped this pass");
                    report.venues_failed += 1;
                }
            }
        }

        let merged = merge_wallets(snapshots);
        report.merged = merged.len();

        let stored = self.repo.stored_wallet_hashes().await?;
        let plan = plan_wallet_writes(merged, &stored);
        self.repo.apply_wallet_writes(&plan).await?;

        report.inserted = plan.inserts.len();
        report.updated = plan.updates.len();
        report.unchanged = plan.unchanged;
        info!(
            merged = report.merged,
            inserted = report.inserted,
            updated = report.updated,
            unchanged = report.unchanged,
            venues_failed = report.venues_failed,
            "Wallet pass complete"
        );
        Ok(report)
    }
}
