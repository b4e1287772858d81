//! Background reconciliation loops.

use super::{CoinReconciler, WalletReconciler};
use futures::FutureExt;
use std::fmt::Display;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

/// Run `tick` now and then once per `period`, forever.
///
/// A tick that errors or panics is logged and the loop carries on; a tick that overruns
/// the period delays the next one instead of bursting.
pub fn spawn_periodic<F, Fut, T, E>(
    name: &'static str,
    period: Duration,
    mut tick: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send,
    E: Display + Send,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(task = name, period_secs = period.as_secs_f64(), "Periodic task started");

        loop {
            interval.tick().await;
            match AssertUnwindSafe(tick()).catch_unwind().await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!(task = name, error = %e, "Periodic task failed"),
                Err(_) => error!(task = name, "Periodic task panicked"),
            }
        }
    })
}

/// Drives the coin and wallet passes on independent intervals.
pub struct Scheduler {
    coins: Arc<CoinReconciler>,
    wallets: Arc<WalletReconciler>,
    coin_interval: Duration,
    wallet_interval: Duration,
}

/// Handles of the two background loops. Dropping them leaves the loops running.
#[derive(Debug)]
pub struct SchedulerHandles {
    pub coins: JoinHandle<()>,
    pub wallets: JoinHandle<()>,
}

impl SchedulerHandles {
    /// Stop both loops. A pass in flight is dropped at its next await point.
    pub fn abort(&self) {
        self.coins.abort();
        self.wallets.abort();
    }
}

impl Scheduler {
    pub fn new(
        coins: Arc<CoinReconciler>,
        wallets: Arc<WalletReconciler>,
        coin_interval: Duration,
        wallet_interval: Duration,
    ) -> Self {
        Self {
            coins,
            wallets,
            coin_interval,
            wallet_interval,
        }
    }

    pub fn start(self) -> SchedulerHandles {
        let coins = self.coins;
        let wallets = self.wallets;

        SchedulerHandles {
            coins: spawn_periodic("coin_sync", self.coin_interval, move || {
                let coins = coins.clone();
                async move { coins.reconcile().await }
            }),
            wallets: spawn_periodic("wallet_sync", self.wallet_interval, move || {
                let wallets = wallets.clone();
                async move { wallets.reconcile().await }
            }),
        }
    }
}
