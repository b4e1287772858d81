use anyhow::Context;
use perpsync::exchange::build_exchanges;
use perpsync::orchestration::{CoinReconciler, Scheduler, WalletReconciler};
use perpsync::{api, config::Config, db::init_db, Repository};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;
    let port = config.port;

    let pool = init_db(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    let repo = Arc::new(Repository::new(pool));

    // Adapter order is merge precedence.
    let exchanges = build_exchanges(&config);
    tracing::info!(
        exchanges = ?exchanges.iter().map(|e| e.key().to_string()).collect::<Vec<_>>(),
        "Exchanges configured"
    );

    let scheduler = Scheduler::new(
        Arc::new(CoinReconciler::new(exchanges.clone(), repo.clone())),
        Arc::new(WalletReconciler::new(exchanges.clone(), repo.clone())),
        config.coin_sync_interval,
        config.wallet_sync_interval,
    );
    let background = scheduler.start();

    let app = api::create_router(api::AppState::new(repo, config, exchanges));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    background.abort();
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Ctrl+C received, shutting down"),
        Err(e) => {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
