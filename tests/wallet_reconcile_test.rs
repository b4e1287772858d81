use perpsync::db::init_db;
use perpsync::domain::{
    Address, Decimal, ExchangeKey, TimeframeStats, Wallet, WalletStats,
};
use perpsync::exchange::{Exchange, MockExchange};
use perpsync::orchestration::WalletReconciler;
use perpsync::Repository;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

async fn setup_repo() -> (Arc<Repository>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    (Arc::new(Repository::new(pool)), temp_dir)
}

fn stats(pnl: &str) -> WalletStats {
    WalletStats {
        daily: TimeframeStats::new(Decimal::from_str("1.5").unwrap(), Decimal::from(100)),
        weekly: TimeframeStats::new(Decimal::from_str("-2").unwrap(), Decimal::from(700)),
        monthly: TimeframeStats::new(Decimal::from(10), Decimal::from(3000)),
        all_time: TimeframeStats::new(Decimal::from_str(pnl).unwrap(), Decimal::from(9000)),
    }
}

fn wallet(address: &str, exchange: &str, label: Option<&str>, pnl: &str) -> Wallet {
    Wallet::reported(
        Address::new(address.to_string()),
        ExchangeKey::new(exchange),
        label.map(str::to_string),
        false,
        stats(pnl),
    )
}

fn venues(hl: Vec<Wallet>, gmx: Vec<Wallet>) -> Vec<Arc<dyn Exchange>> {
    vec![
        Arc::new(MockExchange::new("hl").with_wallets(hl)),
        Arc::new(MockExchange::new("gmx").with_wallets(gmx)),
    ]
}

#[tokio::test]
async fn test_identical_second_pass_writes_nothing() {
    let (repo, _temp) = setup_repo().await;
    let reconciler = WalletReconciler::new(
        venues(
            vec![wallet("0xa", "hl", Some("Alpha"), "50"), wallet("0xb", "hl", None, "20")],
            vec![wallet("0xa", "gmx", None, "1"), wallet("0xc", "gmx", None, "5")],
        ),
        repo.clone(),
    );

    let first = reconciler.reconcile().await.unwrap();
    assert_eq!(first.inserted, 3);

    let second = reconciler.reconcile().await.unwrap();
    assert_eq!(second.writes(), 0);
    assert_eq!(second.unchanged, 3);
}

#[tokio::test]
async fn test_unchanged_wallet_keeps_stored_hash() {
    let (repo, _temp) = setup_repo().await;
    let address = Address::new("0xa".to_string());

    WalletReconciler::new(
        venues(vec![wallet("0xa", "hl", None, "7")], Vec::new()),
        repo.clone(),
    )
    .reconcile()
    .await
    .unwrap();
    let stored = repo.get_wallet(&address).await.unwrap().unwrap();

    let mut recomputed = wallet("0xa", "hl", None, "7");
    recomputed.canonicalize();
    assert_eq!(recomputed.hash, stored.hash);
}

#[tokio::test]
async fn test_venue_declaration_order_does_not_change_hash() {
    let (repo, _temp) = setup_repo().await;

    let hl_first: Vec<Arc<dyn Exchange>> = venues(
        vec![wallet("0xa", "hl", None, "3")],
        vec![wallet("0xa", "gmx", None, "3")],
    );
    WalletReconciler::new(hl_first, repo.clone())
        .reconcile()
        .await
        .unwrap();

    let gmx_first: Vec<Arc<dyn Exchange>> = vec![
        Arc::new(MockExchange::new("gmx").with_wallets(vec![wallet("0xa", "gmx", None, "3")])),
        Arc::new(MockExchange::new("hl").with_wallets(vec![wallet("0xa", "hl", None, "3")])),
    ];
    let report = WalletReconciler::new(gmx_first, repo.clone())
        .reconcile()
        .await
        .unwrap();

    assert_eq!(report.unchanged, 1);
    let stored = repo
        .get_wallet(&Address::new("0xa".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.exchanges, vec![ExchangeKey::new("gmx"), ExchangeKey::new("hl")]);
}

#[tokio::test]
async fn test_first_declared_venue_is_canonical() {
    let (repo, _temp) = setup_repo().await;
    let exchanges: Vec<Arc<dyn Exchange>> = vec![
        Arc::new(
            MockExchange::new("hl")
                .with_wallets(vec![wallet("0xA", "hl", Some("From HL"), "100")])
                .with_delay(Duration::from_millis(50)),
        ),
        Arc::new(MockExchange::new("gmx").with_wallets(vec![wallet("0xa", "gmx", None, "-5")])),
    ];

    WalletReconciler::new(exchanges, repo.clone())
        .reconcile()
        .await
        .unwrap();

    let stored = repo
        .get_wallet(&Address::new("0xa".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.label.as_deref(), Some("From HL"));
    assert_eq!(stored.stats.all_time.pnl, Decimal::from(100));
    assert_eq!(stored.exchanges.len(), 2);
}

#[tokio::test]
async fn test_venue_leaving_updates_membership() {
    let (repo, _temp) = setup_repo().await;
    WalletReconciler::new(
        venues(
            vec![wallet("0xa", "hl", None, "1")],
            vec![wallet("0xa", "gmx", None, "1")],
        ),
        repo.clone(),
    )
    .reconcile()
    .await
    .unwrap();

    let report = WalletReconciler::new(
        venues(vec![wallet("0xa", "hl", None, "1")], Vec::new()),
        repo.clone(),
    )
    .reconcile()
    .await
    .unwrap();
    assert_eq!(report.updated, 1);

    let stored = repo
        .get_wallet(&Address::new("0xa".to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.exchanges, vec![ExchangeKey::new("hl")]);
}
