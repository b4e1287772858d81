use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use perpsync::api::{create_router, AppState};
use perpsync::config::Config;
use perpsync::db::init_db;
use perpsync::domain::{
    Address, Candle, ChartInterval, Coin, Decimal, ExchangeKey, Order, Position, Symbol, TimeMs,
    TimeframeStats, Trade, Wallet, WalletStats,
};
use perpsync::engine::{CoinWritePlan, WalletWritePlan};
use perpsync::exchange::{Exchange, MockExchange};
use perpsync::Repository;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

const WHALE: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
const MINNOW: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
const IDLE: &str = "0xcccccccccccccccccccccccccccccccccccccccc";

struct TestApp {
    app: Router,
    repo: Arc<Repository>,
    _temp: TempDir,
}

fn wallet(address: &str, label: Option<&str>, all_time_pnl: i64, weekly_volume: i64) -> Wallet {
    let mut wallet = Wallet::reported(
        Address::new(address.to_string()),
        ExchangeKey::new("hl"),
        label.map(str::to_string),
        false,
        WalletStats {
            daily: TimeframeStats::new(Decimal::from(1), Decimal::from(10)),
            weekly: TimeframeStats::new(Decimal::from(2), Decimal::from(weekly_volume)),
            monthly: TimeframeStats::new(Decimal::from(3), Decimal::from(30)),
            all_time: TimeframeStats::new(Decimal::from(all_time_pnl), Decimal::from(40)),
        },
    );
    wallet.canonicalize();
    wallet
}

fn trade(hash: &str, time: i64) -> Trade {
    Trade {
        hash: hash.to_string(),
        wallet: Address::new(WHALE.to_string()),
        coin: Symbol::new("BTC".to_string()),
        exchange: ExchangeKey::new("hl"),
        time: TimeMs::new(time),
        price: Decimal::from(60_000),
        size: Decimal::from(2),
        is_buy: true,
        start_position: None,
    }
}

fn position(coin: &str, exchange: &str, is_long: bool) -> Position {
    Position {
        wallet: Address::new(WHALE.to_string()),
        coin: Symbol::new(coin.to_string()),
        exchange: ExchangeKey::new(exchange),
        is_long,
        size: Decimal::from(3),
        collateral: Decimal::from(1000),
        entry_price: Decimal::from(100),
        liquidation_price: None,
    }
}

async fn setup_app(exchanges: Vec<Arc<dyn Exchange>>) -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let mut btc = Coin::listed(Symbol::new("BTC".to_string()), ExchangeKey::new("hl"), 5);
    btc.decimals.insert(ExchangeKey::new("gmx"), 8);
    let eth = Coin::listed(Symbol::new("ETH".to_string()), ExchangeKey::new("hl"), 4);
    repo.apply_coin_writes(&CoinWritePlan {
        inserts: vec![btc, eth],
        updates: Vec::new(),
    })
    .await
    .unwrap();

    let mut plan = WalletWritePlan::default();
    plan.inserts = vec![
        wallet(WHALE, Some("Whale"), 5000, 100),
        wallet(MINNOW, None, 10, 50),
        wallet(IDLE, Some("Dormant"), 9999, 0),
    ];
    repo.apply_wallet_writes(&plan).await.unwrap();

    let env: HashMap<String, String> = [
        ("DATABASE_PATH", db_path.as_str()),
        ("TRADE_PAGE_DELAY_MS", "0"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    let config = Config::from_env_map(env).unwrap();

    let state = AppState::new(repo.clone(), config, exchanges);
    TestApp {
        app: create_router(state),
        repo,
        _temp: temp_dir,
    }
}

async fn request(app: &Router, uri: &str) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

fn venues() -> Vec<Arc<dyn Exchange>> {
    vec![
        Arc::new(
            MockExchange::new("hl")
                .with_trades(vec![trade("t1", 1000), trade("t2", 2000)])
                .with_positions(vec![position("BTC", "hl", true), position("ETH", "hl", false)])
                .with_orders(vec![Order {
                    id: "42".to_string(),
                    wallet: Address::new(WHALE.to_string()),
                    coin: Symbol::new("ETH".to_string()),
                    exchange: ExchangeKey::new("hl"),
                    is_buy: false,
                    price: Decimal::from(3500),
                    size: Decimal::from(1),
                    time: TimeMs::new(777),
                }]),
        ),
        Arc::new(MockExchange::new("gmx").with_positions(vec![position("BTC", "gmx", false)])),
    ]
}

#[tokio::test]
async fn test_health_and_ready() {
    let t = setup_app(venues()).await;

    let (status, body) = request(&t.app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = request(&t.app, "/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_wallets_ranked_by_all_time_pnl_without_idle() {
    let t = setup_app(venues()).await;

    let (status, body) = request(&t.app, "/v1/wallets").await;
    assert_eq!(status, StatusCode::OK);

    let wallets = body["wallets"].as_array().unwrap();
    let addresses: Vec<&str> = wallets
        .iter()
        .map(|w| w["address"].as_str().unwrap())
        .collect();
    assert_eq!(addresses, vec![WHALE, MINNOW]);
    assert_eq!(wallets[0]["label"], "Whale");
    assert_eq!(wallets[0]["isVault"], false);
    assert_eq!(wallets[0]["stats"]["allTime"]["pnl"], "5000");
}

#[tokio::test]
async fn test_wallets_search_and_limit() {
    let t = setup_app(venues()).await;

    let (status, body) = request(&t.app, "/v1/wallets?search=dorm").await;
    assert_eq!(status, StatusCode::OK);
    let wallets = body["wallets"].as_array().unwrap();
    assert_eq!(wallets.len(), 1);
    assert_eq!(wallets[0]["address"], IDLE);

    let (_, body) = request(&t.app, &format!("/v1/wallets?search={}", MINNOW)).await;
    assert_eq!(body["wallets"].as_array().unwrap().len(), 1);

    let (_, body) = request(&t.app, "/v1/wallets?limit=1").await;
    assert_eq!(body["wallets"].as_array().unwrap().len(), 1);

    let (status, body) = request(&t.app, "/v1/wallets?limit=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_wallets_hidden_when_their_venue_is_not_configured() {
    // Every seeded wallet was reported by hl only.
    let exchanges: Vec<Arc<dyn Exchange>> = vec![Arc::new(MockExchange::new("gmx"))];
    let t = setup_app(exchanges).await;

    let (status, body) = request(&t.app, "/v1/wallets").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["wallets"].as_array().unwrap().is_empty());

    let (_, body) = request(&t.app, "/v1/wallets?search=whale").await;
    assert!(body["wallets"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_trades_syncs_and_returns_newest_first() {
    let t = setup_app(venues()).await;

    let (status, body) = request(&t.app, &format!("/v1/trades?wallet={}", WHALE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inserted"], 2);

    let trades = body["trades"].as_array().unwrap();
    assert_eq!(trades.len(), 2);
    assert_eq!(trades[0]["hash"], "t2");
    assert_eq!(trades[0]["timeMs"], 2000);
    assert_eq!(trades[0]["side"], "buy");
    assert_eq!(trades[0]["price"], "60000");
    assert!(trades[0].get("startPosition").is_none());

    // Second call finds everything already stored.
    let (_, body) = request(&t.app, &format!("/v1/trades?wallet={}&limit=1", WHALE)).await;
    assert_eq!(body["inserted"], 0);
    assert_eq!(body["trades"].as_array().unwrap().len(), 1);

    let filter = perpsync::engine::TradeFilter::wallet(Address::new(WHALE.to_string()));
    assert_eq!(t.repo.query_trades(&filter, None).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_trades_rejects_unknown_inputs() {
    let t = setup_app(venues()).await;

    let unknown_wallet = "0xdddddddddddddddddddddddddddddddddddddddd";
    let (status, _) = request(&t.app, &format!("/v1/trades?wallet={}", unknown_wallet)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(&t.app, "/v1/trades?wallet=not-a-wallet").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) =
        request(&t.app, &format!("/v1/trades?wallet={}&exchange=dydx", WHALE)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(&t.app, &format!("/v1/trades?wallet={}&coin=DOGE", WHALE)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(&t.app, &format!("/v1/trades?wallet={}&limit=5001", WHALE)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_positions_across_venues_and_filtered() {
    let t = setup_app(venues()).await;

    let (status, body) = request(&t.app, &format!("/v1/positions?wallet={}", WHALE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["positions"].as_array().unwrap().len(), 3);

    let (_, body) = request(&t.app, &format!("/v1/positions?wallet={}&coin=BTC", WHALE)).await;
    assert_eq!(body["positions"].as_array().unwrap().len(), 2);

    let (_, body) = request(
        &t.app,
        &format!("/v1/positions?wallet={}&coin=BTC&exchange=gmx", WHALE),
    )
    .await;
    let positions = body["positions"].as_array().unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0]["exchange"], "gmx");
    assert_eq!(positions[0]["side"], "short");
    assert_eq!(positions[0]["entryPrice"], "100");
    assert_eq!(positions[0]["liquidationPrice"], Value::Null);

    // No ETH position open on gmx.
    let (status, body) = request(
        &t.app,
        &format!("/v1/positions?wallet={}&coin=ETH&exchange=gmx", WHALE),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["positions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_positions_tolerate_failing_venue() {
    let exchanges: Vec<Arc<dyn Exchange>> = vec![
        Arc::new(MockExchange::new("hl").with_positions(vec![position("BTC", "hl", true)])),
        Arc::new(MockExchange::new("gmx").failing()),
    ];
    let t = setup_app(exchanges).await;

    let (status, body) = request(&t.app, &format!("/v1/positions?wallet={}", WHALE)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["positions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_orders_read_through() {
    let t = setup_app(venues()).await;

    let (status, body) = request(&t.app, &format!("/v1/orders?wallet={}", WHALE)).await;
    assert_eq!(status, StatusCode::OK);
    let orders = body["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["id"], "42");
    assert_eq!(orders[0]["side"], "sell");
    assert_eq!(orders[0]["timeMs"], 777);

    let (status, _) = request(&t.app, &format!("/v1/orders?wallet={}", IDLE)).await;
    assert_eq!(status, StatusCode::OK);
}

fn candle(time: i64, close: i64) -> Candle {
    Candle {
        time: TimeMs::new(time),
        open: Decimal::from(close - 10),
        high: Decimal::from(close + 5),
        low: Decimal::from(close - 20),
        close: Decimal::from(close),
        volume: Decimal::from(7),
    }
}

fn charting_venues() -> Vec<Arc<dyn Exchange>> {
    vec![
        Arc::new(MockExchange::new("hl").with_candles(
            "BTC",
            ChartInterval::OneHour,
            vec![candle(7_200_000, 61_000), candle(3_600_000, 60_500)],
        )),
        Arc::new(MockExchange::new("gmx").with_chart_intervals(&[
            ChartInterval::OneMinute,
            ChartInterval::OneHour,
        ])),
    ]
}

#[tokio::test]
async fn test_intervals_listed_per_venue() {
    let t = setup_app(charting_venues()).await;

    let (status, body) = request(&t.app, "/v1/intervals").await;
    assert_eq!(status, StatusCode::OK);
    let venues = body["exchanges"].as_array().unwrap();
    assert_eq!(venues[0]["exchange"], "hl");
    assert_eq!(venues[0]["intervals"].as_array().unwrap().len(), 7);
    assert_eq!(venues[1]["exchange"], "gmx");
    assert_eq!(venues[1]["intervals"], serde_json::json!(["1m", "1h"]));
}

#[tokio::test]
async fn test_candles_read_through_oldest_first() {
    let t = setup_app(charting_venues()).await;

    let (status, body) = request(&t.app, "/v1/candles?coin=BTC&exchange=hl&interval=1h").await;
    assert_eq!(status, StatusCode::OK);
    let candles = body["candles"].as_array().unwrap();
    assert_eq!(candles.len(), 2);
    assert_eq!(candles[0]["timeMs"], 3_600_000);
    assert_eq!(candles[0]["close"], "60500");
    assert_eq!(candles[1]["high"], "61005");
    assert_eq!(candles[1]["volume"], "7");

    // ETH carries no gmx precision, so gmx has nothing to chart.
    let (status, body) = request(&t.app, "/v1/candles?coin=ETH&exchange=gmx&interval=1h").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["candles"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_candles_reject_bad_inputs() {
    let t = setup_app(charting_venues()).await;

    let (status, _) = request(&t.app, "/v1/candles?coin=BTC&interval=1h").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(&t.app, "/v1/candles?coin=BTC&exchange=hl&interval=2h").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(&t.app, "/v1/candles?coin=BTC&exchange=gmx&interval=30m").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = request(&t.app, "/v1/candles?coin=DOGE&exchange=hl&interval=1h").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = request(&t.app, "/v1/candles?exchange=hl&interval=1h").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
