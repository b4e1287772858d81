use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Coin catalogs change rarely; one pass per day.
pub const DEFAULT_COIN_SYNC_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub const DEFAULT_WALLET_SYNC_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Pause between consecutive trade pages from one venue.
pub const DEFAULT_TRADE_PAGE_DELAY: Duration = Duration::from_millis(500);

pub const DEFAULT_HYPERLIQUID_API_URL: &str = "https://api.hyperliquid.xyz";
pub const DEFAULT_GMX_API_URL: &str = "https://arbitrum-api.gmxinfra.io";
pub const DEFAULT_GMX_SQUID_URL: &str = "https://gmx.squids.live/gmx-synthetics-arbitrum/graphql";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub hyperliquid_api_url: String,
    pub gmx_api_url: String,
    pub gmx_squid_url: String,
    /// Enabled venues. Order is merge precedence.
    pub exchanges: Vec<ExchangeKind>,
    pub coin_sync_interval: Duration,
    pub wallet_sync_interval: Duration,
    pub trade_page_delay: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExchangeKind {
    Hyperliquid,
    Gmx,
}

impl ExchangeKind {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "hl" => Some(ExchangeKind::Hyperliquid),
            "gmx" => Some(ExchangeKind::Gmx),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let url = |name: &str, default: &str| {
            env_map
                .get(name)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        let exchanges = parse_exchanges(
            env_map
                .get("EXCHANGES")
                .map(|s| s.as_str())
                .unwrap_or("hl,gmx"),
        )?;

        let coin_sync_interval = parse_duration(
            &env_map,
            "COIN_SYNC_INTERVAL_SECS",
            Duration::from_secs,
            DEFAULT_COIN_SYNC_INTERVAL,
            1,
        )?;
        let wallet_sync_interval = parse_duration(
            &env_map,
            "WALLET_SYNC_INTERVAL_SECS",
            Duration::from_secs,
            DEFAULT_WALLET_SYNC_INTERVAL,
            1,
        )?;
        let trade_page_delay = parse_duration(
            &env_map,
            "TRADE_PAGE_DELAY_MS",
            Duration::from_millis,
            DEFAULT_TRADE_PAGE_DELAY,
            0,
        )?;

        Ok(Config {
            port,
            database_path,
            hyperliquid_api_url: url("HYPERLIQUID_API_URL", DEFAULT_HYPERLIQUID_API_URL),
            gmx_api_url: url("GMX_API_URL", DEFAULT_GMX_API_URL),
            gmx_squid_url: url("GMX_SQUID_URL", DEFAULT_GMX_SQUID_URL),
            exchanges,
            coin_sync_interval,
            wallet_sync_interval,
            trade_page_delay,
        })
    }
}

fn parse_exchanges(value: &str) -> Result<Vec<ExchangeKind>, ConfigError> {
    let mut kinds = Vec::new();
    for key in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let kind = ExchangeKind::parse(key).ok_or_else(|| {
            ConfigError::InvalidValue(
                "EXCHANGES".to_string(),
                format!("unknown exchange {}, expected hl or gmx", key),
            )
        })?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }

    if kinds.is_empty() {
        return Err(ConfigError::InvalidValue(
            "EXCHANGES".to_string(),
            "must name at least one exchange".to_string(),
        ));
    }
    Ok(kinds)
}

fn parse_duration(
    env_map: &HashMap<String, String>,
    name: &str,
    unit: fn(u64) -> Duration,
    default: Duration,
    min: u64,
) -> Result<Duration, ConfigError> {
    match env_map.get(name) {
        None => Ok(default),
        Some(raw) => match raw.parse::<u64>() {
            Ok(value) if value >= min => Ok(unit(value)),
            _ => Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("must be an integer >= {}", min),
            )),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/test.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.hyperliquid_api_url, DEFAULT_HYPERLIQUID_API_URL);
        assert_eq!(config.gmx_squid_url, DEFAULT_GMX_SQUID_URL);
        assert_eq!(
            config.exchanges,
            vec![ExchangeKind::Hyperliquid, ExchangeKind::Gmx]
        );
        assert_eq!(config.coin_sync_interval, Duration::from_secs(86_400));
        assert_eq!(config.wallet_sync_interval, Duration::from_secs(300));
        assert_eq!(config.trade_page_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_exchange_order_is_kept() {
        let mut env_map = setup_required_env();
        env_map.insert("EXCHANGES".to_string(), " gmx , hl, gmx".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(
            config.exchanges,
            vec![ExchangeKind::Gmx, ExchangeKind::Hyperliquid]
        );
    }

    #[test]
    fn test_unknown_exchange() {
        let mut env_map = setup_required_env();
        env_map.insert("EXCHANGES".to_string(), "hl,dydx".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, msg)) => {
                assert_eq!(k, "EXCHANGES");
                assert!(msg.contains("dydx"));
            }
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_interval_overrides() {
        let mut env_map = setup_required_env();
        env_map.insert("COIN_SYNC_INTERVAL_SECS".to_string(), "60".to_string());
        env_map.insert("TRADE_PAGE_DELAY_MS".to_string(), "0".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.coin_sync_interval, Duration::from_secs(60));
        assert_eq!(config.trade_page_delay, Duration::ZERO);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut env_map = setup_required_env();
        env_map.insert("WALLET_SYNC_INTERVAL_SECS".to_string(), "0".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "WALLET_SYNC_INTERVAL_SECS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }
}
