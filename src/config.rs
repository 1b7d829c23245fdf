use crate::domain::Address;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub ledger_rpc_url: String,
    pub program_id: Address,
    pub keeper_address: Address,
    pub cycle_interval: Duration,
    pub paused_backoff: Duration,
    pub call_timeout: Duration,
    pub pool_lookup_attempts: u32,
    pub pool_lookup_delay: Duration,
    pub max_concurrency: usize,
    pub status_port: Option<u16>,
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
        let ledger_rpc_url = required(&env_map, "LEDGER_RPC_URL")?;
        let program_id = parse_address(&env_map, "PROGRAM_ID")?;
        let keeper_address = parse_address(&env_map, "KEEPER_ADDRESS")?;

        let cycle_interval = parse_millis(&env_map, "CYCLE_INTERVAL_MS", 5_000)?;
        let paused_backoff = parse_millis(&env_map, "PAUSED_BACKOFF_MS", 10_000)?;
        let call_timeout = parse_millis(&env_map, "CALL_TIMEOUT_MS", 10_000)?;
        let pool_lookup_delay = parse_millis(&env_map, "POOL_LOOKUP_DELAY_MS", 1_000)?;

        let pool_lookup_attempts = env_map
            .get("POOL_LOOKUP_ATTEMPTS")
            .map(|s| s.as_str())
            .unwrap_or("3")
            .parse::<u32>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "POOL_LOOKUP_ATTEMPTS".to_string(),
                    "must be an integer >= 1".to_string(),
                )
            })?;

        let max_concurrency = env_map
            .get("MAX_CONCURRENCY")
            .map(|s| s.as_str())
            .unwrap_or("1")
            .parse::<usize>()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                ConfigError::InvalidValue(
                    "MAX_CONCURRENCY".to_string(),
                    "must be an integer >= 1".to_string(),
                )
            })?;

        let status_port = match env_map.get("STATUS_PORT") {
            Some(s) => Some(s.parse::<u16>().map_err(|_| {
                ConfigError::InvalidValue(
                    "STATUS_PORT".to_string(),
                    "must be a valid u16".to_string(),
                )
            })?),
            None => None,
        };

        Ok(Config {
            ledger_rpc_url,
            program_id,
            keeper_address,
            cycle_interval,
            paused_backoff,
            call_timeout,
            pool_lookup_attempts,
            pool_lookup_delay,
            max_concurrency,
            status_port,
        })
    }

    /// Configuration for offline runs against the in-memory ledger.
    pub fn dry_run() -> Self {
        Config {
            ledger_rpc_url: "http://localhost.invalid".to_string(),
            program_id: Address::from_bytes([0x11; 32]),
            keeper_address: Address::from_bytes([0xee; 32]),
            cycle_interval: Duration::from_millis(5_000),
            paused_backoff: Duration::from_millis(10_000),
            call_timeout: Duration::from_millis(10_000),
            pool_lookup_attempts: 3,
            pool_lookup_delay: Duration::from_millis(1_000),
            max_concurrency: 1,
            status_port: None,
        }
    }
}

fn required(env_map: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    env_map
        .get(key)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

fn parse_address(env_map: &HashMap<String, String>, key: &str) -> Result<Address, ConfigError> {
    let raw = required(env_map, key)?;
    Address::parse(&raw).map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

fn parse_millis(
    env_map: &HashMap<String, String>,
    key: &str,
    default_ms: u64,
) -> Result<Duration, ConfigError> {
    match env_map.get(key) {
        Some(s) => s.parse::<u64>().map(Duration::from_millis).map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid u64".to_string())
        }),
        None => Ok(Duration::from_millis(default_ms)),
    }
}
