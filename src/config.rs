use crate::bridge::ChannelMapping;
use crate::engine::DEFAULT_SETTLEMENT_MARGIN;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bot_nickname: String,
    pub ledger_url: String,
    pub ledger_history_url: String,
    pub ledger_timeout: Duration,
    pub store_path: PathBuf,
    pub store_lock_timeout: Duration,
    pub store_lock_stale: Duration,
    pub settlement_margin: u64,
    pub channel_mapping: ChannelMapping,
    pub primary_webhook_url: String,
    pub secondary_webhook_url: String,
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

        let bot_nickname = required(&env_map, "BOT_NICKNAME")?;
        let ledger_url = required(&env_map, "LEDGER_URL")?;
        let ledger_history_url = env_map
            .get("LEDGER_HISTORY_URL")
            .cloned()
            .unwrap_or_else(|| ledger_url.clone());

        let ledger_timeout = millis(&env_map, "LEDGER_TIMEOUT_MS", 10_000)?;
        let store_lock_timeout = millis(&env_map, "STORE_LOCK_TIMEOUT_MS", 5_000)?;
        let store_lock_stale = millis(&env_map, "STORE_LOCK_STALE_MS", 30_000)?;

        let settlement_margin = match env_map.get("SETTLEMENT_MARGIN_BLOCKS") {
            None => DEFAULT_SETTLEMENT_MARGIN,
            Some(raw) => raw.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "SETTLEMENT_MARGIN_BLOCKS".to_string(),
                    "must be a number of blocks".to_string(),
                )
            })?,
        };

        let store_path = env_map
            .get("STORE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("deposits-{}.json", bot_nickname)));

        let channel_mapping = ChannelMapping::parse(&required(&env_map, "CHANNEL_MAPPING")?)
            .map_err(|e| ConfigError::InvalidValue("CHANNEL_MAPPING".to_string(), e.to_string()))?;

        let primary_webhook_url = required(&env_map, "PRIMARY_WEBHOOK_URL")?;
        let secondary_webhook_url = required(&env_map, "SECONDARY_WEBHOOK_URL")?;

        Ok(Config {
            port,
            bot_nickname,
            ledger_url,
            ledger_history_url,
            ledger_timeout,
            store_path,
            store_lock_timeout,
            store_lock_stale,
            settlement_margin,
            channel_mapping,
            primary_webhook_url,
            secondary_webhook_url,
        })
    }
}

fn required(env_map: &HashMap<String, String>, key: &str) -> Result<String, ConfigError> {
    env_map
        .get(key)
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnv(key.to_string()))
}

fn millis(
    env_map: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    match env_map.get(key) {
        None => Ok(Duration::from_millis(default)),
        Some(raw) => raw.parse::<u64>().map(Duration::from_millis).map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a number of milliseconds".to_string())
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("BOT_NICKNAME".to_string(), "tipbot".to_string());
        map.insert(
            "LEDGER_URL".to_string(),
            "http://127.0.0.1:7890".to_string(),
        );
        map.insert(
            "CHANNEL_MAPPING".to_string(),
            "#general=#nem secret".to_string(),
        );
        map.insert(
            "PRIMARY_WEBHOOK_URL".to_string(),
            "http://127.0.0.1:9000/primary".to_string(),
        );
        map.insert(
            "SECONDARY_WEBHOOK_URL".to_string(),
            "http://127.0.0.1:9000/secondary".to_string(),
        );
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.ledger_history_url, config.ledger_url);
        assert_eq!(config.ledger_timeout, Duration::from_secs(10));
        assert_eq!(config.store_path, PathBuf::from("deposits-tipbot.json"));
        assert_eq!(config.store_lock_timeout, Duration::from_secs(5));
        assert_eq!(config.store_lock_stale, Duration::from_secs(30));
        assert_eq!(config.settlement_margin, 5);
        assert_eq!(config.channel_mapping.secondary_for("#general"), Some("#nem"));
    }

    #[test]
    fn test_missing_required_variables() {
        for key in [
            "BOT_NICKNAME",
            "LEDGER_URL",
            "CHANNEL_MAPPING",
            "PRIMARY_WEBHOOK_URL",
            "SECONDARY_WEBHOOK_URL",
        ] {
            let mut env_map = setup_required_env();
            env_map.remove(key);
            match Config::from_env_map(env_map) {
                Err(ConfigError::MissingEnv(s)) => assert_eq!(s, key),
                _ => panic!("Expected MissingEnv error for {}", key),
            }
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
    fn test_invalid_timeout() {
        let mut env_map = setup_required_env();
        env_map.insert("LEDGER_TIMEOUT_MS".to_string(), "-1".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "LEDGER_TIMEOUT_MS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_settlement_margin() {
        let mut env_map = setup_required_env();
        env_map.insert("SETTLEMENT_MARGIN_BLOCKS".to_string(), "soon".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "SETTLEMENT_MARGIN_BLOCKS"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_malformed_channel_mapping() {
        let mut env_map = setup_required_env();
        env_map.insert("CHANNEL_MAPPING".to_string(), "#general".to_string());
        match Config::from_env_map(env_map) {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "CHANNEL_MAPPING"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_overrides() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "3000".to_string());
        env_map.insert(
            "LEDGER_HISTORY_URL".to_string(),
            "http://history:7890".to_string(),
        );
        env_map.insert("STORE_PATH".to_string(), "/var/lib/tip.json".to_string());
        env_map.insert("SETTLEMENT_MARGIN_BLOCKS".to_string(), "12".to_string());
        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.ledger_history_url, "http://history:7890");
        assert_eq!(config.store_path, PathBuf::from("/var/lib/tip.json"));
        assert_eq!(config.settlement_margin, 12);
    }
}
