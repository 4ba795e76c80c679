// Process configuration
// Everything is read from environment variables; only the model API key is required

use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use secrecy::SecretString;
use thiserror::Error;

use crate::data_store::{DataStoreConfig, InventorySourceConfig};
use crate::inventory::InventoryConfig;
use crate::llm::ModelConfig;
use crate::logging::{LogFormat, LoggingConfig};
use crate::refresh::DEFAULT_REFRESH_TIME;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required")]
    MissingVar(String),

    #[error("invalid value `{value}` for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub source: InventorySourceConfig,
    pub store: DataStoreConfig,
    pub inventory: InventoryConfig,
    pub model: ModelConfig,
    pub logging: LoggingConfig,
    pub refresh_at: NaiveTime,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    // Builds the configuration from any key lookup; blank values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = read("GEMINI_API_KEY")
            .ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;
        let mut model = ModelConfig::new(SecretString::from(api_key));
        if let Some(name) = read("GEMINI_MODEL") {
            model.model = name;
        }

        let mut source = InventorySourceConfig::default();
        if let Some(url) = read("HOTEL_API_URL") {
            source.url = url;
        }
        source.bearer_token = read("API_TOKEN").map(SecretString::from);

        let mut store = DataStoreConfig::default();
        if let Some(path) = read("HOTEL_CACHE_PATH") {
            store.cache_path = PathBuf::from(path);
        }
        if let Some(path) = read("HOTEL_FALLBACK_PATH") {
            store.fallback_path = PathBuf::from(path);
        }
        if let Some(value) = read("HOTEL_CACHE_TTL_SECS") {
            store.cache_ttl = Duration::from_secs(parse_u64("HOTEL_CACHE_TTL_SECS", &value)?);
        }
        store.fetch_timeout = source.timeout;

        let mut server = ServerConfig::default();
        if let Some(value) = read("PORT") {
            server.port = parse_u16("PORT", &value)?;
        }

        let mut logging = LoggingConfig::default();
        if let Some(level) = read("LOG_LEVEL") {
            logging.level = level;
        }
        if let Some(format) = read("LOG_FORMAT") {
            logging.format = format.parse::<LogFormat>()?;
        }

        let refresh_time = read("HOTEL_REFRESH_TIME").unwrap_or_else(|| DEFAULT_REFRESH_TIME.to_string());
        let refresh_at = parse_time("HOTEL_REFRESH_TIME", &refresh_time)?;

        Ok(Self {
            server,
            source,
            store,
            inventory: InventoryConfig::default(),
            model,
            logging,
            refresh_at,
        })
    }
}

fn invalid(key: &str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse::<u16>().map_err(|e| invalid(key, value, e))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|e| invalid(key, value, e))
}

fn parse_time(key: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|e| invalid(key, value, e))
}
