use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::duration::{deserialize_duration, serialize_duration};
use crate::error::EngineError;
use crate::market_data::RetryPolicy;
use crate::replay::SameDayOrder;

/// Bounds on in-flight external work. Shared by the price fetcher, the
/// symbol resolver and the batch runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyLimits {
    pub max_concurrent_symbol_lookups: usize,
    pub max_concurrent_price_batches: usize,
    /// Symbols per price-fetch batch.
    pub batch_size: usize,
    pub max_concurrent_users: usize,
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        Self {
            max_concurrent_symbol_lookups: 10,
            max_concurrent_price_batches: 5,
            batch_size: 50,
            max_concurrent_users: 4,
        }
    }
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_retry_backoff() -> Duration {
    Duration::from_millis(500)
}

/// Timeouts and retries for calls to price and identifier providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    #[serde(
        default = "default_request_timeout",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub request_timeout: Duration,

    pub retry_attempts: u32,

    #[serde(
        default = "default_retry_backoff",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub retry_backoff: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout: default_request_timeout(),
            retry_attempts: 3,
            retry_backoff: default_retry_backoff(),
        }
    }
}

impl NetworkConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts.max(1),
            backoff: self.retry_backoff,
            timeout: self.request_timeout,
        }
    }
}

/// Reconstruction and chart assembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// How far back (calendar days) a missing close may be borrowed from.
    pub price_lookback_days: u32,

    /// Security value below which an account is treated as not existing yet.
    pub near_zero_threshold: Decimal,

    /// Days between trade date and the date holdings change (1 = T+1).
    pub settlement_lag_days: u32,

    pub same_day_order: SameDayOrder,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            price_lookback_days: 5,
            near_zero_threshold: Decimal::ONE,
            settlement_lag_days: 1,
            same_day_order: SameDayOrder::default(),
        }
    }
}

fn default_eodhd_key_env() -> String {
    "EODHD_API_KEY".to_string()
}

fn default_openfigi_key_env() -> String {
    "OPENFIGI_API_KEY".to_string()
}

/// Where provider credentials come from. Keys themselves never live in the
/// config file, only the name of the environment variable holding them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub eodhd_api_key_env: String,
    pub openfigi_api_key_env: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eodhd_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openfigi_base_url: Option<String>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            eodhd_api_key_env: default_eodhd_key_env(),
            openfigi_api_key_env: default_openfigi_key_env(),
            eodhd_base_url: None,
            openfigi_base_url: None,
        }
    }
}

impl ProvidersConfig {
    /// The EODHD key. Missing or empty is a configuration error for the price
    /// feed only.
    pub fn eodhd_api_key(&self) -> Result<SecretString, EngineError> {
        read_secret(&self.eodhd_api_key_env).ok_or_else(|| {
            EngineError::configuration(
                "eodhd",
                format!("environment variable {} is not set", self.eodhd_api_key_env),
            )
        })
    }

    /// OpenFIGI works anonymously at a lower rate limit, so the key is optional.
    pub fn openfigi_api_key(&self) -> Option<SecretString> {
        read_secret(&self.openfigi_api_key_env)
    }
}

fn read_secret(var: &str) -> Option<SecretString> {
    std::env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to data directory. If relative, resolved from config file location.
    /// If not specified, defaults to the config file's directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,

    pub limits: ConcurrencyLimits,

    pub network: NetworkConfig,

    pub history: HistoryConfig,

    pub providers: ProvidersConfig,
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the data directory path.
    ///
    /// If `data_dir` is set and relative, it's resolved relative to `config_dir`.
    /// If `data_dir` is not set, returns `config_dir`.
    pub fn resolve_data_dir(&self, config_dir: &Path) -> PathBuf {
        match &self.data_dir {
            Some(data_dir) if data_dir.is_absolute() => data_dir.clone(),
            Some(data_dir) => config_dir.join(data_dir),
            None => config_dir.to_path_buf(),
        }
    }
}

/// Loaded configuration with resolved paths.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub data_dir: PathBuf,
    pub limits: ConcurrencyLimits,
    pub network: NetworkConfig,
    pub history: HistoryConfig,
    pub providers: ProvidersConfig,
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `./wealthline.toml` if it exists in current directory
/// 2. `~/.local/share/wealthline/wealthline.toml` (XDG data directory)
pub fn default_config_path() -> PathBuf {
    let local_config = PathBuf::from("wealthline.toml");
    if local_config.exists() {
        return local_config;
    }

    if let Some(data_dir) = dirs::data_dir() {
        return data_dir.join("wealthline").join("wealthline.toml");
    }

    local_config
}

impl ResolvedConfig {
    fn from_config(config: Config, config_dir: &Path) -> Self {
        Self {
            data_dir: config.resolve_data_dir(config_dir),
            limits: config.limits,
            network: config.network,
            history: config.history,
            providers: config.providers,
        }
    }

    /// Load and resolve config from a file path.
    ///
    /// The data directory is resolved relative to the config file's parent directory.
    pub fn load(config_path: &Path) -> Result<Self> {
        let config_path = config_path
            .canonicalize()
            .with_context(|| format!("Config file not found: {}", config_path.display()))?;

        let config_dir = config_path
            .parent()
            .context("Config file has no parent directory")?;

        let config = Config::load(&config_path)?;
        Ok(Self::from_config(config, config_dir))
    }

    /// Load config, falling back to defaults rooted at the config file's
    /// intended directory when the file doesn't exist.
    pub fn load_or_default(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            return Self::load(config_path);
        }

        let config_path = if config_path.is_relative() {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(config_path)
        } else {
            config_path.to_path_buf()
        };

        let config_dir = config_path
            .parent()
            .context("Config path has no parent directory")?;

        Ok(Self::from_config(Config::default(), config_dir))
    }
}
