//! Configuration management with validation and defaults
//!
//! All tunables of the economy live here: odds constants, theft and account
//! defaults, storage layout and logging. [`ConfigLoader`] reads a TOML file
//! and applies `WAGERBOT_*` environment overrides on top.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::ConfigError;

const MAX_COOLDOWN_SECS: u64 = 365 * 24 * 60 * 60;

/// Complete economy configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub storage: StorageConfig,
    pub casino: CasinoConfig,
    pub theft: TheftConfig,
    pub accounts: AccountDefaults,
    pub income: IncomeConfig,
    pub payments: PaymentsConfig,
    pub monitoring: MonitoringConfig,
}

/// RocksDB storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_directory: String,
    pub write_buffer_size_mb: usize,
    pub compression_type: CompressionType,
    /// Number of balances kept in the in-process LRU
    pub balance_cache_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_directory: "./DB/wagerbot".to_string(),
            write_buffer_size_mb: 64,
            compression_type: CompressionType::Lz4,
            balance_cache_capacity: 4096,
        }
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompressionType {
    None,
    Snappy,
    Lz4,
    Zstd,
}

/// House account and game settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CasinoConfig {
    /// Balance the casino account starts with when it is first created
    pub seed_balance: i64,
    pub min_wager: i64,
    /// Fixed seed for the game generator; OS entropy when absent
    pub rng_seed: Option<u64>,
    pub odds: OddsConfig,
}

impl Default for CasinoConfig {
    fn default() -> Self {
        Self {
            seed_balance: 100_000,
            min_wager: 10,
            rng_seed: None,
            odds: OddsConfig::default(),
        }
    }
}

/// Constants of the adaptive house-edge model
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OddsConfig {
    /// Casino balance at or below which players never win
    pub floor_balance: i64,
    /// Casino balance at or above which the natural odds apply untouched
    pub ceiling_balance: i64,
    /// Casino must hold more than `wager * wager_guard_multiplier` for any chance
    pub wager_guard_multiplier: i64,
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            floor_balance: 25_000,
            ceiling_balance: 100_000,
            wager_guard_multiplier: 10,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TheftConfig {
    pub cooldown_secs: u64,
    pub success_divisor: u32,
    pub failure_penalty_divisor: i64,
    /// Account whose attempts always succeed
    pub privileged_thief: Option<i64>,
}

impl TheftConfig {
    /// How long a robbed victim stays protected
    pub fn cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cooldown_secs.min(MAX_COOLDOWN_SECS) as i64)
    }
}

impl Default for TheftConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 3 * 60 * 60,
            success_divisor: 5,
            failure_penalty_divisor: 4,
            privileged_thief: None,
        }
    }
}

/// Values given to a freshly registered account
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountDefaults {
    pub starting_balance: i64,
    pub starting_level: i64,
    pub starting_income: i64,
}

impl Default for AccountDefaults {
    fn default() -> Self {
        Self {
            starting_balance: 1500,
            starting_level: 1,
            starting_income: 250,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    /// Account allowed to grant currency without paying for it
    pub operator: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for IncomeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 60 * 60,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,
    /// When off, counters are never incremented and render stays empty
    pub enable_metrics: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_filter: "wagerbot=info".to_string(),
            enable_metrics: true,
        }
    }
}

impl EconomyConfig {
    /// Configuration for tests: fixed seed, metrics on
    pub fn testing(data_directory: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.storage.data_directory = data_directory.into();
        config.storage.balance_cache_capacity = 64;
        config.casino.rng_seed = Some(7);
        config
    }

    /// Validate configuration for logical consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        let odds = &self.casino.odds;
        if odds.floor_balance < 0 {
            return Err(invalid("casino.odds.floor_balance", odds.floor_balance, "must be >= 0"));
        }
        if odds.ceiling_balance <= odds.floor_balance {
            return Err(ConfigError::LogicalInconsistency(format!(
                "odds ceiling {} must exceed floor {}",
                odds.ceiling_balance, odds.floor_balance
            )));
        }
        if odds.wager_guard_multiplier < 0 {
            return Err(invalid(
                "casino.odds.wager_guard_multiplier",
                odds.wager_guard_multiplier,
                "must be >= 0",
            ));
        }
        if self.casino.min_wager <= 0 {
            return Err(invalid("casino.min_wager", self.casino.min_wager, "must be > 0"));
        }
        if self.casino.seed_balance < 0 {
            return Err(invalid("casino.seed_balance", self.casino.seed_balance, "must be >= 0"));
        }
        if self.theft.success_divisor == 0 {
            return Err(invalid("theft.success_divisor", 0, "must be > 0"));
        }
        if self.theft.failure_penalty_divisor <= 0 {
            return Err(invalid(
                "theft.failure_penalty_divisor",
                self.theft.failure_penalty_divisor,
                "must be > 0",
            ));
        }
        if self.theft.cooldown_secs == 0 || self.theft.cooldown_secs > MAX_COOLDOWN_SECS {
            return Err(invalid(
                "theft.cooldown_secs",
                self.theft.cooldown_secs,
                "must be between 1 second and one year",
            ));
        }
        if self.accounts.starting_balance < 0 {
            return Err(invalid(
                "accounts.starting_balance",
                self.accounts.starting_balance,
                "must be >= 0",
            ));
        }
        if self.accounts.starting_income < 0 {
            return Err(invalid(
                "accounts.starting_income",
                self.accounts.starting_income,
                "must be >= 0",
            ));
        }
        if self.income.interval_secs == 0 {
            return Err(invalid("income.interval_secs", 0, "must be > 0"));
        }
        if self.storage.balance_cache_capacity == 0 {
            return Err(invalid("storage.balance_cache_capacity", 0, "must be > 0"));
        }
        Ok(())
    }

    pub fn income_interval(&self) -> Duration {
        Duration::from_secs(self.income.interval_secs)
    }
}

fn invalid(field: &str, value: impl ToString, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Configuration loader with environment variable support
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration file path
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration from file and environment variables, then validate
    pub fn load(&self) -> Result<EconomyConfig, ConfigError> {
        let mut config = match self.config_path {
            Some(ref path) => Self::load_from_file(path)?,
            None => EconomyConfig::default(),
        };

        Self::apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<EconomyConfig, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::LoadFailed(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse a TOML document; missing sections fall back to defaults
    pub fn parse(content: &str) -> Result<EconomyConfig, ConfigError> {
        toml::from_str(content)
            .map_err(|e| ConfigError::LoadFailed(format!("failed to parse TOML: {}", e)))
    }

    fn apply_env_overrides(config: &mut EconomyConfig) -> Result<(), ConfigError> {
        if let Ok(dir) = env::var("WAGERBOT_DATA_DIR") {
            config.storage.data_directory = dir;
        }
        if let Ok(filter) = env::var("WAGERBOT_LOG") {
            config.monitoring.log_filter = filter;
        }
        if let Ok(seed) = env::var("WAGERBOT_RNG_SEED") {
            let parsed = seed.parse().map_err(|_| ConfigError::InvalidValue {
                field: "WAGERBOT_RNG_SEED".to_string(),
                value: seed.clone(),
                reason: "expected an unsigned integer".to_string(),
            })?;
            config.casino.rng_seed = Some(parsed);
        }
        if let Ok(balance) = env::var("WAGERBOT_SEED_BALANCE") {
            config.casino.seed_balance = balance.parse().map_err(|_| ConfigError::InvalidValue {
                field: "WAGERBOT_SEED_BALANCE".to_string(),
                value: balance.clone(),
                reason: "expected an integer".to_string(),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EconomyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.casino.odds.floor_balance, 25_000);
        assert_eq!(config.casino.odds.ceiling_balance, 100_000);
        assert_eq!(config.casino.min_wager, 10);
    }

    #[test]
    fn test_testing_config_is_valid() {
        let config = EconomyConfig::testing("/tmp/wagerbot-test");
        assert!(config.validate().is_ok());
        assert_eq!(config.casino.rng_seed, Some(7));
    }

    #[test]
    fn test_inverted_odds_rejected() {
        let mut config = EconomyConfig::default();
        config.casino.odds.ceiling_balance = config.casino.odds.floor_balance;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::LogicalInconsistency(_))
        ));
    }

    #[test]
    fn test_zero_divisor_rejected() {
        let mut config = EconomyConfig::default();
        config.theft.success_divisor = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ConfigLoader::parse(
            r#"
            [casino]
            min_wager = 25

            [theft]
            privileged_thief = 42

            [payments]
            operator = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.casino.min_wager, 25);
        assert_eq!(config.casino.odds.ceiling_balance, 100_000);
        assert_eq!(config.theft.privileged_thief, Some(42));
        assert_eq!(config.payments.operator, Some(7));
        assert_eq!(config.theft.cooldown_secs, 10_800);
        assert_eq!(config.accounts.starting_balance, 1500);
    }

    #[test]
    fn test_duration_conversions() {
        let config = EconomyConfig::default();
        assert_eq!(config.theft.cooldown(), chrono::Duration::hours(3));
        assert_eq!(config.income_interval(), Duration::from_secs(3600));
    }
}
