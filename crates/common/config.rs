//! TOML configuration for l2scope.
//!
//! Every section has defaults, so an empty file (or no file at all) is a
//! valid configuration. Operator-facing units are used (seconds, gwei, USD).
//!
//! ```toml
//! [rpc]
//! timeout_secs = 30
//! max_retries = 3
//!
//! [networks.local]
//! rpc_url = "http://127.0.0.1:8545"
//!
//! [oracle]
//! default_gas_price_gwei = 0.1
//! token_prices_usd = { arbitrum-sepolia = 3000.0, polygon-amoy = 0.5 }
//!
//! [advisor]
//! storage_slot_threshold = 5
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::networks::{NetworkError, NetworkRegistry};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// Top-level configuration, loadable from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct L2ScopeConfig {
    pub rpc: RpcSettings,
    /// Per-network endpoint overrides, keyed by network id.
    pub networks: BTreeMap<String, NetworkOverride>,
    pub oracle: OracleSettings,
    pub advisor: AdvisorSettings,
    pub monitor: MonitorSettings,
    pub storage: StorageSettings,
    pub compiler: CompilerSettings,
}

impl L2ScopeConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Validate configuration values, returning an error message on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.rpc.timeout_secs == 0 {
            return Err("rpc.timeout_secs must be > 0".to_string());
        }
        if self.rpc.receipt_poll_interval_ms == 0 {
            return Err("rpc.receipt_poll_interval_ms must be > 0".to_string());
        }
        if self.oracle.default_gas_price_gwei < 0.0 {
            return Err(format!(
                "oracle.default_gas_price_gwei must be non-negative, got {}",
                self.oracle.default_gas_price_gwei
            ));
        }
        if let Some((network, price)) = self
            .oracle
            .token_prices_usd
            .iter()
            .find(|(_, price)| **price < 0.0)
        {
            return Err(format!(
                "oracle.token_prices_usd.{network} must be non-negative, got {price}"
            ));
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err("monitor.poll_interval_ms must be > 0".to_string());
        }
        if self.monitor.stuck_window_secs == 0 {
            return Err("monitor.stuck_window_secs must be > 0".to_string());
        }
        Ok(())
    }

    /// Network registry with the `[networks.*]` overrides applied.
    pub fn network_registry(&self) -> Result<NetworkRegistry, ConfigError> {
        let overrides = self
            .networks
            .iter()
            .map(|(id, entry)| (id.clone(), entry.rpc_url.clone()))
            .collect();
        Ok(NetworkRegistry::with_overrides(&overrides)?)
    }
}

/// JSON-RPC client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    /// Per-request timeout (default: 30).
    pub timeout_secs: u64,
    /// TCP connect timeout (default: 10).
    pub connect_timeout_secs: u64,
    /// Retries for transient failures (default: 3).
    pub max_retries: u32,
    /// First backoff delay, doubled per retry (default: 1000).
    pub base_backoff_ms: u64,
    /// How long `deploy`/`call` wait for their receipt (default: 120).
    pub receipt_timeout_secs: u64,
    /// Poll interval while waiting for a receipt (default: 2000).
    pub receipt_poll_interval_ms: u64,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            max_retries: 3,
            base_backoff_ms: 1_000,
            receipt_timeout_secs: 120,
            receipt_poll_interval_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkOverride {
    pub rpc_url: String,
}

/// Inputs of the static price oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    /// Gas price used when no per-network price is configured (default: 0.1 gwei).
    pub default_gas_price_gwei: f64,
    /// Per-network gas price overrides, in gwei.
    pub gas_prices_gwei: BTreeMap<String, f64>,
    /// Native token prices in USD, keyed by network id.
    pub token_prices_usd: BTreeMap<String, f64>,
    /// Token price used for networks missing from `token_prices_usd` (default: 3000).
    pub default_token_price_usd: f64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            default_gas_price_gwei: 0.1,
            gas_prices_gwei: BTreeMap::new(),
            token_prices_usd: BTreeMap::new(),
            default_token_price_usd: 3_000.0,
        }
    }
}

/// Thresholds of the optimization advisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorSettings {
    /// Distinct storage slots above which caching is suggested (default: 5).
    pub storage_slot_threshold: usize,
    /// External calls above which batching is suggested (default: 3).
    pub external_call_threshold: u64,
    /// Cyclomatic complexity above which decomposition is suggested (default: 10).
    pub complexity_threshold: u32,
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        Self {
            storage_slot_threshold: 5,
            external_call_threshold: 3,
            complexity_threshold: 10,
        }
    }
}

/// Sequencer benchmark timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    /// Receipt poll interval of the confirmation monitor (default: 1000).
    pub poll_interval_ms: u64,
    /// Observation window of the stuck-transaction scenario (default: 30).
    pub stuck_window_secs: u64,
    /// Delay between fee-ladder submissions (default: 250).
    pub ladder_delay_ms: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            stuck_window_secs: 30,
            ladder_delay_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite database file. Results are kept in memory when unset.
    pub sqlite_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    /// Path or name of the `solc` binary (default: "solc").
    pub solc_path: PathBuf,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            solc_path: PathBuf::from("solc"),
        }
    }
}
