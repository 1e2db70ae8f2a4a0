use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Unknown network: {0}")]
    NotFound(String),
    #[error("Invalid RPC URL for {network}: {source}")]
    InvalidUrl {
        network: String,
        #[source]
        source: url::ParseError,
    },
}

/// Networks the analyzers know how to talk to.
///
/// Adding a network is a compile-time change: every `match` on this enum is
/// exhaustive, so advisories and defaults can't silently fall through.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Network {
    ArbitrumSepolia,
    OptimismSepolia,
    BaseSepolia,
    PolygonAmoy,
    #[serde(rename = "zksync-sepolia")]
    #[strum(serialize = "zksync-sepolia")]
    ZkSyncSepolia,
    ScrollSepolia,
    LineaSepolia,
    /// Ethereum L1 testnet, used as the cost baseline.
    Sepolia,
    Local,
}

const FALLBACK_ADVISORY: &str =
    "No network-specific guidance available; compare against an L1 baseline before deploying.";

impl Network {
    pub fn chain_id(self) -> u64 {
        match self {
            Network::ArbitrumSepolia => 421_614,
            Network::OptimismSepolia => 11_155_420,
            Network::BaseSepolia => 84_532,
            Network::PolygonAmoy => 80_002,
            Network::ZkSyncSepolia => 300,
            Network::ScrollSepolia => 534_351,
            Network::LineaSepolia => 59_141,
            Network::Sepolia => 11_155_111,
            Network::Local => 31_337,
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Network::ArbitrumSepolia => "Arbitrum Sepolia",
            Network::OptimismSepolia => "Optimism Sepolia",
            Network::BaseSepolia => "Base Sepolia",
            Network::PolygonAmoy => "Polygon Amoy",
            Network::ZkSyncSepolia => "zkSync Era Sepolia",
            Network::ScrollSepolia => "Scroll Sepolia",
            Network::LineaSepolia => "Linea Sepolia",
            Network::Sepolia => "Ethereum Sepolia",
            Network::Local => "Local devnet",
        }
    }

    pub fn native_token(self) -> &'static str {
        match self {
            Network::PolygonAmoy => "POL",
            Network::ArbitrumSepolia
            | Network::OptimismSepolia
            | Network::BaseSepolia
            | Network::ZkSyncSepolia
            | Network::ScrollSepolia
            | Network::LineaSepolia
            | Network::Sepolia
            | Network::Local => "ETH",
        }
    }

    pub fn default_rpc_url(self) -> &'static str {
        match self {
            Network::ArbitrumSepolia => "https://sepolia-rollup.arbitrum.io/rpc",
            Network::OptimismSepolia => "https://sepolia.optimism.io",
            Network::BaseSepolia => "https://sepolia.base.org",
            Network::PolygonAmoy => "https://rpc-amoy.polygon.technology",
            Network::ZkSyncSepolia => "https://sepolia.era.zksync.dev",
            Network::ScrollSepolia => "https://sepolia-rpc.scroll.io",
            Network::LineaSepolia => "https://rpc.sepolia.linea.build",
            Network::Sepolia => "https://rpc.sepolia.org",
            Network::Local => "http://localhost:8545",
        }
    }

    /// Static cost advice attached to every profile for this network.
    pub fn advisories(self) -> Vec<&'static str> {
        match self {
            Network::ArbitrumSepolia => vec![
                "Arbitrum charges L1 calldata separately; minimise calldata size.",
                "Stylus contracts can cut compute-heavy costs considerably.",
            ],
            Network::OptimismSepolia => vec![
                "The L1 data fee usually dominates; pack calldata tightly.",
                "Batch several operations per transaction to amortise the L1 fee.",
            ],
            Network::BaseSepolia => vec![
                "Base shares the OP Stack fee model; the L1 data fee usually dominates.",
                "Batch several operations per transaction to amortise the L1 fee.",
            ],
            Network::PolygonAmoy => vec![
                "Fees are paid in POL; USD cost tracks the POL price, not ETH.",
                "Storage writes remain the largest execution cost; cache reads in memory.",
            ],
            Network::ZkSyncSepolia => vec![
                "zkSync charges for published pubdata; avoid redundant storage writes.",
                "Account abstraction is native; paymasters can sponsor user fees.",
            ],
            Network::ScrollSepolia => vec![
                "Scroll is bytecode-equivalent; L1 data fee follows calldata size.",
                "Some precompiles are more expensive to prove; prefer plain EVM code.",
            ],
            Network::LineaSepolia => vec![
                "Linea gas prices track proving cost; heavy KECCAK256 use is costly.",
                "Compress calldata where possible to reduce the L1 posting cost.",
            ],
            Network::Sepolia => vec![
                "L1 baseline: every storage write and calldata byte pays full L1 price.",
            ],
            Network::Local => vec![FALLBACK_ADVISORY],
        }
    }

    pub fn is_l1_baseline(self) -> bool {
        matches!(self, Network::Sepolia)
    }

    pub fn all() -> impl Iterator<Item = Network> {
        Network::iter()
    }
}

/// Resolved endpoint details for one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub network: Network,
    pub chain_id: u64,
    pub rpc_url: Url,
}

/// Maps network identifiers to endpoints, applying per-network URL overrides.
#[derive(Debug, Clone, Default)]
pub struct NetworkRegistry {
    overrides: BTreeMap<Network, Url>,
}

impl NetworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from `[networks.<id>] rpc_url = ...` style overrides.
    pub fn with_overrides(overrides: &BTreeMap<String, String>) -> Result<Self, NetworkError> {
        let mut registry = Self::new();
        for (id, raw_url) in overrides {
            let network: Network = id
                .parse()
                .map_err(|_| NetworkError::NotFound(id.clone()))?;
            let url = Url::parse(raw_url).map_err(|source| NetworkError::InvalidUrl {
                network: id.clone(),
                source,
            })?;
            registry.overrides.insert(network, url);
        }
        Ok(registry)
    }

    pub fn resolve(&self, network_id: &str) -> Result<NetworkConfig, NetworkError> {
        let network: Network = network_id
            .parse()
            .map_err(|_| NetworkError::NotFound(network_id.to_string()))?;
        self.config_for(network)
    }

    pub fn config_for(&self, network: Network) -> Result<NetworkConfig, NetworkError> {
        let rpc_url = match self.overrides.get(&network) {
            Some(url) => url.clone(),
            None => Url::parse(network.default_rpc_url()).map_err(|source| {
                NetworkError::InvalidUrl {
                    network: network.to_string(),
                    source,
                }
            })?,
        };
        Ok(NetworkConfig {
            network,
            chain_id: network.chain_id(),
            rpc_url,
        })
    }
}
