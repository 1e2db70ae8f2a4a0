use std::collections::BTreeMap;

use async_trait::async_trait;
use l2scope_common::config::OracleSettings;
use l2scope_common::networks::Network;

use crate::error::OracleError;

const WEI_PER_GWEI: f64 = 1_000_000_000.0;

/// Source of gas and token prices for cost conversion.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn gas_price_wei(&self, network: Network) -> Result<u64, OracleError>;

    async fn token_price_usd(&self, network: Network) -> Result<f64, OracleError>;
}

/// Fixed prices from configuration. No network access.
#[derive(Debug, Clone)]
pub struct StaticPriceOracle {
    default_gas_price_wei: u64,
    gas_prices_wei: BTreeMap<Network, u64>,
    default_token_price_usd: f64,
    token_prices_usd: BTreeMap<Network, f64>,
}

impl StaticPriceOracle {
    pub fn new(default_gas_price_wei: u64, default_token_price_usd: f64) -> Self {
        Self {
            default_gas_price_wei,
            gas_prices_wei: BTreeMap::new(),
            default_token_price_usd,
            token_prices_usd: BTreeMap::new(),
        }
    }

    pub fn with_gas_price(mut self, network: Network, wei: u64) -> Self {
        self.gas_prices_wei.insert(network, wei);
        self
    }

    pub fn with_token_price(mut self, network: Network, usd: f64) -> Self {
        self.token_prices_usd.insert(network, usd);
        self
    }

    /// Build from the `[oracle]` section. Unknown network ids are rejected.
    pub fn from_settings(settings: &OracleSettings) -> Result<Self, OracleError> {
        let mut oracle = Self::new(
            gwei_to_wei(settings.default_gas_price_gwei),
            settings.default_token_price_usd,
        );
        for (id, gwei) in &settings.gas_prices_gwei {
            let network: Network = id
                .parse()
                .map_err(|_| OracleError::Unavailable(id.clone()))?;
            oracle = oracle.with_gas_price(network, gwei_to_wei(*gwei));
        }
        for (id, usd) in &settings.token_prices_usd {
            let network: Network = id
                .parse()
                .map_err(|_| OracleError::Unavailable(id.clone()))?;
            oracle = oracle.with_token_price(network, *usd);
        }
        Ok(oracle)
    }
}

fn gwei_to_wei(gwei: f64) -> u64 {
    (gwei * WEI_PER_GWEI).round().max(0.0) as u64
}

#[async_trait]
impl PriceOracle for StaticPriceOracle {
    async fn gas_price_wei(&self, network: Network) -> Result<u64, OracleError> {
        Ok(self
            .gas_prices_wei
            .get(&network)
            .copied()
            .unwrap_or(self.default_gas_price_wei))
    }

    async fn token_price_usd(&self, network: Network) -> Result<f64, OracleError> {
        Ok(self
            .token_prices_usd
            .get(&network)
            .copied()
            .unwrap_or(self.default_token_price_usd))
    }
}
