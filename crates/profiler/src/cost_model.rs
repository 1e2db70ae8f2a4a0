use ethereum_types::U256;
use l2scope_common::networks::Network;
use l2scope_common::types::CostEstimate;

pub const WEI_PER_NATIVE: f64 = 1e18;

/// Convert gas into wei, native token and USD, and attach the network's advisories.
///
/// Prices are supplied by the caller; nothing here touches the network.
pub fn estimate(
    gas_used: u64,
    network: Network,
    gas_price_wei: u64,
    token_price_usd: f64,
) -> CostEstimate {
    let wei = u128::from(gas_used) * u128::from(gas_price_wei);
    let cost_native = wei as f64 / WEI_PER_NATIVE;
    CostEstimate {
        gas_used,
        gas_price_wei,
        cost_wei: U256::from(wei),
        cost_native,
        native_token: network.native_token().to_string(),
        token_price_usd,
        cost_usd: cost_native * token_price_usd,
        advisories: network
            .advisories()
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_gas_to_every_unit() {
        let estimate = estimate(50_000, Network::ArbitrumSepolia, 100_000_000, 3_000.0);
        assert_eq!(estimate.cost_wei, U256::from(5_000_000_000_000u64));
        assert!((estimate.cost_native - 0.000005).abs() < 1e-12);
        assert!((estimate.cost_usd - 0.015).abs() < 1e-9);
        assert_eq!(estimate.native_token, "ETH");
        assert!(!estimate.advisories.is_empty());
    }

    #[test]
    fn uses_the_network_token() {
        let estimate = estimate(21_000, Network::PolygonAmoy, 30_000_000_000, 0.5);
        assert_eq!(estimate.native_token, "POL");
        assert_eq!(estimate.cost_wei, U256::from(630_000_000_000_000u64));
        assert!((estimate.cost_usd - 0.000315).abs() < 1e-12);
    }

    #[test]
    fn handles_extreme_inputs() {
        let estimate = estimate(u64::MAX, Network::Local, u64::MAX, 1.0);
        assert_eq!(
            estimate.cost_wei,
            U256::from(u64::MAX) * U256::from(u64::MAX)
        );
        assert!(estimate.cost_usd.is_finite());
    }
}
