//! Cross-network aggregation of stored complexity profiles.

use std::collections::BTreeMap;

use l2scope_common::networks::Network;
use l2scope_common::stats::{SampleStats, compute_stats, mean_or_zero};
use l2scope_common::types::ComplexityProfile;
use serde::{Deserialize, Serialize};

/// Aggregates of one network's runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAggregate {
    pub network: Network,
    pub runs: usize,
    pub mean_gas_used: f64,
    pub min_gas_used: u64,
    pub max_gas_used: u64,
    pub mean_cost_usd: f64,
    /// `None` with fewer than two runs.
    pub gas_stats: Option<SampleStats>,
    /// How much cheaper than the L1 baseline, in percent. Negative when pricier.
    pub discount_vs_l1_percent: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkComparison {
    pub contract_name: String,
    pub function_name: String,
    /// Cheapest mean USD cost first.
    pub networks: Vec<NetworkAggregate>,
}

impl NetworkComparison {
    pub fn get(&self, network: Network) -> Option<&NetworkAggregate> {
        self.networks.iter().find(|entry| entry.network == network)
    }

    pub fn cheapest(&self) -> Option<&NetworkAggregate> {
        self.networks.first()
    }
}

/// Group profiles by network and rank the groups by mean USD cost.
///
/// Profiles of other contract functions are ignored.
pub fn compare_profiles(
    contract_name: &str,
    function_name: &str,
    profiles: &[ComplexityProfile],
) -> NetworkComparison {
    let mut by_network: BTreeMap<Network, Vec<&ComplexityProfile>> = BTreeMap::new();
    for profile in profiles
        .iter()
        .filter(|p| p.contract_name == contract_name && p.function_name == function_name)
    {
        by_network.entry(profile.network).or_default().push(profile);
    }

    let mut networks: Vec<NetworkAggregate> = by_network
        .into_iter()
        .map(|(network, runs)| aggregate(network, &runs))
        .collect();

    let baseline = networks
        .iter()
        .find(|entry| entry.network.is_l1_baseline())
        .map(|entry| entry.mean_cost_usd)
        .filter(|cost| *cost > 0.0);
    if let Some(baseline) = baseline {
        for entry in &mut networks {
            entry.discount_vs_l1_percent = Some((1.0 - entry.mean_cost_usd / baseline) * 100.0);
        }
    }

    networks.sort_by(|a, b| a.mean_cost_usd.total_cmp(&b.mean_cost_usd));
    NetworkComparison {
        contract_name: contract_name.to_string(),
        function_name: function_name.to_string(),
        networks,
    }
}

fn aggregate(network: Network, runs: &[&ComplexityProfile]) -> NetworkAggregate {
    let gas: Vec<f64> = runs.iter().map(|p| p.gas_used as f64).collect();
    let costs: Vec<f64> = runs.iter().map(|p| p.cost.cost_usd).collect();
    NetworkAggregate {
        network,
        runs: runs.len(),
        mean_gas_used: mean_or_zero(&gas),
        min_gas_used: runs.iter().map(|p| p.gas_used).min().unwrap_or_default(),
        max_gas_used: runs.iter().map(|p| p.gas_used).max().unwrap_or_default(),
        mean_cost_usd: mean_or_zero(&costs),
        gas_stats: compute_stats(&gas),
        discount_vs_l1_percent: None,
    }
}
