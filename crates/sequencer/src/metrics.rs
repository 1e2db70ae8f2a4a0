//! Reduction of probe results into inclusion, latency and fairness metrics.
//!
//! Everything here is a pure function of its inputs, so recomputing on the
//! same snapshot yields the same metrics.

use ethereum_types::U256;
use l2scope_common::stats::{compute_stats, mean_or_zero};
use l2scope_common::types::{
    FeeTier, PerformanceMetrics, StatusCounts, StuckTransactionRecord, TierMetrics,
    TransactionResult, TxStatus,
};

const WEI_PER_NATIVE: f64 = 1e18;

/// Weight of the low-fee inclusion rate in the censorship score.
const INCLUSION_WEIGHT: f64 = 0.4;
/// Full latency-fairness points, granted up to [`FAIR_LATENCY_RATIO`].
const LATENCY_FAIRNESS_POINTS: f64 = 30.0;
const FAIR_LATENCY_RATIO: f64 = 1.5;
/// Fairness points lost per 0.1 of latency ratio above the fair ratio.
const FAIRNESS_PENALTY_PER_TENTH: f64 = 10.0;
/// Granted when parallel processing was observed.
const PARALLEL_SUPPORT_POINTS: f64 = 30.0;

pub fn calculate(
    tiers: &[FeeTier],
    stuck: Option<&StuckTransactionRecord>,
    token_price_usd: f64,
) -> PerformanceMetrics {
    let low: Vec<&TransactionResult> = tiers
        .iter()
        .filter(|tier| tier.kind.is_low_side())
        .flat_map(|tier| tier.results.iter())
        .collect();
    let normal: Vec<&TransactionResult> = tiers
        .iter()
        .filter(|tier| !tier.kind.is_low_side())
        .flat_map(|tier| tier.results.iter())
        .collect();
    let all: Vec<&TransactionResult> = tiers.iter().flat_map(|tier| tier.results.iter()).collect();

    let low_fee_inclusion_rate = inclusion_rate(&low);
    let normal_fee_inclusion_rate = inclusion_rate(&normal);
    let avg_low_fee_latency_ms = mean_or_zero(&latencies(&low));
    let avg_normal_fee_latency_ms = mean_or_zero(&latencies(&normal));
    let latency_ratio = if avg_normal_fee_latency_ms > 0.0 {
        avg_low_fee_latency_ms / avg_normal_fee_latency_ms
    } else {
        0.0
    };

    let parallel_processing_efficiency = match stuck {
        Some(record) if record.total_parallel > 0 => {
            f64::from(record.confirmed_parallel) / f64::from(record.total_parallel)
        }
        Some(_) => 0.0,
        None => inclusion_rate(&all) / 100.0,
    };

    let total_cost_wei = all
        .iter()
        .fold(U256::zero(), |acc, result| acc.saturating_add(result.cost_wei()));

    PerformanceMetrics {
        low_fee_inclusion_rate,
        normal_fee_inclusion_rate,
        avg_low_fee_latency_ms,
        avg_normal_fee_latency_ms,
        latency_ratio,
        parallel_processing_efficiency,
        censorship_resistance_score: censorship_resistance_score(
            low_fee_inclusion_rate,
            latency_ratio,
            parallel_processing_efficiency,
        ),
        total_cost_wei,
        total_cost_usd: wei_to_native(total_cost_wei) * token_price_usd,
        counts: StatusCounts::tally(all.iter().copied()),
        tiers: tiers.iter().map(tier_metrics).collect(),
    }
}

/// `0.4 * low-fee inclusion (%) + latency fairness + parallel support`, in `0..=100`.
pub fn censorship_resistance_score(
    low_fee_inclusion_rate: f64,
    latency_ratio: f64,
    parallel_processing_efficiency: f64,
) -> f64 {
    let inclusion = INCLUSION_WEIGHT * low_fee_inclusion_rate.clamp(0.0, 100.0);
    let fairness = if latency_ratio <= FAIR_LATENCY_RATIO {
        LATENCY_FAIRNESS_POINTS
    } else {
        let tenths_above = (latency_ratio - FAIR_LATENCY_RATIO) / 0.1;
        (LATENCY_FAIRNESS_POINTS - FAIRNESS_PENALTY_PER_TENTH * tenths_above).max(0.0)
    };
    let parallel = if parallel_processing_efficiency > 0.0 {
        PARALLEL_SUPPORT_POINTS
    } else {
        0.0
    };
    (inclusion + fairness + parallel).clamp(0.0, 100.0)
}

fn tier_metrics(tier: &FeeTier) -> TierMetrics {
    let results: Vec<&TransactionResult> = tier.results.iter().collect();
    let latencies = latencies(&results);
    TierMetrics {
        label: tier.label.clone(),
        priority_fee_wei: tier.priority_fee_wei,
        counts: StatusCounts::tally(results.iter().copied()),
        inclusion_rate: inclusion_rate(&results),
        avg_latency_ms: mean_or_zero(&latencies),
        latency_stats: compute_stats(&latencies),
    }
}

/// Confirmed share in percent, 0 for an empty set.
fn inclusion_rate(results: &[&TransactionResult]) -> f64 {
    if results.is_empty() {
        return 0.0;
    }
    let confirmed = results
        .iter()
        .filter(|result| result.status == TxStatus::Confirmed)
        .count();
    confirmed as f64 / results.len() as f64 * 100.0
}

fn latencies(results: &[&TransactionResult]) -> Vec<f64> {
    results
        .iter()
        .filter_map(|result| result.latency_ms)
        .map(|latency| latency as f64)
        .collect()
}

fn wei_to_native(wei: U256) -> f64 {
    if wei.bits() <= 128 {
        wei.low_u128() as f64 / WEI_PER_NATIVE
    } else {
        f64::MAX
    }
}
