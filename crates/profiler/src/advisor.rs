use l2scope_common::config::AdvisorSettings;
use l2scope_common::opcodes::OpcodeCategory;
use l2scope_common::types::{
    ComplexityMetrics, GasBreakdown, OptimizationRecommendation, RecommendationCategory, Severity,
};

/// Gas saved per slot when a repeated storage read becomes a memory read
/// (cold `SLOAD` minus `MLOAD`).
const SAVINGS_PER_CACHED_SLOT: u64 = 2_100 - 3;
/// Base cost of a message call that batching avoids.
const SAVINGS_PER_BATCHED_CALL: u64 = 2_600;
/// Rough gas per unit of cyclomatic complexity in dispatch and branching.
const GAS_PER_BRANCH: u64 = 200;

/// Derive recommendations from the metrics and the breakdown.
///
/// Each rule is independent, so the output only depends on which thresholds
/// are exceeded. An empty list means nothing stood out.
pub fn recommend(
    metrics: &ComplexityMetrics,
    breakdown: &GasBreakdown,
    settings: &AdvisorSettings,
) -> Vec<OptimizationRecommendation> {
    let mut recommendations = Vec::new();

    if metrics.unique_storage_slots > settings.storage_slot_threshold {
        let slots = metrics.unique_storage_slots as u64;
        recommendations.push(OptimizationRecommendation {
            category: RecommendationCategory::StorageCaching,
            severity: severity(slots, settings.storage_slot_threshold as u64),
            description: format!(
                "Function touches {slots} distinct storage slots ({} storage accesses)",
                metrics.storage_accesses
            ),
            estimated_current_cost: breakdown.category_gas(OpcodeCategory::Storage),
            estimated_savings: slots.saturating_mul(SAVINGS_PER_CACHED_SLOT),
            suggested_fix: "Load storage values into local variables once, operate in memory \
                            and write back at the end"
                .to_string(),
        });
    }

    if metrics.external_calls > settings.external_call_threshold {
        let calls = metrics.external_calls;
        recommendations.push(OptimizationRecommendation {
            category: RecommendationCategory::CallBatching,
            severity: severity(calls, settings.external_call_threshold),
            description: format!("Function performs {calls} external calls"),
            estimated_current_cost: breakdown.category_gas(OpcodeCategory::System),
            // The first call is unavoidable.
            estimated_savings: calls.saturating_sub(1).saturating_mul(SAVINGS_PER_BATCHED_CALL),
            suggested_fix: "Batch the calls through a multicall or move the logic into the \
                            callee"
                .to_string(),
        });
    }

    if metrics.cyclomatic_complexity > settings.complexity_threshold {
        let complexity = u64::from(metrics.cyclomatic_complexity);
        let threshold = u64::from(settings.complexity_threshold);
        recommendations.push(OptimizationRecommendation {
            category: RecommendationCategory::FunctionDecomposition,
            severity: severity(complexity, threshold),
            description: format!("Cyclomatic complexity of {complexity} exceeds {threshold}"),
            estimated_current_cost: complexity.saturating_mul(GAS_PER_BRANCH),
            estimated_savings: (complexity - threshold).saturating_mul(GAS_PER_BRANCH),
            suggested_fix: "Split the function into smaller internal functions and move \
                            rarely taken branches out of the hot path"
                .to_string(),
        });
    }

    recommendations
}

/// Above twice the threshold is high, above 1.5 times is medium.
fn severity(value: u64, threshold: u64) -> Severity {
    if value > threshold.saturating_mul(2) {
        Severity::High
    } else if value.saturating_mul(2) > threshold.saturating_mul(3) {
        Severity::Medium
    } else {
        Severity::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_below_thresholds() {
        let metrics = ComplexityMetrics {
            unique_storage_slots: 5,
            external_calls: 3,
            cyclomatic_complexity: 10,
            ..Default::default()
        };
        assert!(recommend(&metrics, &GasBreakdown::default(), &AdvisorSettings::default()).is_empty());
    }

    #[test]
    fn each_rule_fires_independently() {
        let settings = AdvisorSettings::default();
        let storage_only = ComplexityMetrics {
            unique_storage_slots: 8,
            storage_accesses: 12,
            ..Default::default()
        };
        let recs = recommend(&storage_only, &GasBreakdown::default(), &settings);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].category, RecommendationCategory::StorageCaching);
        assert_eq!(recs[0].severity, Severity::Medium);
        assert_eq!(recs[0].estimated_savings, 8 * SAVINGS_PER_CACHED_SLOT);

        let everything = ComplexityMetrics {
            unique_storage_slots: 6,
            external_calls: 7,
            cyclomatic_complexity: 25,
            ..Default::default()
        };
        let recs = recommend(&everything, &GasBreakdown::default(), &settings);
        let categories: Vec<_> = recs.iter().map(|r| r.category).collect();
        assert_eq!(
            categories,
            vec![
                RecommendationCategory::StorageCaching,
                RecommendationCategory::CallBatching,
                RecommendationCategory::FunctionDecomposition,
            ]
        );
        assert_eq!(recs[0].severity, Severity::Low);
        assert_eq!(recs[1].severity, Severity::High);
        assert_eq!(recs[1].estimated_savings, 6 * SAVINGS_PER_BATCHED_CALL);
        assert_eq!(recs[2].severity, Severity::High);
    }

    #[test]
    fn thresholds_are_configurable() {
        let settings = AdvisorSettings {
            storage_slot_threshold: 0,
            external_call_threshold: 0,
            complexity_threshold: 0,
        };
        let metrics = ComplexityMetrics {
            unique_storage_slots: 1,
            external_calls: 1,
            cyclomatic_complexity: 1,
            ..Default::default()
        };
        assert_eq!(recommend(&metrics, &GasBreakdown::default(), &settings).len(), 3);
    }
}
