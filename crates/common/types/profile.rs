use std::collections::BTreeMap;

use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use super::trace::CallTraceNode;
use crate::networks::Network;
use crate::opcodes::OpcodeCategory;
use crate::serde_utils::bytes_hex;

/// Per-opcode aggregate within a [`GasBreakdown`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpcodeGas {
    pub total_gas: u64,
    pub count: u64,
    pub average_gas: f64,
    /// Share of the breakdown's total gas, 0 to 100.
    pub percentage: f64,
    pub category: OpcodeCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hotspot {
    pub opcode: String,
    pub gas: u64,
    pub percentage: f64,
    pub hint: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GasBreakdown {
    pub total_gas: u64,
    pub opcodes: BTreeMap<String, OpcodeGas>,
    /// At most ten entries, most expensive first.
    pub hotspots: Vec<Hotspot>,
}

impl GasBreakdown {
    /// Total gas attributed to one category.
    pub fn category_gas(&self, category: OpcodeCategory) -> u64 {
        self.opcodes
            .values()
            .filter(|entry| entry.category == category)
            .map(|entry| entry.total_gas)
            .sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    pub cyclomatic_complexity: u32,
    pub source_length: usize,
    pub max_call_depth: u64,
    /// Largest memory image seen in the trace, in bytes.
    pub peak_memory_bytes: usize,
    pub unique_storage_slots: usize,
    pub storage_accesses: u64,
    pub external_calls: u64,
    pub loop_count: u32,
    pub conditional_count: u32,
    /// Linear penalty heuristic in `0..=100`, not a cost simulation.
    pub gas_efficiency_score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RecommendationCategory {
    StorageCaching,
    CallBatching,
    FunctionDecomposition,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecommendation {
    pub category: RecommendationCategory,
    pub severity: Severity,
    pub description: String,
    /// Gas attributed to the pattern today (heuristic).
    pub estimated_current_cost: u64,
    /// Gas the fix is expected to save (heuristic).
    pub estimated_savings: u64,
    pub suggested_fix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEstimate {
    pub gas_used: u64,
    pub gas_price_wei: u64,
    pub cost_wei: U256,
    /// Cost in the network's native token (ETH, POL, ...).
    pub cost_native: f64,
    pub native_token: String,
    pub token_price_usd: f64,
    pub cost_usd: f64,
    pub advisories: Vec<String>,
}

/// Compiler output for one contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledContract {
    pub contract_name: String,
    #[serde(with = "bytes_hex")]
    pub bytecode: Vec<u8>,
    pub abi: serde_json::Value,
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub source_map: String,
}

/// Input of a single complexity analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Network identifier, e.g. `arbitrum-sepolia`.
    pub network: String,
    pub contract_name: String,
    pub source: String,
    pub function_name: String,
    #[serde(default)]
    pub function_args: Vec<serde_json::Value>,
    #[serde(default)]
    pub constructor_args: Vec<serde_json::Value>,
    /// Request call-tree and opcode traces from the node.
    #[serde(default = "default_detailed_trace")]
    pub detailed_trace: bool,
}

fn default_detailed_trace() -> bool {
    true
}

/// Result of one complexity analysis. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityProfile {
    pub id: Uuid,
    pub network: Network,
    pub contract_name: String,
    pub function_name: String,
    pub compiled: CompiledContract,
    pub contract_address: Address,
    pub transaction_hash: H256,
    pub gas_used: u64,
    pub call_trace: CallTraceNode,
    /// The node couldn't trace; `call_trace` was synthesized from the receipt.
    pub fallback_trace: bool,
    pub gas_breakdown: GasBreakdown,
    pub metrics: ComplexityMetrics,
    pub recommendations: Vec<OptimizationRecommendation>,
    pub cost: CostEstimate,
    /// Unix time in milliseconds.
    pub created_at: u64,
}
