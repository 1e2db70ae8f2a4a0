//! Per-opcode gas aggregation over an opcode-level trace.

use std::collections::BTreeMap;

use l2scope_common::opcodes::categorize;
use l2scope_common::types::{ExecutionTraceFrame, GasBreakdown, Hotspot, OpcodeGas};

/// Hotspots kept in a breakdown.
pub const MAX_HOTSPOTS: usize = 10;

/// Aggregate the gas cost of every step by opcode and rank the most expensive ones.
pub fn analyze(frames: &[ExecutionTraceFrame]) -> GasBreakdown {
    let mut totals: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for frame in frames {
        let entry = totals.entry(frame.op.as_str()).or_default();
        entry.0 = entry.0.saturating_add(frame.gas_cost);
        entry.1 += 1;
    }
    let total_gas = totals
        .values()
        .fold(0u64, |acc, (gas, _)| acc.saturating_add(*gas));

    let opcodes: BTreeMap<String, OpcodeGas> = totals
        .into_iter()
        .map(|(op, (gas, count))| {
            let entry = OpcodeGas {
                total_gas: gas,
                count,
                average_gas: gas as f64 / count as f64,
                percentage: percentage(gas, total_gas),
                category: categorize(op),
            };
            (op.to_string(), entry)
        })
        .collect();

    let hotspots = rank_hotspots(&opcodes, total_gas);
    GasBreakdown {
        total_gas,
        opcodes,
        hotspots,
    }
}

fn percentage(gas: u64, total_gas: u64) -> f64 {
    if total_gas == 0 {
        0.0
    } else {
        gas as f64 / total_gas as f64 * 100.0
    }
}

fn rank_hotspots(opcodes: &BTreeMap<String, OpcodeGas>, total_gas: u64) -> Vec<Hotspot> {
    let mut ranked: Vec<(&String, &OpcodeGas)> = opcodes.iter().collect();
    // BTreeMap iteration is already by mnemonic, so the stable sort breaks ties by name.
    ranked.sort_by(|a, b| b.1.total_gas.cmp(&a.1.total_gas));
    ranked
        .into_iter()
        .take(MAX_HOTSPOTS)
        .map(|(op, entry)| Hotspot {
            opcode: op.clone(),
            gas: entry.total_gas,
            percentage: percentage(entry.total_gas, total_gas),
            hint: hint_for(op).to_string(),
        })
        .collect()
}

/// Static optimization hint for an opcode.
pub fn hint_for(opcode: &str) -> &'static str {
    match opcode {
        "SSTORE" => "Reduce storage writes: pack variables and write once per transaction",
        "SLOAD" => "Cache storage reads in memory instead of reloading the same slot",
        "CALL" => "Batch external calls or use a multicall pattern",
        _ => "Review this operation for avoidable repetition",
    }
}
