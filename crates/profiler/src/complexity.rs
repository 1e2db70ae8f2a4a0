//! Complexity metrics from source text and from an execution trace.
//!
//! The source pass is a token count over raw text. Comments and string
//! literals are not stripped, so keywords inside them are counted too.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use l2scope_common::types::{CallTraceNode, ComplexityMetrics, ExecutionTraceFrame};
use regex::Regex;

#[expect(clippy::expect_used, reason = "the pattern is a constant")]
static DECISION_POINTS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?P<keyword>if|while|for)\b|(?P<ternary>\?)|(?P<logical>&&|\|\|)")
        .expect("decision point pattern is valid")
});

#[expect(clippy::expect_used, reason = "the pattern is a constant")]
static ELSE_IF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\belse\s+if\b").expect("else-if pattern is valid"));

/// Counts taken from the contract source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceMetrics {
    pub cyclomatic_complexity: u32,
    pub loop_count: u32,
    pub conditional_count: u32,
    pub source_length: usize,
}

/// Counts taken from the trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceMetrics {
    pub max_call_depth: u64,
    pub peak_memory_bytes: usize,
    pub unique_storage_slots: usize,
    pub storage_accesses: u64,
    pub external_calls: u64,
}

/// Cyclomatic complexity is `1 + decision points`. Every pattern is counted on
/// its own, so an `else if` scores twice: once as `else if` and once as `if`.
pub fn analyze_source(source: &str) -> SourceMetrics {
    let mut metrics = SourceMetrics {
        cyclomatic_complexity: 1,
        source_length: source.len(),
        ..Default::default()
    };
    for captures in DECISION_POINTS.captures_iter(source) {
        metrics.cyclomatic_complexity = metrics.cyclomatic_complexity.saturating_add(1);
        if let Some(keyword) = captures.name("keyword") {
            match keyword.as_str() {
                "if" => metrics.conditional_count += 1,
                _ => metrics.loop_count += 1,
            }
        } else if captures.name("ternary").is_some() {
            metrics.conditional_count += 1;
        }
    }
    let else_ifs = ELSE_IF.find_iter(source).count();
    metrics.cyclomatic_complexity = metrics
        .cyclomatic_complexity
        .saturating_add(u32::try_from(else_ifs).unwrap_or(u32::MAX));
    metrics
}

/// Walk the opcode frames once. The call tree only raises the depth when the
/// node returned no frames.
pub fn analyze_trace(frames: &[ExecutionTraceFrame], call_trace: &CallTraceNode) -> TraceMetrics {
    let mut metrics = TraceMetrics {
        max_call_depth: call_trace.depth() as u64,
        ..Default::default()
    };
    let mut slots = BTreeSet::new();

    for frame in frames {
        metrics.max_call_depth = metrics.max_call_depth.max(frame.depth);
        metrics.peak_memory_bytes = metrics.peak_memory_bytes.max(frame.memory_size());

        let Some(opcode) = frame.opcode() else {
            continue;
        };
        if opcode.is_storage_access() {
            metrics.storage_accesses += 1;
            if let Some(slot) = frame.stack_top() {
                slots.insert(normalize_slot(slot));
            }
        } else if opcode.is_external_call() {
            metrics.external_calls += 1;
        }
    }
    metrics.unique_storage_slots = slots.len();
    metrics
}

/// `0x0`, `0x00` and `00` name the same slot.
fn normalize_slot(raw: &str) -> String {
    let digits = raw.trim_start_matches("0x").trim_start_matches('0');
    if digits.is_empty() {
        "0".to_string()
    } else {
        digits.to_ascii_lowercase()
    }
}

/// `100 - 2 * storage accesses - 5 * external calls`, clamped to `0..=100`.
pub fn gas_efficiency_score(storage_accesses: u64, external_calls: u64) -> u8 {
    let penalty = storage_accesses
        .saturating_mul(2)
        .saturating_add(external_calls.saturating_mul(5));
    100u64.saturating_sub(penalty) as u8
}

pub fn calculate(
    source: &str,
    frames: &[ExecutionTraceFrame],
    call_trace: &CallTraceNode,
) -> ComplexityMetrics {
    let static_metrics = analyze_source(source);
    let dynamic = analyze_trace(frames, call_trace);
    ComplexityMetrics {
        cyclomatic_complexity: static_metrics.cyclomatic_complexity,
        source_length: static_metrics.source_length,
        max_call_depth: dynamic.max_call_depth,
        peak_memory_bytes: dynamic.peak_memory_bytes,
        unique_storage_slots: dynamic.unique_storage_slots,
        storage_accesses: dynamic.storage_accesses,
        external_calls: dynamic.external_calls,
        loop_count: static_metrics.loop_count,
        conditional_count: static_metrics.conditional_count,
        gas_efficiency_score: gas_efficiency_score(dynamic.storage_accesses, dynamic.external_calls),
    }
}

#[cfg(test)]
mod tests {
    use ethereum_types::Address;

    use super::*;

    const SOURCE: &str = r#"
        contract Vault {
            function withdraw(uint256 amount) external {
                if (amount == 0) { revert(); }
                else if (amount > limit && !paused) { amount = limit; }
                for (uint256 i = 0; i < n; i++) {
                    while (pending[i] > 0 || locked) { pending[i]--; }
                }
                uint256 fee = amount > 100 ? 1 : 0;
            }
        }
    "#;

    fn frame(op: &str, depth: u64, stack: &[&str], memory_words: usize) -> ExecutionTraceFrame {
        ExecutionTraceFrame {
            pc: 0,
            op: op.to_string(),
            gas: 100_000,
            gas_cost: 3,
            depth,
            stack: stack.iter().map(|s| s.to_string()).collect(),
            memory: vec!["00".repeat(32); memory_words],
            storage: Default::default(),
            error: None,
        }
    }

    #[test]
    fn counts_decision_points_in_source() {
        let metrics = analyze_source(SOURCE);
        // if, else if (twice), &&, for, while, ||, ?
        assert_eq!(metrics.cyclomatic_complexity, 9);
        assert_eq!(metrics.loop_count, 2);
        assert_eq!(metrics.conditional_count, 3);
        assert_eq!(metrics.source_length, SOURCE.len());

        assert_eq!(analyze_source("").cyclomatic_complexity, 1);
        // Identifiers containing keywords don't count.
        assert_eq!(analyze_source("uint format; bool iffy;").cyclomatic_complexity, 1);
    }

    #[test]
    fn else_if_scores_as_two_patterns() {
        let metrics = analyze_source("if (a) { x(); } else if (b) { y(); }");
        assert_eq!(metrics.cyclomatic_complexity, 4);
        assert_eq!(metrics.conditional_count, 2);

        let chained = analyze_source("if (a) {} else\n    if (b) {} else if (c) {}");
        assert_eq!(chained.cyclomatic_complexity, 6);
        assert_eq!(chained.conditional_count, 3);
    }

    #[test]
    fn walks_trace_for_runtime_metrics() {
        let frames = vec![
            frame("SLOAD", 1, &["0x1", "0x0"], 2),
            frame("SSTORE", 1, &["0x2a", "0x00"], 3),
            frame("SLOAD", 1, &["0x5"], 3),
            frame("CALL", 1, &[], 4),
            frame("STATICCALL", 2, &[], 1),
            frame("DELEGATECALL", 3, &[], 1),
            frame("CALLCODE", 3, &[], 1),
            frame("NOT_AN_OPCODE", 3, &[], 0),
        ];
        let root = CallTraceNode::from_receipt(Address::zero(), Address::zero(), 0, true);
        let metrics = analyze_trace(&frames, &root);

        assert_eq!(metrics.storage_accesses, 3);
        assert_eq!(metrics.unique_storage_slots, 2);
        assert_eq!(metrics.external_calls, 3);
        assert_eq!(metrics.max_call_depth, 3);
        assert_eq!(metrics.peak_memory_bytes, 128);
    }

    #[test]
    fn efficiency_score_is_clamped() {
        assert_eq!(gas_efficiency_score(0, 0), 100);
        assert_eq!(gas_efficiency_score(10, 4), 60);
        assert_eq!(gas_efficiency_score(50, 0), 0);
        assert_eq!(gas_efficiency_score(u64::MAX, u64::MAX), 0);
    }

    #[test]
    fn combines_static_and_dynamic_passes() {
        let root = CallTraceNode::from_receipt(Address::zero(), Address::zero(), 0, true);
        let metrics = calculate(SOURCE, &[frame("SSTORE", 1, &["0x1"], 0)], &root);
        assert_eq!(metrics.cyclomatic_complexity, 8);
        assert_eq!(metrics.storage_accesses, 1);
        assert_eq!(metrics.gas_efficiency_score, 98);
        assert_eq!(metrics.max_call_depth, 1);
    }
}
