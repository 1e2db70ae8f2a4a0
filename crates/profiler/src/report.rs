//! Markdown and JSON renderings of profiles and comparisons.

use l2scope_common::types::ComplexityProfile;

use crate::compare::NetworkComparison;

/// Pretty JSON of a profile.
pub fn profile_to_json(profile: &ComplexityProfile) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(profile)
}

pub fn comparison_to_json(comparison: &NetworkComparison) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(comparison)
}

pub fn profile_to_markdown(profile: &ComplexityProfile) -> String {
    let mut md = String::new();

    md.push_str(&format!(
        "# Complexity Profile: {}.{}\n\n",
        profile.contract_name, profile.function_name
    ));
    md.push_str(&format!("**Session**: `{}`\n", profile.id));
    md.push_str(&format!(
        "**Network**: {}\n",
        profile.network.display_name()
    ));
    md.push_str(&format!("**Contract**: `{:#x}`\n", profile.contract_address));
    md.push_str(&format!("**Transaction**: `{:#x}`\n", profile.transaction_hash));
    md.push_str(&format!("**Gas used**: {}\n\n", profile.gas_used));
    if profile.fallback_trace {
        md.push_str("> The node could not trace this transaction; opcode data is unavailable.\n\n");
    }

    md.push_str("## Cost\n\n");
    let cost = &profile.cost;
    md.push_str("| Unit | Value |\n|------|-------|\n");
    md.push_str(&format!("| Gas price (wei) | {} |\n", cost.gas_price_wei));
    md.push_str(&format!("| Cost (wei) | {} |\n", cost.cost_wei));
    md.push_str(&format!(
        "| Cost ({}) | {:.9} |\n",
        cost.native_token, cost.cost_native
    ));
    md.push_str(&format!("| Cost (USD) | {:.6} |\n\n", cost.cost_usd));
    for advisory in &cost.advisories {
        md.push_str(&format!("- {advisory}\n"));
    }
    if !cost.advisories.is_empty() {
        md.push('\n');
    }

    md.push_str("## Complexity\n\n");
    let m = &profile.metrics;
    md.push_str("| Metric | Value |\n|--------|-------|\n");
    md.push_str(&format!("| Cyclomatic complexity | {} |\n", m.cyclomatic_complexity));
    md.push_str(&format!("| Loops | {} |\n", m.loop_count));
    md.push_str(&format!("| Conditionals | {} |\n", m.conditional_count));
    md.push_str(&format!("| Max call depth | {} |\n", m.max_call_depth));
    md.push_str(&format!("| Peak memory (bytes) | {} |\n", m.peak_memory_bytes));
    md.push_str(&format!("| Storage accesses | {} |\n", m.storage_accesses));
    md.push_str(&format!("| Unique storage slots | {} |\n", m.unique_storage_slots));
    md.push_str(&format!("| External calls | {} |\n", m.external_calls));
    md.push_str(&format!(
        "| Gas efficiency score | {}/100 |\n\n",
        m.gas_efficiency_score
    ));

    if !profile.gas_breakdown.hotspots.is_empty() {
        md.push_str("## Hotspots\n\n");
        md.push_str("| Opcode | Gas | Share | Hint |\n|--------|-----|-------|------|\n");
        for hotspot in &profile.gas_breakdown.hotspots {
            md.push_str(&format!(
                "| {} | {} | {:.1}% | {} |\n",
                hotspot.opcode, hotspot.gas, hotspot.percentage, hotspot.hint
            ));
        }
        md.push('\n');
    }

    md.push_str("## Recommendations\n\n");
    if profile.recommendations.is_empty() {
        md.push_str("No optimization thresholds exceeded.\n");
    }
    for rec in &profile.recommendations {
        md.push_str(&format!(
            "### {} ({})\n\n{}\n\n- Current cost: ~{} gas\n- Estimated savings: ~{} gas\n- Fix: {}\n\n",
            rec.category,
            rec.severity,
            rec.description,
            rec.estimated_current_cost,
            rec.estimated_savings,
            rec.suggested_fix
        ));
    }

    md
}

pub fn comparison_to_markdown(comparison: &NetworkComparison) -> String {
    let mut md = String::new();

    md.push_str(&format!(
        "# Cross-network comparison: {}.{}\n\n",
        comparison.contract_name, comparison.function_name
    ));
    if comparison.networks.is_empty() {
        md.push_str("No stored profiles for this function.\n");
        return md;
    }

    md.push_str("| Network | Runs | Mean gas | Min gas | Max gas | Mean cost (USD) | vs L1 |\n");
    md.push_str("|---------|------|----------|---------|---------|-----------------|-------|\n");
    for entry in &comparison.networks {
        let discount = entry
            .discount_vs_l1_percent
            .map(|d| format!("{d:+.1}%"))
            .unwrap_or_else(|| "n/a".to_string());
        md.push_str(&format!(
            "| {} | {} | {:.0} | {} | {} | {:.6} | {} |\n",
            entry.network.display_name(),
            entry.runs,
            entry.mean_gas_used,
            entry.min_gas_used,
            entry.max_gas_used,
            entry.mean_cost_usd,
            discount
        ));
    }
    md
}
