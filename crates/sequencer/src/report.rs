//! Markdown and JSON renderings of sequencer test snapshots.

use l2scope_common::types::{SequencerPerformanceTest, TxStatus};

pub fn to_json(test: &SequencerPerformanceTest) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(test)
}

pub fn to_markdown(test: &SequencerPerformanceTest) -> String {
    let mut md = String::new();

    md.push_str(&format!(
        "# Sequencer Test: {} on {}\n\n",
        test.config.test_type,
        test.network.display_name()
    ));
    md.push_str(&format!("**Session**: `{}`\n", test.id));
    md.push_str(&format!("**Status**: {}\n", test.status));
    md.push_str(&format!("**Sender**: `{:#x}`\n", test.sender));
    match test.finished_at {
        Some(finished) => md.push_str(&format!(
            "**Duration**: {:.1}s\n\n",
            finished.saturating_sub(test.started_at) as f64 / 1000.0
        )),
        None => md.push('\n'),
    }

    if let Some(metrics) = &test.metrics {
        md.push_str("## Summary\n\n");
        md.push_str("| Metric | Value |\n|--------|-------|\n");
        md.push_str(&format!(
            "| Censorship resistance score | {:.1}/100 |\n",
            metrics.censorship_resistance_score
        ));
        md.push_str(&format!(
            "| Low-fee inclusion | {:.1}% |\n",
            metrics.low_fee_inclusion_rate
        ));
        md.push_str(&format!(
            "| Normal-fee inclusion | {:.1}% |\n",
            metrics.normal_fee_inclusion_rate
        ));
        md.push_str(&format!(
            "| Avg low-fee latency | {:.0} ms |\n",
            metrics.avg_low_fee_latency_ms
        ));
        md.push_str(&format!(
            "| Avg normal-fee latency | {:.0} ms |\n",
            metrics.avg_normal_fee_latency_ms
        ));
        md.push_str(&format!("| Latency ratio | {:.2} |\n", metrics.latency_ratio));
        md.push_str(&format!(
            "| Parallel processing efficiency | {:.0}% |\n",
            metrics.parallel_processing_efficiency * 100.0
        ));
        md.push_str(&format!(
            "| Total cost | {} wei (${:.4}) |\n\n",
            metrics.total_cost_wei, metrics.total_cost_usd
        ));

        if !metrics.tiers.is_empty() {
            md.push_str("## Fee Tiers\n\n");
            md.push_str(
                "| Tier | Priority fee (wei) | Confirmed | Failed | Dropped | Inclusion | Avg latency | Max latency |\n",
            );
            md.push_str(
                "|------|--------------------|-----------|--------|---------|-----------|-------------|-------------|\n",
            );
            for tier in &metrics.tiers {
                let max = tier
                    .latency_stats
                    .as_ref()
                    .map(|stats| format!("{:.0} ms", stats.max))
                    .unwrap_or_else(|| "-".to_string());
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {:.1}% | {:.0} ms | {} |\n",
                    tier.label,
                    tier.priority_fee_wei,
                    tier.counts.confirmed,
                    tier.counts.failed,
                    tier.counts.dropped,
                    tier.inclusion_rate,
                    tier.avg_latency_ms,
                    max
                ));
            }
            md.push('\n');
        }
    }

    if let Some(stuck) = &test.stuck {
        md.push_str("## Stuck Transaction\n\n");
        md.push_str(&format!(
            "The minimum-fee probe ended `{}`; {}/{} queued probes confirmed within {}s.\n\n",
            stuck.stuck.status, stuck.confirmed_parallel, stuck.total_parallel, stuck.window_secs
        ));
        if stuck.sequencer_blocked_parallel_processing {
            md.push_str("> The sequencer did not process transactions queued behind the stuck one.\n\n");
        }
    }

    let unresolved: Vec<_> = test
        .results()
        .filter(|result| matches!(result.status, TxStatus::Failed | TxStatus::Dropped))
        .collect();
    if !unresolved.is_empty() {
        md.push_str("## Unconfirmed Probes\n\n");
        md.push_str("| Nonce | Priority fee (wei) | Status | Note |\n|-------|--------------------|--------|------|\n");
        for result in unresolved {
            let nonce = result
                .consumed_nonce()
                .map(|nonce| nonce.to_string())
                .unwrap_or_else(|| "-".to_string());
            md.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                nonce,
                result.priority_fee_wei,
                result.status,
                result.note.as_deref().unwrap_or("-")
            ));
        }
        md.push('\n');
    }

    if !test.notes.is_empty() {
        md.push_str("## Notes\n\n");
        for note in &test.notes {
            md.push_str(&format!("- {note}\n"));
        }
        md.push('\n');
    }

    md
}
