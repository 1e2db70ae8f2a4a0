use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use super::receipt::Receipt;
use crate::networks::Network;
use crate::stats::SampleStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TestType {
    LowFee,
    StuckTransaction,
    FeeMarketStress,
}

const GWEI: u64 = 1_000_000_000;

/// Input of one sequencer benchmark run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfiguration {
    /// Network identifier, e.g. `optimism-sepolia`.
    pub network: String,
    pub test_type: TestType,
    pub low_fee_tx_count: u32,
    pub normal_fee_tx_count: u32,
    pub min_priority_fee_wei: u64,
    pub normal_priority_fee_wei: u64,
    pub max_priority_fee_wei: u64,
    pub fee_ladder_steps: u32,
    pub duration_secs: u64,
    /// Size of the burst sent behind the stuck probe.
    pub parallel_account_count: u32,
}

impl Default for TestConfiguration {
    fn default() -> Self {
        Self {
            network: Network::Local.to_string(),
            test_type: TestType::LowFee,
            low_fee_tx_count: 3,
            normal_fee_tx_count: 3,
            min_priority_fee_wei: 1_000_000,
            normal_priority_fee_wei: 2 * GWEI,
            max_priority_fee_wei: 10 * GWEI,
            fee_ladder_steps: 10,
            duration_secs: 300,
            parallel_account_count: 5,
        }
    }
}

impl TestConfiguration {
    pub fn validate(&self) -> Result<(), String> {
        if self.duration_secs == 0 {
            return Err("duration_secs must be greater than 0".to_string());
        }
        if self.min_priority_fee_wei > self.normal_priority_fee_wei {
            return Err(format!(
                "min_priority_fee_wei ({}) must not exceed normal_priority_fee_wei ({})",
                self.min_priority_fee_wei, self.normal_priority_fee_wei
            ));
        }
        match self.test_type {
            TestType::LowFee => {
                if self.low_fee_tx_count == 0 && self.normal_fee_tx_count == 0 {
                    return Err("low_fee test needs at least one transaction".to_string());
                }
            }
            TestType::StuckTransaction => {
                if self.parallel_account_count == 0 {
                    return Err("parallel_account_count must be greater than 0".to_string());
                }
            }
            TestType::FeeMarketStress => {
                if self.fee_ladder_steps == 0 {
                    return Err("fee_ladder_steps must be greater than 0".to_string());
                }
                if self.max_priority_fee_wei < self.min_priority_fee_wei {
                    return Err(format!(
                        "max_priority_fee_wei ({}) must not be below min_priority_fee_wei ({})",
                        self.max_priority_fee_wei, self.min_priority_fee_wei
                    ));
                }
            }
        }
        Ok(())
    }

    /// Upper bound on the number of probes this configuration submits.
    pub fn planned_transactions(&self) -> u64 {
        match self.test_type {
            TestType::LowFee => {
                u64::from(self.low_fee_tx_count) + u64::from(self.normal_fee_tx_count)
            }
            TestType::StuckTransaction => 1 + u64::from(self.parallel_account_count),
            TestType::FeeMarketStress => u64::from(self.fee_ladder_steps),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
    Dropped,
}

/// One probe transaction and what became of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResult {
    /// Absent when the node rejected the submission.
    pub hash: Option<H256>,
    /// Nonce the transaction was signed with. A rejected submission never
    /// consumed it, so the next accepted probe reuses the same value; only
    /// results with a `hash` form the gap-free on-chain sequence.
    pub nonce: u64,
    pub priority_fee_wei: u64,
    /// Max fee at submission; the receipt's effective gas price once mined.
    pub fee_per_gas_wei: u64,
    pub submitted_at: u64,
    pub confirmed_at: Option<u64>,
    pub block_number: Option<u64>,
    pub gas_used: Option<u64>,
    pub status: TxStatus,
    pub latency_ms: Option<u64>,
    pub note: Option<String>,
}

impl TransactionResult {
    pub fn pending(
        hash: H256,
        nonce: u64,
        priority_fee_wei: u64,
        max_fee_wei: u64,
        submitted_at: u64,
    ) -> Self {
        Self {
            hash: Some(hash),
            nonce,
            priority_fee_wei,
            fee_per_gas_wei: max_fee_wei,
            submitted_at,
            confirmed_at: None,
            block_number: None,
            gas_used: None,
            status: TxStatus::Pending,
            latency_ms: None,
            note: None,
        }
    }

    /// The nonce this result took from the account, `None` if the node rejected it.
    pub fn consumed_nonce(&self) -> Option<u64> {
        self.hash.map(|_| self.nonce)
    }

    pub fn submission_failed(
        nonce: u64,
        priority_fee_wei: u64,
        max_fee_wei: u64,
        submitted_at: u64,
        note: impl Into<String>,
    ) -> Self {
        Self {
            hash: None,
            nonce,
            priority_fee_wei,
            fee_per_gas_wei: max_fee_wei,
            submitted_at,
            confirmed_at: None,
            block_number: None,
            gas_used: None,
            status: TxStatus::Failed,
            latency_ms: None,
            note: Some(note.into()),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TxStatus::Pending
    }

    /// Apply a receipt. Terminal results are returned unchanged.
    pub fn settle(self, receipt: &Receipt, observed_at: u64) -> Self {
        if !self.is_pending() {
            return self;
        }
        let status = if receipt.succeeded() {
            TxStatus::Confirmed
        } else {
            TxStatus::Failed
        };
        Self {
            confirmed_at: Some(observed_at),
            block_number: Some(receipt.block_number),
            gas_used: Some(receipt.gas_used),
            fee_per_gas_wei: receipt.effective_gas_price.unwrap_or(self.fee_per_gas_wei),
            latency_ms: Some(observed_at.saturating_sub(self.submitted_at)),
            note: (!receipt.succeeded()).then(|| "reverted".to_string()),
            status,
            ..self
        }
    }

    /// Force a still-pending result to `dropped`. Terminal results are returned unchanged.
    pub fn drop_pending(self, note: &str) -> Self {
        if !self.is_pending() {
            return self;
        }
        Self {
            status: TxStatus::Dropped,
            note: Some(note.to_string()),
            ..self
        }
    }

    /// `gas_used * fee_per_gas` for confirmed results, zero otherwise.
    pub fn cost_wei(&self) -> U256 {
        match (self.status, self.gas_used) {
            (TxStatus::Confirmed, Some(gas_used)) => {
                U256::from(gas_used) * U256::from(self.fee_per_gas_wei)
            }
            _ => U256::zero(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum FeeTierKind {
    Low,
    Normal,
    /// The minimum-fee probe of a stuck-transaction run.
    Stuck,
    /// The burst queued behind the stuck probe.
    Parallel,
    Ladder { rung: u32, of: u32 },
}

impl FeeTierKind {
    /// Whether the tier counts toward the low-fee side of the metrics.
    pub fn is_low_side(self) -> bool {
        match self {
            FeeTierKind::Low | FeeTierKind::Stuck => true,
            FeeTierKind::Normal | FeeTierKind::Parallel => false,
            FeeTierKind::Ladder { rung, of } => u64::from(rung) * 2 < u64::from(of),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTier {
    pub label: String,
    pub kind: FeeTierKind,
    pub priority_fee_wei: u64,
    pub results: Vec<TransactionResult>,
}

impl FeeTier {
    pub fn new(label: impl Into<String>, kind: FeeTierKind, priority_fee_wei: u64) -> Self {
        Self {
            label: label.into(),
            kind,
            priority_fee_wei,
            results: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StuckTransactionRecord {
    pub stuck: TransactionResult,
    pub confirmed_parallel: u32,
    pub total_parallel: u32,
    pub window_secs: u64,
    pub sequencer_blocked_parallel_processing: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub pending: u64,
    pub confirmed: u64,
    pub failed: u64,
    pub dropped: u64,
}

impl StatusCounts {
    pub fn tally<'a>(results: impl IntoIterator<Item = &'a TransactionResult>) -> Self {
        let mut counts = Self::default();
        for result in results {
            match result.status {
                TxStatus::Pending => counts.pending += 1,
                TxStatus::Confirmed => counts.confirmed += 1,
                TxStatus::Failed => counts.failed += 1,
                TxStatus::Dropped => counts.dropped += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> u64 {
        self.pending + self.confirmed + self.failed + self.dropped
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierMetrics {
    pub label: String,
    pub priority_fee_wei: u64,
    pub counts: StatusCounts,
    /// Percentage, 0 to 100.
    pub inclusion_rate: f64,
    pub avg_latency_ms: f64,
    pub latency_stats: Option<SampleStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Percentage, 0 to 100.
    pub low_fee_inclusion_rate: f64,
    /// Percentage, 0 to 100.
    pub normal_fee_inclusion_rate: f64,
    pub avg_low_fee_latency_ms: f64,
    pub avg_normal_fee_latency_ms: f64,
    pub latency_ratio: f64,
    /// Fraction, 0 to 1.
    pub parallel_processing_efficiency: f64,
    pub censorship_resistance_score: f64,
    pub total_cost_wei: U256,
    pub total_cost_usd: f64,
    pub counts: StatusCounts,
    pub tiers: Vec<TierMetrics>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TestStatus {
    Running,
    Completed,
    Failed,
}

/// Snapshot of a sequencer benchmark run.
///
/// Every transition consumes the snapshot and returns the next one; the
/// store replaces the previous snapshot wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencerPerformanceTest {
    pub id: Uuid,
    pub config: TestConfiguration,
    pub network: Network,
    pub sender: Address,
    pub tiers: Vec<FeeTier>,
    pub stuck: Option<StuckTransactionRecord>,
    pub metrics: Option<PerformanceMetrics>,
    pub status: TestStatus,
    pub notes: Vec<String>,
    pub started_at: u64,
    pub finished_at: Option<u64>,
}

impl SequencerPerformanceTest {
    pub fn new(
        id: Uuid,
        config: TestConfiguration,
        network: Network,
        sender: Address,
        started_at: u64,
    ) -> Self {
        Self {
            id,
            config,
            network,
            sender,
            tiers: Vec::new(),
            stuck: None,
            metrics: None,
            status: TestStatus::Running,
            notes: Vec::new(),
            started_at,
            finished_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != TestStatus::Running
    }

    pub fn results(&self) -> impl Iterator<Item = &TransactionResult> {
        self.tiers.iter().flat_map(|tier| tier.results.iter())
    }

    pub fn status_counts(&self) -> StatusCounts {
        StatusCounts::tally(self.results())
    }

    pub fn with_tiers(self, tiers: Vec<FeeTier>) -> Self {
        Self { tiers, ..self }
    }

    pub fn with_stuck(self, stuck: StuckTransactionRecord) -> Self {
        Self {
            stuck: Some(stuck),
            ..self
        }
    }

    pub fn with_metrics(self, metrics: PerformanceMetrics) -> Self {
        Self {
            metrics: Some(metrics),
            ..self
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Force every pending result to `dropped`.
    pub fn drop_pending(self, note: &str) -> Self {
        let tiers = self
            .tiers
            .into_iter()
            .map(|tier| FeeTier {
                results: tier
                    .results
                    .into_iter()
                    .map(|result| result.drop_pending(note))
                    .collect(),
                ..tier
            })
            .collect();
        Self { tiers, ..self }
    }

    /// Terminal success. Leftover pending results are dropped.
    pub fn complete(self, finished_at: u64) -> Self {
        if self.is_terminal() {
            return self;
        }
        Self {
            status: TestStatus::Completed,
            finished_at: Some(finished_at),
            ..self.drop_pending("monitoring window elapsed")
        }
    }

    /// Terminal failure. Observed results are kept, pending ones are dropped.
    pub fn fail(self, note: impl Into<String>, finished_at: u64) -> Self {
        if self.is_terminal() {
            return self;
        }
        let test = self.drop_pending("test aborted").with_note(note);
        Self {
            status: TestStatus::Failed,
            finished_at: Some(finished_at),
            ..test
        }
    }
}
