use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use l2scope_common::config::MonitorSettings;
use l2scope_common::networks::NetworkRegistry;
use l2scope_common::types::{
    FeeTier, FeeTierKind, SequencerPerformanceTest, StuckTransactionRecord, TestConfiguration,
    TestType, TxStatus, now_millis,
};
use l2scope_rpc::{ChainClient, ChainConnector, PriceOracle};
use l2scope_storage::{SessionUpdates, Store};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::SequencerError;
use crate::metrics;
use crate::monitor::{ConfirmationMonitor, MonitorExit, ProgressSink};
use crate::submitter::TransactionSubmitter;

/// Fee per rung: `min + (max - min) * i / steps` for `i` in `0..steps`.
pub fn fee_ladder(min: u64, max: u64, steps: u32) -> Vec<u64> {
    let span = u128::from(max.saturating_sub(min));
    (0..steps)
        .map(|i| {
            let offset = span * u128::from(i) / u128::from(steps);
            min.saturating_add(u64::try_from(offset).unwrap_or(u64::MAX))
        })
        .collect()
}

/// A running sequencer test.
#[derive(Debug)]
pub struct SessionHandle {
    id: Uuid,
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stop submitting and monitoring. Pending probes are dropped and the test fails.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for the final snapshot to be persisted.
    pub async fn join(self) -> Result<(), SequencerError> {
        self.join
            .await
            .map_err(|err| SequencerError::Task(err.to_string()))
    }
}

/// Starts sequencer benchmarks and serves their results.
pub struct SequencerTester {
    registry: NetworkRegistry,
    connector: Arc<dyn ChainConnector>,
    oracle: Arc<dyn PriceOracle>,
    store: Store,
    monitor: MonitorSettings,
}

impl SequencerTester {
    pub fn new(
        registry: NetworkRegistry,
        connector: Arc<dyn ChainConnector>,
        oracle: Arc<dyn PriceOracle>,
        store: Store,
    ) -> Self {
        Self {
            registry,
            connector,
            oracle,
            store,
            monitor: MonitorSettings::default(),
        }
    }

    pub fn with_monitor_settings(mut self, monitor: MonitorSettings) -> Self {
        self.monitor = monitor;
        self
    }

    /// Validate, persist the `running` record, and start the scenario in the background.
    pub async fn run_sequencer_test(
        &self,
        config: TestConfiguration,
    ) -> Result<SessionHandle, SequencerError> {
        config
            .validate()
            .map_err(SequencerError::InvalidConfiguration)?;
        let network = self.registry.resolve(&config.network)?;
        let client = self.connector.connect(&network).await?;

        let test = SequencerPerformanceTest::new(
            Uuid::new_v4(),
            config,
            network.network,
            client.sender(),
            now_millis(),
        );
        let id = test.id;
        self.store.put_sequencer_test(test.clone()).await?;
        info!(
            session_id = %id,
            network = %network.network,
            test_type = %test.config.test_type,
            "Sequencer test started"
        );

        let cancel = CancellationToken::new();
        let runner = ScenarioRunner {
            client,
            oracle: self.oracle.clone(),
            store: self.store.clone(),
            monitor: self.monitor,
            cancel: cancel.clone(),
        };
        let join = tokio::spawn(runner.run(test));
        Ok(SessionHandle { id, cancel, join })
    }

    pub async fn get_test_result(
        &self,
        id: Uuid,
    ) -> Result<SequencerPerformanceTest, SequencerError> {
        self.store
            .get_sequencer_test(id)
            .await?
            .ok_or(SequencerError::SessionNotFound(id))
    }

    /// Stream of snapshots for one session, ending with the terminal one.
    pub async fn subscribe(&self, id: Uuid) -> Result<SessionUpdates, SequencerError> {
        if self.store.get_sequencer_test(id).await?.is_none() {
            return Err(SequencerError::SessionNotFound(id));
        }
        Ok(self.store.subscribe(id).await?)
    }
}

struct ScenarioRunner {
    client: Arc<dyn ChainClient>,
    oracle: Arc<dyn PriceOracle>,
    store: Store,
    monitor: MonitorSettings,
    cancel: CancellationToken,
}

/// Persists a fresh snapshot, metrics included, after each monitor update.
struct SnapshotSink<'a> {
    store: &'a Store,
    base: SequencerPerformanceTest,
    token_price_usd: f64,
}

#[async_trait]
impl ProgressSink for SnapshotSink<'_> {
    async fn publish(&self, tiers: &[FeeTier]) {
        let snapshot = with_metrics(
            self.base.clone().with_tiers(tiers.to_vec()),
            self.token_price_usd,
        );
        if let Err(err) = self.store.put_sequencer_test(snapshot).await {
            warn!(session_id = %self.base.id, %err, "Failed to persist progress");
        }
    }
}

fn with_metrics(test: SequencerPerformanceTest, token_price_usd: f64) -> SequencerPerformanceTest {
    let metrics = metrics::calculate(&test.tiers, test.stuck.as_ref(), token_price_usd);
    test.with_metrics(metrics)
}

impl ScenarioRunner {
    /// Never fails: errors end up as a `failed` record.
    async fn run(self, test: SequencerPerformanceTest) {
        let id = test.id;
        let token_price_usd = match self.oracle.token_price_usd(test.network).await {
            Ok(price) => price,
            Err(err) => {
                warn!(session_id = %id, %err, "No token price, USD costs will read 0");
                0.0
            }
        };

        let mut latest = test;
        let finished = match self.execute(&mut latest, token_price_usd).await {
            Ok(()) => latest.complete(now_millis()),
            Err(err) => {
                warn!(session_id = %id, %err, "Sequencer test failed");
                latest.fail(err.to_string(), now_millis())
            }
        };
        let finished = with_metrics(finished, token_price_usd);
        let status = finished.status;
        let score = finished
            .metrics
            .as_ref()
            .map(|m| m.censorship_resistance_score)
            .unwrap_or_default();
        match self.store.put_sequencer_test(finished).await {
            Ok(()) => info!(session_id = %id, %status, score, "Sequencer test finished"),
            Err(err) => warn!(session_id = %id, %err, "Failed to persist final snapshot"),
        }
    }

    async fn execute(
        &self,
        latest: &mut SequencerPerformanceTest,
        token_price_usd: f64,
    ) -> Result<(), SequencerError> {
        let config = latest.config.clone();
        // Probes submitted before a cancellation are still monitored, which
        // drops them right away and reports the cancellation.
        let mut submitter = TransactionSubmitter::prepare(self.client.clone()).await?;
        let top_fee = match config.test_type {
            TestType::FeeMarketStress => config.max_priority_fee_wei,
            TestType::LowFee | TestType::StuckTransaction => config.normal_priority_fee_wei,
        };
        submitter
            .ensure_funded(config.planned_transactions(), top_fee)
            .await?;

        let (tiers, window) = match config.test_type {
            TestType::LowFee => {
                let mut low = FeeTier::new("low", FeeTierKind::Low, config.min_priority_fee_wei);
                let mut normal =
                    FeeTier::new("normal", FeeTierKind::Normal, config.normal_priority_fee_wei);
                for _ in 0..config.low_fee_tx_count {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    low.results.push(submitter.submit(low.priority_fee_wei).await);
                }
                for _ in 0..config.normal_fee_tx_count {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    normal
                        .results
                        .push(submitter.submit(normal.priority_fee_wei).await);
                }
                (vec![low, normal], Duration::from_secs(config.duration_secs))
            }
            TestType::StuckTransaction => {
                let mut stuck =
                    FeeTier::new("stuck", FeeTierKind::Stuck, config.min_priority_fee_wei);
                let mut parallel = FeeTier::new(
                    "parallel",
                    FeeTierKind::Parallel,
                    config.normal_priority_fee_wei,
                );
                stuck.results.push(submitter.submit(stuck.priority_fee_wei).await);
                for _ in 0..config.parallel_account_count {
                    if self.cancel.is_cancelled() {
                        break;
                    }
                    parallel
                        .results
                        .push(submitter.submit(parallel.priority_fee_wei).await);
                }
                let window = self.monitor.stuck_window_secs.min(config.duration_secs);
                (vec![stuck, parallel], Duration::from_secs(window))
            }
            TestType::FeeMarketStress => {
                let fees = fee_ladder(
                    config.min_priority_fee_wei,
                    config.max_priority_fee_wei,
                    config.fee_ladder_steps,
                );
                let mut tiers = Vec::with_capacity(fees.len());
                let delay = Duration::from_millis(self.monitor.ladder_delay_ms);
                for (rung, fee) in (0u32..).zip(fees) {
                    if rung > 0 {
                        tokio::select! {
                            _ = self.cancel.cancelled() => break,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                    let mut tier = FeeTier::new(
                        format!("rung-{rung}"),
                        FeeTierKind::Ladder {
                            rung,
                            of: config.fee_ladder_steps,
                        },
                        fee,
                    );
                    tier.results.push(submitter.submit(fee).await);
                    tiers.push(tier);
                }
                (tiers, Duration::from_secs(config.duration_secs))
            }
        };

        info!(
            session_id = %latest.id,
            accepted = submitter.nonces().accepted(),
            window_secs = window.as_secs(),
            "Probes submitted, monitoring"
        );
        *latest = with_metrics(latest.clone().with_tiers(tiers), token_price_usd);
        self.store.put_sequencer_test(latest.clone()).await?;

        let monitor = ConfirmationMonitor::new(
            self.client.clone(),
            Duration::from_millis(self.monitor.poll_interval_ms),
        );
        let sink = SnapshotSink {
            store: &self.store,
            base: latest.clone(),
            token_price_usd,
        };
        let outcome = monitor
            .run(latest.tiers.clone(), window, &self.cancel, &sink)
            .await;
        *latest = latest.clone().with_tiers(outcome.tiers);

        if config.test_type == TestType::StuckTransaction
            && let Some(record) = stuck_record(&latest.tiers, window)
        {
            if record.sequencer_blocked_parallel_processing {
                warn!(session_id = %latest.id, "No queued probe confirmed behind the stuck one");
            }
            *latest = latest.clone().with_stuck(record);
        }

        if outcome.exit == MonitorExit::Cancelled || self.cancel.is_cancelled() {
            return Err(SequencerError::Cancelled);
        }
        Ok(())
    }
}

fn stuck_record(tiers: &[FeeTier], window: Duration) -> Option<StuckTransactionRecord> {
    let stuck = tiers
        .iter()
        .find(|tier| tier.kind == FeeTierKind::Stuck)?
        .results
        .first()?
        .clone();
    let parallel = tiers
        .iter()
        .find(|tier| tier.kind == FeeTierKind::Parallel)?;
    let confirmed_parallel = parallel
        .results
        .iter()
        .filter(|result| result.status == TxStatus::Confirmed)
        .count() as u32;
    Some(StuckTransactionRecord {
        stuck,
        confirmed_parallel,
        total_parallel: parallel.results.len() as u32,
        window_secs: window.as_secs(),
        sequencer_blocked_parallel_processing: confirmed_parallel == 0,
    })
}
