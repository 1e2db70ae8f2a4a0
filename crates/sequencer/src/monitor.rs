use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use l2scope_common::types::{FeeTier, now_millis};
use l2scope_rpc::ChainClient;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Receives the tiers after every poll that changed at least one result.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn publish(&self, tiers: &[FeeTier]);
}

/// Sink that discards progress.
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn publish(&self, _tiers: &[FeeTier]) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorExit {
    /// Every probe reached a terminal status.
    Settled,
    /// The window elapsed with probes still pending.
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct MonitorOutcome {
    /// Input tiers with every result terminal.
    pub tiers: Vec<FeeTier>,
    pub exit: MonitorExit,
    /// Results forced to `dropped` on exit.
    pub dropped: usize,
}

/// Polls receipts of every pending probe in one loop.
pub struct ConfirmationMonitor {
    client: Arc<dyn ChainClient>,
    poll_interval: Duration,
}

impl ConfirmationMonitor {
    pub fn new(client: Arc<dyn ChainClient>, poll_interval: Duration) -> Self {
        Self {
            client,
            poll_interval,
        }
    }

    /// Watch `tiers` until nothing is pending, `window` elapses or `cancel` fires.
    ///
    /// Whatever is still pending on exit is dropped.
    pub async fn run(
        &self,
        mut tiers: Vec<FeeTier>,
        window: Duration,
        cancel: &CancellationToken,
        sink: &dyn ProgressSink,
    ) -> MonitorOutcome {
        let deadline = Instant::now() + window;
        let exit = loop {
            if !has_pending(&tiers) {
                break MonitorExit::Settled;
            }
            if cancel.is_cancelled() {
                break MonitorExit::Cancelled;
            }

            let updated = self.poll_once(&mut tiers).await;
            if updated > 0 {
                debug!(updated, "Receipts observed");
                sink.publish(&tiers).await;
            }
            if !has_pending(&tiers) {
                break MonitorExit::Settled;
            }

            let now = Instant::now();
            if now >= deadline {
                break MonitorExit::TimedOut;
            }
            let nap = self.poll_interval.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => break MonitorExit::Cancelled,
                _ = tokio::time::sleep(nap) => {}
            }
        };

        let note = match exit {
            MonitorExit::Cancelled => "test cancelled",
            MonitorExit::Settled | MonitorExit::TimedOut => "monitoring window elapsed",
        };
        let dropped = drop_pending(&mut tiers, note);
        if dropped > 0 {
            warn!(dropped, ?exit, "Probes dropped without a receipt");
        } else {
            info!(?exit, "Monitoring finished");
        }
        MonitorOutcome {
            tiers,
            exit,
            dropped,
        }
    }

    /// One receipt lookup per pending probe. Returns how many results changed.
    async fn poll_once(&self, tiers: &mut [FeeTier]) -> usize {
        let mut updated = 0;
        for result in tiers.iter_mut().flat_map(|tier| tier.results.iter_mut()) {
            let Some(hash) = result.hash.filter(|_| result.is_pending()) else {
                continue;
            };
            match self.client.get_receipt(hash).await {
                Ok(Some(receipt)) => {
                    *result = result.clone().settle(&receipt, now_millis());
                    updated += 1;
                }
                Ok(None) => {}
                Err(err) => {
                    // Stays pending, the next poll retries.
                    debug!(tx = ?hash, %err, "Receipt lookup failed");
                }
            }
        }
        updated
    }
}

pub fn has_pending(tiers: &[FeeTier]) -> bool {
    tiers
        .iter()
        .flat_map(|tier| tier.results.iter())
        .any(|result| result.is_pending())
}

fn drop_pending(tiers: &mut [FeeTier], note: &str) -> usize {
    let mut dropped = 0;
    for result in tiers.iter_mut().flat_map(|tier| tier.results.iter_mut()) {
        if result.is_pending() {
            *result = result.clone().drop_pending(note);
            dropped += 1;
        }
    }
    dropped
}
