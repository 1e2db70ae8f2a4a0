use std::sync::Arc;

use ethereum_types::U256;
use l2scope_common::types::{TransactionResult, now_millis};
use l2scope_rpc::{CallRequest, ChainClient, TransactionRequest};
use tracing::{debug, warn};

use crate::error::SequencerError;

/// Gas limit used when the node can't estimate a probe.
pub const FALLBACK_GAS_LIMIT: u64 = 100_000;
/// Padding applied on top of the estimate, in percent.
pub const GAS_LIMIT_PADDING_PERCENT: u64 = 20;

/// Hands out nonces for one account.
///
/// The nonce only moves forward when the node accepted the transaction that
/// used it, so accepted nonces stay gap-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceSequencer {
    start: u64,
    next: u64,
}

impl NonceSequencer {
    pub fn new(start: u64) -> Self {
        Self { start, next: start }
    }

    /// Nonce for the next submission.
    pub fn peek(&self) -> u64 {
        self.next
    }

    /// Mark the peeked nonce as used by an accepted transaction.
    pub fn advance(&mut self) {
        self.next += 1;
    }

    /// Transactions accepted so far.
    pub fn accepted(&self) -> u64 {
        self.next - self.start
    }
}

/// `2 * base_fee + priority_fee`, saturating.
pub fn max_fee_per_gas(base_fee: u64, priority_fee: u64) -> u64 {
    base_fee.saturating_mul(2).saturating_add(priority_fee)
}

fn pad_gas_limit(gas: u64) -> u64 {
    gas.saturating_add(gas.saturating_mul(GAS_LIMIT_PADDING_PERCENT) / 100)
}

/// Builds and sends zero-value self-transfers at a chosen priority fee.
pub struct TransactionSubmitter {
    client: Arc<dyn ChainClient>,
    nonces: NonceSequencer,
    base_fee: u64,
    gas_limit: u64,
}

impl TransactionSubmitter {
    /// Read the pending nonce and base fee, and size the gas limit of a probe.
    pub async fn prepare(client: Arc<dyn ChainClient>) -> Result<Self, SequencerError> {
        let sender = client.sender();
        let nonce = client.get_transaction_count(sender).await?;
        let base_fee = client.base_fee_per_gas().await?;
        let probe = CallRequest {
            from: sender,
            to: Some(sender),
            value: U256::zero(),
            data: Vec::new(),
        };
        let estimate = match client.estimate_gas(&probe).await {
            Ok(gas) => gas,
            Err(err) => {
                warn!(%err, fallback = FALLBACK_GAS_LIMIT, "Gas estimation failed, using fallback");
                FALLBACK_GAS_LIMIT
            }
        };
        let gas_limit = pad_gas_limit(estimate);
        debug!(nonce, base_fee, gas_limit, "Submitter ready");
        Ok(Self {
            client,
            nonces: NonceSequencer::new(nonce),
            base_fee,
            gas_limit,
        })
    }

    pub fn gas_limit(&self) -> u64 {
        self.gas_limit
    }

    pub fn base_fee(&self) -> u64 {
        self.base_fee
    }

    pub fn nonces(&self) -> &NonceSequencer {
        &self.nonces
    }

    /// Fail fast when the account can't pay for `count` probes at `max_priority_fee`.
    pub async fn ensure_funded(
        &self,
        count: u64,
        max_priority_fee: u64,
    ) -> Result<(), SequencerError> {
        let per_tx = U256::from(self.gas_limit)
            * U256::from(max_fee_per_gas(self.base_fee, max_priority_fee));
        let required = per_tx * U256::from(count);
        let available = self.client.get_balance(self.client.sender()).await?;
        if available < required {
            return Err(SequencerError::InsufficientBalance {
                required,
                available,
            });
        }
        Ok(())
    }

    /// Submit one probe. A rejected submission comes back as a `failed` result.
    pub async fn submit(&mut self, priority_fee: u64) -> TransactionResult {
        let nonce = self.nonces.peek();
        let max_fee = max_fee_per_gas(self.base_fee, priority_fee);
        let sender = self.client.sender();
        let request = TransactionRequest {
            to: sender,
            value: U256::zero(),
            data: Vec::new(),
            nonce,
            gas_limit: self.gas_limit,
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: priority_fee,
        };
        let submitted_at = now_millis();
        match self.client.send_transaction(&request).await {
            Ok(sent) => {
                self.nonces.advance();
                debug!(nonce, priority_fee, hash = ?sent.hash, "Probe submitted");
                TransactionResult::pending(sent.hash, nonce, priority_fee, max_fee, submitted_at)
            }
            Err(err) => {
                warn!(nonce, priority_fee, %err, "Probe submission failed");
                TransactionResult::submission_failed(
                    nonce,
                    priority_fee,
                    max_fee,
                    submitted_at,
                    err.to_string(),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use l2scope_common::types::TxStatus;
    use l2scope_rpc::mock::{MockChainClient, ProbeOutcome};

    use super::*;

    #[test]
    fn nonce_sequencer_only_moves_on_accept() {
        let mut nonces = NonceSequencer::new(7);
        assert_eq!(nonces.peek(), 7);
        assert_eq!(nonces.peek(), 7);
        nonces.advance();
        assert_eq!(nonces.peek(), 8);
        assert_eq!(nonces.accepted(), 1);
    }

    #[test]
    fn fee_math() {
        assert_eq!(max_fee_per_gas(1_000, 5), 2_005);
        assert_eq!(max_fee_per_gas(u64::MAX, 1), u64::MAX);
        assert_eq!(pad_gas_limit(21_000), 25_200);
        assert_eq!(pad_gas_limit(FALLBACK_GAS_LIMIT), 120_000);
    }

    #[tokio::test]
    async fn rejected_probes_do_not_consume_nonces() {
        let mock = Arc::new(
            MockChainClient::new()
                .with_nonce(4)
                .with_outcome(|request| {
                    if request.max_priority_fee_per_gas == 1 {
                        ProbeOutcome::Reject
                    } else {
                        ProbeOutcome::Include
                    }
                }),
        );
        let mut submitter = TransactionSubmitter::prepare(mock.clone()).await.unwrap();

        let first = submitter.submit(2).await;
        let rejected = submitter.submit(1).await;
        let second = submitter.submit(3).await;

        assert_eq!(first.status, TxStatus::Pending);
        assert_eq!(first.nonce, 4);
        assert_eq!(rejected.status, TxStatus::Failed);
        assert!(rejected.hash.is_none());
        assert!(rejected.note.is_some());
        assert_eq!(second.nonce, 5);
        // The rejected probe was signed with the nonce `second` then took.
        assert_eq!(rejected.nonce, second.nonce);
        assert_eq!(rejected.consumed_nonce(), None);
        let consumed: Vec<u64> = [&first, &rejected, &second]
            .iter()
            .filter_map(|result| result.consumed_nonce())
            .collect();
        assert_eq!(consumed, vec![4, 5]);

        let nonces: Vec<u64> = mock.sent().iter().map(|tx| tx.nonce).collect();
        assert_eq!(nonces, vec![4, 5]);
        assert_eq!(submitter.nonces().accepted(), 2);
    }

    #[tokio::test]
    async fn gas_estimation_falls_back() {
        let mock = Arc::new(MockChainClient::new().with_failing_gas_estimate());
        let mut submitter = TransactionSubmitter::prepare(mock.clone()).await.unwrap();
        assert_eq!(submitter.gas_limit(), 120_000);

        submitter.submit(1_000).await;
        let sent = mock.sent();
        assert_eq!(sent[0].gas_limit, 120_000);
        assert_eq!(sent[0].max_fee_per_gas, 2 * 1_000_000_000 + 1_000);
        assert_eq!(sent[0].to, mock.sender());
        assert!(sent[0].value.is_zero());
    }

    #[tokio::test]
    async fn insufficient_balance_fails_fast() {
        let mock = Arc::new(MockChainClient::new().with_balance(U256::from(1_000u64)));
        let submitter = TransactionSubmitter::prepare(mock).await.unwrap();
        let err = submitter.ensure_funded(6, 2_000_000_000).await.unwrap_err();
        assert!(matches!(
            err,
            SequencerError::InsufficientBalance { available, .. } if available == U256::from(1_000u64)
        ));
        assert!(submitter.ensure_funded(0, 2_000_000_000).await.is_ok());
    }
}
