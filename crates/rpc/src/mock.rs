//! Scriptable in-memory collaborators for tests.
//!
//! [`MockChainClient`] mines nothing on its own: each submitted transaction
//! is classified by a caller-supplied rule and its receipt becomes visible
//! after a configurable number of lookups.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use ethereum_types::{Address, H256, U256};
use l2scope_common::networks::NetworkConfig;
use l2scope_common::types::{CallTraceNode, CompiledContract, ExecutionTraceFrame, Receipt};
use serde_json::{Value, json};

use crate::client::{
    CallRequest, ChainClient, DeployedContract, SentTransaction, TransactionRequest,
};
use crate::compiler::CompilerAdapter;
use crate::connector::ChainConnector;
use crate::error::{ChainClientError, CompilerError, RpcError};
use crate::signer::keccak;

/// What the mock chain does with a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Include,
    Revert,
    /// Never mined.
    Pending,
    /// Rejected by `eth_sendRawTransaction`.
    Reject,
}

type OutcomeRule = Arc<dyn Fn(&TransactionRequest) -> ProbeOutcome + Send + Sync>;

struct PlannedReceipt {
    receipt: Option<Receipt>,
    lookups_left: u32,
}

struct MockState {
    balance: U256,
    pending_nonce: u64,
    base_fee: u64,
    gas_estimate: Option<u64>,
    tracing_supported: bool,
    opcode_tracing_supported: bool,
    call_tree: Option<CallTraceNode>,
    opcode_trace: Vec<ExecutionTraceFrame>,
    call_gas_used: u64,
    confirmation_lookups: u32,
    outcome: OutcomeRule,
    receipts: HashMap<H256, PlannedReceipt>,
    sent: Vec<TransactionRequest>,
    receipt_lookups: u64,
    block_number: u64,
}

pub struct MockChainClient {
    sender: Address,
    chain_id: u64,
    contract_address: Address,
    state: Mutex<MockState>,
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChainClient {
    pub fn new() -> Self {
        Self {
            sender: Address::repeat_byte(0xaa),
            chain_id: 31_337,
            contract_address: Address::repeat_byte(0xcc),
            state: Mutex::new(MockState {
                balance: U256::exp10(19),
                pending_nonce: 0,
                base_fee: 1_000_000_000,
                gas_estimate: Some(21_000),
                tracing_supported: true,
                opcode_tracing_supported: true,
                call_tree: None,
                opcode_trace: Vec::new(),
                call_gas_used: 50_000,
                confirmation_lookups: 0,
                outcome: Arc::new(|_| ProbeOutcome::Include),
                receipts: HashMap::new(),
                sent: Vec::new(),
                receipt_lookups: 0,
                block_number: 100,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_balance(self, balance: U256) -> Self {
        self.state().balance = balance;
        self
    }

    pub fn with_nonce(self, nonce: u64) -> Self {
        self.state().pending_nonce = nonce;
        self
    }

    pub fn with_base_fee(self, base_fee: u64) -> Self {
        self.state().base_fee = base_fee;
        self
    }

    pub fn with_failing_gas_estimate(self) -> Self {
        self.state().gas_estimate = None;
        self
    }

    pub fn without_tracing(self) -> Self {
        self.state().tracing_supported = false;
        self
    }

    /// Serves the call tracer but rejects opcode-level tracing.
    pub fn without_opcode_tracing(self) -> Self {
        self.state().opcode_tracing_supported = false;
        self
    }

    pub fn with_traces(self, call_tree: CallTraceNode, frames: Vec<ExecutionTraceFrame>) -> Self {
        {
            let mut state = self.state();
            state.call_tree = Some(call_tree);
            state.opcode_trace = frames;
        }
        self
    }

    pub fn with_call_gas_used(self, gas_used: u64) -> Self {
        self.state().call_gas_used = gas_used;
        self
    }

    /// Receipts stay invisible for this many lookups after submission.
    pub fn with_confirmation_lookups(self, lookups: u32) -> Self {
        self.state().confirmation_lookups = lookups;
        self
    }

    pub fn with_outcome(
        self,
        rule: impl Fn(&TransactionRequest) -> ProbeOutcome + Send + Sync + 'static,
    ) -> Self {
        self.state().outcome = Arc::new(rule);
        self
    }

    /// Every transaction accepted by the node, in submission order.
    pub fn sent(&self) -> Vec<TransactionRequest> {
        self.state().sent.clone()
    }

    pub fn receipt_lookups(&self) -> u64 {
        self.state().receipt_lookups
    }

    fn plan(&self, state: &mut MockState, hash: H256, gas_used: u64, status: Option<u64>) {
        let receipt = status.map(|status| {
            state.block_number += 1;
            Receipt {
                transaction_hash: hash,
                block_number: state.block_number,
                from: self.sender,
                to: Some(self.sender),
                gas_used,
                effective_gas_price: Some(state.base_fee),
                status,
                contract_address: None,
            }
        });
        let lookups_left = state.confirmation_lookups;
        state.receipts.insert(
            hash,
            PlannedReceipt {
                receipt,
                lookups_left,
            },
        );
    }
}

fn fake_hash(tag: &str, nonce: u64) -> H256 {
    keccak(format!("{tag}:{nonce}").as_bytes())
}

#[async_trait]
impl ChainClient for MockChainClient {
    fn sender(&self) -> Address {
        self.sender
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn deploy(
        &self,
        _contract: &CompiledContract,
        _constructor_args: &[Value],
    ) -> Result<DeployedContract, ChainClientError> {
        let mut state = self.state();
        let nonce = state.pending_nonce;
        state.pending_nonce += 1;
        Ok(DeployedContract {
            address: self.contract_address,
            transaction_hash: fake_hash("deploy", nonce),
        })
    }

    async fn call(
        &self,
        _address: Address,
        _abi: &Value,
        function: &str,
        _args: &[Value],
    ) -> Result<H256, ChainClientError> {
        let mut state = self.state();
        let nonce = state.pending_nonce;
        state.pending_nonce += 1;
        let hash = fake_hash(function, nonce);
        let gas_used = state.call_gas_used;
        self.plan(&mut state, hash, gas_used, Some(1));
        Ok(hash)
    }

    async fn get_receipt(&self, hash: H256) -> Result<Option<Receipt>, ChainClientError> {
        let mut state = self.state();
        state.receipt_lookups += 1;
        let Some(planned) = state.receipts.get_mut(&hash) else {
            return Ok(None);
        };
        if planned.lookups_left > 0 {
            planned.lookups_left -= 1;
            return Ok(None);
        }
        Ok(planned.receipt.clone())
    }

    async fn trace_call_tree(&self, _hash: H256) -> Result<CallTraceNode, ChainClientError> {
        let state = self.state();
        if !state.tracing_supported {
            return Err(ChainClientError::from_trace_error(
                "debug_traceTransaction",
                unsupported(),
            ));
        }
        state
            .call_tree
            .clone()
            .ok_or_else(|| ChainClientError::Custom("no call tree scripted".to_string()))
    }

    async fn trace_opcodes(
        &self,
        _hash: H256,
    ) -> Result<Vec<ExecutionTraceFrame>, ChainClientError> {
        let state = self.state();
        if !state.tracing_supported || !state.opcode_tracing_supported {
            return Err(ChainClientError::from_trace_error(
                "debug_traceTransaction",
                unsupported(),
            ));
        }
        Ok(state.opcode_trace.clone())
    }

    async fn estimate_gas(&self, _request: &CallRequest) -> Result<u64, ChainClientError> {
        self.state().gas_estimate.ok_or_else(|| {
            ChainClientError::Rpc(RpcError::JsonRpcError {
                method: "eth_estimateGas".into(),
                code: -32000,
                message: "gas required exceeds allowance".into(),
            })
        })
    }

    async fn get_balance(&self, _address: Address) -> Result<U256, ChainClientError> {
        Ok(self.state().balance)
    }

    async fn get_transaction_count(&self, _address: Address) -> Result<u64, ChainClientError> {
        Ok(self.state().pending_nonce)
    }

    async fn base_fee_per_gas(&self) -> Result<u64, ChainClientError> {
        Ok(self.state().base_fee)
    }

    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<SentTransaction, ChainClientError> {
        let mut state = self.state();
        let outcome = (state.outcome)(request);
        if outcome == ProbeOutcome::Reject {
            return Err(ChainClientError::Rpc(RpcError::JsonRpcError {
                method: "eth_sendRawTransaction".into(),
                code: -32000,
                message: "replacement transaction underpriced".into(),
            }));
        }
        if request.nonce != state.pending_nonce {
            return Err(ChainClientError::Rpc(RpcError::JsonRpcError {
                method: "eth_sendRawTransaction".into(),
                code: -32000,
                message: format!(
                    "nonce too {}: expected {}, got {}",
                    if request.nonce < state.pending_nonce { "low" } else { "high" },
                    state.pending_nonce,
                    request.nonce
                ),
            }));
        }
        state.pending_nonce += 1;
        state.sent.push(request.clone());

        let hash = fake_hash("probe", request.nonce);
        let status = match outcome {
            ProbeOutcome::Include => Some(1),
            ProbeOutcome::Revert => Some(0),
            ProbeOutcome::Pending | ProbeOutcome::Reject => None,
        };
        self.plan(&mut state, hash, request.gas_limit.min(21_000), status);
        Ok(SentTransaction {
            hash,
            nonce: request.nonce,
        })
    }
}

fn unsupported() -> RpcError {
    RpcError::JsonRpcError {
        method: "debug_traceTransaction".into(),
        code: -32601,
        message: "the method debug_traceTransaction does not exist/is not available".into(),
    }
}

/// Hands out the same client for every network.
pub struct MockConnector {
    client: Arc<MockChainClient>,
}

impl MockConnector {
    pub fn new(client: Arc<MockChainClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChainConnector for MockConnector {
    async fn connect(
        &self,
        _network: &NetworkConfig,
    ) -> Result<Arc<dyn ChainClient>, ChainClientError> {
        Ok(self.client.clone())
    }
}

/// Returns fixed artifacts, or fixed diagnostics.
pub struct MockCompiler {
    result: Result<CompiledContract, Vec<String>>,
}

impl MockCompiler {
    pub fn succeeding() -> Self {
        Self {
            result: Ok(CompiledContract {
                contract_name: String::new(),
                bytecode: vec![0x60, 0x80, 0x60, 0x40, 0x52],
                abi: json!([{"type": "function", "name": "run", "inputs": []}]),
                metadata: String::new(),
                source_map: String::new(),
            }),
        }
    }

    pub fn failing(diagnostics: Vec<String>) -> Self {
        Self {
            result: Err(diagnostics),
        }
    }
}

#[async_trait]
impl CompilerAdapter for MockCompiler {
    async fn compile(
        &self,
        _source: &str,
        contract_name: &str,
    ) -> Result<CompiledContract, CompilerError> {
        match &self.result {
            Ok(compiled) => Ok(CompiledContract {
                contract_name: contract_name.to_string(),
                ..compiled.clone()
            }),
            Err(diagnostics) => Err(CompilerError::Compilation(diagnostics.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::client::wait_for_receipt;

    fn probe(nonce: u64, priority_fee: u64) -> TransactionRequest {
        TransactionRequest {
            to: Address::repeat_byte(0xaa),
            value: U256::zero(),
            data: Vec::new(),
            nonce,
            gas_limit: 25_200,
            max_fee_per_gas: 3_000_000_000,
            max_priority_fee_per_gas: priority_fee,
        }
    }

    #[tokio::test]
    async fn receipts_appear_after_scripted_lookups() {
        let client = MockChainClient::new().with_confirmation_lookups(2);
        let sent = client.send_transaction(&probe(0, 1)).await.unwrap();
        assert!(client.get_receipt(sent.hash).await.unwrap().is_none());
        assert!(client.get_receipt(sent.hash).await.unwrap().is_none());
        let receipt = client.get_receipt(sent.hash).await.unwrap().unwrap();
        assert!(receipt.succeeded());
        assert_eq!(receipt.gas_used, 21_000);
    }

    #[tokio::test]
    async fn enforces_sequential_nonces() {
        let client = MockChainClient::new().with_nonce(4);
        assert!(client.send_transaction(&probe(5, 1)).await.is_err());
        assert!(client.send_transaction(&probe(4, 1)).await.is_ok());
        assert_eq!(client.get_transaction_count(client.sender()).await.unwrap(), 5);
        assert_eq!(client.sent().len(), 1);
    }

    #[tokio::test]
    async fn outcome_rule_controls_inclusion() {
        let client = MockChainClient::new().with_outcome(|request| {
            if request.max_priority_fee_per_gas < 10 {
                ProbeOutcome::Pending
            } else {
                ProbeOutcome::Revert
            }
        });
        let stuck = client.send_transaction(&probe(0, 1)).await.unwrap();
        let reverted = client.send_transaction(&probe(1, 100)).await.unwrap();
        assert!(client.get_receipt(stuck.hash).await.unwrap().is_none());
        assert!(!client.get_receipt(reverted.hash).await.unwrap().unwrap().succeeded());

        let err = wait_for_receipt(
            &client,
            stuck.hash,
            Duration::from_millis(30),
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ChainClientError::ReceiptTimeout { .. }));
    }

    #[tokio::test]
    async fn tracing_can_be_disabled() {
        let client = MockChainClient::new().without_tracing();
        let err = client.trace_opcodes(H256::zero()).await.unwrap_err();
        assert!(matches!(err, ChainClientError::TracingUnsupported { .. }));
    }

    #[tokio::test]
    async fn mock_compiler_reports_diagnostics() {
        let compiler = MockCompiler::failing(vec!["ParserError: boom".to_string()]);
        assert!(matches!(
            compiler.compile("", "A").await,
            Err(CompilerError::Compilation(d)) if d.len() == 1
        ));
        let ok = MockCompiler::succeeding().compile("", "Counter").await.unwrap();
        assert_eq!(ok.contract_name, "Counter");
    }
}
