use std::time::Duration;

use async_trait::async_trait;
use ethereum_types::{Address, H256, U256};
use l2scope_common::types::{
    CallTraceNode, CompiledContract, ExecutionTraceFrame, OpcodeTrace, Receipt,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::abi;
use crate::error::ChainClientError;
use crate::rpc::RpcClient;
use crate::signer::{Eip1559Transaction, Signer, TxKind};

/// Gas limits used when `eth_estimateGas` fails for deployments and calls.
const FALLBACK_DEPLOY_GAS: u64 = 3_000_000;
const FALLBACK_CALL_GAS: u64 = 500_000;
/// Priority fee used when the node has no `eth_maxPriorityFeePerGas`.
const FALLBACK_PRIORITY_FEE: u64 = 1_000_000;

/// Input of `eth_estimateGas`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
}

impl CallRequest {
    fn to_json(&self) -> Value {
        let mut request = json!({
            "from": format!("{:#x}", self.from),
            "value": format!("{:#x}", self.value),
            "data": format!("0x{}", hex::encode(&self.data)),
        });
        if let (Some(to), Some(object)) = (self.to, request.as_object_mut()) {
            object.insert("to".to_string(), json!(format!("{to:#x}")));
        }
        request
    }
}

/// A transaction to be signed by the client's own key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRequest {
    pub to: Address,
    pub value: U256,
    pub data: Vec<u8>,
    pub nonce: u64,
    pub gas_limit: u64,
    pub max_fee_per_gas: u64,
    pub max_priority_fee_per_gas: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentTransaction {
    pub hash: H256,
    pub nonce: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployedContract {
    pub address: Address,
    pub transaction_hash: H256,
}

/// Everything the analyzers need from an EVM node.
///
/// `trace_call_tree`/`trace_opcodes` return
/// [`ChainClientError::TracingUnsupported`] when the node doesn't expose the
/// debug namespace, which callers treat differently from "not mined yet".
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Account that signs every transaction sent through this client.
    fn sender(&self) -> Address;

    fn chain_id(&self) -> u64;

    /// Deploy and wait for the creation receipt.
    async fn deploy(
        &self,
        contract: &CompiledContract,
        constructor_args: &[Value],
    ) -> Result<DeployedContract, ChainClientError>;

    /// Send a state-changing call to `function`; returns without waiting for inclusion.
    async fn call(
        &self,
        address: Address,
        abi: &Value,
        function: &str,
        args: &[Value],
    ) -> Result<H256, ChainClientError>;

    /// `None` while the transaction is not mined.
    async fn get_receipt(&self, hash: H256) -> Result<Option<Receipt>, ChainClientError>;

    async fn trace_call_tree(&self, hash: H256) -> Result<CallTraceNode, ChainClientError>;

    async fn trace_opcodes(&self, hash: H256)
    -> Result<Vec<ExecutionTraceFrame>, ChainClientError>;

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, ChainClientError>;

    async fn get_balance(&self, address: Address) -> Result<U256, ChainClientError>;

    /// Pending-state nonce of `address`.
    async fn get_transaction_count(&self, address: Address) -> Result<u64, ChainClientError>;

    async fn base_fee_per_gas(&self) -> Result<u64, ChainClientError>;

    /// Sign with the client's key and submit via `eth_sendRawTransaction`.
    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<SentTransaction, ChainClientError>;
}

/// Poll `get_receipt` until it returns or `timeout` elapses.
pub async fn wait_for_receipt(
    client: &dyn ChainClient,
    hash: H256,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Receipt, ChainClientError> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match client.get_receipt(hash).await {
            Ok(Some(receipt)) => return Ok(receipt),
            Ok(None) => {}
            Err(err) => debug!(%hash, error = %err, "Receipt lookup failed, retrying"),
        }
        if tokio::time::Instant::now() + poll_interval > deadline {
            return Err(ChainClientError::ReceiptTimeout {
                hash,
                waited_secs: timeout.as_secs(),
            });
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// [`ChainClient`] over JSON-RPC, signing locally.
#[derive(Debug, Clone)]
pub struct EthClient {
    rpc: RpcClient,
    signer: Signer,
    chain_id: u64,
    receipt_timeout: Duration,
    receipt_poll_interval: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockFees {
    #[serde(default)]
    base_fee_per_gas: Option<U256>,
}

impl EthClient {
    pub fn new(rpc: RpcClient, signer: Signer, chain_id: u64) -> Self {
        Self {
            rpc,
            signer,
            chain_id,
            receipt_timeout: Duration::from_secs(120),
            receipt_poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_receipt_wait(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.receipt_timeout = timeout;
        self.receipt_poll_interval = poll_interval;
        self
    }

    /// Query the node's chain id.
    pub async fn fetch_chain_id(rpc: &RpcClient) -> Result<u64, ChainClientError> {
        let raw: String = rpc.request("eth_chainId", json!([])).await?;
        l2scope_common::serde_utils::parse_quantity(&raw)
            .map_err(|e| ChainClientError::Custom(format!("eth_chainId returned {raw}: {e}")))
    }

    async fn suggested_priority_fee(&self) -> u64 {
        match self
            .rpc
            .request::<String>("eth_maxPriorityFeePerGas", json!([]))
            .await
            .map(|raw| l2scope_common::serde_utils::parse_quantity(&raw))
        {
            Ok(Ok(fee)) => fee,
            _ => FALLBACK_PRIORITY_FEE,
        }
    }

    /// Fill in nonce, fees and gas for a transaction from our own account.
    async fn prepare(
        &self,
        to: Option<Address>,
        data: Vec<u8>,
        fallback_gas: u64,
    ) -> Result<Eip1559Transaction, ChainClientError> {
        let nonce = self.get_transaction_count(self.sender()).await?;
        let base_fee = self.base_fee_per_gas().await?;
        let priority_fee = self.suggested_priority_fee().await;
        let request = CallRequest {
            from: self.sender(),
            to,
            value: U256::zero(),
            data,
        };
        let gas_limit = match self.estimate_gas(&request).await {
            Ok(estimate) => estimate.saturating_mul(6) / 5,
            Err(err) => {
                warn!(error = %err, fallback_gas, "Gas estimation failed, using fallback limit");
                fallback_gas
            }
        };
        Ok(Eip1559Transaction {
            chain_id: self.chain_id,
            nonce,
            max_priority_fee_per_gas: priority_fee,
            max_fee_per_gas: base_fee.saturating_mul(2).saturating_add(priority_fee),
            gas_limit,
            to: to.map(TxKind::Call).unwrap_or(TxKind::Create),
            value: U256::zero(),
            data: request.data,
        })
    }

    async fn send_raw(&self, tx: &Eip1559Transaction) -> Result<H256, ChainClientError> {
        let signed = self.signer.sign(tx)?;
        let hash: H256 = self
            .rpc
            .request(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(&signed.raw))]),
            )
            .await?;
        if hash != signed.hash {
            warn!(node = %hash, local = %signed.hash, "Node returned unexpected transaction hash");
        }
        Ok(hash)
    }
}

#[async_trait]
impl ChainClient for EthClient {
    fn sender(&self) -> Address {
        self.signer.address()
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn deploy(
        &self,
        contract: &CompiledContract,
        constructor_args: &[Value],
    ) -> Result<DeployedContract, ChainClientError> {
        let mut data = contract.bytecode.clone();
        data.extend(abi::encode_constructor(&contract.abi, constructor_args)?);
        let tx = self.prepare(None, data, FALLBACK_DEPLOY_GAS).await?;
        let hash = self.send_raw(&tx).await?;
        info!(contract = %contract.contract_name, %hash, "Deployment submitted");

        let receipt =
            wait_for_receipt(self, hash, self.receipt_timeout, self.receipt_poll_interval).await?;
        if !receipt.succeeded() {
            return Err(ChainClientError::DeploymentFailed(format!(
                "creation transaction {hash:#x} reverted"
            )));
        }
        let address = receipt.contract_address.ok_or_else(|| {
            ChainClientError::DeploymentFailed(format!("receipt of {hash:#x} has no contract address"))
        })?;
        Ok(DeployedContract {
            address,
            transaction_hash: hash,
        })
    }

    async fn call(
        &self,
        address: Address,
        abi: &Value,
        function: &str,
        args: &[Value],
    ) -> Result<H256, ChainClientError> {
        let data = abi::encode_call(abi, function, args)?;
        let tx = self.prepare(Some(address), data, FALLBACK_CALL_GAS).await?;
        self.send_raw(&tx).await
    }

    async fn get_receipt(&self, hash: H256) -> Result<Option<Receipt>, ChainClientError> {
        Ok(self
            .rpc
            .request("eth_getTransactionReceipt", json!([format!("{hash:#x}")]))
            .await?)
    }

    async fn trace_call_tree(&self, hash: H256) -> Result<CallTraceNode, ChainClientError> {
        self.rpc
            .request(
                "debug_traceTransaction",
                json!([format!("{hash:#x}"), {"tracer": "callTracer"}]),
            )
            .await
            .map_err(|err| ChainClientError::from_trace_error("debug_traceTransaction", err))
    }

    async fn trace_opcodes(
        &self,
        hash: H256,
    ) -> Result<Vec<ExecutionTraceFrame>, ChainClientError> {
        let trace: OpcodeTrace = self
            .rpc
            .request(
                "debug_traceTransaction",
                json!([format!("{hash:#x}"), {"enableMemory": true, "disableStorage": false}]),
            )
            .await
            .map_err(|err| ChainClientError::from_trace_error("debug_traceTransaction", err))?;
        Ok(trace.struct_logs)
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, ChainClientError> {
        let raw: String = self
            .rpc
            .request("eth_estimateGas", json!([request.to_json()]))
            .await?;
        l2scope_common::serde_utils::parse_quantity(&raw)
            .map_err(|e| ChainClientError::Custom(format!("eth_estimateGas returned {raw}: {e}")))
    }

    async fn get_balance(&self, address: Address) -> Result<U256, ChainClientError> {
        Ok(self
            .rpc
            .request("eth_getBalance", json!([format!("{address:#x}"), "latest"]))
            .await?)
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64, ChainClientError> {
        let raw: String = self
            .rpc
            .request(
                "eth_getTransactionCount",
                json!([format!("{address:#x}"), "pending"]),
            )
            .await?;
        l2scope_common::serde_utils::parse_quantity(&raw).map_err(|e| {
            ChainClientError::Custom(format!("eth_getTransactionCount returned {raw}: {e}"))
        })
    }

    async fn base_fee_per_gas(&self) -> Result<u64, ChainClientError> {
        let block: BlockFees = self
            .rpc
            .request("eth_getBlockByNumber", json!(["latest", false]))
            .await?;
        // Pre-London chains have no base fee.
        Ok(block
            .base_fee_per_gas
            .map(|fee| fee.low_u64())
            .unwrap_or_default())
    }

    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<SentTransaction, ChainClientError> {
        let tx = Eip1559Transaction {
            chain_id: self.chain_id,
            nonce: request.nonce,
            max_priority_fee_per_gas: request.max_priority_fee_per_gas,
            max_fee_per_gas: request.max_fee_per_gas,
            gas_limit: request.gas_limit,
            to: TxKind::Call(request.to),
            value: request.value,
            data: request.data.clone(),
        };
        let hash = self.send_raw(&tx).await?;
        Ok(SentTransaction {
            hash,
            nonce: request.nonce,
        })
    }
}
