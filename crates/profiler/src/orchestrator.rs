use std::sync::Arc;
use std::time::Duration;

use l2scope_common::config::{AdvisorSettings, RpcSettings};
use l2scope_common::networks::NetworkRegistry;
use l2scope_common::types::{
    AnalysisRequest, CallTraceNode, ComplexityProfile, ExecutionTraceFrame, Receipt, now_millis,
};
use l2scope_rpc::{
    ChainClient, ChainClientError, ChainConnector, CompilerAdapter, PriceOracle, wait_for_receipt,
};
use l2scope_storage::Store;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compare::{NetworkComparison, compare_profiles};
use crate::error::ProfilerError;
use crate::{advisor, complexity, cost_model, trace_analyzer};

/// Runs one contract function on a live node and turns the trace into a
/// [`ComplexityProfile`].
pub struct ComplexityAnalyzer {
    registry: NetworkRegistry,
    compiler: Arc<dyn CompilerAdapter>,
    connector: Arc<dyn ChainConnector>,
    oracle: Arc<dyn PriceOracle>,
    store: Store,
    advisor: AdvisorSettings,
    receipt_timeout: Duration,
    receipt_poll_interval: Duration,
}

struct Traces {
    call_trace: CallTraceNode,
    frames: Vec<ExecutionTraceFrame>,
    fallback: bool,
}

impl ComplexityAnalyzer {
    pub fn new(
        registry: NetworkRegistry,
        compiler: Arc<dyn CompilerAdapter>,
        connector: Arc<dyn ChainConnector>,
        oracle: Arc<dyn PriceOracle>,
        store: Store,
    ) -> Self {
        let rpc = RpcSettings::default();
        Self {
            registry,
            compiler,
            connector,
            oracle,
            store,
            advisor: AdvisorSettings::default(),
            receipt_timeout: Duration::from_secs(rpc.receipt_timeout_secs),
            receipt_poll_interval: Duration::from_millis(rpc.receipt_poll_interval_ms),
        }
    }

    pub fn with_advisor_settings(mut self, advisor: AdvisorSettings) -> Self {
        self.advisor = advisor;
        self
    }

    pub fn with_receipt_wait(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.receipt_timeout = timeout;
        self.receipt_poll_interval = poll_interval;
        self
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Compile, deploy, invoke, trace and analyze, then persist the profile.
    ///
    /// Nothing is persisted unless every stage succeeds.
    pub async fn analyze_complexity(
        &self,
        request: &AnalysisRequest,
    ) -> Result<ComplexityProfile, ProfilerError> {
        let network = self.registry.resolve(&request.network)?;
        let id = Uuid::new_v4();
        info!(
            session_id = %id,
            network = %network.network,
            contract = %request.contract_name,
            function = %request.function_name,
            "Starting complexity analysis"
        );

        let compiled = self
            .compiler
            .compile(&request.source, &request.contract_name)
            .await?;
        debug!(session_id = %id, bytecode_len = compiled.bytecode.len(), "Compiled contract");

        let client = self.connector.connect(&network).await?;
        let deployed = client.deploy(&compiled, &request.constructor_args).await?;
        info!(session_id = %id, address = ?deployed.address, "Contract deployed");

        let hash = client
            .call(
                deployed.address,
                &compiled.abi,
                &request.function_name,
                &request.function_args,
            )
            .await?;
        let receipt = wait_for_receipt(
            client.as_ref(),
            hash,
            self.receipt_timeout,
            self.receipt_poll_interval,
        )
        .await?;
        if !receipt.succeeded() {
            warn!(session_id = %id, tx = ?hash, "Function call reverted, analyzing anyway");
        }

        let traces = if request.detailed_trace {
            self.fetch_traces(client.as_ref(), &receipt, deployed.address)
                .await?
        } else {
            fallback_traces(&receipt, deployed.address)
        };

        let gas_breakdown = trace_analyzer::analyze(&traces.frames);
        let metrics = complexity::calculate(&request.source, &traces.frames, &traces.call_trace);
        let recommendations = advisor::recommend(&metrics, &gas_breakdown, &self.advisor);

        let gas_price_wei = self.oracle.gas_price_wei(network.network).await?;
        let token_price_usd = self.oracle.token_price_usd(network.network).await?;
        let cost = cost_model::estimate(
            receipt.gas_used,
            network.network,
            gas_price_wei,
            token_price_usd,
        );

        let profile = ComplexityProfile {
            id,
            network: network.network,
            contract_name: request.contract_name.clone(),
            function_name: request.function_name.clone(),
            compiled,
            contract_address: deployed.address,
            transaction_hash: hash,
            gas_used: receipt.gas_used,
            call_trace: traces.call_trace,
            fallback_trace: traces.fallback,
            gas_breakdown,
            metrics,
            recommendations,
            cost,
            created_at: now_millis(),
        };
        self.store.insert_profile(profile.clone()).await?;
        info!(
            session_id = %id,
            gas_used = profile.gas_used,
            score = profile.metrics.gas_efficiency_score,
            recommendations = profile.recommendations.len(),
            "Complexity analysis stored"
        );
        Ok(profile)
    }

    async fn fetch_traces(
        &self,
        client: &dyn ChainClient,
        receipt: &Receipt,
        contract: ethereum_types::Address,
    ) -> Result<Traces, ProfilerError> {
        let hash = receipt.transaction_hash;
        let call_trace = match client.trace_call_tree(hash).await {
            Ok(call_trace) => call_trace,
            Err(ChainClientError::TracingUnsupported { method, reason }) => {
                warn!(%method, %reason, "Node can't trace, using receipt-only call trace");
                return Ok(fallback_traces(receipt, contract));
            }
            Err(err) => return Err(err.into()),
        };
        // Some nodes serve the call tracer but not the struct logger.
        let frames = match client.trace_opcodes(hash).await {
            Ok(frames) => frames,
            Err(ChainClientError::TracingUnsupported { method, reason }) => {
                warn!(%method, %reason, "Node can't replay opcodes, keeping the call trace only");
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Traces {
            call_trace,
            frames,
            fallback: false,
        })
    }

    /// Aggregate the stored profiles of one contract function per network.
    pub async fn compare_across_networks(
        &self,
        contract_name: &str,
        function_name: &str,
    ) -> Result<NetworkComparison, ProfilerError> {
        let profiles = self.store.profiles_for(contract_name, function_name).await?;
        Ok(compare_profiles(contract_name, function_name, &profiles))
    }
}

fn fallback_traces(receipt: &Receipt, contract: ethereum_types::Address) -> Traces {
    Traces {
        call_trace: CallTraceNode::from_receipt(
            receipt.from,
            contract,
            receipt.gas_used,
            receipt.succeeded(),
        ),
        frames: Vec::new(),
        fallback: true,
    }
}
