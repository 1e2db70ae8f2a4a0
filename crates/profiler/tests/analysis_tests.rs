use std::sync::Arc;
use std::time::Duration;

use ethereum_types::Address;
use l2scope_common::networks::{Network, NetworkRegistry};
use l2scope_common::types::{
    AnalysisRequest, CallKind, CallTraceNode, ExecutionTraceFrame, RecommendationCategory,
};
use l2scope_profiler::{ComplexityAnalyzer, ProfilerError};
use l2scope_rpc::mock::{MockChainClient, MockCompiler, MockConnector};
use l2scope_rpc::{CompilerAdapter, StaticPriceOracle};
use l2scope_storage::Store;

const SOURCE: &str = "contract Bank { function run() external { if (a && b) { x = 1; } } }";

fn request(network: &str) -> AnalysisRequest {
    AnalysisRequest {
        network: network.to_string(),
        contract_name: "Bank".to_string(),
        source: SOURCE.to_string(),
        function_name: "run".to_string(),
        function_args: Vec::new(),
        constructor_args: Vec::new(),
        detailed_trace: true,
    }
}

fn frame(op: &str, gas_cost: u64, depth: u64, stack: &[&str]) -> ExecutionTraceFrame {
    ExecutionTraceFrame {
        pc: 0,
        op: op.to_string(),
        gas: 100_000,
        gas_cost,
        depth,
        stack: stack.iter().map(|s| s.to_string()).collect(),
        memory: Vec::new(),
        storage: Default::default(),
        error: None,
    }
}

fn scripted_traces() -> (CallTraceNode, Vec<ExecutionTraceFrame>) {
    let mut root =
        CallTraceNode::from_receipt(Address::repeat_byte(0xaa), Address::repeat_byte(0xcc), 50_000, true);
    let mut child = root.clone();
    child.kind = CallKind::StaticCall;
    root.calls.push(child);

    let mut frames = Vec::new();
    for slot in 0..7 {
        let slot = format!("0x{slot:x}");
        frames.push(frame("SLOAD", 2_100, 1, &[&slot]));
        frames.push(frame("SSTORE", 5_000, 1, &[&slot]));
    }
    for _ in 0..4 {
        frames.push(frame("STATICCALL", 2_600, 2, &[]));
    }
    frames.push(frame("PUSH1", 3, 1, &[]));
    (root, frames)
}

fn analyzer(client: Arc<MockChainClient>, compiler: Arc<dyn CompilerAdapter>) -> ComplexityAnalyzer {
    ComplexityAnalyzer::new(
        NetworkRegistry::new(),
        compiler,
        Arc::new(MockConnector::new(client)),
        Arc::new(StaticPriceOracle::new(100_000_000, 3_000.0)),
        Store::in_memory(),
    )
    .with_receipt_wait(Duration::from_secs(2), Duration::from_millis(10))
}

#[tokio::test]
async fn analysis_with_traces_is_persisted() {
    let (root, frames) = scripted_traces();
    let client = Arc::new(MockChainClient::new().with_traces(root, frames));
    let analyzer = analyzer(client, Arc::new(MockCompiler::succeeding()));

    let profile = analyzer
        .analyze_complexity(&request("arbitrum-sepolia"))
        .await
        .unwrap();

    assert!(!profile.fallback_trace);
    assert_eq!(profile.network, Network::ArbitrumSepolia);
    assert_eq!(profile.gas_used, 50_000);
    assert_eq!(profile.call_trace.node_count(), 2);

    let breakdown = &profile.gas_breakdown;
    assert_eq!(breakdown.total_gas, 7 * 2_100 + 7 * 5_000 + 4 * 2_600 + 3);
    assert_eq!(breakdown.hotspots[0].opcode, "SSTORE");

    let metrics = &profile.metrics;
    assert_eq!(metrics.storage_accesses, 14);
    assert_eq!(metrics.unique_storage_slots, 7);
    assert_eq!(metrics.external_calls, 4);
    assert_eq!(metrics.max_call_depth, 2);
    // 100 - 14*2 - 4*5
    assert_eq!(metrics.gas_efficiency_score, 52);
    // if, &&
    assert_eq!(metrics.cyclomatic_complexity, 3);

    let categories: Vec<_> = profile.recommendations.iter().map(|r| r.category).collect();
    assert_eq!(
        categories,
        vec![
            RecommendationCategory::StorageCaching,
            RecommendationCategory::CallBatching
        ]
    );

    // 50_000 gas at 0.1 gwei, ETH at 3000 USD
    assert_eq!(profile.cost.native_token, "ETH");
    assert!((profile.cost.cost_usd - 0.015).abs() < 1e-9);

    let stored = analyzer.store().get_profile(profile.id).await.unwrap();
    assert_eq!(stored, Some(profile));
}

#[tokio::test]
async fn nodes_without_tracing_fall_back_to_the_receipt() {
    let client = Arc::new(MockChainClient::new().without_tracing().with_call_gas_used(42_000));
    let analyzer = analyzer(client, Arc::new(MockCompiler::succeeding()));

    let profile = analyzer
        .analyze_complexity(&request("optimism-sepolia"))
        .await
        .unwrap();

    assert!(profile.fallback_trace);
    assert_eq!(profile.call_trace.node_count(), 1);
    assert_eq!(profile.call_trace.gas_used, 42_000);
    assert_eq!(profile.call_trace.to, Some(profile.contract_address));
    assert_eq!(profile.gas_breakdown.total_gas, 0);
    assert_eq!(profile.metrics.gas_efficiency_score, 100);
    assert_eq!(analyzer.store().list_profiles().await.unwrap().len(), 1);
}

#[tokio::test]
async fn call_trace_survives_when_opcode_tracing_is_unsupported() {
    let (root, frames) = scripted_traces();
    let client = Arc::new(
        MockChainClient::new()
            .with_traces(root.clone(), frames)
            .without_opcode_tracing(),
    );
    let analyzer = analyzer(client, Arc::new(MockCompiler::succeeding()));

    let profile = analyzer
        .analyze_complexity(&request("base-sepolia"))
        .await
        .unwrap();

    assert!(!profile.fallback_trace);
    assert_eq!(profile.call_trace, root);
    assert_eq!(profile.call_trace.node_count(), 2);
    assert_eq!(profile.gas_breakdown.total_gas, 0);
    assert_eq!(profile.metrics.storage_accesses, 0);
}

#[tokio::test]
async fn compilation_errors_abort_without_persisting() {
    let client = Arc::new(MockChainClient::new());
    let compiler = MockCompiler::failing(vec![
        "ParserError: Expected ';'".to_string(),
        "TypeError: Undeclared identifier".to_string(),
    ]);
    let analyzer = analyzer(client.clone(), Arc::new(compiler));

    let err = analyzer
        .analyze_complexity(&request("base-sepolia"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProfilerError::Compilation(_)));
    assert_eq!(err.diagnostics().map(<[String]>::len), Some(2));
    assert!(analyzer.store().list_profiles().await.unwrap().is_empty());
    assert!(client.sent().is_empty());
}

#[tokio::test]
async fn unknown_networks_are_rejected() {
    let analyzer = analyzer(
        Arc::new(MockChainClient::new()),
        Arc::new(MockCompiler::succeeding()),
    );
    let err = analyzer
        .analyze_complexity(&request("moonnet"))
        .await
        .unwrap_err();
    assert!(matches!(err, ProfilerError::InvalidNetwork(_)));
}

#[tokio::test]
async fn comparison_ranks_networks_and_reports_l1_discount() {
    let client = Arc::new(MockChainClient::new().without_tracing());
    let oracle = StaticPriceOracle::new(100_000_000, 3_000.0)
        .with_gas_price(Network::Sepolia, 10_000_000_000)
        .with_gas_price(Network::ArbitrumSepolia, 10_000_000);
    let analyzer = ComplexityAnalyzer::new(
        NetworkRegistry::new(),
        Arc::new(MockCompiler::succeeding()),
        Arc::new(MockConnector::new(client)),
        Arc::new(oracle),
        Store::in_memory(),
    )
    .with_receipt_wait(Duration::from_secs(2), Duration::from_millis(10));

    for network in ["sepolia", "arbitrum-sepolia", "arbitrum-sepolia", "base-sepolia"] {
        analyzer.analyze_complexity(&request(network)).await.unwrap();
    }

    let comparison = analyzer.compare_across_networks("Bank", "run").await.unwrap();
    let order: Vec<Network> = comparison.networks.iter().map(|n| n.network).collect();
    assert_eq!(
        order,
        vec![Network::ArbitrumSepolia, Network::BaseSepolia, Network::Sepolia]
    );

    let arbitrum = comparison.get(Network::ArbitrumSepolia).unwrap();
    assert_eq!(arbitrum.runs, 2);
    assert_eq!(arbitrum.mean_gas_used, 50_000.0);
    assert!(arbitrum.gas_stats.is_some());
    // 0.01 gwei vs 10 gwei
    assert!((arbitrum.discount_vs_l1_percent.unwrap() - 99.9).abs() < 1e-9);

    let l1 = comparison.get(Network::Sepolia).unwrap();
    assert_eq!(l1.discount_vs_l1_percent, Some(0.0));
    assert!(l1.gas_stats.is_none());

    let other = analyzer.compare_across_networks("Bank", "withdraw").await.unwrap();
    assert!(other.networks.is_empty());
}
