use std::sync::Arc;
use std::time::Duration;

use ethereum_types::U256;
use l2scope_common::config::MonitorSettings;
use l2scope_common::networks::NetworkRegistry;
use l2scope_common::types::{
    FeeTierKind, SequencerPerformanceTest, TestConfiguration, TestStatus, TestType, TxStatus,
};
use l2scope_rpc::StaticPriceOracle;
use l2scope_rpc::mock::{MockChainClient, MockConnector, ProbeOutcome};
use l2scope_sequencer::{SequencerError, SequencerTester, fee_ladder};
use l2scope_storage::Store;
use uuid::Uuid;

fn tester(mock: Arc<MockChainClient>) -> SequencerTester {
    SequencerTester::new(
        NetworkRegistry::new(),
        Arc::new(MockConnector::new(mock)),
        Arc::new(StaticPriceOracle::new(1_000_000_000, 2_000.0)),
        Store::in_memory(),
    )
    .with_monitor_settings(MonitorSettings {
        poll_interval_ms: 10,
        stuck_window_secs: 30,
        ladder_delay_ms: 1,
    })
}

fn config(test_type: TestType) -> TestConfiguration {
    TestConfiguration {
        network: "local".to_string(),
        test_type,
        duration_secs: 5,
        ..Default::default()
    }
}

async fn run_to_end(tester: &SequencerTester, config: TestConfiguration) -> SequencerPerformanceTest {
    let handle = tester.run_sequencer_test(config).await.unwrap();
    let id = handle.id();
    handle.join().await.unwrap();
    let test = tester.get_test_result(id).await.unwrap();
    assert!(test.is_terminal());
    assert_eq!(test.status_counts().pending, 0);
    test
}

#[tokio::test(flavor = "multi_thread")]
async fn low_fee_test_with_a_fair_sequencer() {
    let mock = Arc::new(MockChainClient::new().with_nonce(9));
    let tester = tester(mock.clone());

    let test = run_to_end(&tester, config(TestType::LowFee)).await;

    assert_eq!(test.status, TestStatus::Completed);
    assert_eq!(test.tiers.len(), 2);
    assert_eq!(test.tiers[0].kind, FeeTierKind::Low);
    assert_eq!(test.tiers[1].kind, FeeTierKind::Normal);
    let metrics = test.metrics.as_ref().unwrap();
    assert_eq!(metrics.low_fee_inclusion_rate, 100.0);
    assert_eq!(metrics.normal_fee_inclusion_rate, 100.0);
    assert!(metrics.censorship_resistance_score >= 70.0);
    assert!(metrics.total_cost_wei > U256::zero());
    assert!(metrics.total_cost_usd > 0.0);

    let nonces: Vec<u64> = mock.sent().iter().map(|tx| tx.nonce).collect();
    assert_eq!(nonces, (9..15).collect::<Vec<_>>());
    let low_fee = TestConfiguration::default().min_priority_fee_wei;
    assert!(
        mock.sent()[..3]
            .iter()
            .all(|tx| tx.max_priority_fee_per_gas == low_fee)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn stuck_transaction_blocking_the_queue() {
    let mock = Arc::new(MockChainClient::new().with_outcome(|_| ProbeOutcome::Pending));
    let tester = tester(mock.clone());
    let config = TestConfiguration {
        duration_secs: 1,
        parallel_account_count: 3,
        ..config(TestType::StuckTransaction)
    };

    let test = run_to_end(&tester, config).await;

    assert_eq!(test.status, TestStatus::Completed);
    let stuck = test.stuck.as_ref().unwrap();
    assert!(stuck.sequencer_blocked_parallel_processing);
    assert_eq!(stuck.confirmed_parallel, 0);
    assert_eq!(stuck.total_parallel, 3);
    assert_eq!(stuck.window_secs, 1);
    assert_eq!(stuck.stuck.status, TxStatus::Dropped);
    assert_eq!(test.metrics.as_ref().unwrap().parallel_processing_efficiency, 0.0);
    assert_eq!(test.status_counts().dropped, 4);
    assert_eq!(mock.sent().len(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn stuck_probe_with_parallel_progress() {
    let min_fee = TestConfiguration::default().min_priority_fee_wei;
    let mock = Arc::new(MockChainClient::new().with_outcome(move |request| {
        if request.max_priority_fee_per_gas == min_fee {
            ProbeOutcome::Pending
        } else {
            ProbeOutcome::Include
        }
    }));
    let tester = tester(mock);
    let config = TestConfiguration {
        duration_secs: 1,
        parallel_account_count: 2,
        ..config(TestType::StuckTransaction)
    };

    let test = run_to_end(&tester, config).await;

    let stuck = test.stuck.as_ref().unwrap();
    assert!(!stuck.sequencer_blocked_parallel_processing);
    assert_eq!(stuck.confirmed_parallel, 2);
    assert_eq!(test.metrics.as_ref().unwrap().parallel_processing_efficiency, 1.0);
}

#[tokio::test(flavor = "multi_thread")]
async fn fee_market_stress_walks_the_ladder() {
    let mock = Arc::new(MockChainClient::new());
    let tester = tester(mock.clone());
    let config = TestConfiguration {
        min_priority_fee_wei: 1,
        normal_priority_fee_wei: 1,
        max_priority_fee_wei: 1_001,
        fee_ladder_steps: 10,
        ..config(TestType::FeeMarketStress)
    };

    let test = run_to_end(&tester, config).await;

    assert_eq!(test.status, TestStatus::Completed);
    assert_eq!(test.tiers.len(), 10);
    let fees: Vec<u64> = mock
        .sent()
        .iter()
        .map(|tx| tx.max_priority_fee_per_gas)
        .collect();
    assert_eq!(fees, fee_ladder(1, 1_001, 10));
    assert_eq!(
        test.tiers[3].kind,
        FeeTierKind::Ladder { rung: 3, of: 10 }
    );
    assert_eq!(test.metrics.as_ref().unwrap().tiers.len(), 10);
}

#[tokio::test(flavor = "multi_thread")]
async fn underfunded_account_fails_the_test() {
    let mock = Arc::new(MockChainClient::new().with_balance(U256::one()));
    let tester = tester(mock.clone());

    let test = run_to_end(&tester, config(TestType::LowFee)).await;

    assert_eq!(test.status, TestStatus::Failed);
    assert!(test.notes.iter().any(|note| note.contains("Insufficient balance")));
    assert!(test.tiers.is_empty());
    assert!(mock.sent().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn cancellation_drops_pending_probes() {
    let mock = Arc::new(MockChainClient::new().with_outcome(|_| ProbeOutcome::Pending));
    let tester = tester(mock);
    let config = TestConfiguration {
        duration_secs: 600,
        ..config(TestType::LowFee)
    };

    let handle = tester.run_sequencer_test(config).await.unwrap();
    let id = handle.id();
    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle.join())
        .await
        .unwrap()
        .unwrap();

    let test = tester.get_test_result(id).await.unwrap();
    assert_eq!(test.status, TestStatus::Failed);
    assert!(test.notes.iter().any(|note| note == "Test cancelled"));
    assert_eq!(test.status_counts().pending, 0);
    assert_eq!(test.status_counts().dropped, 6);
    assert!(
        test.results()
            .all(|result| result.note.as_deref() == Some("test cancelled"))
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn subscription_ends_with_the_terminal_snapshot() {
    let mock = Arc::new(MockChainClient::new().with_confirmation_lookups(2));
    let tester = tester(mock);

    let handle = tester
        .run_sequencer_test(config(TestType::LowFee))
        .await
        .unwrap();
    let mut updates = tester.subscribe(handle.id()).await.unwrap();

    let mut snapshots = Vec::new();
    while let Some(snapshot) = tokio::time::timeout(Duration::from_secs(5), updates.next())
        .await
        .unwrap()
    {
        snapshots.push(snapshot);
    }
    handle.join().await.unwrap();

    assert!(snapshots.iter().all(|snapshot| snapshot.id == updates.session_id()));
    let last = snapshots.last().unwrap();
    assert_eq!(last.status, TestStatus::Completed);
    assert!(snapshots[..snapshots.len() - 1].iter().all(|s| !s.is_terminal()));
}

#[tokio::test]
async fn rejects_bad_requests() {
    let tester = tester(Arc::new(MockChainClient::new()));

    let invalid = TestConfiguration {
        duration_secs: 0,
        ..config(TestType::LowFee)
    };
    assert!(matches!(
        tester.run_sequencer_test(invalid).await,
        Err(SequencerError::InvalidConfiguration(_))
    ));

    let unknown = TestConfiguration {
        network: "moonbase".to_string(),
        ..config(TestType::LowFee)
    };
    assert!(matches!(
        tester.run_sequencer_test(unknown).await,
        Err(SequencerError::InvalidNetwork(_))
    ));

    let missing = Uuid::new_v4();
    assert!(matches!(
        tester.get_test_result(missing).await,
        Err(SequencerError::SessionNotFound(id)) if id == missing
    ));
    assert!(matches!(
        tester.subscribe(missing).await,
        Err(SequencerError::SessionNotFound(_))
    ));
}
