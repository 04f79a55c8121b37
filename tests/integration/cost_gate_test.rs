//! Cost Gate Integration Tests
//!
//! Gated analyses against SQLite-backed balances and the usage ledger.

use std::sync::Arc;

use idea_impact::models::analytics::UsageFilter;
use idea_impact::services::analytics::{BalanceStore, SqliteBalanceStore, UsageLedgerService};
use idea_impact::storage::open_in_memory;
use idea_impact::{AnalysisService, AppError, CostGate};
use idea_impact_pipeline::prompts::EXTRACT_EXAMPLE_PROPOSAL;
use tokio_util::sync::CancellationToken;

use crate::support::{canned_provider, orchestrator, service};

fn sqlite_service(
    provider: &idea_impact_llm::ScriptedProvider,
    balance: i64,
    estimate: i64,
) -> AnalysisService {
    let pool = open_in_memory().unwrap();
    let ledger = Arc::new(UsageLedgerService::from_pool(pool.clone()).unwrap());
    let balances = Arc::new(SqliteBalanceStore::from_pool(pool).unwrap());
    balances.credit("alice", balance).unwrap();
    AnalysisService::new(orchestrator(provider), CostGate::new(balances, ledger), estimate)
}

#[tokio::test]
async fn test_insufficient_balance_runs_nothing() {
    let provider = canned_provider();
    let service = sqlite_service(&provider, 1_000, 5_000);

    let err = service
        .analyze("alice", EXTRACT_EXAMPLE_PROPOSAL)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::InsufficientBalance { required: 5_000, .. }));
    assert_eq!(provider.total_calls(), 0);
    assert_eq!(
        service
            .gate()
            .ledger()
            .count_usage_records(&UsageFilter::default())
            .unwrap(),
        0
    );
    assert_eq!(service.gate().balances().get_balance("alice").unwrap(), 1_000);
}

#[tokio::test]
async fn test_settlement_debits_recorded_costs() {
    let provider = canned_provider();
    let service = sqlite_service(&provider, 100_000, 20_000);

    let outcome = service
        .analyze("alice", EXTRACT_EXAMPLE_PROPOSAL)
        .await
        .unwrap();

    let records = service
        .gate()
        .ledger()
        .list_usage_records(&UsageFilter::default().with_run(outcome.run_id()))
        .unwrap();
    assert_eq!(records.len(), provider.total_calls());
    assert!(records.iter().all(|r| r.user_id == "alice"));

    let recorded: i64 = records.iter().map(|r| r.record.cost_microdollars).sum();
    assert!(recorded > 0);
    assert_eq!(outcome.settlement.actual_microdollars, recorded);
    assert_eq!(outcome.settlement.reserved_microdollars, 20_000);
    assert_eq!(
        service.gate().balances().get_balance("alice").unwrap(),
        100_000 - recorded
    );

    let summary = service.gate().ledger().usage_summary("alice").unwrap();
    assert_eq!(summary.run_count, 1);
    assert_eq!(summary.totals.total_cost_microdollars, recorded);
}

#[tokio::test]
async fn test_concurrent_runs_cannot_double_spend() {
    let provider = canned_provider();
    let service = sqlite_service(&provider, 20_000, 20_000);

    let (first, second) = tokio::join!(
        service.analyze("alice", EXTRACT_EXAMPLE_PROPOSAL),
        service.analyze("alice", EXTRACT_EXAMPLE_PROPOSAL),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(AppError::InsufficientBalance { .. }))));
    assert!(service.gate().balances().get_balance("alice").unwrap() >= 0);
}

#[tokio::test]
async fn test_cancelled_run_bills_nothing_before_first_call() {
    let provider = canned_provider();
    let service = service(&provider, "alice", 50_000, 10_000);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = service
        .analyze_with_cancel("alice", EXTRACT_EXAMPLE_PROPOSAL, cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Cancelled));
    assert_eq!(provider.total_calls(), 0);
    assert_eq!(service.gate().balances().get_balance("alice").unwrap(), 50_000);
}
