
use ledger_common::*;

use ubl_core::error::LedgerError;
use ubl_core::model::credits::Credits;
use ubl_core::model::economy::{BreakerState, EconomicMetrics, OperationClass, TripReason};
use ubl_core::store::query::QueryCriteria;

fn hyperinflated() -> EconomicMetrics {
    EconomicMetrics {
        inflation: 0.60,
        ..EconomicMetrics::calm(Credits::from_ubl(1_000))
    }
}

// ── Scenario: trip after three consecutive anomalies ────────────────

#[tokio::test]
async fn three_consecutive_anomalies_trip_and_block_transfers() {
    let ledger = ledger();
    funded_pair(&ledger, ubl(1_000)).await;

    assert!(ledger.run_safety_check(&hyperinflated()).await.unwrap().is_none());
    assert!(ledger.run_safety_check(&hyperinflated()).await.unwrap().is_none());
    let trip = ledger
        .run_safety_check(&hyperinflated())
        .await
        .unwrap()
        .expect("third consecutive anomaly trips");

    assert!(matches!(trip.reason, TripReason::Hyperinflation { .. }));
    assert_eq!(trip.consecutive_anomalies, 3);
    assert_eq!(trip.metrics.inflation, 0.60);
    assert_eq!(ledger.breaker.state().await, BreakerState::Open);

    // The trip is on the record, snapshot included.
    let page = ledger
        .store
        .query(QueryCriteria {
            event_types: vec!["CircuitBreakerTripped".to_string()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page.total, 1);

    // Transfers are halted...
    let err = ledger
        .monetary
        .transfer("w1", "w2", ubl(10), agent("agent-1"))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            LedgerError::CircuitBreakerBlocked {
                class: OperationClass::Transfers,
                state: BreakerState::Open,
            }
        ),
        "{err}"
    );
    // ...and so are mint, burn, loans.
    assert!(ledger
        .monetary
        .mint("w1", ubl(1), "genesis-agreement", treasury())
        .await
        .is_err());

    // Reads still work.
    assert_eq!(ledger.monetary.balance("w1").await.unwrap(), ubl(1_000));

    // Operator reset restores everything.
    let reset = ledger.reset_breaker("metrics recovered").await.unwrap();
    assert!(reset.downtime_ms >= 0);
    assert_eq!(ledger.breaker.state().await, BreakerState::Closed);
    ledger
        .monetary
        .transfer("w1", "w2", ubl(10), agent("agent-1"))
        .await
        .expect("transfer after reset");
}

#[tokio::test]
async fn clean_checks_reset_the_anomaly_counter() {
    let ledger = ledger();
    let calm = EconomicMetrics::calm(Credits::from_ubl(1_000));

    assert!(ledger.run_safety_check(&hyperinflated()).await.unwrap().is_none());
    assert!(ledger.run_safety_check(&hyperinflated()).await.unwrap().is_none());
    // A clean check wipes the streak.
    assert!(ledger.run_safety_check(&calm).await.unwrap().is_none());
    assert!(ledger.run_safety_check(&hyperinflated()).await.unwrap().is_none());
    assert!(ledger.run_safety_check(&hyperinflated()).await.unwrap().is_none());
    assert_eq!(ledger.breaker.state().await, BreakerState::Closed);
}

#[tokio::test]
async fn negative_treasury_is_classified_as_impossible_state() {
    let ledger = ledger();
    let metrics = EconomicMetrics {
        treasury_balance: Credits::from_millis(-1),
        ..EconomicMetrics::calm(Credits::from_ubl(1_000))
    };
    for _ in 0..2 {
        assert!(ledger.run_safety_check(&metrics).await.unwrap().is_none());
    }
    let trip = ledger
        .run_safety_check(&metrics)
        .await
        .unwrap()
        .expect("trip");
    assert!(matches!(trip.reason, TripReason::NegativeTreasury { .. }));
}

// ── Manual trip & guarantee-fund unlock ─────────────────────────────

#[tokio::test]
async fn manual_trip_unlocks_the_fund() {
    let ledger = ledger();
    assert!(ledger.fund.snapshot().await.locked);

    let trip = ledger
        .trip_breaker("operator drill", EconomicMetrics::calm(Credits::ZERO))
        .await
        .unwrap();
    assert!(matches!(trip.reason, TripReason::Manual { .. }));
    assert_eq!(ledger.breaker.state().await, BreakerState::Open);
    assert!(!ledger.fund.snapshot().await.locked);
}

// ── HalfOpen policy ─────────────────────────────────────────────────

#[tokio::test]
async fn half_open_reopens_on_one_anomaly_and_closes_on_one_clean_check() {
    let ledger = ledger();
    for _ in 0..3 {
        ledger.run_safety_check(&hyperinflated()).await.unwrap();
    }
    assert_eq!(ledger.breaker.state().await, BreakerState::Open);

    // Operator allows probe traffic.
    assert!(ledger.breaker.half_open().await);
    assert_eq!(ledger.breaker.state().await, BreakerState::HalfOpen);
    ledger
        .breaker
        .guard(OperationClass::Transfers)
        .await
        .expect("probes pass in half-open");

    // One anomalous probe re-opens immediately.
    let trip = ledger.run_safety_check(&hyperinflated()).await.unwrap();
    assert!(trip.is_some());
    assert_eq!(ledger.breaker.state().await, BreakerState::Open);

    // Back to half-open; one clean check closes.
    assert!(ledger.breaker.half_open().await);
    let calm = EconomicMetrics::calm(Credits::from_ubl(1_000));
    assert!(ledger.run_safety_check(&calm).await.unwrap().is_none());
    assert_eq!(ledger.breaker.state().await, BreakerState::Closed);
}
