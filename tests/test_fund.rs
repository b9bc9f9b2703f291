
use ledger_common::*;

use ubl_core::engine::LedgerSettings;
use ubl_core::error::LedgerError;
use ubl_core::model::credits::Credits;
use ubl_core::model::economy::EconomicMetrics;
use ubl_core::safety::FundConfig;

async fn fund_with(ledger: &ubl_core::Ledger, amount: Credits) {
    ledger
        .fund
        .accrue(amount, "w1", treasury(), None)
        .await
        .expect("accrue");
}

// ── Scenario: proportional distribution under shortfall ─────────────

#[tokio::test]
async fn insufficient_fund_distributes_proportionally_and_relocks() {
    let ledger = ledger();
    fund_with(&ledger, ubl(500)).await;
    ledger.fund.unlock().await;

    let affected = vec![
        ("alpha".to_string(), ubl(1_000)),
        ("beta".to_string(), ubl(200)),
        ("gamma".to_string(), ubl(100)),
    ];
    let report = ledger
        .fund
        .distribute(&affected, treasury())
        .await
        .expect("distribute");

    // 80% coverage under a 10,000 UBL cap.
    let eligible: Vec<Credits> = report.claims.iter().map(|c| c.eligible).collect();
    assert_eq!(eligible, vec![ubl(800), ubl(160), ubl(80)]);
    assert_eq!(report.total_eligible, ubl(1_040));

    // Fund of 500 cannot cover 1,040: ratio 500/1040, floored per claim.
    assert!((report.coverage_ratio - 500.0 / 1_040.0).abs() < 1e-9);
    let paid: Vec<Credits> = report.claims.iter().map(|c| c.paid).collect();
    assert_eq!(paid, vec![ubl(384), ubl(76), ubl(38)]);
    assert_eq!(report.total_paid, ubl(498));
    assert_eq!(report.fund_before, ubl(500));
    assert_eq!(report.fund_after, ubl(2));

    let state = ledger.fund.snapshot().await;
    assert_eq!(state.balance, ubl(2));
    assert_eq!(state.total_distributed, ubl(498));
    assert_eq!(state.distribution_count, 1);
    assert!(state.locked, "fund re-locks after distribution");
}

#[tokio::test]
async fn sufficient_fund_pays_every_claim_in_full() {
    let ledger = ledger();
    fund_with(&ledger, ubl(10_000)).await;
    ledger.fund.unlock().await;

    let affected = vec![
        ("alpha".to_string(), ubl(1_000)),
        ("beta".to_string(), ubl(500)),
    ];
    let report = ledger.fund.distribute(&affected, treasury()).await.unwrap();

    assert_eq!(report.coverage_ratio, 1.0);
    let paid: Vec<Credits> = report.claims.iter().map(|c| c.paid).collect();
    assert_eq!(paid, vec![ubl(800), ubl(400)]);
    assert_eq!(report.fund_after, ubl(10_000) - ubl(1_200));
}

#[tokio::test]
async fn coverage_cap_bounds_large_balances() {
    let ledger = ledger();
    fund_with(&ledger, ubl(100_000)).await;
    ledger.fund.unlock().await;

    // A whale above the 10,000 UBL cap is capped before coverage.
    let affected = vec![("whale".to_string(), ubl(50_000))];
    let report = ledger.fund.distribute(&affected, treasury()).await.unwrap();
    assert_eq!(report.claims[0].eligible, ubl(8_000));
    assert_eq!(report.claims[0].paid, ubl(8_000));
}

// ── Preconditions ───────────────────────────────────────────────────

#[tokio::test]
async fn locked_fund_refuses_distribution() {
    let ledger = ledger();
    fund_with(&ledger, ubl(500)).await;

    let err = ledger
        .fund
        .distribute(&[("alpha".to_string(), ubl(100))], treasury())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)), "{err}");
}

#[tokio::test]
async fn distribution_requires_the_minimum_reserve() {
    let settings = LedgerSettings {
        fund: FundConfig {
            min_fund_balance: ubl(1_000),
            ..Default::default()
        },
        ..Default::default()
    };
    let ledger = ledger_with_settings(settings);
    fund_with(&ledger, ubl(500)).await;
    ledger.fund.unlock().await;

    let err = ledger
        .fund
        .distribute(&[("alpha".to_string(), ubl(100))], treasury())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFund { .. }), "{err}");
}

// ── Accrual & trip wiring ───────────────────────────────────────────

#[tokio::test]
async fn transfer_fees_accrue_into_the_fund() {
    let ledger = ledger();
    funded_pair(&ledger, ubl(1_000)).await;

    ledger
        .monetary
        .transfer("w1", "w2", ubl(100), agent("agent-1"))
        .await
        .unwrap();
    ledger
        .monetary
        .transfer("w1", "w2", ubl(200), agent("agent-1"))
        .await
        .unwrap();

    let state = ledger.fund.snapshot().await;
    assert_eq!(state.balance, mubl(300));
    assert_eq!(state.total_collected, mubl(300));
    assert!(state.locked);
}

#[tokio::test]
async fn breaker_trip_enables_emergency_distribution() {
    let ledger = ledger();
    funded_pair(&ledger, ubl(100_000)).await;
    // Build the reserve from ordinary fees.
    ledger
        .monetary
        .transfer("w1", "w2", ubl(50_000), agent("agent-1"))
        .await
        .unwrap();
    assert!(ledger.fund.snapshot().await.locked);

    ledger
        .trip_breaker("mass default drill", EconomicMetrics::calm(ubl(100_000)))
        .await
        .unwrap();

    // Trip unlocked the fund; distribution now runs and re-locks.
    let report = ledger
        .fund
        .distribute(&[("alpha".to_string(), ubl(10))], treasury())
        .await
        .expect("distribute after trip");
    assert_eq!(report.claims[0].paid, ubl(8));
    assert!(ledger.fund.snapshot().await.locked);
}

// ── Hydration ───────────────────────────────────────────────────────

#[tokio::test]
async fn fund_state_rebuilds_from_its_event_stream() {
    use ubl_core::safety::GuaranteeFund;

    let ledger = ledger();
    fund_with(&ledger, ubl(500)).await;
    ledger.fund.unlock().await;
    ledger
        .fund
        .distribute(&[("alpha".to_string(), ubl(100))], treasury())
        .await
        .unwrap();

    let rebuilt = GuaranteeFund::hydrate(ledger.store.clone(), FundConfig::default())
        .await
        .expect("hydrate");
    let fresh = rebuilt.snapshot().await;
    let live = ledger.fund.snapshot().await;
    assert_eq!(fresh.balance, live.balance);
    assert_eq!(fresh.total_collected, live.total_collected);
    assert_eq!(fresh.total_distributed, live.total_distributed);
    assert_eq!(fresh.distribution_count, live.distribution_count);
}
