
use ledger_common::*;

use ubl_core::error::LedgerError;
use ubl_core::model::credits::{Credits, FeeRate};

// ── Scenario: mint, fee'd transfer, balance check ───────────────────

#[tokio::test]
async fn minted_credits_transfer_with_fee_routing() {
    let ledger = ledger();
    funded_pair(&ledger, ubl(1_000)).await;

    let receipt = ledger
        .monetary
        .transfer("w1", "w2", ubl(100), agent("agent-1"))
        .await
        .expect("transfer");

    assert_eq!(receipt.gross, ubl(100));
    assert_eq!(receipt.fee, mubl(100)); // 0.100 UBL at 0.001
    assert_eq!(receipt.net, mubl(99_900));

    assert_eq!(ledger.monetary.balance("w1").await.unwrap(), ubl(900));
    assert_eq!(
        ledger.monetary.balance("w2").await.unwrap(),
        mubl(99_900)
    );
    assert_eq!(ledger.fund.balance().await, mubl(100));

    let supply = ledger.monetary.supply().await.unwrap();
    assert_eq!(supply.total_minted, ubl(1_000));
    assert_eq!(supply.total_burned, Credits::ZERO);
    assert_eq!(supply.circulating, ubl(1_000));
}

#[tokio::test]
async fn transfer_conserves_credits_exactly() {
    let ledger = ledger();
    funded_pair(&ledger, ubl(500)).await;

    let before_sender = ledger.monetary.balance("w1").await.unwrap();
    let before_recipient = ledger.monetary.balance("w2").await.unwrap();
    let before_fund = ledger.fund.balance().await;

    ledger
        .monetary
        .transfer("w1", "w2", mubl(123_456), agent("agent-1"))
        .await
        .unwrap();

    let delta_sender = ledger.monetary.balance("w1").await.unwrap() - before_sender;
    let delta_recipient = ledger.monetary.balance("w2").await.unwrap() - before_recipient;
    let delta_fund = ledger.fund.balance().await - before_fund;

    assert_eq!(
        delta_sender + delta_recipient + delta_fund,
        Credits::ZERO,
        "conservation: {delta_sender} + {delta_recipient} + {delta_fund}"
    );
}

#[tokio::test]
async fn fee_math_is_integer_floor() {
    // fee = gross * round(rate * 10000) / 10000, floored.
    let rate = FeeRate::from_fraction(0.001);
    assert_eq!(rate.fee_on(mubl(999)), Credits::ZERO); // 999 * 10 / 10000 = 0
    assert_eq!(rate.fee_on(mubl(1_000)), mubl(1));
    assert_eq!(rate.fee_on(ubl(100)), mubl(100));
}

// ── Failure paths ───────────────────────────────────────────────────

#[tokio::test]
async fn transfer_beyond_balance_fails_without_side_effects() {
    let ledger = ledger();
    funded_pair(&ledger, ubl(10)).await;
    let sequence_before = ledger.store.current_sequence().await.unwrap();

    let err = ledger
        .monetary
        .transfer("w1", "w2", ubl(11), agent("agent-1"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, LedgerError::TransactionRolledBack { .. }),
        "{err}"
    );

    assert_eq!(ledger.monetary.balance("w1").await.unwrap(), ubl(10));
    assert_eq!(
        ledger.store.current_sequence().await.unwrap(),
        sequence_before,
        "no events from the failed withdraw"
    );
}

#[tokio::test]
async fn transfer_to_missing_wallet_reverses_the_withdraw() {
    let ledger = ledger();
    ledger
        .monetary
        .create_wallet("w1", "agent-1", false, agent("agent-1"))
        .await
        .unwrap();
    ledger
        .monetary
        .mint("w1", ubl(100), "genesis-agreement", treasury())
        .await
        .unwrap();

    let err = ledger
        .monetary
        .transfer("w1", "nowhere", ubl(40), agent("agent-1"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, LedgerError::TransactionRolledBack { .. }),
        "{err}"
    );

    // Balance restored by an opposing deposit; the audit trail keeps both.
    let wallet = ledger.monetary.wallet("w1").await.unwrap();
    assert_eq!(wallet.balance, ubl(100));
    assert_eq!(wallet.total_withdrawn, ubl(40));
    assert_eq!(wallet.total_deposited, ubl(100) + ubl(40));
    // Fund saw nothing.
    assert_eq!(ledger.fund.balance().await, Credits::ZERO);
}

#[tokio::test]
async fn mint_rejects_nonpositive_and_missing_wallet() {
    let ledger = ledger();
    ledger
        .monetary
        .create_wallet("w1", "agent-1", false, agent("agent-1"))
        .await
        .unwrap();

    let err = ledger
        .monetary
        .mint("w1", Credits::ZERO, "genesis-agreement", treasury())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)), "{err}");

    let err = ledger
        .monetary
        .mint("ghost", ubl(1), "genesis-agreement", treasury())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }), "{err}");
}

#[tokio::test]
async fn burn_reduces_supply_and_respects_balance() {
    let ledger = ledger();
    funded_pair(&ledger, ubl(100)).await;

    ledger
        .monetary
        .burn("w1", ubl(30), "genesis-agreement", treasury())
        .await
        .unwrap();
    let supply = ledger.monetary.supply().await.unwrap();
    assert_eq!(supply.total_burned, ubl(30));
    assert_eq!(supply.circulating, ubl(70));

    let err = ledger
        .monetary
        .burn("w1", ubl(100), "genesis-agreement", treasury())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientBalance { .. }), "{err}");
}

#[tokio::test]
async fn duplicate_wallet_creation_is_rejected() {
    let ledger = ledger();
    ledger
        .monetary
        .create_wallet("w1", "agent-1", false, agent("agent-1"))
        .await
        .unwrap();
    let err = ledger
        .monetary
        .create_wallet("w1", "agent-2", false, agent("agent-2"))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)), "{err}");
}

// ── Correlation ─────────────────────────────────────────────────────

#[tokio::test]
async fn transfer_events_share_one_correlation_id() {
    use ubl_core::store::query::QueryCriteria;

    let ledger = ledger();
    funded_pair(&ledger, ubl(1_000)).await;

    let receipt = ledger
        .monetary
        .transfer("w1", "w2", ubl(100), agent("agent-1"))
        .await
        .unwrap();

    let page = ledger
        .store
        .query(QueryCriteria::correlated(receipt.correlation_id.clone()))
        .await
        .unwrap();
    // Withdraw, deposit, fund contribution.
    assert_eq!(page.total, 3);
    for event in &page.events {
        assert_eq!(
            event.correlation_id(),
            Some(receipt.correlation_id.as_str())
        );
    }
}
