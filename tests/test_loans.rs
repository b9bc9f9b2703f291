
use ledger_common::*;

use ubl_core::engine::LoanTerms;
use ubl_core::error::LedgerError;
use ubl_core::model::credits::Credits;
use ubl_core::model::event::{AggregateType, EventInput};
use ubl_core::model::loan::{LoanStatus, RepaymentSource};
use ubl_core::model::payload::Payload;

fn terms(principal: Credits) -> LoanTerms {
    LoanTerms {
        principal,
        interest_rate: 0.05,
        repayment_rate: 0.20,
        grace_period_days: 30,
        guarantor_id: None,
    }
}

// ── Scenario: full loan lifecycle ───────────────────────────────────

#[tokio::test]
async fn loan_lifecycle_from_grace_to_paid_off() {
    let ledger = ledger();
    let loan = ledger
        .loans
        .disburse("agent-1", terms(ubl(1_000)), None, loan_service())
        .await
        .expect("disburse");

    assert_eq!(loan.status, LoanStatus::GracePeriod);
    assert_eq!(loan.remaining_balance(), ubl(1_000));
    assert!(loan.grace_period_end > 0);

    let loan = ledger
        .loans
        .accrue_interest(&loan.id, Some(ubl(10)), loan_service())
        .await
        .unwrap();
    assert_eq!(loan.interest_accrued, ubl(10));
    assert_eq!(loan.remaining_balance(), ubl(1_010));

    let loan = ledger
        .loans
        .repay(
            &loan.id,
            ubl(500),
            RepaymentSource::Earnings,
            None,
            loan_service(),
        )
        .await
        .unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.remaining_balance(), ubl(510));
    assert_eq!(loan.total_paid, ubl(500));
    assert_eq!(loan.payment_count, 1);

    let loan = ledger
        .loans
        .repay(
            &loan.id,
            ubl(510),
            RepaymentSource::Manual,
            None,
            loan_service(),
        )
        .await
        .unwrap();
    assert_eq!(loan.status, LoanStatus::PaidOff);
    assert_eq!(loan.remaining_balance(), Credits::ZERO);
    assert!(loan.paid_off_at.is_some());
}

#[tokio::test]
async fn disbursement_mints_into_the_borrower_wallet() {
    let ledger = ledger();
    ledger
        .monetary
        .create_wallet("w1", "agent-1", false, agent("agent-1"))
        .await
        .unwrap();

    ledger
        .loans
        .disburse("agent-1", terms(ubl(250)), Some("w1"), loan_service())
        .await
        .unwrap();

    assert_eq!(ledger.monetary.balance("w1").await.unwrap(), ubl(250));
    let supply = ledger.monetary.supply().await.unwrap();
    assert_eq!(supply.total_minted, ubl(250));
}

#[tokio::test]
async fn repayment_from_wallet_burns_the_credits() {
    let ledger = ledger();
    ledger
        .monetary
        .create_wallet("w1", "agent-1", false, agent("agent-1"))
        .await
        .unwrap();
    let loan = ledger
        .loans
        .disburse("agent-1", terms(ubl(100)), Some("w1"), loan_service())
        .await
        .unwrap();

    ledger
        .loans
        .repay(
            &loan.id,
            ubl(40),
            RepaymentSource::Earnings,
            Some("w1"),
            loan_service(),
        )
        .await
        .unwrap();

    assert_eq!(ledger.monetary.balance("w1").await.unwrap(), ubl(60));
    let supply = ledger.monetary.supply().await.unwrap();
    assert_eq!(supply.circulating, ubl(60));
}

#[tokio::test]
async fn starter_loan_uses_the_configured_defaults() {
    let ledger = ledger();
    ledger
        .monetary
        .create_wallet("w1", "agent-1", false, agent("agent-1"))
        .await
        .unwrap();

    let loan = ledger
        .loans
        .disburse_starter("agent-1", Some("w1"), loan_service())
        .await
        .unwrap();
    assert_eq!(loan.principal, ubl(100));
    assert!((loan.repayment_rate - 0.20).abs() < 1e-9);
    assert_eq!(loan.status, LoanStatus::GracePeriod);
    assert_eq!(ledger.monetary.balance("w1").await.unwrap(), ubl(100));
}

// ── Forgiveness & terminal states ───────────────────────────────────

#[tokio::test]
async fn full_forgiveness_closes_the_loan() {
    let ledger = ledger();
    let loan = ledger
        .loans
        .disburse("agent-1", terms(ubl(300)), None, loan_service())
        .await
        .unwrap();

    let loan = ledger
        .loans
        .forgive(&loan.id, None, "hardship", loan_service())
        .await
        .unwrap();
    assert_eq!(loan.status, LoanStatus::Forgiven);
    assert_eq!(loan.remaining_balance(), Credits::ZERO);
}

#[tokio::test]
async fn partial_forgiveness_keeps_the_loan_open() {
    let ledger = ledger();
    let loan = ledger
        .loans
        .disburse("agent-1", terms(ubl(300)), None, loan_service())
        .await
        .unwrap();

    let loan = ledger
        .loans
        .forgive(&loan.id, Some(ubl(100)), "partial relief", loan_service())
        .await
        .unwrap();
    assert_eq!(loan.status, LoanStatus::GracePeriod);
    assert_eq!(loan.remaining_balance(), ubl(200));
}

#[tokio::test]
async fn terminal_loans_admit_no_further_transitions() {
    let ledger = ledger();
    let loan = ledger
        .loans
        .disburse("agent-1", terms(ubl(100)), None, loan_service())
        .await
        .unwrap();
    ledger
        .loans
        .mark_defaulted(&loan.id, "missed everything", loan_service())
        .await
        .unwrap();

    let err = ledger
        .loans
        .repay(
            &loan.id,
            ubl(10),
            RepaymentSource::Manual,
            None,
            loan_service(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(_)), "{err}");

    let state = ledger.loans.state(&loan.id).await.unwrap();
    assert_eq!(state.status, LoanStatus::Defaulted);
}

#[tokio::test]
async fn delinquency_tracks_missed_payments() {
    let ledger = ledger();
    let loan = ledger
        .loans
        .disburse("agent-1", terms(ubl(100)), None, loan_service())
        .await
        .unwrap();

    let loan = ledger
        .loans
        .mark_delinquent(&loan.id, 2, 14, loan_service())
        .await
        .unwrap();
    assert_eq!(loan.status, LoanStatus::Delinquent);
    assert_eq!(loan.missed_payments, 2);

    // A repayment pulls it back to active.
    let loan = ledger
        .loans
        .repay(
            &loan.id,
            ubl(10),
            RepaymentSource::Earnings,
            None,
            loan_service(),
        )
        .await
        .unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
}

// ── Derived rules ───────────────────────────────────────────────────

#[tokio::test]
async fn required_payment_floors_earnings_share() {
    let ledger = ledger();
    let loan = ledger
        .loans
        .disburse("agent-1", terms(ubl(100)), None, loan_service())
        .await
        .unwrap();

    // 20% of 33.333 = 6.6666 -> floors to 6.666
    let payment = ledger
        .loans
        .required_payment(&loan.id, mubl(33_333))
        .await
        .unwrap();
    assert_eq!(payment, mubl(6_666));
}

#[tokio::test]
async fn rehydrator_ignores_payloads_for_other_loans() {
    let ledger = ledger();
    let loan = ledger
        .loans
        .disburse("agent-1", terms(ubl(100)), None, loan_service())
        .await
        .unwrap();

    // A repayment naming a different loan lands in this stream.
    ledger
        .store
        .append(EventInput::new(
            AggregateType::Agreement,
            loan.id.clone(),
            Payload::LoanRepayment {
                loan_id: "some-other-loan".to_string(),
                amount: ubl(100),
                source: RepaymentSource::Manual,
            },
            loan_service(),
        ))
        .await
        .unwrap();

    let state = ledger.loans.state(&loan.id).await.unwrap();
    assert_eq!(state.total_paid, Credits::ZERO);
    assert_eq!(state.status, LoanStatus::GracePeriod);
}
