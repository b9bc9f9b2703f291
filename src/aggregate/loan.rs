use serde::Serialize;

use crate::model::credits::Credits;
use crate::model::event::{AggregateType, Event};
use crate::model::loan::LoanStatus;
use crate::model::payload::{EventPayload, Payload};

use super::Rehydrator;

/// Derived loan state. `remaining_balance()` is always
/// `principal + interest − paid − forgiven`, clamped at zero.
#[derive(Debug, Clone, Serialize)]
pub struct LoanState {
    pub id: String,
    pub borrower_id: String,
    pub guarantor_id: Option<String>,
    pub principal: Credits,
    pub interest_accrued: Credits,
    pub total_paid: Credits,
    pub forgiven: Credits,
    /// APR as a fraction.
    pub interest_rate: f64,
    /// Fraction of earnings garnished per period.
    pub repayment_rate: f64,
    pub grace_period_end: i64,
    pub status: LoanStatus,
    pub payment_count: u32,
    pub missed_payments: u32,
    pub disbursed: bool,
    pub paid_off_at: Option<i64>,
    pub version: u64,
}

impl LoanState {
    pub fn total_owed(&self) -> Credits {
        self.principal + self.interest_accrued
    }

    pub fn remaining_balance(&self) -> Credits {
        (self.total_owed() - self.total_paid - self.forgiven).clamped()
    }

    /// What the borrower owes this period given their earnings.
    pub fn required_payment(&self, earnings: Credits) -> Credits {
        earnings.scaled_floor((self.repayment_rate * 10_000.0).round() as i64, 10_000)
    }
}

pub struct LoanRehydrator;

impl LoanRehydrator {
    /// Loan payloads name their loan; events about some other loan that
    /// landed in this stream are skipped.
    fn loan_id(payload: &Payload) -> Option<&str> {
        match payload {
            Payload::LoanDisbursed { loan_id, .. }
            | Payload::InterestAccrued { loan_id, .. }
            | Payload::LoanRepayment { loan_id, .. }
            | Payload::LoanDelinquent { loan_id, .. }
            | Payload::LoanDefaulted { loan_id, .. }
            | Payload::LoanForgiven { loan_id, .. }
            | Payload::LoanPaidOff { loan_id } => Some(loan_id),
            _ => None,
        }
    }
}

impl Rehydrator for LoanRehydrator {
    type State = LoanState;

    const AGGREGATE: AggregateType = AggregateType::Agreement;

    fn initial(id: &str) -> LoanState {
        LoanState {
            id: id.to_string(),
            borrower_id: String::new(),
            guarantor_id: None,
            principal: Credits::ZERO,
            interest_accrued: Credits::ZERO,
            total_paid: Credits::ZERO,
            forgiven: Credits::ZERO,
            interest_rate: 0.0,
            repayment_rate: 0.0,
            grace_period_end: 0,
            status: LoanStatus::GracePeriod,
            payment_count: 0,
            missed_payments: 0,
            disbursed: false,
            paid_off_at: None,
            version: 0,
        }
    }

    fn apply(state: &mut LoanState, event: &Event) {
        let EventPayload::Known(payload) = &event.payload else {
            return;
        };
        match Self::loan_id(payload) {
            Some(loan_id) if loan_id == state.id => {}
            _ => return,
        }
        // Terminal statuses admit no further transitions.
        if state.disbursed && state.status.is_terminal() {
            return;
        }
        match payload {
            Payload::LoanDisbursed {
                borrower_id,
                guarantor_id,
                principal,
                interest_rate,
                repayment_rate,
                grace_period_end,
                ..
            } => {
                state.borrower_id = borrower_id.clone();
                state.guarantor_id = guarantor_id.clone();
                state.principal = *principal;
                state.interest_rate = *interest_rate;
                state.repayment_rate = *repayment_rate;
                state.grace_period_end = *grace_period_end;
                state.status = LoanStatus::GracePeriod;
                state.disbursed = true;
            }
            Payload::InterestAccrued { amount, .. } => {
                state.interest_accrued = state.interest_accrued + *amount;
            }
            Payload::LoanRepayment { amount, .. } => {
                state.total_paid = state.total_paid + *amount;
                state.payment_count += 1;
                if state.remaining_balance().is_zero() {
                    state.status = LoanStatus::PaidOff;
                    state.paid_off_at = Some(event.timestamp);
                } else {
                    state.status = LoanStatus::Active;
                }
            }
            Payload::LoanDelinquent {
                missed_payments, ..
            } => {
                state.missed_payments = *missed_payments;
                state.status = LoanStatus::Delinquent;
            }
            Payload::LoanDefaulted { .. } => {
                state.status = LoanStatus::Defaulted;
            }
            Payload::LoanForgiven { amount, .. } => {
                state.forgiven = state.forgiven + *amount;
                if state.remaining_balance().is_zero() {
                    state.status = LoanStatus::Forgiven;
                }
            }
            Payload::LoanPaidOff { .. } => {
                state.status = LoanStatus::PaidOff;
                state.paid_off_at = Some(event.timestamp);
            }
            _ => return,
        }
        state.version += 1;
    }
}
