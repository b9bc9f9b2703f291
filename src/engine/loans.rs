use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregate::loan::LoanState;
use crate::aggregate::{LoanRehydrator, rehydrate};
use crate::error::{LedgerError, LedgerResult};
use crate::model::credits::Credits;
use crate::model::economy::OperationClass;
use crate::model::event::{ActorRef, AggregateType, EventInput};
use crate::model::loan::RepaymentSource;
use crate::model::payload::Payload;
use crate::safety::CircuitBreaker;
use crate::store::EventStore;

const MS_PER_DAY: i64 = 86_400_000;
const DAYS_PER_YEAR: i64 = 365;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: Credits,
    /// APR as a fraction.
    pub interest_rate: f64,
    /// Fraction of earnings garnished per period.
    pub repayment_rate: f64,
    pub grace_period_days: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guarantor_id: Option<String>,
}

/// Terms for the starter loan every newly registered agent may take once.
#[derive(Debug, Clone, Serialize)]
pub struct StarterLoanTerms {
    pub principal: Credits,
    pub interest_rate: f64,
    pub repayment_rate: f64,
    pub grace_period_days: i64,
}

impl Default for StarterLoanTerms {
    fn default() -> Self {
        StarterLoanTerms {
            principal: Credits::from_ubl(100),
            interest_rate: 0.05,
            repayment_rate: 0.20,
            grace_period_days: 30,
        }
    }
}

/// Loan issuance and lifecycle. Loans are agreements; every state change is
/// an event on the loan's agreement stream, and money movement rides the
/// borrower's wallet stream under the same correlation id.
#[derive(Clone)]
pub struct LoanService {
    store: Arc<EventStore>,
    breaker: Arc<CircuitBreaker>,
    starter: StarterLoanTerms,
}

impl LoanService {
    pub fn new(
        store: Arc<EventStore>,
        breaker: Arc<CircuitBreaker>,
        starter: StarterLoanTerms,
    ) -> Self {
        LoanService {
            store,
            breaker,
            starter,
        }
    }

    /// Issue the configured starter loan into a new agent's wallet.
    pub async fn disburse_starter(
        &self,
        borrower_id: &str,
        borrower_wallet: Option<&str>,
        actor: ActorRef,
    ) -> LedgerResult<LoanState> {
        let terms = LoanTerms {
            principal: self.starter.principal,
            interest_rate: self.starter.interest_rate,
            repayment_rate: self.starter.repayment_rate,
            grace_period_days: self.starter.grace_period_days,
            guarantor_id: None,
        };
        self.disburse(borrower_id, terms, borrower_wallet, actor)
            .await
    }

    pub async fn state(&self, loan_id: &str) -> LedgerResult<LoanState> {
        let state = rehydrate::<LoanRehydrator>(&self.store, loan_id).await?;
        if !state.disbursed {
            return Err(LedgerError::not_found("loan", loan_id));
        }
        Ok(state)
    }

    /// Issue a loan. Disbursed principal is minted into the borrower's
    /// wallet when one is given; loans create money, repayment destroys it.
    pub async fn disburse(
        &self,
        borrower_id: &str,
        terms: LoanTerms,
        borrower_wallet: Option<&str>,
        actor: ActorRef,
    ) -> LedgerResult<LoanState> {
        self.breaker.guard(OperationClass::Loans).await?;
        if terms.principal <= Credits::ZERO {
            return Err(LedgerError::InvalidInput(format!(
                "loan principal must be positive, got {}",
                terms.principal
            )));
        }
        if !(0.0..=1.0).contains(&terms.repayment_rate) {
            return Err(LedgerError::InvalidInput(format!(
                "repayment rate must be within 0..=1, got {}",
                terms.repayment_rate
            )));
        }

        let loan_id = Uuid::new_v4().to_string();
        let correlation_id = Uuid::new_v4().to_string();
        let grace_period_end =
            Utc::now().timestamp_millis() + terms.grace_period_days * MS_PER_DAY;

        self.store
            .append(
                EventInput::new(
                    AggregateType::Agreement,
                    loan_id.clone(),
                    Payload::LoanDisbursed {
                        loan_id: loan_id.clone(),
                        borrower_id: borrower_id.to_string(),
                        guarantor_id: terms.guarantor_id.clone(),
                        principal: terms.principal,
                        interest_rate: terms.interest_rate,
                        repayment_rate: terms.repayment_rate,
                        grace_period_end,
                    },
                    actor.clone(),
                )
                .correlated(correlation_id.clone()),
            )
            .await?;

        if let Some(wallet_id) = borrower_wallet {
            self.store
                .append(
                    EventInput::new(
                        AggregateType::Container,
                        wallet_id,
                        Payload::CreditsMinted {
                            amount: terms.principal,
                            agreement_id: loan_id.clone(),
                            reason: Some("loan disbursement".to_string()),
                        },
                        actor,
                    )
                    .correlated(correlation_id),
                )
                .await?;
        }

        self.state(&loan_id).await
    }

    /// Daily interest on the remaining balance at the loan's APR.
    pub fn periodic_interest(state: &LoanState) -> Credits {
        state.remaining_balance().scaled_floor(
            (state.interest_rate * 10_000.0).round() as i64,
            10_000 * DAYS_PER_YEAR,
        )
    }

    /// Accrue interest; defaults to one period at the loan's rate.
    pub async fn accrue_interest(
        &self,
        loan_id: &str,
        amount: Option<Credits>,
        actor: ActorRef,
    ) -> LedgerResult<LoanState> {
        let state = self.open_loan(loan_id).await?;
        let amount = amount.unwrap_or_else(|| Self::periodic_interest(&state));
        if amount.is_zero() {
            return Ok(state);
        }
        self.store
            .append(EventInput::new(
                AggregateType::Agreement,
                loan_id,
                Payload::InterestAccrued {
                    loan_id: loan_id.to_string(),
                    amount,
                },
                actor,
            ))
            .await?;
        self.state(loan_id).await
    }

    /// Record a repayment. When a wallet is given, the amount is burned out
    /// of it under the same correlation id.
    pub async fn repay(
        &self,
        loan_id: &str,
        amount: Credits,
        source: RepaymentSource,
        wallet_id: Option<&str>,
        actor: ActorRef,
    ) -> LedgerResult<LoanState> {
        self.breaker.guard(OperationClass::Loans).await?;
        if amount <= Credits::ZERO {
            return Err(LedgerError::InvalidInput(format!(
                "repayment must be positive, got {amount}"
            )));
        }
        self.open_loan(loan_id).await?;

        let correlation_id = Uuid::new_v4().to_string();

        if let Some(wallet_id) = wallet_id {
            let wallet =
                rehydrate::<crate::aggregate::WalletRehydrator>(&self.store, wallet_id).await?;
            if !wallet.created {
                return Err(LedgerError::not_found("wallet", wallet_id));
            }
            if !wallet.can_withdraw(amount) {
                return Err(LedgerError::InsufficientBalance {
                    wallet_id: wallet_id.to_string(),
                    have: wallet.balance,
                    need: amount,
                });
            }
            self.store
                .append(
                    EventInput::new(
                        AggregateType::Container,
                        wallet_id,
                        Payload::CreditsBurned {
                            amount,
                            agreement_id: loan_id.to_string(),
                            reason: Some("loan repayment".to_string()),
                        },
                        actor.clone(),
                    )
                    .correlated(correlation_id.clone()),
                )
                .await?;
        }

        self.store
            .append(
                EventInput::new(
                    AggregateType::Agreement,
                    loan_id,
                    Payload::LoanRepayment {
                        loan_id: loan_id.to_string(),
                        amount,
                        source,
                    },
                    actor,
                )
                .correlated(correlation_id),
            )
            .await?;
        self.state(loan_id).await
    }

    /// What the borrower owes this period, given their earnings.
    pub async fn required_payment(
        &self,
        loan_id: &str,
        earnings: Credits,
    ) -> LedgerResult<Credits> {
        Ok(self.state(loan_id).await?.required_payment(earnings))
    }

    pub async fn mark_delinquent(
        &self,
        loan_id: &str,
        missed_payments: u32,
        days_past_due: u32,
        actor: ActorRef,
    ) -> LedgerResult<LoanState> {
        self.open_loan(loan_id).await?;
        self.store
            .append(EventInput::new(
                AggregateType::Agreement,
                loan_id,
                Payload::LoanDelinquent {
                    loan_id: loan_id.to_string(),
                    missed_payments,
                    days_past_due,
                },
                actor,
            ))
            .await?;
        self.state(loan_id).await
    }

    pub async fn mark_defaulted(
        &self,
        loan_id: &str,
        reason: &str,
        actor: ActorRef,
    ) -> LedgerResult<LoanState> {
        self.open_loan(loan_id).await?;
        self.store
            .append(EventInput::new(
                AggregateType::Agreement,
                loan_id,
                Payload::LoanDefaulted {
                    loan_id: loan_id.to_string(),
                    reason: reason.to_string(),
                },
                actor,
            ))
            .await?;
        self.state(loan_id).await
    }

    /// Forgive part or all of the remaining balance.
    pub async fn forgive(
        &self,
        loan_id: &str,
        amount: Option<Credits>,
        reason: &str,
        actor: ActorRef,
    ) -> LedgerResult<LoanState> {
        let state = self.open_loan(loan_id).await?;
        let amount = amount.unwrap_or_else(|| state.remaining_balance());
        self.store
            .append(EventInput::new(
                AggregateType::Agreement,
                loan_id,
                Payload::LoanForgiven {
                    loan_id: loan_id.to_string(),
                    amount,
                    reason: reason.to_string(),
                },
                actor,
            ))
            .await?;
        self.state(loan_id).await
    }

    /// A loan that exists and is still mutable.
    async fn open_loan(&self, loan_id: &str) -> LedgerResult<LoanState> {
        let state = self.state(loan_id).await?;
        if state.status.is_terminal() {
            return Err(LedgerError::InvalidInput(format!(
                "loan `{loan_id}` is {} and admits no further transitions",
                state.status
            )));
        }
        Ok(state)
    }
}
