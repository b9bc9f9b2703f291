use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::aggregate::wallet::WalletState;
use crate::aggregate::{WalletRehydrator, rehydrate};
use crate::error::{LedgerError, LedgerResult};
use crate::model::credits::{Credits, FeeRate};
use crate::model::economy::OperationClass;
use crate::model::event::{ActorRef, AggregateType, Event, EventInput};
use crate::model::payload::Payload;
use crate::safety::{CircuitBreaker, GuaranteeFund};
use crate::store::EventStore;
use crate::store::query::QueryCriteria;

use super::saga::{IntentTransaction, SagaContext, SagaStep};

/// System actors allowed to change supply. Enforcement lives at the
/// boundary; the ledger records the authorizing agreement either way.
pub const SUPPLY_AUTHORITIES: [&str; 4] =
    ["treasury", "loan-service", "reward-service", "fee-router"];

pub fn is_supply_authority(actor: &ActorRef) -> bool {
    match actor {
        ActorRef::System { system_id } => SUPPLY_AUTHORITIES.contains(&system_id.as_str()),
        _ => false,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonetaryPolicy {
    pub fee_rate: FeeRate,
    /// APR applied to newly issued loans.
    pub base_interest_rate: f64,
}

impl Default for MonetaryPolicy {
    fn default() -> Self {
        MonetaryPolicy {
            fee_rate: FeeRate::from_fraction(0.001),
            base_interest_rate: 0.05,
        }
    }
}

/// Circulating-supply accounting, folded from the full log.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SupplySnapshot {
    pub total_minted: Credits,
    pub total_burned: Credits,
    pub circulating: Credits,
}

#[derive(Debug, Serialize)]
pub struct TransferReceipt {
    pub correlation_id: String,
    pub gross: Credits,
    pub fee: Credits,
    pub net: Credits,
    pub events: Vec<Event>,
}

/// Mint, burn, and fee-routed transfer of credits.
///
/// A transfer is an intent transaction: withdraw gross from the sender,
/// deposit net to the recipient, route the fee to the guarantee fund. The
/// three deltas always sum to zero.
#[derive(Clone)]
pub struct MonetaryEngine {
    store: Arc<EventStore>,
    breaker: Arc<CircuitBreaker>,
    fund: Arc<GuaranteeFund>,
    policy: MonetaryPolicy,
}

impl MonetaryEngine {
    pub fn new(
        store: Arc<EventStore>,
        breaker: Arc<CircuitBreaker>,
        fund: Arc<GuaranteeFund>,
        policy: MonetaryPolicy,
    ) -> Self {
        MonetaryEngine {
            store,
            breaker,
            fund,
            policy,
        }
    }

    pub fn policy(&self) -> &MonetaryPolicy {
        &self.policy
    }

    pub async fn create_wallet(
        &self,
        wallet_id: &str,
        owner_id: &str,
        allow_negative: bool,
        actor: ActorRef,
    ) -> LedgerResult<WalletState> {
        let existing = rehydrate::<WalletRehydrator>(&self.store, wallet_id).await?;
        if existing.created {
            return Err(LedgerError::InvalidInput(format!(
                "wallet `{wallet_id}` already exists"
            )));
        }
        self.store
            .append(EventInput::new(
                AggregateType::Container,
                wallet_id,
                Payload::WalletCreated {
                    owner_id: owner_id.to_string(),
                    currency: "UBL".to_string(),
                    allow_negative,
                },
                actor,
            ))
            .await?;
        rehydrate::<WalletRehydrator>(&self.store, wallet_id).await
    }

    pub async fn wallet(&self, wallet_id: &str) -> LedgerResult<WalletState> {
        let state = rehydrate::<WalletRehydrator>(&self.store, wallet_id).await?;
        if !state.created {
            return Err(LedgerError::not_found("wallet", wallet_id));
        }
        Ok(state)
    }

    pub async fn balance(&self, wallet_id: &str) -> LedgerResult<Credits> {
        Ok(self.wallet(wallet_id).await?.balance)
    }

    /// Increase circulating supply into a wallet.
    pub async fn mint(
        &self,
        wallet_id: &str,
        amount: Credits,
        agreement_id: &str,
        actor: ActorRef,
    ) -> LedgerResult<Event> {
        self.breaker.guard(OperationClass::Minting).await?;
        if amount <= Credits::ZERO {
            return Err(LedgerError::InvalidInput(format!(
                "mint amount must be positive, got {amount}"
            )));
        }
        self.wallet(wallet_id).await?;
        Ok(self
            .store
            .append(EventInput::new(
                AggregateType::Container,
                wallet_id,
                Payload::CreditsMinted {
                    amount,
                    agreement_id: agreement_id.to_string(),
                    reason: None,
                },
                actor,
            ))
            .await?)
    }

    /// Remove credits from circulation out of a wallet.
    pub async fn burn(
        &self,
        wallet_id: &str,
        amount: Credits,
        agreement_id: &str,
        actor: ActorRef,
    ) -> LedgerResult<Event> {
        self.breaker.guard(OperationClass::Burning).await?;
        if amount <= Credits::ZERO {
            return Err(LedgerError::InvalidInput(format!(
                "burn amount must be positive, got {amount}"
            )));
        }
        let wallet = self.wallet(wallet_id).await?;
        if !wallet.can_withdraw(amount) {
            return Err(LedgerError::InsufficientBalance {
                wallet_id: wallet_id.to_string(),
                have: wallet.balance,
                need: amount,
            });
        }
        Ok(self
            .store
            .append(EventInput::new(
                AggregateType::Container,
                wallet_id,
                Payload::CreditsBurned {
                    amount,
                    agreement_id: agreement_id.to_string(),
                    reason: None,
                },
                actor,
            ))
            .await?)
    }

    /// Fee-routed transfer, executed as a compensating transaction.
    pub async fn transfer(
        &self,
        from: &str,
        to: &str,
        gross: Credits,
        actor: ActorRef,
    ) -> LedgerResult<TransferReceipt> {
        self.breaker.guard(OperationClass::Transfers).await?;
        if gross <= Credits::ZERO {
            return Err(LedgerError::InvalidInput(format!(
                "transfer amount must be positive, got {gross}"
            )));
        }

        let fee = self.policy.fee_rate.fee_on(gross);
        let net = gross - fee;

        let saga = IntentTransaction::new(actor)
            .step(WithdrawStep {
                store: self.store.clone(),
                wallet_id: from.to_string(),
                amount: gross,
                counterparty: to.to_string(),
            })
            .step(DepositStep {
                store: self.store.clone(),
                wallet_id: to.to_string(),
                amount: net,
                counterparty: from.to_string(),
            })
            .step(FeeStep {
                fund: self.fund.clone(),
                fee,
                source_wallet: from.to_string(),
            });

        let correlation_id = saga.correlation_id().to_string();
        let report = saga.execute().await;
        if !report.committed() {
            return Err(report.into_error());
        }

        let page = self
            .store
            .query(QueryCriteria::correlated(correlation_id.clone()))
            .await?;

        Ok(TransferReceipt {
            correlation_id,
            gross,
            fee,
            net,
            events: page.events,
        })
    }

    /// Fold minted/burned totals over the whole log.
    pub async fn supply(&self) -> LedgerResult<SupplySnapshot> {
        let events = self.store.get_by_sequence(1, None).await?;
        let mut total_minted = Credits::ZERO;
        let mut total_burned = Credits::ZERO;
        for event in &events {
            match event.payload.as_known() {
                Some(Payload::CreditsMinted { amount, .. }) => {
                    total_minted = total_minted + *amount;
                }
                Some(Payload::CreditsBurned { amount, .. }) => {
                    total_burned = total_burned + *amount;
                }
                _ => {}
            }
        }
        Ok(SupplySnapshot {
            total_minted,
            total_burned,
            circulating: total_minted - total_burned,
        })
    }
}

// ── Transfer saga steps ─────────────────────────────────────────────

struct WithdrawStep {
    store: Arc<EventStore>,
    wallet_id: String,
    amount: Credits,
    counterparty: String,
}

#[async_trait]
impl SagaStep for WithdrawStep {
    fn name(&self) -> &str {
        "withdraw"
    }

    async fn execute(&self, ctx: &mut SagaContext) -> LedgerResult<Value> {
        let wallet = rehydrate::<WalletRehydrator>(&self.store, &self.wallet_id).await?;
        if !wallet.created {
            return Err(LedgerError::not_found("wallet", &self.wallet_id));
        }
        if !wallet.can_withdraw(self.amount) {
            return Err(LedgerError::InsufficientBalance {
                wallet_id: self.wallet_id.clone(),
                have: wallet.balance,
                need: self.amount,
            });
        }
        let event = self
            .store
            .append(
                EventInput::new(
                    AggregateType::Container,
                    &self.wallet_id,
                    Payload::CreditsWithdrawn {
                        amount: self.amount,
                        destination: Some(self.counterparty.clone()),
                        reason: None,
                    },
                    ctx.actor.clone(),
                )
                .correlated(ctx.correlation_id.clone()),
            )
            .await?;
        Ok(serde_json::json!({ "event_id": event.id }))
    }

    /// The withdrawal event is immutable; reversal is an opposing deposit.
    async fn compensate(&self, ctx: &SagaContext, _result: &Value) -> LedgerResult<()> {
        self.store
            .append(
                EventInput::new(
                    AggregateType::Container,
                    &self.wallet_id,
                    Payload::CreditsDeposited {
                        amount: self.amount,
                        source: Some("transfer-reversal".to_string()),
                    },
                    ctx.actor.clone(),
                )
                .correlated(ctx.correlation_id.clone()),
            )
            .await?;
        Ok(())
    }
}

struct DepositStep {
    store: Arc<EventStore>,
    wallet_id: String,
    amount: Credits,
    counterparty: String,
}

#[async_trait]
impl SagaStep for DepositStep {
    fn name(&self) -> &str {
        "deposit"
    }

    async fn execute(&self, ctx: &mut SagaContext) -> LedgerResult<Value> {
        let wallet = rehydrate::<WalletRehydrator>(&self.store, &self.wallet_id).await?;
        if !wallet.created {
            return Err(LedgerError::not_found("wallet", &self.wallet_id));
        }
        let event = self
            .store
            .append(
                EventInput::new(
                    AggregateType::Container,
                    &self.wallet_id,
                    Payload::CreditsDeposited {
                        amount: self.amount,
                        source: Some(self.counterparty.clone()),
                    },
                    ctx.actor.clone(),
                )
                .correlated(ctx.correlation_id.clone()),
            )
            .await?;
        Ok(serde_json::json!({ "event_id": event.id }))
    }

    async fn compensate(&self, ctx: &SagaContext, _result: &Value) -> LedgerResult<()> {
        self.store
            .append(
                EventInput::new(
                    AggregateType::Container,
                    &self.wallet_id,
                    Payload::CreditsWithdrawn {
                        amount: self.amount,
                        destination: None,
                        reason: Some("transfer-reversal".to_string()),
                    },
                    ctx.actor.clone(),
                )
                .correlated(ctx.correlation_id.clone()),
            )
            .await?;
        Ok(())
    }
}

struct FeeStep {
    fund: Arc<GuaranteeFund>,
    fee: Credits,
    source_wallet: String,
}

#[async_trait]
impl SagaStep for FeeStep {
    fn name(&self) -> &str {
        "fee"
    }

    // Append-only step; nothing to compensate. If it fails, the earlier
    // steps unwind and the fund never saw the fee.
    async fn execute(&self, ctx: &mut SagaContext) -> LedgerResult<Value> {
        self.fund
            .accrue(
                self.fee,
                &self.source_wallet,
                ctx.actor.clone(),
                Some(&ctx.correlation_id),
            )
            .await?;
        Ok(serde_json::json!({ "fee": self.fee }))
    }
}
