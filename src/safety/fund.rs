use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::{LedgerError, LedgerResult};
use crate::model::credits::Credits;
use crate::model::economy::FundClaim;
use crate::model::event::{ActorRef, AggregateType, EventInput};
use crate::model::payload::{EventPayload, Payload};
use crate::store::EventStore;

/// Aggregate id the fund's own events are recorded under.
pub const FUND_AGGREGATE_ID: &str = "guarantee-fund";

#[derive(Debug, Clone, Serialize)]
pub struct FundConfig {
    /// Share of an affected balance that is covered, in basis points.
    pub coverage_bps: u32,
    pub max_coverage_per_entity: Credits,
    /// Distribution refuses to run below this reserve.
    pub min_fund_balance: Credits,
}

impl Default for FundConfig {
    fn default() -> Self {
        FundConfig {
            coverage_bps: 8_000,
            max_coverage_per_entity: Credits::from_ubl(10_000),
            min_fund_balance: Credits::ZERO,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FundState {
    pub balance: Credits,
    pub total_collected: Credits,
    pub total_distributed: Credits,
    pub distribution_count: u64,
    pub locked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DistributionReport {
    pub claims: Vec<FundClaim>,
    pub total_eligible: Credits,
    pub total_paid: Credits,
    pub coverage_ratio: f64,
    pub fund_before: Credits,
    pub fund_after: Credits,
}

/// Reserve accrued from transaction fees. Locked in normal operation; a
/// circuit-breaker trip unlocks it for one distribution, after which it
/// re-locks itself.
pub struct GuaranteeFund {
    store: Arc<EventStore>,
    config: FundConfig,
    state: RwLock<FundState>,
}

impl GuaranteeFund {
    pub fn new(store: Arc<EventStore>, config: FundConfig) -> Self {
        GuaranteeFund {
            store,
            config,
            state: RwLock::new(FundState {
                balance: Credits::ZERO,
                total_collected: Credits::ZERO,
                total_distributed: Credits::ZERO,
                distribution_count: 0,
                locked: true,
            }),
        }
    }

    /// Rebuild the fund from its event stream on startup.
    pub async fn hydrate(store: Arc<EventStore>, config: FundConfig) -> LedgerResult<Self> {
        let fund = Self::new(store.clone(), config);
        let events = store
            .get_by_aggregate(
                AggregateType::System,
                FUND_AGGREGATE_ID,
                Default::default(),
            )
            .await?;
        {
            let mut state = fund.state.write().await;
            for event in &events {
                match &event.payload {
                    EventPayload::Known(Payload::GuaranteeFundContribution { amount, .. }) => {
                        state.balance = state.balance + *amount;
                        state.total_collected = state.total_collected + *amount;
                    }
                    EventPayload::Known(Payload::GuaranteeFundDistribution {
                        total_paid, ..
                    }) => {
                        state.balance = state.balance - *total_paid;
                        state.total_distributed = state.total_distributed + *total_paid;
                        state.distribution_count += 1;
                    }
                    _ => {}
                }
            }
        }
        Ok(fund)
    }

    pub async fn snapshot(&self) -> FundState {
        self.state.read().await.clone()
    }

    pub async fn balance(&self) -> Credits {
        self.state.read().await.balance
    }

    pub async fn unlock(&self) {
        let mut state = self.state.write().await;
        if state.locked {
            state.locked = false;
            eprintln!("[fund] unlocked for emergency distribution");
        }
    }

    pub async fn lock(&self) {
        self.state.write().await.locked = true;
    }

    /// Record a fee contribution. Called from the transfer path.
    pub async fn accrue(
        &self,
        amount: Credits,
        source_wallet: &str,
        actor: ActorRef,
        correlation_id: Option<&str>,
    ) -> LedgerResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        let mut input = EventInput::new(
            AggregateType::System,
            FUND_AGGREGATE_ID,
            Payload::GuaranteeFundContribution {
                amount,
                source_wallet: source_wallet.to_string(),
            },
            actor,
        );
        if let Some(correlation_id) = correlation_id {
            input = input.correlated(correlation_id);
        }
        self.store.append(input).await?;

        let mut state = self.state.write().await;
        state.balance = state.balance + amount;
        state.total_collected = state.total_collected + amount;
        Ok(())
    }

    /// Pay affected entities proportionally and re-lock.
    ///
    /// Claims are computed and paid in whole UBL (floor), so a distribution
    /// never over-pays; sub-UBL dust stays in the fund.
    pub async fn distribute(
        &self,
        affected: &[(String, Credits)],
        actor: ActorRef,
    ) -> LedgerResult<DistributionReport> {
        let mut state = self.state.write().await;

        if state.locked {
            return Err(LedgerError::InvalidInput(
                "guarantee fund is locked; distribution requires a circuit-breaker trip".into(),
            ));
        }
        if state.balance < self.config.min_fund_balance {
            return Err(LedgerError::InsufficientFund {
                balance: state.balance,
                minimum: self.config.min_fund_balance,
            });
        }

        let fund_before = state.balance;
        let fund_ubl = fund_before.millis() / Credits::SCALE;

        let mut claims: Vec<FundClaim> = affected
            .iter()
            .map(|(entity_id, balance)| {
                let capped = balance.min(&self.config.max_coverage_per_entity).clamped();
                let capped_ubl = capped.millis() / Credits::SCALE;
                let eligible_ubl =
                    capped_ubl * self.config.coverage_bps as i64 / 10_000;
                FundClaim {
                    entity_id: entity_id.clone(),
                    affected_balance: *balance,
                    eligible: Credits::from_ubl(eligible_ubl),
                    paid: Credits::ZERO,
                }
            })
            .collect();

        let total_eligible: Credits = claims.iter().map(|c| c.eligible).sum();
        let total_eligible_ubl = total_eligible.millis() / Credits::SCALE;

        let coverage_ratio = if total_eligible.is_zero() || fund_before >= total_eligible {
            1.0
        } else {
            fund_ubl as f64 / total_eligible_ubl as f64
        };

        for claim in &mut claims {
            let eligible_ubl = claim.eligible.millis() / Credits::SCALE;
            let paid_ubl = if coverage_ratio >= 1.0 {
                eligible_ubl
            } else {
                eligible_ubl * fund_ubl / total_eligible_ubl
            };
            claim.paid = Credits::from_ubl(paid_ubl);
        }

        let total_paid: Credits = claims.iter().map(|c| c.paid).sum();
        let fund_after = fund_before - total_paid;

        self.store
            .append(EventInput::new(
                AggregateType::System,
                FUND_AGGREGATE_ID,
                Payload::GuaranteeFundDistribution {
                    claims: claims.clone(),
                    total_eligible,
                    total_paid,
                    coverage_ratio,
                    fund_before,
                    fund_after,
                },
                actor,
            ))
            .await?;

        state.balance = fund_after;
        state.total_distributed = state.total_distributed + total_paid;
        state.distribution_count += 1;
        state.locked = true;
        eprintln!(
            "[fund] distributed {total_paid} to {} entities (ratio {coverage_ratio:.4}), re-locked",
            claims.len()
        );

        Ok(DistributionReport {
            claims,
            total_eligible,
            total_paid,
            coverage_ratio,
            fund_before,
            fund_after,
        })
    }
}
