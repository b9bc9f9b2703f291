pub mod containers;
pub mod loans;
pub mod monetary;
pub mod rates;
pub mod saga;

pub use containers::{ContainerManager, ItemTransfer};
pub use loans::{LoanService, LoanTerms, StarterLoanTerms};
pub use monetary::{MonetaryEngine, MonetaryPolicy, SupplySnapshot, TransferReceipt};
pub use rates::{RateAdjustment, RateConfig, RateController};
pub use saga::{IntentTransaction, SagaReport, SagaStatus, SagaStep};

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::LedgerResult;
use crate::model::economy::EconomicMetrics;
use crate::model::event::{ActorRef, AggregateType, EventInput};
use crate::model::payload::Payload;
use crate::safety::{
    BreakerConfig, CircuitBreaker, FundConfig, GuaranteeFund, ResetReport, TripReport,
};
use crate::store::EventStore;

/// Aggregate ids for breaker and policy events.
const SAFETY_AGGREGATE_ID: &str = "circuit-breaker";
const POLICY_AGGREGATE_ID: &str = "monetary-policy";

#[derive(Debug, Clone, Default)]
pub struct LedgerSettings {
    pub breaker: BreakerConfig,
    pub fund: FundConfig,
    pub policy: MonetaryPolicy,
    pub rates: RateConfig,
    pub starter_loan: StarterLoanTerms,
}

/// Process-wide handles, instantiated once at startup and passed explicitly.
/// No hidden globals: everything is reachable from here and torn down
/// together (stop subscribers, drain sagas, drop the store last).
pub struct Ledger {
    pub store: Arc<EventStore>,
    pub breaker: Arc<CircuitBreaker>,
    pub fund: Arc<GuaranteeFund>,
    pub containers: ContainerManager,
    pub monetary: MonetaryEngine,
    pub loans: LoanService,
    rates: Mutex<RateController>,
}

impl Ledger {
    pub fn new(store: Arc<EventStore>, settings: LedgerSettings) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(settings.breaker));
        let fund = Arc::new(GuaranteeFund::new(store.clone(), settings.fund));
        Ledger {
            containers: ContainerManager::new(store.clone()),
            monetary: MonetaryEngine::new(
                store.clone(),
                breaker.clone(),
                fund.clone(),
                settings.policy,
            ),
            loans: LoanService::new(store.clone(), breaker.clone(), settings.starter_loan),
            rates: Mutex::new(RateController::new(settings.rates)),
            store,
            breaker,
            fund,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(EventStore::in_memory()), LedgerSettings::default())
    }

    /// Feed a metrics snapshot to the breaker. On trip: record the event
    /// with a full snapshot, halt every operation class, unlock the fund.
    pub async fn run_safety_check(
        &self,
        metrics: &EconomicMetrics,
    ) -> LedgerResult<Option<TripReport>> {
        let Some(report) = self.breaker.check(metrics).await else {
            return Ok(None);
        };
        self.record_trip(&report).await?;
        Ok(Some(report))
    }

    /// Operator-initiated halt with a reason.
    pub async fn trip_breaker(
        &self,
        note: &str,
        metrics: EconomicMetrics,
    ) -> LedgerResult<TripReport> {
        let report = self.breaker.trip_manual(note, metrics).await;
        self.record_trip(&report).await?;
        Ok(report)
    }

    async fn record_trip(&self, report: &TripReport) -> LedgerResult<()> {
        self.fund.unlock().await;
        self.store
            .append(EventInput::new(
                AggregateType::System,
                SAFETY_AGGREGATE_ID,
                Payload::CircuitBreakerTripped {
                    reason: report.reason.clone(),
                    consecutive_anomalies: report.consecutive_anomalies,
                    metrics: report.metrics.clone(),
                },
                ActorRef::system(SAFETY_AGGREGATE_ID),
            ))
            .await?;
        Ok(())
    }

    /// Full manual reset; records downtime and restores all operations.
    pub async fn reset_breaker(&self, reason: &str) -> LedgerResult<ResetReport> {
        let report = self.breaker.reset(reason).await;
        self.store
            .append(EventInput::new(
                AggregateType::System,
                SAFETY_AGGREGATE_ID,
                Payload::CircuitBreakerReset {
                    reason: report.reason.clone(),
                    downtime_ms: report.downtime_ms,
                },
                ActorRef::system(SAFETY_AGGREGATE_ID),
            ))
            .await?;
        Ok(report)
    }

    /// Run the floating-rate controller against an inflation reading,
    /// recording any band change.
    pub async fn evaluate_rates(&self, inflation: f64) -> LedgerResult<Option<RateAdjustment>> {
        let now = Utc::now().timestamp_millis();
        let adjustment = {
            let mut controller = self.rates.lock().await;
            controller.evaluate(inflation, now)
        };
        let Some(adjustment) = adjustment else {
            return Ok(None);
        };

        let correlation_id = Uuid::new_v4().to_string();
        let actor = ActorRef::system("treasury");

        self.store
            .append(
                EventInput::new(
                    AggregateType::System,
                    POLICY_AGGREGATE_ID,
                    Payload::InterestRateAdjusted {
                        previous_rate: adjustment.previous_rate,
                        new_rate: adjustment.new_rate,
                        band: adjustment.band,
                    },
                    actor.clone(),
                )
                .correlated(correlation_id.clone()),
            )
            .await?;
        self.store
            .append(
                EventInput::new(
                    AggregateType::System,
                    POLICY_AGGREGATE_ID,
                    Payload::MacroeconomicBandChanged {
                        previous_band: adjustment.previous_band,
                        band: adjustment.band,
                        inflation: adjustment.inflation,
                    },
                    actor,
                )
                .correlated(correlation_id),
            )
            .await?;

        Ok(Some(adjustment))
    }

    pub async fn current_interest_rate(&self) -> f64 {
        self.rates.lock().await.current_rate()
    }
}
