use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{RwLock, broadcast};

use crate::error::{LedgerError, LedgerResult};
use crate::model::economy::{BreakerState, EconomicMetrics, OperationClass, TripReason};

/// Trip thresholds. An anomalous check increments a counter; the breaker
/// opens only after `anomaly_threshold` consecutive anomalies, so one noisy
/// reading never halts the economy.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerConfig {
    pub max_inflation: f64,
    pub max_supply_change: f64,
    pub max_default_rate: f64,
    pub max_gini: f64,
    pub anomaly_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            max_inflation: 0.50,
            max_supply_change: 1.00,
            max_default_rate: 0.50,
            max_gini: 0.95,
            anomaly_threshold: 3,
        }
    }
}

/// Emitted on every trip; the guarantee fund listens to unlock itself.
#[derive(Debug, Clone, Serialize)]
pub struct TripReport {
    pub reason: TripReason,
    pub consecutive_anomalies: u32,
    pub metrics: EconomicMetrics,
    /// Epoch ms.
    pub tripped_at: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResetReport {
    pub reason: String,
    pub downtime_ms: i64,
}

struct BreakerInner {
    state: BreakerState,
    consecutive_anomalies: u32,
    blocked: HashSet<OperationClass>,
    tripped_at: Option<i64>,
    last_trip: Option<TripReason>,
}

/// Process-wide safety controller. Every operation class calls `guard`
/// before doing anything; only internal transitions mutate the state.
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: RwLock<BreakerInner>,
    trips_tx: broadcast::Sender<TripReport>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        let (trips_tx, _) = broadcast::channel(16);
        CircuitBreaker {
            config,
            inner: RwLock::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_anomalies: 0,
                blocked: HashSet::new(),
                tripped_at: None,
                last_trip: None,
            }),
            trips_tx,
        }
    }

    pub async fn state(&self) -> BreakerState {
        self.inner.read().await.state
    }

    pub async fn last_trip(&self) -> Option<TripReason> {
        self.inner.read().await.last_trip.clone()
    }

    /// Fail fast if this operation class is currently halted. HalfOpen lets
    /// probe operations through; reads are never guarded.
    pub async fn guard(&self, class: OperationClass) -> LedgerResult<()> {
        let inner = self.inner.read().await;
        if inner.blocked.contains(&class) {
            return Err(LedgerError::CircuitBreakerBlocked {
                class,
                state: inner.state,
            });
        }
        Ok(())
    }

    pub fn subscribe_trips(&self) -> broadcast::Receiver<TripReport> {
        self.trips_tx.subscribe()
    }

    /// First threshold the metrics breach, in severity order.
    fn classify(&self, m: &EconomicMetrics) -> Option<TripReason> {
        if m.treasury_balance.is_negative() {
            return Some(TripReason::NegativeTreasury {
                balance: m.treasury_balance,
            });
        }
        if m.inflation > self.config.max_inflation {
            return Some(TripReason::Hyperinflation {
                inflation: m.inflation,
            });
        }
        if m.supply_change_24h.abs() > self.config.max_supply_change {
            return Some(TripReason::SupplyAnomaly {
                supply_change_24h: m.supply_change_24h,
            });
        }
        if m.default_rate > self.config.max_default_rate {
            return Some(TripReason::MassDefault {
                default_rate: m.default_rate,
            });
        }
        if m.gini > self.config.max_gini {
            return Some(TripReason::ExtremeConcentration { gini: m.gini });
        }
        None
    }

    /// Feed one metrics snapshot. Returns a report when this check tripped
    /// the breaker. A clean check resets the anomaly counter, and closes a
    /// HalfOpen breaker.
    pub async fn check(&self, metrics: &EconomicMetrics) -> Option<TripReport> {
        let mut inner = self.inner.write().await;

        let Some(reason) = self.classify(metrics) else {
            inner.consecutive_anomalies = 0;
            if inner.state == BreakerState::HalfOpen {
                inner.state = BreakerState::Closed;
                inner.blocked.clear();
                inner.tripped_at = None;
                eprintln!("[breaker] half-open probe clean, closing");
            }
            return None;
        };

        if inner.state == BreakerState::Open {
            // Already halted; nothing more to trip.
            inner.consecutive_anomalies += 1;
            return None;
        }

        inner.consecutive_anomalies += 1;
        // A HalfOpen breaker exists to test recovery: one anomaly re-opens.
        let threshold = match inner.state {
            BreakerState::HalfOpen => 1,
            _ => self.config.anomaly_threshold,
        };
        if inner.consecutive_anomalies < threshold {
            return None;
        }

        let report = TripReport {
            reason: reason.clone(),
            consecutive_anomalies: inner.consecutive_anomalies,
            metrics: metrics.clone(),
            tripped_at: Utc::now().timestamp_millis(),
        };
        Self::open(&mut inner, reason, report.tripped_at);
        eprintln!("[breaker] tripped: {}", report.reason);
        let _ = self.trips_tx.send(report.clone());
        Some(report)
    }

    /// Operator-initiated halt.
    pub async fn trip_manual(&self, note: &str, metrics: EconomicMetrics) -> TripReport {
        let mut inner = self.inner.write().await;
        let reason = TripReason::Manual {
            note: note.to_string(),
        };
        let report = TripReport {
            reason: reason.clone(),
            consecutive_anomalies: inner.consecutive_anomalies,
            metrics,
            tripped_at: Utc::now().timestamp_millis(),
        };
        Self::open(&mut inner, reason, report.tripped_at);
        eprintln!("[breaker] manual trip: {note}");
        let _ = self.trips_tx.send(report.clone());
        report
    }

    fn open(inner: &mut BreakerInner, reason: TripReason, at: i64) {
        inner.state = BreakerState::Open;
        inner.blocked = OperationClass::ALL.into_iter().collect();
        inner.tripped_at = Some(at);
        inner.last_trip = Some(reason);
    }

    /// Operator-gated partial reset: allow probe traffic without declaring
    /// recovery. No-op unless the breaker is Open.
    pub async fn half_open(&self) -> bool {
        let mut inner = self.inner.write().await;
        if inner.state != BreakerState::Open {
            return false;
        }
        inner.state = BreakerState::HalfOpen;
        inner.blocked.clear();
        inner.consecutive_anomalies = 0;
        eprintln!("[breaker] half-open: probe traffic allowed");
        true
    }

    /// Full manual reset: back to Closed, all operations restored.
    pub async fn reset(&self, reason: &str) -> ResetReport {
        let mut inner = self.inner.write().await;
        let now = Utc::now().timestamp_millis();
        let downtime_ms = inner.tripped_at.map(|t| now - t).unwrap_or(0);
        inner.state = BreakerState::Closed;
        inner.blocked.clear();
        inner.consecutive_anomalies = 0;
        inner.tripped_at = None;
        eprintln!("[breaker] reset after {downtime_ms}ms: {reason}");
        ResetReport {
            reason: reason.to_string(),
            downtime_ms,
        }
    }
}
