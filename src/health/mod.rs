use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;
use crate::model::credits::Credits;
use crate::model::economy::EconomicMetrics;
use crate::model::event::{ActorRef, Event};
use crate::model::loan::LoanStatus;
use crate::model::payload::Payload;
use crate::store::EventStore;

/// Wallet id conventionally held by the treasury system actor.
pub const TREASURY_WALLET_ID: &str = "treasury";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Critical,
}

/// One threshold breach, with the corrective action it suggests. Actions
/// that imply a policy change are flagged `requires_approval`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Alert {
    pub severity: Severity,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub action: String,
    pub requires_approval: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MonetaryKpis {
    pub total_minted: Credits,
    pub total_burned: Credits,
    pub circulating_supply: Credits,
    /// Supply growth over the window, as a fraction of the starting supply.
    pub inflation: f64,
    /// Net supply change over the last 24h relative to the earlier supply.
    pub supply_change_24h: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransactionKpis {
    pub period_count: u64,
    pub period_volume: Credits,
    /// period volume / circulating supply.
    pub velocity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoanKpis {
    pub total_disbursed: Credits,
    pub total_count: u64,
    pub active_count: u64,
    pub outstanding_principal: Credits,
    pub default_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DistributionKpis {
    pub wallet_count: u64,
    pub gini: f64,
    pub top_decile_share: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentKpis {
    pub registered: u64,
    /// Entities that acted within the window.
    pub active: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct HealthReport {
    pub computed_at: i64,
    pub monetary: MonetaryKpis,
    pub transactions: TransactionKpis,
    pub loans: LoanKpis,
    pub distribution: DistributionKpis,
    pub agents: AgentKpis,
    pub treasury_balance: Credits,
    pub level: HealthLevel,
    pub alerts: Vec<Alert>,
}

impl HealthReport {
    /// The snapshot shape the circuit breaker consumes.
    pub fn metrics(&self) -> EconomicMetrics {
        EconomicMetrics {
            inflation: self.monetary.inflation,
            supply_change_24h: self.monetary.supply_change_24h,
            default_rate: self.loans.default_rate,
            treasury_balance: self.treasury_balance,
            gini: self.distribution.gini,
            circulating_supply: self.monetary.circulating_supply,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthThresholds {
    pub inflation_warning: f64,
    pub inflation_critical: f64,
    pub default_rate_warning: f64,
    pub default_rate_critical: f64,
    pub gini_warning: f64,
    pub gini_critical: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        HealthThresholds {
            inflation_warning: 0.10,
            inflation_critical: 0.50,
            default_rate_warning: 0.20,
            default_rate_critical: 0.50,
            gini_warning: 0.80,
            gini_critical: 0.95,
        }
    }
}

/// Periodically folds the event stream into KPIs and an overall level;
/// the resulting metrics snapshot feeds the circuit breaker.
pub struct HealthMonitor {
    store: Arc<EventStore>,
    thresholds: HealthThresholds,
    /// Inflation/velocity window, ms.
    window_ms: i64,
}

const DAY_MS: i64 = 86_400_000;

impl HealthMonitor {
    pub fn new(store: Arc<EventStore>, thresholds: HealthThresholds, window_ms: i64) -> Self {
        HealthMonitor {
            store,
            thresholds,
            window_ms,
        }
    }

    pub async fn compute(&self) -> LedgerResult<HealthReport> {
        let now = Utc::now().timestamp_millis();
        let events = self.store.get_by_sequence(1, None).await?;
        Ok(self.fold(&events, now))
    }

    fn fold(&self, events: &[Event], now: i64) -> HealthReport {
        let window_start = now - self.window_ms;
        let day_start = now - DAY_MS;

        let mut total_minted = Credits::ZERO;
        let mut total_burned = Credits::ZERO;
        let mut net_window = Credits::ZERO;
        let mut net_24h = Credits::ZERO;

        let mut period_count = 0u64;
        let mut period_volume = Credits::ZERO;

        let mut loans_disbursed = Credits::ZERO;
        let mut loan_status: HashMap<String, LoanStatus> = HashMap::new();
        let mut loan_principals: HashMap<String, Credits> = HashMap::new();
        let mut loan_paid: HashMap<String, Credits> = HashMap::new();

        let mut wallet_balances: HashMap<String, Credits> = HashMap::new();
        let mut wallet_ids: HashSet<String> = HashSet::new();

        let mut registered = 0u64;
        let mut active: HashSet<String> = HashSet::new();

        for event in events {
            if event.timestamp >= window_start {
                if let ActorRef::Entity { id } = &event.actor {
                    active.insert(id.clone());
                }
            }
            let Some(payload) = event.payload.as_known() else {
                continue;
            };
            match payload {
                Payload::CreditsMinted { amount, .. } => {
                    total_minted = total_minted + *amount;
                    if event.timestamp >= window_start {
                        net_window = net_window + *amount;
                    }
                    if event.timestamp >= day_start {
                        net_24h = net_24h + *amount;
                    }
                    let balance = wallet_balances
                        .entry(event.aggregate_id.clone())
                        .or_insert(Credits::ZERO);
                    *balance = *balance + *amount;
                }
                Payload::CreditsBurned { amount, .. } => {
                    total_burned = total_burned + *amount;
                    if event.timestamp >= window_start {
                        net_window = net_window - *amount;
                    }
                    if event.timestamp >= day_start {
                        net_24h = net_24h - *amount;
                    }
                    let balance = wallet_balances
                        .entry(event.aggregate_id.clone())
                        .or_insert(Credits::ZERO);
                    *balance = *balance - *amount;
                }
                Payload::CreditsDeposited { amount, .. } => {
                    let balance = wallet_balances
                        .entry(event.aggregate_id.clone())
                        .or_insert(Credits::ZERO);
                    *balance = *balance + *amount;
                }
                Payload::CreditsWithdrawn { amount, .. } => {
                    if event.timestamp >= window_start {
                        period_count += 1;
                        period_volume = period_volume + *amount;
                    }
                    let balance = wallet_balances
                        .entry(event.aggregate_id.clone())
                        .or_insert(Credits::ZERO);
                    *balance = *balance - *amount;
                }
                Payload::WalletCreated { .. } => {
                    wallet_ids.insert(event.aggregate_id.clone());
                }
                Payload::EntityCreated { .. } => {
                    registered += 1;
                }
                Payload::LoanDisbursed {
                    loan_id, principal, ..
                } => {
                    loans_disbursed = loans_disbursed + *principal;
                    loan_status.insert(loan_id.clone(), LoanStatus::GracePeriod);
                    loan_principals.insert(loan_id.clone(), *principal);
                }
                Payload::InterestAccrued { loan_id, amount } => {
                    if let Some(p) = loan_principals.get_mut(loan_id) {
                        *p = *p + *amount;
                    }
                }
                Payload::LoanRepayment { loan_id, amount, .. } => {
                    let paid = loan_paid.entry(loan_id.clone()).or_insert(Credits::ZERO);
                    *paid = *paid + *amount;
                    if let Some(status) = loan_status.get_mut(loan_id) {
                        if !status.is_terminal() {
                            let owed = loan_principals
                                .get(loan_id)
                                .copied()
                                .unwrap_or(Credits::ZERO);
                            *status = if *paid >= owed {
                                LoanStatus::PaidOff
                            } else {
                                LoanStatus::Active
                            };
                        }
                    }
                }
                Payload::LoanDelinquent { loan_id, .. } => {
                    loan_status.insert(loan_id.clone(), LoanStatus::Delinquent);
                }
                Payload::LoanDefaulted { loan_id, .. } => {
                    loan_status.insert(loan_id.clone(), LoanStatus::Defaulted);
                }
                Payload::LoanForgiven { loan_id, .. } => {
                    // Full-state forgiveness tracking lives in the rehydrator;
                    // for KPIs a forgiven loan simply stops being active.
                    loan_status.insert(loan_id.clone(), LoanStatus::Forgiven);
                }
                Payload::LoanPaidOff { loan_id } => {
                    loan_status.insert(loan_id.clone(), LoanStatus::PaidOff);
                }
                _ => {}
            }
        }

        let circulating = total_minted - total_burned;

        let supply_before_window = circulating - net_window;
        let inflation = ratio(net_window, supply_before_window);
        let supply_before_day = circulating - net_24h;
        let supply_change_24h = ratio(net_24h, supply_before_day);

        let velocity = if circulating.is_zero() {
            0.0
        } else {
            period_volume.millis() as f64 / circulating.millis() as f64
        };

        let total_loans = loan_status.len() as u64;
        let defaulted = loan_status
            .values()
            .filter(|s| **s == LoanStatus::Defaulted)
            .count() as u64;
        let active_loans = loan_status
            .values()
            .filter(|s| !s.is_terminal())
            .count() as u64;
        let outstanding: Credits = loan_status
            .iter()
            .filter(|(_, s)| !s.is_terminal())
            .map(|(id, _)| {
                let owed = loan_principals.get(id).copied().unwrap_or(Credits::ZERO);
                let paid = loan_paid.get(id).copied().unwrap_or(Credits::ZERO);
                (owed - paid).clamped()
            })
            .sum();
        let default_rate = if total_loans == 0 {
            0.0
        } else {
            defaulted as f64 / total_loans as f64
        };

        let balances: Vec<Credits> = wallet_ids
            .iter()
            .map(|id| wallet_balances.get(id).copied().unwrap_or(Credits::ZERO))
            .collect();
        let treasury_balance = wallet_balances
            .get(TREASURY_WALLET_ID)
            .copied()
            .unwrap_or(Credits::ZERO);

        let mut report = HealthReport {
            computed_at: now,
            monetary: MonetaryKpis {
                total_minted,
                total_burned,
                circulating_supply: circulating,
                inflation,
                supply_change_24h,
            },
            transactions: TransactionKpis {
                period_count,
                period_volume,
                velocity,
            },
            loans: LoanKpis {
                total_disbursed: loans_disbursed,
                total_count: total_loans,
                active_count: active_loans,
                outstanding_principal: outstanding,
                default_rate,
            },
            distribution: DistributionKpis {
                wallet_count: balances.len() as u64,
                gini: gini(&balances),
                top_decile_share: top_decile_share(&balances),
            },
            agents: AgentKpis {
                registered,
                active: active.len() as u64,
            },
            treasury_balance,
            level: HealthLevel::Healthy,
            alerts: Vec::new(),
        };
        self.assess(&mut report);
        report
    }

    /// Compare KPIs against thresholds; fill alerts and the overall level.
    fn assess(&self, report: &mut HealthReport) {
        let mut alerts = Vec::new();

        grade(
            &mut alerts,
            "inflation",
            report.monetary.inflation,
            self.thresholds.inflation_warning,
            self.thresholds.inflation_critical,
            "tighten monetary policy: raise interest rates",
            true,
        );
        grade(
            &mut alerts,
            "default_rate",
            report.loans.default_rate,
            self.thresholds.default_rate_warning,
            self.thresholds.default_rate_critical,
            "pause loan issuance",
            true,
        );
        grade(
            &mut alerts,
            "gini",
            report.distribution.gini,
            self.thresholds.gini_warning,
            self.thresholds.gini_critical,
            "review fee routing and reward distribution",
            false,
        );
        if report.treasury_balance.is_negative() {
            alerts.push(Alert {
                severity: Severity::Critical,
                metric: "treasury_balance".into(),
                value: report.treasury_balance.millis() as f64,
                threshold: 0.0,
                action: "halt operations and audit the treasury stream".into(),
                requires_approval: false,
            });
        }

        report.level = alerts
            .iter()
            .map(|a| match a.severity {
                Severity::Warning => HealthLevel::Warning,
                Severity::Critical => HealthLevel::Critical,
            })
            .max()
            .unwrap_or(HealthLevel::Healthy);
        report.alerts = alerts;
    }
}

fn ratio(delta: Credits, base: Credits) -> f64 {
    if base <= Credits::ZERO {
        0.0
    } else {
        delta.millis() as f64 / base.millis() as f64
    }
}

fn grade(
    alerts: &mut Vec<Alert>,
    metric: &str,
    value: f64,
    warning: f64,
    critical: f64,
    action: &str,
    requires_approval: bool,
) {
    let severity = if value >= critical {
        Severity::Critical
    } else if value >= warning {
        Severity::Warning
    } else {
        return;
    };
    let threshold = match severity {
        Severity::Critical => critical,
        Severity::Warning => warning,
    };
    alerts.push(Alert {
        severity,
        metric: metric.to_string(),
        value,
        threshold,
        action: action.to_string(),
        requires_approval,
    });
}

/// Gini coefficient over wallet balances:
/// `G = (2·Σ i·b_i) / (n·Σ b_i) − (n+1)/n` on sorted balances, 1-indexed.
/// Empty or all-zero distributions are perfectly equal.
pub fn gini(balances: &[Credits]) -> f64 {
    let n = balances.len();
    if n == 0 {
        return 0.0;
    }
    let mut sorted: Vec<i64> = balances.iter().map(|b| b.millis().max(0)).collect();
    sorted.sort_unstable();
    let total: i128 = sorted.iter().map(|&b| b as i128).sum();
    if total == 0 {
        return 0.0;
    }
    let weighted: i128 = sorted
        .iter()
        .enumerate()
        .map(|(i, &b)| (i as i128 + 1) * b as i128)
        .sum();
    (2.0 * weighted as f64) / (n as f64 * total as f64) - (n as f64 + 1.0) / n as f64
}

/// Share of total balance held by the richest 10% of wallets (at least one).
pub fn top_decile_share(balances: &[Credits]) -> f64 {
    let n = balances.len();
    if n == 0 {
        return 0.0;
    }
    let mut sorted: Vec<i64> = balances.iter().map(|b| b.millis().max(0)).collect();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    let total: i128 = sorted.iter().map(|&b| b as i128).sum();
    if total == 0 {
        return 0.0;
    }
    let top_n = (n / 10).max(1);
    let top: i128 = sorted.iter().take(top_n).map(|&b| b as i128).sum();
    top as f64 / total as f64
}
