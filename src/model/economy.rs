use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::credits::Credits;

/// Operation classes the circuit breaker can halt independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    Transfers,
    Loans,
    Conversions,
    Minting,
    Burning,
    AgentRegistration,
}

impl OperationClass {
    pub const ALL: [OperationClass; 6] = [
        OperationClass::Transfers,
        OperationClass::Loans,
        OperationClass::Conversions,
        OperationClass::Minting,
        OperationClass::Burning,
        OperationClass::AgentRegistration,
    ];
}

impl std::fmt::Display for OperationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationClass::Transfers => "transfers",
            OperationClass::Loans => "loans",
            OperationClass::Conversions => "conversions",
            OperationClass::Minting => "minting",
            OperationClass::Burning => "burning",
            OperationClass::AgentRegistration => "agent_registration",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

/// Why the breaker opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TripReason {
    Hyperinflation { inflation: f64 },
    SupplyAnomaly { supply_change_24h: f64 },
    MassDefault { default_rate: f64 },
    /// Treasury below zero is an impossible state; trip immediately.
    NegativeTreasury { balance: Credits },
    ExtremeConcentration { gini: f64 },
    Manual { note: String },
}

impl std::fmt::Display for TripReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TripReason::Hyperinflation { inflation } => {
                write!(f, "hyperinflation (inflation {inflation:.2})")
            }
            TripReason::SupplyAnomaly { supply_change_24h } => {
                write!(f, "supply anomaly (24h change {supply_change_24h:.2})")
            }
            TripReason::MassDefault { default_rate } => {
                write!(f, "mass default (rate {default_rate:.2})")
            }
            TripReason::NegativeTreasury { balance } => {
                write!(f, "negative treasury ({balance})")
            }
            TripReason::ExtremeConcentration { gini } => {
                write!(f, "extreme concentration (gini {gini:.2})")
            }
            TripReason::Manual { note } => write!(f, "manual: {note}"),
        }
    }
}

/// Macroeconomic snapshot fed to the breaker on every check and embedded in
/// trip events for the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EconomicMetrics {
    pub inflation: f64,
    pub supply_change_24h: f64,
    pub default_rate: f64,
    pub treasury_balance: Credits,
    pub gini: f64,
    pub circulating_supply: Credits,
}

impl EconomicMetrics {
    /// A quiet economy; useful as a baseline in checks and tests.
    pub fn calm(circulating_supply: Credits) -> Self {
        EconomicMetrics {
            inflation: 0.0,
            supply_change_24h: 0.0,
            default_rate: 0.0,
            treasury_balance: Credits::ZERO,
            gini: 0.0,
            circulating_supply,
        }
    }
}

/// Interest/exchange rate bands keyed off inflation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RateBand {
    Low,
    Normal,
    High,
}

impl std::fmt::Display for RateBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RateBand::Low => "low",
            RateBand::Normal => "normal",
            RateBand::High => "high",
        };
        f.write_str(s)
    }
}

/// One entity's share of a guarantee-fund distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FundClaim {
    pub entity_id: String,
    /// Balance the entity held when the distribution was computed.
    pub affected_balance: Credits,
    /// Coverage-capped amount the entity was eligible for.
    pub eligible: Credits,
    /// What was actually paid out.
    pub paid: Credits,
}
