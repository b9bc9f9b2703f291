use std::borrow::Cow;

use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::container::{ContainerItem, ContainerType, Physics, TransferInfo};
use super::credits::Credits;
use super::economy::{EconomicMetrics, FundClaim, RateBand, TripReason};
use super::loan::RepaymentSource;
use super::trajectory::TrajectorySpan;

/// Every event kind the ledger understands, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Payload {
    // ── Agreements & entities ───────────────────────────────────────
    AgreementProposed {
        title: String,
        terms: Value,
        proposer_id: String,
    },
    AgreementStatusChanged {
        status: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    EntityCreated {
        name: String,
        role: String,
    },

    // ── Containers ──────────────────────────────────────────────────
    ContainerCreated {
        name: String,
        container_type: ContainerType,
        physics: Physics,
        owner_id: String,
        realm_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parent_container_id: Option<String>,
        governance_agreement_id: String,
    },
    ContainerItemDeposited {
        item: ContainerItem,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<TransferInfo>,
    },
    ContainerItemWithdrawn {
        item_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quantity: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<TransferInfo>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    // ── Wallets & credits ───────────────────────────────────────────
    WalletCreated {
        owner_id: String,
        currency: String,
        /// Whether the wallet's rules allow a negative balance.
        #[serde(default)]
        allow_negative: bool,
    },
    CreditsMinted {
        amount: Credits,
        /// Agreement authorizing the supply change, recorded for audit.
        agreement_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    CreditsBurned {
        amount: Credits,
        agreement_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    CreditsDeposited {
        amount: Credits,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    CreditsWithdrawn {
        amount: Credits,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        destination: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    // ── Loans ───────────────────────────────────────────────────────
    LoanDisbursed {
        loan_id: String,
        borrower_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        guarantor_id: Option<String>,
        principal: Credits,
        /// APR as a fraction (0.05 = 5%).
        interest_rate: f64,
        /// Fraction of earnings garnished per period.
        repayment_rate: f64,
        /// Epoch ms after which repayment is expected.
        grace_period_end: i64,
    },
    InterestAccrued {
        loan_id: String,
        amount: Credits,
    },
    LoanRepayment {
        loan_id: String,
        amount: Credits,
        source: RepaymentSource,
    },
    LoanDelinquent {
        loan_id: String,
        missed_payments: u32,
        days_past_due: u32,
    },
    LoanDefaulted {
        loan_id: String,
        reason: String,
    },
    LoanForgiven {
        loan_id: String,
        amount: Credits,
        reason: String,
    },
    LoanPaidOff {
        loan_id: String,
    },

    // ── Monetary policy ─────────────────────────────────────────────
    InterestRateAdjusted {
        previous_rate: f64,
        new_rate: f64,
        band: RateBand,
    },
    MacroeconomicBandChanged {
        previous_band: RateBand,
        band: RateBand,
        inflation: f64,
    },

    // ── Circuit breaker & guarantee fund ────────────────────────────
    CircuitBreakerTripped {
        reason: TripReason,
        consecutive_anomalies: u32,
        metrics: EconomicMetrics,
    },
    CircuitBreakerReset {
        reason: String,
        downtime_ms: i64,
    },
    GuaranteeFundContribution {
        amount: Credits,
        source_wallet: String,
    },
    GuaranteeFundDistribution {
        claims: Vec<FundClaim>,
        total_eligible: Credits,
        total_paid: Credits,
        coverage_ratio: f64,
        fund_before: Credits,
        fund_after: Credits,
    },

    // ── Trajectories & shadows ──────────────────────────────────────
    TrajectorySpanRecorded {
        span: TrajectorySpan,
    },
    ShadowPromoted {
        entity_id: String,
    },
}

impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::AgreementProposed { .. } => "AgreementProposed",
            Payload::AgreementStatusChanged { .. } => "AgreementStatusChanged",
            Payload::EntityCreated { .. } => "EntityCreated",
            Payload::ContainerCreated { .. } => "ContainerCreated",
            Payload::ContainerItemDeposited { .. } => "ContainerItemDeposited",
            Payload::ContainerItemWithdrawn { .. } => "ContainerItemWithdrawn",
            Payload::WalletCreated { .. } => "WalletCreated",
            Payload::CreditsMinted { .. } => "CreditsMinted",
            Payload::CreditsBurned { .. } => "CreditsBurned",
            Payload::CreditsDeposited { .. } => "CreditsDeposited",
            Payload::CreditsWithdrawn { .. } => "CreditsWithdrawn",
            Payload::LoanDisbursed { .. } => "LoanDisbursed",
            Payload::InterestAccrued { .. } => "InterestAccrued",
            Payload::LoanRepayment { .. } => "LoanRepayment",
            Payload::LoanDelinquent { .. } => "LoanDelinquent",
            Payload::LoanDefaulted { .. } => "LoanDefaulted",
            Payload::LoanForgiven { .. } => "LoanForgiven",
            Payload::LoanPaidOff { .. } => "LoanPaidOff",
            Payload::InterestRateAdjusted { .. } => "InterestRateAdjusted",
            Payload::MacroeconomicBandChanged { .. } => "MacroeconomicBandChanged",
            Payload::CircuitBreakerTripped { .. } => "CircuitBreakerTripped",
            Payload::CircuitBreakerReset { .. } => "CircuitBreakerReset",
            Payload::GuaranteeFundContribution { .. } => "GuaranteeFundContribution",
            Payload::GuaranteeFundDistribution { .. } => "GuaranteeFundDistribution",
            Payload::TrajectorySpanRecorded { .. } => "TrajectorySpanRecorded",
            Payload::ShadowPromoted { .. } => "ShadowPromoted",
        }
    }
}

/// A stored payload: either a kind this build understands, or a record
/// written by a newer build, carried opaquely so older stores replay clean.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    Known(Payload),
    Unknown { event_type: String, raw: Value },
}

impl EventPayload {
    /// The `type` tag of this payload.
    pub fn kind(&self) -> &str {
        match self {
            EventPayload::Known(p) => p.kind(),
            EventPayload::Unknown { event_type, .. } => event_type,
        }
    }

    /// Decode a raw JSON payload, falling back to `Unknown` on kinds this
    /// build does not recognize.
    pub fn decode(raw: Value) -> Self {
        match serde_json::from_value::<Payload>(raw.clone()) {
            Ok(p) => EventPayload::Known(p),
            Err(_) => {
                let event_type = raw
                    .get("type")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown")
                    .to_string();
                EventPayload::Unknown { event_type, raw }
            }
        }
    }

    pub fn as_known(&self) -> Option<&Payload> {
        match self {
            EventPayload::Known(p) => Some(p),
            EventPayload::Unknown { .. } => None,
        }
    }
}

impl From<Payload> for EventPayload {
    fn from(p: Payload) -> Self {
        EventPayload::Known(p)
    }
}

impl Serialize for EventPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EventPayload::Known(p) => p.serialize(serializer),
            // Unknown payloads are written back exactly as stored.
            EventPayload::Unknown { raw, .. } => raw.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for EventPayload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        Ok(EventPayload::decode(raw))
    }
}

impl JsonSchema for EventPayload {
    fn schema_name() -> Cow<'static, str> {
        Cow::Borrowed("EventPayload")
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        // The wire schema is the known-payload sum; unknown payloads are a
        // runtime tolerance, not part of the contract.
        Payload::json_schema(generator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_known_kind() {
        let raw = serde_json::json!({
            "type": "LoanPaidOff",
            "loan_id": "loan-1",
        });
        let p = EventPayload::decode(raw);
        assert_eq!(p.kind(), "LoanPaidOff");
        assert!(matches!(
            p,
            EventPayload::Known(Payload::LoanPaidOff { .. })
        ));
    }

    #[test]
    fn unknown_kind_survives_round_trip() {
        let raw = serde_json::json!({
            "type": "QuantumEntangled",
            "qubits": 7,
        });
        let p = EventPayload::decode(raw.clone());
        assert_eq!(p.kind(), "QuantumEntangled");
        let back = serde_json::to_value(&p).unwrap();
        assert_eq!(back, raw);
    }
}
