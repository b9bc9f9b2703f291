use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    Active,
    GracePeriod,
    Delinquent,
    Defaulted,
    PaidOff,
    Forgiven,
}

impl LoanStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoanStatus::PaidOff | LoanStatus::Forgiven | LoanStatus::Defaulted
        )
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LoanStatus::Active => "active",
            LoanStatus::GracePeriod => "grace_period",
            LoanStatus::Delinquent => "delinquent",
            LoanStatus::Defaulted => "defaulted",
            LoanStatus::PaidOff => "paid_off",
            LoanStatus::Forgiven => "forgiven",
        };
        f.write_str(s)
    }
}

/// Where repayment money came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RepaymentSource {
    /// Automatic garnishment of the borrower's earnings.
    Earnings,
    Manual,
    /// Guarantee-fund or guarantor bailout.
    Bailout,
}

impl std::str::FromStr for RepaymentSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "earnings" => Ok(RepaymentSource::Earnings),
            "manual" => Ok(RepaymentSource::Manual),
            "bailout" => Ok(RepaymentSource::Bailout),
            other => Err(format!("unknown repayment source `{other}`")),
        }
    }
}
