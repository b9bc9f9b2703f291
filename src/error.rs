use thiserror::Error;

use crate::model::economy::{BreakerState, OperationClass};
use crate::model::credits::Credits;

/// Core ledger failures. Invariant breakages refuse the offending operation;
/// domain errors are recoverable and leave the store untouched.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("temporal violation at sequence {sequence}: {detail}")]
    TemporalViolation { sequence: u64, detail: String },

    #[error("hash chain broken at sequence {sequence}: {reason}")]
    ChainBroken { sequence: u64, reason: String },

    #[error(
        "version conflict on {aggregate_id}: expected version {expected}, aggregate is at {actual}"
    )]
    VersionConflict {
        aggregate_id: String,
        expected: u32,
        actual: u32,
    },

    #[error("physics violation on container {container_id}: {detail}")]
    PhysicsViolation {
        container_id: String,
        detail: String,
    },

    #[error("insufficient balance in {wallet_id}: have {have}, need {need}")]
    InsufficientBalance {
        wallet_id: String,
        have: Credits,
        need: Credits,
    },

    #[error("insufficient quantity of `{item_id}` in {container_id}: have {have}, need {need}")]
    InsufficientQuantity {
        container_id: String,
        item_id: String,
        have: i64,
        need: i64,
    },

    #[error("{class} halted: circuit breaker is {state}")]
    CircuitBreakerBlocked {
        class: OperationClass,
        state: BreakerState,
    },

    #[error("transaction {transaction_id} rolled back after step `{failed_step}`: {reason}")]
    TransactionRolledBack {
        transaction_id: String,
        failed_step: String,
        reason: String,
    },

    #[error("guarantee fund below minimum: {balance} < {minimum}")]
    InsufficientFund { balance: Credits, minimum: Credits },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{kind} `{id}` not found")]
    NotFound { kind: &'static str, id: String },

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
