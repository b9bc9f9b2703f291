use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::model::event::ActorRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStatus {
    Pending,
    Executing,
    Committed,
    Compensating,
    RolledBack,
    Failed,
}

/// Shared state threaded through a transaction's steps. Every event a step
/// appends must carry `correlation_id`, so the whole atomic operation can be
/// reassembled later with a correlation query.
pub struct SagaContext {
    pub transaction_id: String,
    pub correlation_id: String,
    /// Epoch ms when the transaction was created.
    pub started_at: i64,
    /// The claimed initiator, passed through to every appended event.
    pub actor: ActorRef,
    pub metadata: Value,
    results: HashMap<String, Value>,
}

impl SagaContext {
    /// Result recorded by an earlier step, by step name.
    pub fn result(&self, step: &str) -> Option<&Value> {
        self.results.get(step)
    }
}

/// One step of an intent transaction.
///
/// Compensation is logical reversal: appended events are immutable, so a
/// compensating step emits an opposing event rather than deleting anything.
/// Steps that only append may keep the default no-op compensation; the
/// audit trail stays honest either way.
#[async_trait]
pub trait SagaStep: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, ctx: &mut SagaContext) -> LedgerResult<Value>;

    async fn compensate(&self, _ctx: &SagaContext, _result: &Value) -> LedgerResult<()> {
        Ok(())
    }
}

/// A compensation that itself failed. Recorded, never fatal: the rollback
/// continues through the remaining steps.
#[derive(Debug, Clone, Serialize)]
pub struct CompensationFailure {
    pub step: String,
    pub error: String,
}

/// Outcome of a completed (committed or unwound) transaction.
#[derive(Debug, Serialize)]
pub struct SagaReport {
    pub transaction_id: String,
    pub correlation_id: String,
    pub status: SagaStatus,
    pub completed_steps: Vec<String>,
    pub failed_step: Option<String>,
    pub error: Option<String>,
    pub compensation_failures: Vec<CompensationFailure>,
    pub results: HashMap<String, Value>,
}

impl SagaReport {
    pub fn committed(&self) -> bool {
        self.status == SagaStatus::Committed
    }

    /// Collapse a failed report into the caller-facing error.
    pub fn into_error(self) -> LedgerError {
        LedgerError::TransactionRolledBack {
            transaction_id: self.transaction_id,
            failed_step: self.failed_step.unwrap_or_default(),
            reason: self.error.unwrap_or_default(),
        }
    }
}

/// An ordered multi-step operation with compensating rollback.
///
/// `execute` consumes the transaction, so a terminal transaction cannot be
/// re-run; build a new one instead.
pub struct IntentTransaction {
    ctx: SagaContext,
    steps: Vec<Box<dyn SagaStep>>,
}

impl IntentTransaction {
    pub fn new(actor: ActorRef) -> Self {
        let correlation_id = Uuid::new_v4().to_string();
        Self::with_correlation(actor, correlation_id)
    }

    pub fn with_correlation(actor: ActorRef, correlation_id: String) -> Self {
        IntentTransaction {
            ctx: SagaContext {
                transaction_id: Uuid::new_v4().to_string(),
                correlation_id,
                started_at: Utc::now().timestamp_millis(),
                actor,
                metadata: Value::Null,
                results: HashMap::new(),
            },
            steps: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.ctx.metadata = metadata;
        self
    }

    pub fn step(mut self, step: impl SagaStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn correlation_id(&self) -> &str {
        &self.ctx.correlation_id
    }

    /// Run all steps in order. On the first failure, compensate completed
    /// steps in reverse order; compensation failures are recorded but do
    /// not stop the rollback.
    pub async fn execute(mut self) -> SagaReport {
        let mut completed: Vec<usize> = Vec::new();
        let mut failed_step = None;
        let mut error = None;

        for (i, step) in self.steps.iter().enumerate() {
            match step.execute(&mut self.ctx).await {
                Ok(result) => {
                    self.ctx.results.insert(step.name().to_string(), result);
                    completed.push(i);
                }
                Err(err) => {
                    failed_step = Some(step.name().to_string());
                    error = Some(err.to_string());
                    break;
                }
            }
        }

        let completed_names: Vec<String> = completed
            .iter()
            .map(|&i| self.steps[i].name().to_string())
            .collect();

        if failed_step.is_none() {
            return SagaReport {
                transaction_id: self.ctx.transaction_id.clone(),
                correlation_id: self.ctx.correlation_id.clone(),
                status: SagaStatus::Committed,
                completed_steps: completed_names,
                failed_step: None,
                error: None,
                compensation_failures: Vec::new(),
                results: self.ctx.results,
            };
        }

        let mut compensation_failures = Vec::new();
        for &i in completed.iter().rev() {
            let step = &self.steps[i];
            let result = self
                .ctx
                .results
                .get(step.name())
                .cloned()
                .unwrap_or(Value::Null);
            if let Err(err) = step.compensate(&self.ctx, &result).await {
                eprintln!(
                    "[saga] compensation for step `{}` failed: {err}",
                    step.name()
                );
                compensation_failures.push(CompensationFailure {
                    step: step.name().to_string(),
                    error: err.to_string(),
                });
            }
        }

        let status = if compensation_failures.is_empty() {
            SagaStatus::RolledBack
        } else {
            SagaStatus::Failed
        };

        SagaReport {
            transaction_id: self.ctx.transaction_id.clone(),
            correlation_id: self.ctx.correlation_id.clone(),
            status,
            completed_steps: completed_names,
            failed_step,
            error,
            compensation_failures,
            results: self.ctx.results,
        }
    }
}
