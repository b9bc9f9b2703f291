use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event::{ActorRef, Event};

/// A caller-supplied command. One endpoint accepts every intent; the
/// `intent` string selects the operation and `payload` carries its inputs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Intent {
    pub intent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub realm: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<ActorRef>,
    #[serde(default)]
    pub payload: Value,
    /// Epoch milliseconds; stamped server-side if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// What an intent did, structurally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Outcome {
    Created {
        id: String,
        entity: String,
    },
    Transferred {
        from: String,
        to: String,
        item_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        quantity: Option<i64>,
    },
    Transitioned {
        id: String,
        status: String,
    },
    Nothing,
}

/// A follow-up operation the caller could take from here.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Affordance {
    pub intent: String,
    pub description: String,
    pub required: Vec<String>,
}

impl Affordance {
    pub fn new(intent: &str, description: &str, required: &[&str]) -> Self {
        Affordance {
            intent: intent.to_string(),
            description: description.to_string(),
            required: required.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Machine-readable failure codes the boundary maps to HTTP statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingIntent,
    IntentError,
    NotFound,
    RateLimited,
    AgentNotReady,
    CircuitBreakerBlocked,
    TemporalViolation,
    VersionConflict,
    PhysicsViolation,
    InsufficientBalance,
    InsufficientTrust,
    InvalidMessage,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IntentError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl IntentError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        IntentError {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IntentMeta {
    /// Epoch milliseconds when processing finished.
    pub processed_at: i64,
    pub processing_time_ms: u64,
}

/// The one response shape every intent returns, success and failure alike.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IntentResult {
    pub success: bool,
    pub outcome: Outcome,
    pub events: Vec<Event>,
    pub affordances: Vec<Affordance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<IntentError>>,
    pub meta: IntentMeta,
}

impl IntentResult {
    pub fn ok(outcome: Outcome, events: Vec<Event>, affordances: Vec<Affordance>) -> Self {
        IntentResult {
            success: true,
            outcome,
            events,
            affordances,
            errors: None,
            meta: IntentMeta {
                processed_at: 0,
                processing_time_ms: 0,
            },
        }
    }

    pub fn failure(errors: Vec<IntentError>) -> Self {
        IntentResult {
            success: false,
            outcome: Outcome::Nothing,
            events: Vec::new(),
            affordances: Vec::new(),
            errors: Some(errors),
            meta: IntentMeta {
                processed_at: 0,
                processing_time_ms: 0,
            },
        }
    }

    pub fn stamped(mut self, processed_at: i64, processing_time_ms: u64) -> Self {
        self.meta = IntentMeta {
            processed_at,
            processing_time_ms,
        };
        self
    }
}
