use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::payload::EventPayload;

/// `previous_hash` of the first event in the chain.
pub const GENESIS_HASH: &str = "genesis";

/// Every aggregate kind the ledger records events for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum AggregateType {
    Party,
    Asset,
    Agreement,
    Role,
    Workflow,
    Flow,
    System,
    Realm,
    Container,
    Watcher,
    Shadow,
    Trajectory,
    Session,
}

impl AggregateType {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregateType::Party => "Party",
            AggregateType::Asset => "Asset",
            AggregateType::Agreement => "Agreement",
            AggregateType::Role => "Role",
            AggregateType::Workflow => "Workflow",
            AggregateType::Flow => "Flow",
            AggregateType::System => "System",
            AggregateType::Realm => "Realm",
            AggregateType::Container => "Container",
            AggregateType::Watcher => "Watcher",
            AggregateType::Shadow => "Shadow",
            AggregateType::Trajectory => "Trajectory",
            AggregateType::Session => "Session",
        }
    }
}

impl FromStr for AggregateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Party" => Ok(AggregateType::Party),
            "Asset" => Ok(AggregateType::Asset),
            "Agreement" => Ok(AggregateType::Agreement),
            "Role" => Ok(AggregateType::Role),
            "Workflow" => Ok(AggregateType::Workflow),
            "Flow" => Ok(AggregateType::Flow),
            "System" => Ok(AggregateType::System),
            "Realm" => Ok(AggregateType::Realm),
            "Container" => Ok(AggregateType::Container),
            "Watcher" => Ok(AggregateType::Watcher),
            "Shadow" => Ok(AggregateType::Shadow),
            "Trajectory" => Ok(AggregateType::Trajectory),
            "Session" => Ok(AggregateType::Session),
            other => Err(format!("unknown aggregate type `{other}`")),
        }
    }
}

impl std::fmt::Display for AggregateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The claimed initiator of an event. The ledger records the claim;
/// verification is the boundary's concern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActorRef {
    Entity { id: String },
    System { system_id: String },
    Anonymous,
}

impl ActorRef {
    pub fn entity(id: impl Into<String>) -> Self {
        ActorRef::Entity { id: id.into() }
    }

    pub fn system(system_id: impl Into<String>) -> Self {
        ActorRef::System {
            system_id: system_id.into(),
        }
    }

    /// The entity id if this actor is an entity.
    pub fn entity_id(&self) -> Option<&str> {
        match self {
            ActorRef::Entity { id } => Some(id),
            _ => None,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, ActorRef::System { .. })
    }
}

impl std::fmt::Display for ActorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorRef::Entity { id } => write!(f, "entity:{id}"),
            ActorRef::System { system_id } => write!(f, "system:{system_id}"),
            ActorRef::Anonymous => f.write_str("anonymous"),
        }
    }
}

/// Links an event back to the command/saga/workflow that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Causation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
}

impl Causation {
    pub fn correlated(correlation_id: impl Into<String>) -> Self {
        Causation {
            correlation_id: Some(correlation_id.into()),
            ..Default::default()
        }
    }
}

/// An immutable ledger record. Append-only; never modified or deleted.
///
/// Store accessors return events by value, so callers can never reach the
/// stored representation through what they are handed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Event {
    /// Globally monotonic, gap-free, first event = 1.
    pub sequence: u64,
    pub id: String,
    /// Epoch milliseconds at append; never decreases along the chain.
    pub timestamp: i64,
    /// Tag of the payload variant, duplicated for indexing.
    #[serde(rename = "type")]
    pub event_type: String,
    pub aggregate_type: AggregateType,
    pub aggregate_id: String,
    /// Per-aggregate counter, first = 1, no gaps.
    pub aggregate_version: u32,
    pub payload: EventPayload,
    pub actor: ActorRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub causation: Option<Causation>,
    /// Hash of the previous event, or `"genesis"` for sequence 1.
    pub previous_hash: String,
    pub hash: String,
}

impl Event {
    pub fn correlation_id(&self) -> Option<&str> {
        self.causation
            .as_ref()
            .and_then(|c| c.correlation_id.as_deref())
    }
}

/// What a caller submits; the store stamps sequence, version, timestamp,
/// and hashes at append time.
#[derive(Debug, Clone)]
pub struct EventInput {
    pub aggregate_type: AggregateType,
    pub aggregate_id: String,
    pub payload: EventPayload,
    pub actor: ActorRef,
    pub causation: Option<Causation>,
    /// Caller-supplied timestamp (epoch ms); stamped at append if absent.
    pub timestamp: Option<i64>,
    /// Optimistic concurrency: append fails with a version conflict if the
    /// aggregate has moved past this.
    pub expected_version: Option<u32>,
}

impl EventInput {
    pub fn new(
        aggregate_type: AggregateType,
        aggregate_id: impl Into<String>,
        payload: impl Into<EventPayload>,
        actor: ActorRef,
    ) -> Self {
        EventInput {
            aggregate_type,
            aggregate_id: aggregate_id.into(),
            payload: payload.into(),
            actor,
            causation: None,
            timestamp: None,
            expected_version: None,
        }
    }

    pub fn with_causation(mut self, causation: Causation) -> Self {
        self.causation = Some(causation);
        self
    }

    pub fn correlated(mut self, correlation_id: impl Into<String>) -> Self {
        let causation = self.causation.get_or_insert_with(Causation::default);
        causation.correlation_id = Some(correlation_id.into());
        self
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn expecting_version(mut self, version: u32) -> Self {
        self.expected_version = Some(version);
        self
    }
}
