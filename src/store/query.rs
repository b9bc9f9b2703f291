use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::event::{ActorRef, AggregateType, Event};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    #[default]
    Sequence,
    Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Actor filter: by shape, by entity id, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ActorFilter {
    /// "entity", "system", or "anonymous".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl ActorFilter {
    fn matches(&self, actor: &ActorRef) -> bool {
        if let Some(kind) = &self.kind {
            let actual = match actor {
                ActorRef::Entity { .. } => "entity",
                ActorRef::System { .. } => "system",
                ActorRef::Anonymous => "anonymous",
            };
            if actual != kind {
                return false;
            }
        }
        if let Some(entity_id) = &self.entity_id {
            if actor.entity_id() != Some(entity_id.as_str()) {
                return false;
            }
        }
        true
    }
}

/// Declarative event query: every populated field narrows the result.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct QueryCriteria {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregate_types: Vec<AggregateType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregate_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<ActorFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_sequence: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_sequence: Option<u64>,
    #[serde(default)]
    pub order_by: OrderBy,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub offset: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl QueryCriteria {
    pub fn correlated(correlation_id: impl Into<String>) -> Self {
        QueryCriteria {
            correlation_id: Some(correlation_id.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, event: &Event) -> bool {
        if !self.event_types.is_empty()
            && !self.event_types.iter().any(|t| t == &event.event_type)
        {
            return false;
        }
        if !self.aggregate_types.is_empty()
            && !self.aggregate_types.contains(&event.aggregate_type)
        {
            return false;
        }
        if !self.aggregate_ids.is_empty()
            && !self.aggregate_ids.iter().any(|id| id == &event.aggregate_id)
        {
            return false;
        }
        if let Some(actor) = &self.actor {
            if !actor.matches(&event.actor) {
                return false;
            }
        }
        if let Some(correlation_id) = &self.correlation_id {
            if event.correlation_id() != Some(correlation_id.as_str()) {
                return false;
            }
        }
        if let Some(from) = self.from_timestamp {
            if event.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to_timestamp {
            if event.timestamp > to {
                return false;
            }
        }
        if let Some(from) = self.from_sequence {
            if event.sequence < from {
                return false;
            }
        }
        if let Some(to) = self.to_sequence {
            if event.sequence > to {
                return false;
            }
        }
        true
    }
}

/// One page of query results.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct QueryPage {
    pub events: Vec<Event>,
    /// Matching events before pagination.
    pub total: usize,
    pub has_more: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<usize>,
}

/// Version/timestamp bounds for aggregate reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    pub from_version: Option<u32>,
    pub to_version: Option<u32>,
    pub from_timestamp: Option<i64>,
    pub to_timestamp: Option<i64>,
    pub limit: Option<usize>,
}

impl ReadOptions {
    pub fn up_to_version(version: u32) -> Self {
        ReadOptions {
            to_version: Some(version),
            ..Default::default()
        }
    }

    pub fn up_to_timestamp(timestamp: i64) -> Self {
        ReadOptions {
            to_timestamp: Some(timestamp),
            ..Default::default()
        }
    }

    pub fn retains(&self, event: &Event) -> bool {
        if let Some(from) = self.from_version {
            if event.aggregate_version < from {
                return false;
            }
        }
        if let Some(to) = self.to_version {
            if event.aggregate_version > to {
                return false;
            }
        }
        if let Some(from) = self.from_timestamp {
            if event.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to_timestamp {
            if event.timestamp > to {
                return false;
            }
        }
        true
    }
}
