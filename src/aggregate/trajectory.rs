use std::collections::HashMap;

use serde::Serialize;

use crate::model::credits::Credits;
use crate::model::event::{AggregateType, Event};
use crate::model::payload::{EventPayload, Payload};
use crate::model::trajectory::TrajectorySpan;

use super::Rehydrator;

/// An entity's identity-through-action: the fold of everything it has done.
#[derive(Debug, Clone, Serialize)]
pub struct TrajectoryState {
    pub entity_id: String,
    /// Spans in arrival order.
    pub spans: Vec<TrajectorySpan>,
    pub total_spans: u64,
    pub total_cost: Credits,
    pub total_tokens: u64,
    pub total_duration_ms: u64,
    pub action_counts: HashMap<String, u64>,
    pub success_count: u64,
    pub first_action_at: Option<i64>,
    pub last_action_at: Option<i64>,
    pub version: u64,
}

impl TrajectoryState {
    pub fn success_rate(&self) -> f64 {
        if self.total_spans == 0 {
            return 0.0;
        }
        self.success_count as f64 / self.total_spans as f64
    }
}

pub struct TrajectoryRehydrator;

impl Rehydrator for TrajectoryRehydrator {
    type State = TrajectoryState;

    const AGGREGATE: AggregateType = AggregateType::Trajectory;

    fn initial(id: &str) -> TrajectoryState {
        TrajectoryState {
            entity_id: id.to_string(),
            spans: Vec::new(),
            total_spans: 0,
            total_cost: Credits::ZERO,
            total_tokens: 0,
            total_duration_ms: 0,
            action_counts: HashMap::new(),
            success_count: 0,
            first_action_at: None,
            last_action_at: None,
            version: 0,
        }
    }

    fn apply(state: &mut TrajectoryState, event: &Event) {
        let EventPayload::Known(Payload::TrajectorySpanRecorded { span }) = &event.payload else {
            return;
        };
        state.total_spans += 1;
        state.total_cost = state.total_cost + span.cost;
        state.total_tokens += span.tokens;
        state.total_duration_ms += span.duration_ms;
        *state.action_counts.entry(span.action.clone()).or_insert(0) += 1;
        if span.success {
            state.success_count += 1;
        }
        if state.first_action_at.is_none() {
            state.first_action_at = Some(span.started_at);
        }
        state.last_action_at = Some(span.started_at);
        state.spans.push(span.clone());
        state.version += 1;
    }
}
