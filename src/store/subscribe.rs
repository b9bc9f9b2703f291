use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::Stream;

use crate::model::event::{AggregateType, Event};

/// What a subscriber wants to see. Empty filter = everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct EventFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregate_types: Vec<AggregateType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aggregate_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl EventFilter {
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
        if let Some(correlation_id) = &self.correlation_id {
            if event.correlation_id() != Some(correlation_id.as_str()) {
                return false;
            }
        }
        true
    }
}

/// What a subscription yields. A subscriber that falls behind the bounded
/// queue loses the oldest pending events (drop-oldest policy) and sees an
/// explicit `Lagged` marker instead of blocking the append path.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SubscriptionMessage {
    Event(Event),
    Lagged { missed: u64 },
}

/// Turn a broadcast receiver into a filtered, cancellable stream. Delivery
/// is append-order; a subscription started at time T sees only events
/// appended after T. Dropping the stream releases the receiver.
pub fn subscription_stream(
    mut rx: broadcast::Receiver<Event>,
    filter: EventFilter,
) -> impl Stream<Item = SubscriptionMessage> {
    async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if filter.matches(&event) {
                        yield SubscriptionMessage::Event(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    yield SubscriptionMessage::Lagged { missed };
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
