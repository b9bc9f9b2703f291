use std::convert::Infallible;

use axum::extract::{Query, State};
use axum::response::sse::{Event as SseEvent, Sse};
use serde::Deserialize;
use tokio_stream::{Stream, StreamExt};

use crate::api::state::AppState;
use crate::model::event::AggregateType;
use crate::store::subscribe::EventFilter;

#[derive(Debug, Default, Deserialize)]
pub struct SubscribeParams {
    /// Comma-separated event types.
    pub types: Option<String>,
    /// Comma-separated aggregate types.
    pub aggregates: Option<String>,
    pub correlation_id: Option<String>,
}

/// Live event stream. Delivery is append-order; a subscriber that lags
/// behind the queue sees a lag marker instead of the dropped events.
pub async fn event_stream(
    State(state): State<AppState>,
    Query(params): Query<SubscribeParams>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let filter = EventFilter {
        event_types: split_list(params.types.as_deref()),
        aggregate_types: split_list(params.aggregates.as_deref())
            .iter()
            .filter_map(|s| s.parse::<AggregateType>().ok())
            .collect(),
        aggregate_ids: Vec::new(),
        correlation_id: params.correlation_id,
    };

    let stream = state.ledger.store.subscribe(filter).map(|message| {
        let json = serde_json::to_string(&message).unwrap_or_default();
        Ok::<_, Infallible>(SseEvent::default().data(json))
    });

    Sse::new(stream)
}

fn split_list(raw: Option<&str>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
