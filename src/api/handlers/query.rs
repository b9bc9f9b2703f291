use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::state::AppState;
use crate::model::event::AggregateType;
use crate::store::query::{ActorFilter, Direction, OrderBy, QueryCriteria, QueryPage};

#[derive(Debug, Default, Deserialize)]
pub struct QueryParams {
    /// Comma-separated event types.
    pub types: Option<String>,
    /// Comma-separated aggregate types.
    pub aggregates: Option<String>,
    /// Comma-separated aggregate ids.
    pub aggregate_ids: Option<String>,
    pub actor_kind: Option<String>,
    pub actor_entity_id: Option<String>,
    pub correlation_id: Option<String>,
    pub from_timestamp: Option<i64>,
    pub to_timestamp: Option<i64>,
    pub from_sequence: Option<u64>,
    pub to_sequence: Option<u64>,
    pub order_by: Option<String>,
    pub direction: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

pub async fn query_events(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<QueryPage>, ApiError> {
    let actor = if params.actor_kind.is_some() || params.actor_entity_id.is_some() {
        Some(ActorFilter {
            kind: params.actor_kind,
            entity_id: params.actor_entity_id,
        })
    } else {
        None
    };

    let criteria = QueryCriteria {
        event_types: split_list(params.types.as_deref()),
        aggregate_types: split_list(params.aggregates.as_deref())
            .iter()
            .filter_map(|s| s.parse::<AggregateType>().ok())
            .collect(),
        aggregate_ids: split_list(params.aggregate_ids.as_deref()),
        actor,
        correlation_id: params.correlation_id,
        from_timestamp: params.from_timestamp,
        to_timestamp: params.to_timestamp,
        from_sequence: params.from_sequence,
        to_sequence: params.to_sequence,
        order_by: match params.order_by.as_deref() {
            Some("timestamp") => OrderBy::Timestamp,
            _ => OrderBy::Sequence,
        },
        direction: match params.direction.as_deref() {
            Some("desc") => Direction::Desc,
            _ => Direction::Asc,
        },
        offset: params.offset.unwrap_or(0),
        limit: params.limit,
    };

    let page = state.ledger.store.query(criteria).await?;
    Ok(Json(page))
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
