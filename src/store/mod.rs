pub mod backend;
pub mod chain;
pub mod memory;
pub mod query;
pub mod sqlite;
pub mod subscribe;

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, broadcast};
use tokio_stream::Stream;
use uuid::Uuid;

use crate::error::{LedgerError, LedgerResult};
use crate::model::event::{AggregateType, Event, EventInput, GENESIS_HASH};

use backend::EventBackend;
use chain::{ChainReport, compute_hash, validate_temporal, verify_chain};
use memory::MemoryBackend;
use query::{Direction, OrderBy, QueryCriteria, QueryPage, ReadOptions};
use subscribe::{EventFilter, SubscriptionMessage, subscription_stream};

const SUBSCRIBER_QUEUE: usize = 1024;
const STREAM_PAGE: u64 = 256;

/// The append-only, hash-chained event log.
///
/// There is exactly one append-serializing path: `append` takes the writer
/// lock, stamps sequence/version/timestamp/hash, validates ordering, and
/// persists. Readers run concurrently and observe a consistent prefix.
pub struct EventStore {
    backend: Arc<dyn EventBackend>,
    writer: Mutex<()>,
    events_tx: broadcast::Sender<Event>,
}

impl EventStore {
    pub fn new(backend: Arc<dyn EventBackend>) -> Self {
        let (events_tx, _) = broadcast::channel(SUBSCRIBER_QUEUE);
        EventStore {
            backend,
            writer: Mutex::new(()),
            events_tx,
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Stamp, hash, validate, persist, notify. The only write path.
    pub async fn append(&self, input: EventInput) -> LedgerResult<Event> {
        let _writer = self.writer.lock().await;

        let head = self.backend.head().await?;
        let sequence = head.as_ref().map(|h| h.sequence).unwrap_or(0) + 1;

        let now = Utc::now().timestamp_millis();
        let timestamp = match input.timestamp {
            // A caller-supplied timestamp must not backdate the chain.
            Some(ts) => ts,
            // Stamped timestamps never regress, even under clock skew.
            None => head.as_ref().map(|h| h.timestamp.max(now)).unwrap_or(now),
        };

        let latest = self
            .backend
            .latest_for_aggregate(input.aggregate_type, &input.aggregate_id)
            .await?;
        let current_version = latest.map(|e| e.aggregate_version).unwrap_or(0);
        let aggregate_version = current_version + 1;

        if let Some(expected) = input.expected_version {
            if expected != aggregate_version {
                return Err(LedgerError::VersionConflict {
                    aggregate_id: input.aggregate_id,
                    expected,
                    actual: current_version,
                });
            }
        }

        let previous_hash = head
            .as_ref()
            .map(|h| h.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let event_type = input.payload.kind().to_string();
        let mut event = Event {
            sequence,
            id: Uuid::new_v4().to_string(),
            timestamp,
            event_type,
            aggregate_type: input.aggregate_type,
            aggregate_id: input.aggregate_id,
            aggregate_version,
            payload: input.payload,
            actor: input.actor,
            causation: input.causation,
            previous_hash,
            hash: String::new(),
        };

        if let Some(previous) = &head {
            validate_temporal(&event, previous)?;
        }

        event.hash = compute_hash(&event);
        self.backend.persist(&event).await?;

        // Nobody listening is fine.
        let _ = self.events_tx.send(event.clone());

        Ok(event)
    }

    /// Events for one aggregate, version order, filtered by `opts`.
    pub async fn get_by_aggregate(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: &str,
        opts: ReadOptions,
    ) -> LedgerResult<Vec<Event>> {
        let events = self
            .backend
            .by_aggregate(aggregate_type, aggregate_id)
            .await?;
        let mut filtered: Vec<Event> = events.into_iter().filter(|e| opts.retains(e)).collect();
        if let Some(limit) = opts.limit {
            filtered.truncate(limit);
        }
        Ok(filtered)
    }

    pub async fn get_by_sequence(&self, from: u64, to: Option<u64>) -> LedgerResult<Vec<Event>> {
        Ok(self.backend.by_sequence(from, to).await?)
    }

    /// Lazy, cancellable walk of the log in sequence order. The backend is
    /// read one page at a time; dropping the stream stops the reads.
    pub fn stream_by_sequence(
        &self,
        from: u64,
        to: Option<u64>,
    ) -> impl Stream<Item = LedgerResult<Event>> + '_ {
        async_stream::stream! {
            let mut cursor = from.max(1);
            loop {
                let upper = match to {
                    Some(t) if t < cursor => break,
                    Some(t) => t.min(cursor + STREAM_PAGE - 1),
                    None => cursor + STREAM_PAGE - 1,
                };
                let page = match self.backend.by_sequence(cursor, Some(upper)).await {
                    Ok(page) => page,
                    Err(err) => {
                        yield Err(LedgerError::Storage(err));
                        break;
                    }
                };
                let short = (page.len() as u64) < (upper - cursor + 1);
                for event in page {
                    yield Ok(event);
                }
                if short || Some(upper) == to {
                    break;
                }
                cursor = upper + 1;
            }
        }
    }

    pub async fn get_by_id(&self, id: &str) -> LedgerResult<Option<Event>> {
        Ok(self.backend.by_id(id).await?)
    }

    pub async fn get_latest(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: &str,
    ) -> LedgerResult<Option<Event>> {
        Ok(self
            .backend
            .latest_for_aggregate(aggregate_type, aggregate_id)
            .await?)
    }

    pub async fn current_sequence(&self) -> LedgerResult<u64> {
        Ok(self.backend.head().await?.map(|h| h.sequence).unwrap_or(0))
    }

    /// 1 if the aggregate has no events, else last version + 1.
    pub async fn next_version(
        &self,
        aggregate_type: AggregateType,
        aggregate_id: &str,
    ) -> LedgerResult<u32> {
        Ok(self
            .backend
            .latest_for_aggregate(aggregate_type, aggregate_id)
            .await?
            .map(|e| e.aggregate_version + 1)
            .unwrap_or(1))
    }

    /// Live events matching the filter, in append order, starting now.
    /// Lagging subscribers lose oldest pending events and see a marker.
    /// The stream owns its receiver, so it outlives this borrow.
    pub fn subscribe(
        &self,
        filter: EventFilter,
    ) -> impl Stream<Item = SubscriptionMessage> + use<> {
        subscription_stream(self.events_tx.subscribe(), filter)
    }

    /// Filtered, ordered, paginated read over the whole log.
    pub async fn query(&self, criteria: QueryCriteria) -> LedgerResult<QueryPage> {
        let from = criteria.from_sequence.unwrap_or(1);
        let events = self.backend.by_sequence(from, criteria.to_sequence).await?;
        let mut matched: Vec<Event> =
            events.into_iter().filter(|e| criteria.matches(e)).collect();

        match (criteria.order_by, criteria.direction) {
            (OrderBy::Sequence, Direction::Asc) => {}
            (OrderBy::Sequence, Direction::Desc) => matched.reverse(),
            (OrderBy::Timestamp, Direction::Asc) => {
                matched.sort_by_key(|e| (e.timestamp, e.sequence))
            }
            (OrderBy::Timestamp, Direction::Desc) => {
                matched.sort_by_key(|e| (std::cmp::Reverse(e.timestamp), std::cmp::Reverse(e.sequence)))
            }
        }

        let total = matched.len();
        let offset = criteria.offset.min(total);
        let limit = criteria.limit.unwrap_or(total);
        let events: Vec<Event> = matched.into_iter().skip(offset).take(limit).collect();
        let consumed = offset + events.len();
        let has_more = consumed < total;

        Ok(QueryPage {
            events,
            total,
            has_more,
            next_offset: has_more.then_some(consumed),
        })
    }

    /// Re-walk a chain segment and report the first break, if any.
    pub async fn verify_integrity(
        &self,
        from: Option<u64>,
        to: Option<u64>,
    ) -> LedgerResult<ChainReport> {
        // Start one event early so the boundary link is also checked.
        let start = from.unwrap_or(1).saturating_sub(1).max(1);
        let events = self.backend.by_sequence(start, to).await?;
        Ok(verify_chain(&events))
    }

    pub async fn healthy(&self) -> bool {
        self.backend.healthy().await
    }
}
