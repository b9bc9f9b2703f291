use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::event::{AggregateType, Event};

/// Storage behind the event store. Implementations persist fully-stamped
/// events and read them back; all invariant enforcement happens above, in
/// the single-writer append path.
#[async_trait]
pub trait EventBackend: Send + Sync {
    /// Durably record one event. Called only from the append path, after
    /// stamping and hashing.
    async fn persist(&self, event: &Event) -> Result<()>;

    /// The most recent event, by sequence.
    async fn head(&self) -> Result<Option<Event>>;

    async fn by_sequence(&self, from: u64, to: Option<u64>) -> Result<Vec<Event>>;

    async fn by_id(&self, id: &str) -> Result<Option<Event>>;

    /// Every event for one aggregate, ordered by `aggregate_version`.
    async fn by_aggregate(&self, aggregate_type: AggregateType, id: &str) -> Result<Vec<Event>>;

    async fn latest_for_aggregate(
        &self,
        aggregate_type: AggregateType,
        id: &str,
    ) -> Result<Option<Event>>;

    async fn count(&self) -> Result<u64>;

    /// Liveness probe for the health endpoint.
    async fn healthy(&self) -> bool;
}

/// Backoff schedule for transient backend failures (locked database,
/// interrupted I/O). Delays grow by `multiplier` from `initial_delay` up to
/// `max_delay`, with a little jitter to keep retries from stampeding.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(2),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry attempt (0-based), jittered ±20%.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        use rand::Rng;

        let base = self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let capped = base.min(self.max_delay.as_millis() as f64);
        let jitter = rand::rng().random_range(0.8..1.2);
        Duration::from_millis((capped * jitter) as u64)
    }
}
