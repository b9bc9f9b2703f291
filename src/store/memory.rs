use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::model::event::{AggregateType, Event};

use super::backend::EventBackend;

#[derive(Default)]
struct MemState {
    /// Events in sequence order; index n holds sequence n+1.
    log: Vec<Event>,
    by_id: HashMap<String, usize>,
    by_aggregate: HashMap<(AggregateType, String), Vec<usize>>,
}

/// In-memory backend for tests and development. Same invariants as the
/// durable backend, no I/O.
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<MemState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the stored hash of one event, bypassing the append path.
    /// Exists so integrity verification can be exercised against a tampered
    /// log; nothing in the crate calls this outside tests.
    pub async fn tamper_hash(&self, sequence: u64, new_hash: &str) -> bool {
        let mut state = self.state.write().await;
        match state.log.get_mut(sequence as usize - 1) {
            Some(event) => {
                event.hash = new_hash.to_string();
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl EventBackend for MemoryBackend {
    async fn persist(&self, event: &Event) -> Result<()> {
        let mut state = self.state.write().await;
        let index = state.log.len();
        state.by_id.insert(event.id.clone(), index);
        state
            .by_aggregate
            .entry((event.aggregate_type, event.aggregate_id.clone()))
            .or_default()
            .push(index);
        state.log.push(event.clone());
        Ok(())
    }

    async fn head(&self) -> Result<Option<Event>> {
        Ok(self.state.read().await.log.last().cloned())
    }

    async fn by_sequence(&self, from: u64, to: Option<u64>) -> Result<Vec<Event>> {
        let state = self.state.read().await;
        let start = from.max(1) as usize - 1;
        let end = to
            .map(|t| (t as usize).min(state.log.len()))
            .unwrap_or(state.log.len());
        if start >= end {
            return Ok(Vec::new());
        }
        Ok(state.log[start..end].to_vec())
    }

    async fn by_id(&self, id: &str) -> Result<Option<Event>> {
        let state = self.state.read().await;
        Ok(state.by_id.get(id).map(|&i| state.log[i].clone()))
    }

    async fn by_aggregate(&self, aggregate_type: AggregateType, id: &str) -> Result<Vec<Event>> {
        let state = self.state.read().await;
        Ok(state
            .by_aggregate
            .get(&(aggregate_type, id.to_string()))
            .map(|indexes| indexes.iter().map(|&i| state.log[i].clone()).collect())
            .unwrap_or_default())
    }

    async fn latest_for_aggregate(
        &self,
        aggregate_type: AggregateType,
        id: &str,
    ) -> Result<Option<Event>> {
        let state = self.state.read().await;
        Ok(state
            .by_aggregate
            .get(&(aggregate_type, id.to_string()))
            .and_then(|indexes| indexes.last())
            .map(|&i| state.log[i].clone()))
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.state.read().await.log.len() as u64)
    }

    async fn healthy(&self) -> bool {
        true
    }
}
