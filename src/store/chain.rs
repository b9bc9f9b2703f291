use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{LedgerError, LedgerResult};
use crate::model::event::{ActorRef, AggregateType, Causation, Event, GENESIS_HASH};
use crate::model::payload::EventPayload;

/// Canonical serialization envelope: every event field except `hash`, in
/// fixed declaration order. Hashing this keeps the digest deterministic
/// across replays and backends.
#[derive(Serialize)]
struct HashEnvelope<'a> {
    sequence: u64,
    id: &'a str,
    timestamp: i64,
    event_type: &'a str,
    aggregate_type: AggregateType,
    aggregate_id: &'a str,
    aggregate_version: u32,
    payload: &'a EventPayload,
    actor: &'a ActorRef,
    causation: &'a Option<Causation>,
    previous_hash: &'a str,
}

/// SHA-256 over the canonical envelope, hex-encoded.
pub fn compute_hash(event: &Event) -> String {
    let envelope = HashEnvelope {
        sequence: event.sequence,
        id: &event.id,
        timestamp: event.timestamp,
        event_type: &event.event_type,
        aggregate_type: event.aggregate_type,
        aggregate_id: &event.aggregate_id,
        aggregate_version: event.aggregate_version,
        payload: &event.payload,
        actor: &event.actor,
        causation: &event.causation,
        previous_hash: &event.previous_hash,
    };
    let bytes = serde_json::to_vec(&envelope).expect("event envelope serializes");
    hex::encode(Sha256::digest(&bytes))
}

/// Reject an event that would reorder or backdate the chain.
pub fn validate_temporal(event: &Event, previous: &Event) -> LedgerResult<()> {
    if event.sequence <= previous.sequence {
        return Err(LedgerError::TemporalViolation {
            sequence: event.sequence,
            detail: format!(
                "sequence {} does not advance past {}",
                event.sequence, previous.sequence
            ),
        });
    }
    if event.timestamp < previous.timestamp {
        return Err(LedgerError::TemporalViolation {
            sequence: event.sequence,
            detail: format!(
                "timestamp {} is earlier than previous {}",
                event.timestamp, previous.timestamp
            ),
        });
    }
    Ok(())
}

/// Result of walking a chain segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChainReport {
    pub ok: bool,
    /// Events inspected.
    pub checked: u64,
    /// Sequence where the chain first breaks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broken_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ChainReport {
    fn ok(checked: u64) -> Self {
        ChainReport {
            ok: true,
            checked,
            broken_at: None,
            reason: None,
        }
    }

    fn broken(checked: u64, at: u64, reason: String) -> Self {
        ChainReport {
            ok: false,
            checked,
            broken_at: Some(at),
            reason: Some(reason),
        }
    }
}

/// Walk a contiguous chain segment, validating linkage and ordering.
///
/// Each event's `previous_hash` is checked against both the stored hash of
/// its predecessor and the predecessor's recomputed digest, so a break is
/// reported at the first event whose link no longer holds. The final event
/// is additionally re-hashed against its own stored digest (it has no
/// successor to vouch for it).
pub fn verify_chain(events: &[Event]) -> ChainReport {
    let Some(first) = events.first() else {
        return ChainReport::ok(0);
    };

    if first.sequence == 1 && first.previous_hash != GENESIS_HASH {
        return ChainReport::broken(
            1,
            first.sequence,
            format!(
                "first event must link to `{GENESIS_HASH}`, found `{}`",
                first.previous_hash
            ),
        );
    }

    for (i, window) in events.windows(2).enumerate() {
        let (prev, event) = (&window[0], &window[1]);
        let checked = (i + 2) as u64;

        if event.sequence != prev.sequence + 1 {
            return ChainReport::broken(
                checked,
                event.sequence,
                format!(
                    "sequence gap: {} follows {}",
                    event.sequence, prev.sequence
                ),
            );
        }
        if event.timestamp < prev.timestamp {
            return ChainReport::broken(
                checked,
                event.sequence,
                format!(
                    "timestamp {} regresses below {}",
                    event.timestamp, prev.timestamp
                ),
            );
        }
        if event.previous_hash != prev.hash {
            return ChainReport::broken(
                checked,
                event.sequence,
                format!(
                    "hash mismatch: stored hash of event {} does not match the link held by event {}",
                    prev.sequence, event.sequence
                ),
            );
        }
        let recomputed = compute_hash(prev);
        if recomputed != event.previous_hash {
            return ChainReport::broken(
                checked,
                event.sequence,
                format!(
                    "hash mismatch: event {} does not re-hash to the link held by event {}",
                    prev.sequence, event.sequence
                ),
            );
        }
    }

    // Tail has no successor; re-hash it directly.
    let last = events.last().expect("non-empty");
    if compute_hash(last) != last.hash {
        return ChainReport::broken(
            events.len() as u64,
            last.sequence,
            format!("hash mismatch: event {} does not re-hash to its stored digest", last.sequence),
        );
    }

    ChainReport::ok(events.len() as u64)
}
