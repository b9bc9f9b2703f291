use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, Row, params};
use tokio::sync::Mutex;

use crate::model::event::{ActorRef, AggregateType, Causation, Event};
use crate::model::payload::EventPayload;

use super::backend::{EventBackend, RetryPolicy};

/// Durable backend: one append-only table, one row per event, payload and
/// actor stored as JSON columns.
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    retry: RetryPolicy,
}

impl SqliteBackend {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).context("creating db directory")?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("opening sqlite at {}", path.display()))?;

        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;
        migrate(&conn)?;

        Ok(SqliteBackend {
            conn: Arc::new(Mutex::new(conn)),
            retry: RetryPolicy::default(),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("opening in-memory sqlite")?;
        migrate(&conn)?;
        Ok(SqliteBackend {
            conn: Arc::new(Mutex::new(conn)),
            retry: RetryPolicy::default(),
        })
    }

    fn is_transient(err: &rusqlite::Error) -> bool {
        matches!(
            err.sqlite_error_code(),
            Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
        )
    }
}

fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS events (
            sequence           INTEGER PRIMARY KEY,
            id                 TEXT UNIQUE NOT NULL,
            timestamp          INTEGER NOT NULL,
            event_type         TEXT NOT NULL,
            aggregate_type     TEXT NOT NULL,
            aggregate_id       TEXT NOT NULL,
            aggregate_version  INTEGER NOT NULL,
            payload            TEXT NOT NULL,
            actor              TEXT NOT NULL,
            causation          TEXT,
            previous_hash      TEXT NOT NULL,
            hash               TEXT NOT NULL,
            UNIQUE(aggregate_type, aggregate_id, aggregate_version)
        );

        CREATE INDEX IF NOT EXISTS idx_events_aggregate
            ON events(aggregate_type, aggregate_id, aggregate_version);
        CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type);
        CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);
        ",
    )?;
    Ok(())
}

fn row_to_event(row: &Row<'_>) -> rusqlite::Result<Event> {
    let aggregate_type: String = row.get("aggregate_type")?;
    let payload: String = row.get("payload")?;
    let actor: String = row.get("actor")?;
    let causation: Option<String> = row.get("causation")?;

    Ok(Event {
        sequence: row.get::<_, i64>("sequence")? as u64,
        id: row.get("id")?,
        timestamp: row.get("timestamp")?,
        event_type: row.get("event_type")?,
        aggregate_type: AggregateType::from_str(&aggregate_type)
            .unwrap_or(AggregateType::System),
        aggregate_id: row.get("aggregate_id")?,
        aggregate_version: row.get::<_, i64>("aggregate_version")? as u32,
        payload: serde_json::from_str::<serde_json::Value>(&payload)
            .map(EventPayload::decode)
            .unwrap_or(EventPayload::Unknown {
                event_type: "Unknown".to_string(),
                raw: serde_json::Value::Null,
            }),
        actor: serde_json::from_str::<ActorRef>(&actor).unwrap_or(ActorRef::Anonymous),
        causation: causation
            .as_deref()
            .and_then(|c| serde_json::from_str::<Causation>(c).ok()),
        previous_hash: row.get("previous_hash")?,
        hash: row.get("hash")?,
    })
}

#[async_trait]
impl EventBackend for SqliteBackend {
    async fn persist(&self, event: &Event) -> Result<()> {
        let payload = serde_json::to_string(&event.payload).context("serializing payload")?;
        let actor = serde_json::to_string(&event.actor).context("serializing actor")?;
        let causation = event
            .causation
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .context("serializing causation")?;

        let conn = self.conn.lock().await;
        let mut attempt = 0u32;
        loop {
            let result = conn.execute(
                "INSERT INTO events (
                    sequence, id, timestamp, event_type, aggregate_type, aggregate_id,
                    aggregate_version, payload, actor, causation, previous_hash, hash
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    event.sequence as i64,
                    event.id,
                    event.timestamp,
                    event.event_type,
                    event.aggregate_type.as_str(),
                    event.aggregate_id,
                    event.aggregate_version as i64,
                    payload,
                    actor,
                    causation,
                    event.previous_hash,
                    event.hash,
                ],
            );
            match result {
                Ok(_) => return Ok(()),
                Err(err) if Self::is_transient(&err) && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    eprintln!("[store] transient sqlite error, retrying in {delay:?}: {err}");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(err).with_context(|| {
                        format!("persisting event sequence {}", event.sequence)
                    });
                }
            }
        }
    }

    async fn head(&self) -> Result<Option<Event>> {
        let conn = self.conn.lock().await;
        let mut stmt =
            conn.prepare("SELECT * FROM events ORDER BY sequence DESC LIMIT 1")?;
        let mut rows = stmt.query_map([], row_to_event)?;
        Ok(rows.next().transpose()?)
    }

    async fn by_sequence(&self, from: u64, to: Option<u64>) -> Result<Vec<Event>> {
        let conn = self.conn.lock().await;
        let to = to.map(|t| t as i64).unwrap_or(i64::MAX);
        let mut stmt = conn.prepare(
            "SELECT * FROM events WHERE sequence >= ?1 AND sequence <= ?2 ORDER BY sequence",
        )?;
        let rows = stmt.query_map(params![from as i64, to], row_to_event)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn by_id(&self, id: &str) -> Result<Option<Event>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT * FROM events WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], row_to_event)?;
        Ok(rows.next().transpose()?)
    }

    async fn by_aggregate(&self, aggregate_type: AggregateType, id: &str) -> Result<Vec<Event>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT * FROM events WHERE aggregate_type = ?1 AND aggregate_id = ?2
             ORDER BY aggregate_version",
        )?;
        let rows = stmt.query_map(params![aggregate_type.as_str(), id], row_to_event)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    async fn latest_for_aggregate(
        &self,
        aggregate_type: AggregateType,
        id: &str,
    ) -> Result<Option<Event>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT * FROM events WHERE aggregate_type = ?1 AND aggregate_id = ?2
             ORDER BY aggregate_version DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map(params![aggregate_type.as_str(), id], row_to_event)?;
        Ok(rows.next().transpose()?)
    }

    async fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    async fn healthy(&self) -> bool {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }
}
