use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::domain::errors::OutboxError;
use crate::domain::event::{EventRecord, EventStatus, NewEvent};
use crate::domain::ports::OutboxStore;

type Rows = BTreeMap<i64, EventRecord>;

/// Snapshot of the table handed to a transaction, plus the ids it wrote.
#[derive(Debug, Default)]
pub struct MemoryTable {
    rows: Rows,
    written: BTreeSet<i64>,
}

impl MemoryTable {
    fn write(&mut self, record: EventRecord) {
        self.written.insert(record.id());
        self.rows.insert(record.id(), record);
    }
}

/// Process-local outbox store for tests and embedding.
///
/// A transaction works on a snapshot taken at its start. On `Ok` the rows
/// it wrote are copied back; on `Err` they are discarded. The table lock is
/// only held while taking the snapshot and while committing, so a handler
/// may append to the same store in the middle of a tick.
///
/// Ids come from a shared sequence and are not reused after a rollback.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOutboxStore {
    rows: Arc<Mutex<Rows>>,
    last_id: Arc<AtomicI64>,
}

impl InMemoryOutboxStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Rows>, OutboxError> {
        self.rows
            .lock()
            .map_err(|_| OutboxError::Internal("in-memory outbox lock poisoned".into()))
    }

    /// Append `event` in its own transaction, returning the new id.
    pub fn append_now(&self, event: NewEvent) -> Result<i64, OutboxError> {
        self.transaction(|conn| self.insert(conn, event, Utc::now()))
            .map(|record| record.id())
    }

    pub fn get(&self, id: i64) -> Result<Option<EventRecord>, OutboxError> {
        Ok(self.lock()?.get(&id).cloned())
    }

    /// Every row, ordered by id.
    pub fn all(&self) -> Result<Vec<EventRecord>, OutboxError> {
        Ok(self.lock()?.values().cloned().collect())
    }
}

impl OutboxStore for InMemoryOutboxStore {
    type Conn = MemoryTable;

    fn transaction<T, F>(&self, f: F) -> Result<T, OutboxError>
    where
        F: FnOnce(&mut MemoryTable) -> Result<T, OutboxError>,
    {
        let mut working = MemoryTable {
            rows: self.lock()?.clone(),
            written: BTreeSet::new(),
        };
        let value = f(&mut working)?;

        let mut shared = self.lock()?;
        for id in &working.written {
            if let Some(row) = working.rows.remove(id) {
                shared.insert(*id, row);
            }
        }
        Ok(value)
    }

    fn insert(
        &self,
        conn: &mut MemoryTable,
        event: NewEvent,
        now: DateTime<Utc>,
    ) -> Result<EventRecord, OutboxError> {
        let id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        let record = EventRecord::inserted(id, event, now);
        conn.write(record.clone());
        Ok(record)
    }

    fn claim_due_batch(
        &self,
        conn: &mut MemoryTable,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<EventRecord>, OutboxError> {
        Ok(conn
            .rows
            .values()
            .filter(|e| e.is_due(now))
            .take(limit)
            .cloned()
            .collect())
    }

    /// Only pending rows can be overwritten; terminal rows stay as they are.
    fn save(&self, conn: &mut MemoryTable, record: &EventRecord) -> Result<(), OutboxError> {
        let pending = conn
            .rows
            .get(&record.id())
            .is_some_and(|row| !row.status().is_terminal());
        if !pending {
            return Err(OutboxError::Internal(format!(
                "outbox event id={} is missing or already terminal",
                record.id()
            )));
        }
        conn.write(record.clone());
        Ok(())
    }

    fn find_by_id(
        &self,
        conn: &mut MemoryTable,
        id: i64,
    ) -> Result<Option<EventRecord>, OutboxError> {
        Ok(conn.rows.get(&id).cloned())
    }

    fn list_by_status(
        &self,
        conn: &mut MemoryTable,
        status: EventStatus,
        limit: usize,
    ) -> Result<Vec<EventRecord>, OutboxError> {
        Ok(conn
            .rows
            .values()
            .filter(|e| e.status() == status)
            .take(limit)
            .cloned()
            .collect())
    }

    fn count_by_status(&self, status: EventStatus) -> Result<i64, OutboxError> {
        let count = self
            .lock()?
            .values()
            .filter(|e| e.status() == status)
            .count();
        Ok(count as i64)
    }
}
