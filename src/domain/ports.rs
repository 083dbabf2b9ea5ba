use chrono::{DateTime, Utc};

use super::errors::OutboxError;
use super::event::{EventRecord, EventStatus, NewEvent};

/// Persistence of outbox rows.
///
/// Row operations take the connection of an open transaction so that the
/// producer can join the caller's business transaction and the dispatcher
/// can scope a whole tick to one transaction.
pub trait OutboxStore: Send + Sync + 'static {
    /// Connection handle valid for the duration of one transaction.
    type Conn;

    /// Run `f` atomically: commit if it returns `Ok`, roll back otherwise.
    fn transaction<T, F>(&self, f: F) -> Result<T, OutboxError>
    where
        F: FnOnce(&mut Self::Conn) -> Result<T, OutboxError>;

    fn insert(
        &self,
        conn: &mut Self::Conn,
        event: NewEvent,
        now: DateTime<Utc>,
    ) -> Result<EventRecord, OutboxError>;

    /// Pending rows due at `now`, oldest id first, at most `limit` of them.
    fn claim_due_batch(
        &self,
        conn: &mut Self::Conn,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<EventRecord>, OutboxError>;

    /// Persist the status fields of `record`.
    ///
    /// Fails if the stored row is missing or already `SENT`/`FAILED`.
    fn save(&self, conn: &mut Self::Conn, record: &EventRecord) -> Result<(), OutboxError>;

    fn find_by_id(
        &self,
        conn: &mut Self::Conn,
        id: i64,
    ) -> Result<Option<EventRecord>, OutboxError>;

    /// Rows in `status`, oldest id first. Used to inspect dead letters.
    fn list_by_status(
        &self,
        conn: &mut Self::Conn,
        status: EventStatus,
        limit: usize,
    ) -> Result<Vec<EventRecord>, OutboxError>;

    fn count_by_status(&self, status: EventStatus) -> Result<i64, OutboxError>;
}
