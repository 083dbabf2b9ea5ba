use chrono::{DateTime, Utc};
use diesel::prelude::*;

use crate::domain::errors::OutboxError;
use crate::domain::event::{EventRecord, EventStatus, StoredEvent};
use crate::schema::outbox_event;

#[derive(Debug, Clone, Queryable, Selectable, Identifiable)]
#[diesel(table_name = outbox_event)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboxEventRow {
    pub id: i64,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: String,
    pub status: String,
    pub attempt_count: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub correlation_id: Option<String>,
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<OutboxEventRow> for EventRecord {
    type Error = OutboxError;

    fn try_from(row: OutboxEventRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<EventStatus>()
            .map_err(|e| OutboxError::CorruptRow {
                id: row.id,
                reason: e.to_string(),
            })?;
        let attempt_count =
            u32::try_from(row.attempt_count).map_err(|_| OutboxError::CorruptRow {
                id: row.id,
                reason: format!("negative attempt_count {}", row.attempt_count),
            })?;

        Ok(StoredEvent {
            id: row.id,
            aggregate_type: row.aggregate_type,
            aggregate_id: row.aggregate_id,
            event_type: row.event_type,
            payload: row.payload,
            status,
            attempt_count,
            next_attempt_at: row.next_attempt_at,
            correlation_id: row.correlation_id,
            request_id: row.request_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
        .into())
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = outbox_event)]
pub struct NewOutboxEventRow {
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: String,
    pub status: String,
    pub attempt_count: i32,
    pub correlation_id: Option<String>,
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Status fields written back by the dispatcher.
#[derive(Debug, AsChangeset)]
#[diesel(table_name = outbox_event)]
#[diesel(treat_none_as_null = true)]
pub struct OutboxEventStatusChange {
    pub status: String,
    pub attempt_count: i32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl OutboxEventStatusChange {
    pub fn from_record(record: &EventRecord) -> Self {
        Self {
            status: record.status().as_str().to_string(),
            attempt_count: i32::try_from(record.attempt_count()).unwrap_or(i32::MAX),
            next_attempt_at: record.next_attempt_at(),
            updated_at: record.updated_at(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(status: &str, attempt_count: i32) -> OutboxEventRow {
        let now = Utc::now();
        OutboxEventRow {
            id: 5,
            aggregate_type: "Asset".into(),
            aggregate_id: "5".into(),
            event_type: "AssetCreated".into(),
            payload: "{}".into(),
            status: status.into(),
            attempt_count,
            next_attempt_at: None,
            correlation_id: Some("corr".into()),
            request_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn converts_valid_row() {
        let record = EventRecord::try_from(row("RETRY", 2)).unwrap();
        assert_eq!(record.id(), 5);
        assert_eq!(record.status(), EventStatus::Retry);
        assert_eq!(record.attempt_count(), 2);
        assert_eq!(record.correlation_id(), Some("corr"));
    }

    #[test]
    fn unknown_status_is_corrupt() {
        let err = EventRecord::try_from(row("PENDING", 0)).unwrap_err();
        assert!(matches!(err, OutboxError::CorruptRow { id: 5, .. }));
    }

    #[test]
    fn negative_attempts_are_corrupt() {
        let err = EventRecord::try_from(row("NEW", -1)).unwrap_err();
        assert!(matches!(err, OutboxError::CorruptRow { id: 5, .. }));
    }

    #[test]
    fn status_change_mirrors_record() {
        let record = EventRecord::try_from(row("FAILED", 5)).unwrap();
        let change = OutboxEventStatusChange::from_record(&record);
        assert_eq!(change.status, "FAILED");
        assert_eq!(change.attempt_count, 5);
        assert_eq!(change.next_attempt_at, None);
    }
}
