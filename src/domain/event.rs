use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
/// Delivery status of an outbox row.
///
/// `NEW` and `RETRY` are pending; `SENT` and `FAILED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStatus {
    New,
    Retry,
    Sent,
    Failed,
}

impl EventStatus {
    pub const ALL: [EventStatus; 4] = [
        EventStatus::New,
        EventStatus::Retry,
        EventStatus::Sent,
        EventStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventStatus::New => "NEW",
            EventStatus::Retry => "RETRY",
            EventStatus::Sent => "SENT",
            EventStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, EventStatus::Sent | EventStatus::Failed)
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for EventStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(EventStatus::New),
            "RETRY" => Ok(EventStatus::Retry),
            "SENT" => Ok(EventStatus::Sent),
            "FAILED" => Ok(EventStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Passthrough tracing identifiers of the request that produced an event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceContext {
    pub correlation_id: Option<String>,
    pub request_id: Option<String>,
}

impl TraceContext {
    pub fn new(correlation_id: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
            request_id: Some(request_id.into()),
        }
    }
}

/// An event to be appended to the outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: String,
    pub trace: TraceContext,
}

impl NewEvent {
    pub fn new(
        aggregate_type: impl Into<String>,
        aggregate_id: impl Into<String>,
        event_type: impl Into<String>,
        payload: impl Into<String>,
    ) -> Self {
        Self {
            aggregate_type: aggregate_type.into(),
            aggregate_id: aggregate_id.into(),
            event_type: event_type.into(),
            payload: payload.into(),
            trace: TraceContext::default(),
        }
    }

    pub fn with_trace(mut self, trace: TraceContext) -> Self {
        self.trace = trace;
        self
    }
}

/// A persisted outbox row.
///
/// Identity, routing and payload fields are fixed at insert; only the
/// dispatcher moves the status fields, through the `mark_*` transitions.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    id: i64,
    aggregate_type: String,
    aggregate_id: String,
    event_type: String,
    payload: String,
    status: EventStatus,
    attempt_count: u32,
    next_attempt_at: Option<DateTime<Utc>>,
    correlation_id: Option<String>,
    request_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Column values of a stored row, used by store implementations to
/// rebuild an [`EventRecord`].
#[derive(Debug, Clone)]
pub(crate) struct StoredEvent {
    pub id: i64,
    pub aggregate_type: String,
    pub aggregate_id: String,
    pub event_type: String,
    pub payload: String,
    pub status: EventStatus,
    pub attempt_count: u32,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub correlation_id: Option<String>,
    pub request_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoredEvent> for EventRecord {
    fn from(s: StoredEvent) -> Self {
        Self {
            id: s.id,
            aggregate_type: s.aggregate_type,
            aggregate_id: s.aggregate_id,
            event_type: s.event_type,
            payload: s.payload,
            status: s.status,
            attempt_count: s.attempt_count,
            next_attempt_at: s.next_attempt_at,
            correlation_id: s.correlation_id,
            request_id: s.request_id,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

impl EventRecord {
    /// A freshly inserted row: `NEW`, no attempts, immediately eligible.
    pub(crate) fn inserted(id: i64, event: NewEvent, now: DateTime<Utc>) -> Self {
        Self {
            id,
            aggregate_type: event.aggregate_type,
            aggregate_id: event.aggregate_id,
            event_type: event.event_type,
            payload: event.payload,
            status: EventStatus::New,
            attempt_count: 0,
            next_attempt_at: None,
            correlation_id: event.trace.correlation_id,
            request_id: event.trace.request_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn status(&self) -> EventStatus {
        self.status
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn next_attempt_at(&self) -> Option<DateTime<Utc>> {
        self.next_attempt_at
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether the dispatcher may claim this row at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.next_attempt_at.map_or(true, |at| at <= now)
    }

    pub(crate) fn mark_sent(&mut self, now: DateTime<Utc>) {
        debug_assert!(!self.status.is_terminal(), "event {} already terminal", self.id);
        self.attempt_count += 1;
        self.status = EventStatus::Sent;
        self.next_attempt_at = None;
        self.updated_at = now;
    }

    pub(crate) fn mark_retry(&mut self, next_attempt_at: DateTime<Utc>, now: DateTime<Utc>) {
        debug_assert!(!self.status.is_terminal(), "event {} already terminal", self.id);
        self.attempt_count += 1;
        self.status = EventStatus::Retry;
        self.next_attempt_at = Some(next_attempt_at);
        self.updated_at = now;
    }

    /// Terminal failure; the in-flight attempt is counted like a retry.
    pub(crate) fn mark_failed(&mut self, now: DateTime<Utc>) {
        debug_assert!(!self.status.is_terminal(), "event {} already terminal", self.id);
        self.attempt_count += 1;
        self.status = EventStatus::Failed;
        self.next_attempt_at = None;
        self.updated_at = now;
    }
}
