use std::sync::Arc;

use chrono::Utc;
use log::error;

use crate::domain::errors::OutboxError;
use crate::domain::event::{EventRecord, NewEvent};
use crate::domain::ports::OutboxStore;
use crate::metrics::{self, MetricsSink};

/// The single write path into the outbox.
///
/// `append` must be called with the connection of the transaction that
/// performs the business change, so the event commits or rolls back with it.
pub struct OutboxProducer<S> {
    store: S,
    metrics: Arc<dyn MetricsSink>,
}

impl<S: OutboxStore> OutboxProducer<S> {
    pub fn new(store: S, metrics: Arc<dyn MetricsSink>) -> Self {
        Self { store, metrics }
    }

    /// Insert `event` as `NEW` within the caller's transaction.
    ///
    /// Errors are returned unchanged so that they fail the surrounding
    /// transaction: there is no business write without its event.
    pub fn append(&self, conn: &mut S::Conn, event: NewEvent) -> Result<EventRecord, OutboxError> {
        let aggregate_type = event.aggregate_type.clone();
        let event_type = event.event_type.clone();

        match self.store.insert(conn, event, Utc::now()) {
            Ok(record) => {
                self.metrics.increment_counter(metrics::INSERT_SUCCESS, &[], 1);
                Ok(record)
            }
            Err(e) => {
                self.metrics.increment_counter(
                    metrics::INSERT_FAILURE,
                    &[(metrics::TAG_EXCEPTION, e.kind())],
                    1,
                );
                error!(
                    "Failed to record outbox event aggregate_type={} event_type={}: {}",
                    aggregate_type, event_type, e
                );
                Err(e)
            }
        }
    }
}
