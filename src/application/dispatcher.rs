use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::{debug, error, warn};

use super::registry::HandlerRegistry;
use crate::config::DispatchConfig;
use crate::domain::backoff::BackoffPolicy;
use crate::domain::errors::OutboxError;
use crate::domain::event::{EventRecord, EventStatus};
use crate::domain::ports::OutboxStore;
use crate::handlers::HandlerError;
use crate::metrics::{self, MetricsSink};

/// What a single dispatch attempt did to an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Retry { next_attempt_at: DateTime<Utc> },
    Dead,
    MissingHandler,
}

/// Counts of one tick's outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub claimed: usize,
    pub sent: usize,
    pub retried: usize,
    pub dead: usize,
    pub missing_handler: usize,
}

impl TickSummary {
    fn record(&mut self, outcome: DispatchOutcome) {
        match outcome {
            DispatchOutcome::Sent => self.sent += 1,
            DispatchOutcome::Retry { .. } => self.retried += 1,
            DispatchOutcome::Dead => self.dead += 1,
            DispatchOutcome::MissingHandler => self.missing_handler += 1,
        }
    }
}

/// Polling dispatcher that drives outbox events to `SENT`, `RETRY` or
/// `FAILED`.
///
/// # Tick
///
/// 1. Claim up to `batch_size` due events, oldest id first
/// 2. Look up each event's handler by `event_type`
/// 3. Call the handler; sequentially, in claim order
/// 4. Apply the transition and save the event
/// 5. Commit all saves of the tick together
///
/// A missing handler is a deployment defect and fails the event at once.
/// Handler errors are retried with exponential backoff until
/// `max_attempts`, then the event is dead-lettered.
///
/// Only one tick runs at a time per dispatcher. Several dispatcher
/// processes over the same table are not coordinated: the claim takes no
/// row locks, so an event can be delivered by more than one of them.
pub struct OutboxDispatcher<S> {
    store: S,
    registry: Arc<HandlerRegistry>,
    metrics: Arc<dyn MetricsSink>,
    config: DispatchConfig,
    backoff: BackoffPolicy,
    tick_lock: Mutex<()>,
}

impl<S: OutboxStore> OutboxDispatcher<S> {
    pub fn new(
        store: S,
        registry: Arc<HandlerRegistry>,
        metrics: Arc<dyn MetricsSink>,
        config: DispatchConfig,
    ) -> Self {
        let backoff = config.backoff_policy();
        Self {
            store,
            registry,
            metrics,
            config,
            backoff,
            tick_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Run one tick against the wall clock.
    pub fn tick(&self) -> Result<TickSummary, OutboxError> {
        self.tick_at(Utc::now())
    }

    /// Run one tick as if the current instant were `now`.
    ///
    /// On a store error every transition of the tick is rolled back and
    /// the same events are claimed again by the next tick.
    pub fn tick_at(&self, now: DateTime<Utc>) -> Result<TickSummary, OutboxError> {
        // The guard protects no data, so a poisoned lock is still usable.
        let _guard = self.tick_lock.lock().unwrap_or_else(|p| p.into_inner());
        let started = Instant::now();

        let summary = self.store.transaction(|conn| {
            let batch = self
                .store
                .claim_due_batch(conn, now, self.config.batch_size)?;
            let mut summary = TickSummary {
                claimed: batch.len(),
                ..TickSummary::default()
            };
            if batch.is_empty() {
                return Ok(summary);
            }

            self.metrics
                .increment_counter(metrics::DISPATCH_ATTEMPT, &[], batch.len() as u64);

            for mut event in batch {
                let outcome = self.dispatch_one(&mut event, now);
                summary.record(outcome);
                self.store.save(conn, &event)?;
            }
            Ok(summary)
        })?;

        if summary.claimed > 0 {
            self.metrics
                .record_duration(metrics::DISPATCH_BATCH_TIME, started.elapsed());
            debug!(
                "Outbox tick claimed={} sent={} retried={} dead={} missing_handler={}",
                summary.claimed,
                summary.sent,
                summary.retried,
                summary.dead,
                summary.missing_handler
            );
        }
        Ok(summary)
    }

    /// Deliver one claimed event and apply the resulting transition.
    fn dispatch_one(&self, event: &mut EventRecord, now: DateTime<Utc>) -> DispatchOutcome {
        let Some(handler) = self.registry.get(event.event_type()) else {
            error!(
                "No handler registered for event_type={}, marking FAILED id={}",
                event.event_type(),
                event.id()
            );
            event.mark_failed(now);
            self.metrics
                .increment_counter(metrics::DISPATCH_MISSING_HANDLER, &[], 1);
            return DispatchOutcome::MissingHandler;
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event)))
            .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(payload))));

        match result {
            Ok(()) => {
                event.mark_sent(now);
                self.metrics.increment_counter(metrics::DISPATCH_SUCCESS, &[], 1);
                debug!("Outbox event id={} sent", event.id());
                DispatchOutcome::Sent
            }
            Err(err) => {
                self.metrics.increment_counter(
                    metrics::DISPATCH_FAILURE,
                    &[(metrics::TAG_EXCEPTION, err.kind())],
                    1,
                );
                let attempts_before = event.attempt_count();
                if attempts_before + 1 >= self.config.max_attempts {
                    event.mark_failed(now);
                    self.metrics.increment_counter(metrics::DISPATCH_DEAD, &[], 1);
                    error!(
                        "Outbox event id={} permanently failed after {} attempts: {}",
                        event.id(),
                        event.attempt_count(),
                        err
                    );
                    DispatchOutcome::Dead
                } else {
                    let next_attempt_at = self.backoff.next_attempt_at(now, attempts_before);
                    event.mark_retry(next_attempt_at, now);
                    warn!(
                        "Outbox event id={} failed attempt={} scheduling retry at {}: {}",
                        event.id(),
                        event.attempt_count(),
                        next_attempt_at,
                        err
                    );
                    DispatchOutcome::Retry { next_attempt_at }
                }
            }
        }
    }

    /// Publish `outbox.queue.depth{status}` for every status.
    pub fn refresh_queue_depth(&self) -> Result<(), OutboxError> {
        for status in EventStatus::ALL {
            let depth = self.store.count_by_status(status)?;
            self.metrics.set_gauge(
                metrics::QUEUE_DEPTH,
                &[(metrics::TAG_STATUS, status.as_str())],
                depth as f64,
            );
        }
        Ok(())
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
