//! Narrow metrics surface of the outbox.
//!
//! The dispatcher and producer only emit through [`MetricsSink`]; wiring a
//! real backend is left to the embedding service.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use log::debug;

pub const DISPATCH_ATTEMPT: &str = "outbox.dispatch.attempt";
pub const DISPATCH_SUCCESS: &str = "outbox.dispatch.success";
pub const DISPATCH_FAILURE: &str = "outbox.dispatch.failure";
pub const DISPATCH_MISSING_HANDLER: &str = "outbox.dispatch.missingHandler";
pub const DISPATCH_DEAD: &str = "outbox.dispatch.dead";
pub const DISPATCH_BATCH_TIME: &str = "outbox.dispatch.batch.time";
pub const QUEUE_DEPTH: &str = "outbox.queue.depth";
pub const INSERT_SUCCESS: &str = "outbox.insert.success";
pub const INSERT_FAILURE: &str = "outbox.insert.failure";

pub const TAG_EXCEPTION: &str = "exception";
pub const TAG_STATUS: &str = "status";

pub type Tags<'a> = &'a [(&'static str, &'a str)];

pub trait MetricsSink: Send + Sync {
    fn increment_counter(&self, name: &'static str, tags: Tags<'_>, value: u64);
    fn record_duration(&self, name: &'static str, elapsed: Duration);
    fn set_gauge(&self, name: &'static str, tags: Tags<'_>, value: f64);
}

/// Emits every metric as a debug log record.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMetrics;

impl MetricsSink for LogMetrics {
    fn increment_counter(&self, name: &'static str, tags: Tags<'_>, value: u64) {
        debug!(target: "outbox_dispatch::metrics", "counter {}{:?} +{}", name, tags, value);
    }

    fn record_duration(&self, name: &'static str, elapsed: Duration) {
        debug!(target: "outbox_dispatch::metrics", "timer {} {:?}", name, elapsed);
    }

    fn set_gauge(&self, name: &'static str, tags: Tags<'_>, value: f64) {
        debug!(target: "outbox_dispatch::metrics", "gauge {}{:?} = {}", name, tags, value);
    }
}

type MetricKey = (&'static str, Vec<(&'static str, String)>);

fn key(name: &'static str, tags: Tags<'_>) -> MetricKey {
    let mut tags: Vec<_> = tags.iter().map(|(k, v)| (*k, v.to_string())).collect();
    tags.sort();
    (name, tags)
}

#[derive(Debug, Default)]
struct Recorded {
    counters: BTreeMap<MetricKey, u64>,
    gauges: BTreeMap<MetricKey, f64>,
    timers: BTreeMap<&'static str, Vec<Duration>>,
}

/// Keeps every metric in memory so it can be queried afterwards.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    recorded: Mutex<Recorded>,
}

impl InMemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter; `0` if it was never incremented.
    pub fn counter(&self, name: &'static str, tags: Tags<'_>) -> u64 {
        self.with(|r| r.counters.get(&key(name, tags)).copied().unwrap_or(0))
    }

    /// Sum of a counter across all tag combinations.
    pub fn counter_total(&self, name: &str) -> u64 {
        self.with(|r| {
            r.counters
                .iter()
                .filter(|((n, _), _)| *n == name)
                .map(|(_, v)| *v)
                .sum()
        })
    }

    pub fn gauge(&self, name: &'static str, tags: Tags<'_>) -> Option<f64> {
        self.with(|r| r.gauges.get(&key(name, tags)).copied())
    }

    pub fn timer_count(&self, name: &str) -> usize {
        self.with(|r| r.timers.get(name).map_or(0, Vec::len))
    }

    fn with<T>(&self, f: impl FnOnce(&mut Recorded) -> T) -> T {
        // Metrics must never take the dispatcher down, poisoned or not.
        let mut guard = self.recorded.lock().unwrap_or_else(|p| p.into_inner());
        f(&mut guard)
    }
}

impl MetricsSink for InMemoryMetrics {
    fn increment_counter(&self, name: &'static str, tags: Tags<'_>, value: u64) {
        self.with(|r| *r.counters.entry(key(name, tags)).or_default() += value);
    }

    fn record_duration(&self, name: &'static str, elapsed: Duration) {
        self.with(|r| r.timers.entry(name).or_default().push(elapsed));
    }

    fn set_gauge(&self, name: &'static str, tags: Tags<'_>, value: f64) {
        self.with(|r| {
            r.gauges.insert(key(name, tags), value);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_keyed_by_tags() {
        let metrics = InMemoryMetrics::new();
        metrics.increment_counter(DISPATCH_FAILURE, &[(TAG_EXCEPTION, "Delivery")], 1);
        metrics.increment_counter(DISPATCH_FAILURE, &[(TAG_EXCEPTION, "Delivery")], 2);
        metrics.increment_counter(DISPATCH_FAILURE, &[(TAG_EXCEPTION, "Panic")], 1);

        assert_eq!(
            metrics.counter(DISPATCH_FAILURE, &[(TAG_EXCEPTION, "Delivery")]),
            3
        );
        assert_eq!(metrics.counter(DISPATCH_FAILURE, &[(TAG_EXCEPTION, "Panic")]), 1);
        assert_eq!(metrics.counter(DISPATCH_FAILURE, &[]), 0);
        assert_eq!(metrics.counter_total(DISPATCH_FAILURE), 4);
    }

    #[test]
    fn gauges_keep_last_value() {
        let metrics = InMemoryMetrics::new();
        assert_eq!(metrics.gauge(QUEUE_DEPTH, &[(TAG_STATUS, "NEW")]), None);

        metrics.set_gauge(QUEUE_DEPTH, &[(TAG_STATUS, "NEW")], 4.0);
        metrics.set_gauge(QUEUE_DEPTH, &[(TAG_STATUS, "NEW")], 1.0);

        assert_eq!(metrics.gauge(QUEUE_DEPTH, &[(TAG_STATUS, "NEW")]), Some(1.0));
    }

    #[test]
    fn timers_record_each_sample() {
        let metrics = InMemoryMetrics::new();
        metrics.record_duration(DISPATCH_BATCH_TIME, Duration::from_millis(3));
        metrics.record_duration(DISPATCH_BATCH_TIME, Duration::from_millis(5));
        assert_eq!(metrics.timer_count(DISPATCH_BATCH_TIME), 2);
        assert_eq!(metrics.timer_count(INSERT_SUCCESS), 0);
    }
}
