use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Exponential retry schedule.
///
/// The delay after a failed attempt is
/// `round(initial_delay_ms * multiplier ^ attempts_before)`, where
/// `attempts_before` is the attempt count *before* the failed attempt is
/// counted. The first retry therefore waits exactly `initial_delay`.
///
/// With the defaults (500ms, x2.0):
/// - 1st failure: 500ms
/// - 2nd failure: 1s
/// - 3rd failure: 2s
/// - 4th failure: 4s
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            multiplier: 2.0,
        }
    }
}

impl BackoffPolicy {
    pub fn new(initial_delay: Duration, multiplier: f64) -> Self {
        Self {
            initial_delay,
            multiplier,
        }
    }

    /// Delay in whole milliseconds before the next attempt.
    ///
    /// Saturates at `i64::MAX` instead of overflowing.
    pub fn delay_millis(&self, attempts_before: u32) -> i64 {
        let exponent = i32::try_from(attempts_before).unwrap_or(i32::MAX);
        let factor = self.multiplier.powi(exponent);
        let delay = (self.initial_delay.as_millis() as f64 * factor).round();
        if delay.is_nan() || delay <= 0.0 {
            0
        } else if delay >= i64::MAX as f64 {
            i64::MAX
        } else {
            delay as i64
        }
    }

    /// Earliest instant the event becomes eligible again.
    pub fn next_attempt_at(&self, now: DateTime<Utc>, attempts_before: u32) -> DateTime<Utc> {
        TimeDelta::try_milliseconds(self.delay_millis(attempts_before))
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap()
    }

    #[test]
    fn first_retry_uses_initial_delay() {
        let policy = BackoffPolicy::default();
        assert_eq!(
            policy.next_attempt_at(now(), 0),
            now() + TimeDelta::milliseconds(500)
        );
    }

    #[test]
    fn exponential_growth() {
        let policy = BackoffPolicy::new(Duration::from_millis(500), 2.0);

        assert_eq!(policy.delay_millis(0), 500);
        assert_eq!(policy.delay_millis(1), 1_000);
        assert_eq!(policy.delay_millis(2), 2_000);
        assert_eq!(policy.delay_millis(3), 4_000);
    }

    #[test]
    fn unit_multiplier_gives_constant_delay() {
        let policy = BackoffPolicy::new(Duration::from_millis(1), 1.0);
        for attempts in 0..10 {
            assert_eq!(policy.delay_millis(attempts), 1);
        }
    }

    #[test]
    fn fractional_delays_are_rounded() {
        let policy = BackoffPolicy::new(Duration::from_millis(100), 1.5);
        // 100 * 1.5^3 = 337.5
        assert_eq!(policy.delay_millis(3), 338);
    }

    #[test]
    fn huge_exponent_saturates_instead_of_overflowing() {
        let policy = BackoffPolicy::new(Duration::from_secs(1), 10.0);
        assert_eq!(policy.delay_millis(u32::MAX), i64::MAX);
        assert_eq!(policy.next_attempt_at(now(), 400), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn is_deterministic_for_injected_clock() {
        let policy = BackoffPolicy::default();
        assert_eq!(
            policy.next_attempt_at(now(), 2),
            policy.next_attempt_at(now(), 2)
        );
    }
}
