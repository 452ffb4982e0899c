//! Per-operation circuit breaker state machine (spec §4.1).

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// The breaker's externally visible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: State,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
}

/// A circuit breaker for a single `operation_id`. Opens after `threshold`
/// consecutive failures; after `timeout` elapses it allows one trial call
/// through as `HalfOpen`, closing on success or reopening (with a fresh
/// `opened_at`) on failure.
pub struct CircuitBreaker {
    threshold: u32,
    timeout: Duration,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(threshold: u32, timeout: Duration) -> Self {
        Self {
            threshold,
            timeout,
            inner: Mutex::new(Inner {
                state: State::Closed,
                consecutive_failures: 0,
                opened_at: None,
            }),
        }
    }

    /// Whether a call should be allowed to proceed right now. `Open` breakers
    /// transition to `HalfOpen` (and allow the call) once `timeout` has
    /// elapsed since `opened_at`, as measured against `monotonic_now`.
    pub fn allow(&self, monotonic_now: Instant) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            State::Closed | State::HalfOpen => true,
            State::Open => {
                let opened_at = inner.opened_at.expect("Open state always has opened_at");
                if monotonic_now.duration_since(opened_at) >= self.timeout {
                    inner.state = State::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Records a successful call. Closes the breaker and resets the failure
    /// count, from any prior state.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = State::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    /// Records a failed call at `monotonic_now`. A failure while `HalfOpen`
    /// reopens immediately with a fresh timestamp; a failure while `Closed`
    /// opens only once `threshold` consecutive failures have accumulated.
    pub fn record_failure(&self, monotonic_now: Instant) {
        let mut inner = self.inner.lock();
        match inner.state {
            State::HalfOpen => {
                inner.state = State::Open;
                inner.opened_at = Some(monotonic_now);
                inner.consecutive_failures = self.threshold;
            }
            State::Closed | State::Open => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.threshold {
                    inner.state = State::Open;
                    inner.opened_at = Some(monotonic_now);
                }
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> State {
        self.inner.lock().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threshold_breaker() -> CircuitBreaker {
        CircuitBreaker::new(5, Duration::from_secs(60))
    }

    #[test]
    fn starts_closed_and_allows_calls() {
        let breaker = threshold_breaker();
        assert_eq!(breaker.state(), State::Closed);
        assert!(breaker.allow(Instant::now()));
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let breaker = threshold_breaker();
        let now = Instant::now();
        for _ in 0..4 {
            breaker.record_failure(now);
        }
        assert_eq!(breaker.state(), State::Closed);
        breaker.record_failure(now);
        assert_eq!(breaker.state(), State::Open);
    }

    #[test]
    fn success_resets_failure_count() {
        let breaker = threshold_breaker();
        let now = Instant::now();
        for _ in 0..4 {
            breaker.record_failure(now);
        }
        breaker.record_success();
        breaker.record_failure(now);
        assert_eq!(breaker.state(), State::Closed);
    }

    #[test]
    fn open_breaker_blocks_until_timeout_then_half_opens() {
        let breaker = threshold_breaker();
        let opened_at = Instant::now();
        for _ in 0..5 {
            breaker.record_failure(opened_at);
        }
        assert_eq!(breaker.state(), State::Open);
        assert!(!breaker.allow(opened_at + Duration::from_secs(30)));
        assert!(breaker.allow(opened_at + Duration::from_secs(60)));
        assert_eq!(breaker.state(), State::HalfOpen);
    }

    #[test]
    fn half_open_success_closes_breaker() {
        let breaker = threshold_breaker();
        let opened_at = Instant::now();
        for _ in 0..5 {
            breaker.record_failure(opened_at);
        }
        breaker.allow(opened_at + Duration::from_secs(60));
        breaker.record_success();
        assert_eq!(breaker.state(), State::Closed);
    }

    #[test]
    fn half_open_failure_reopens_with_fresh_timestamp() {
        let breaker = threshold_breaker();
        let opened_at = Instant::now();
        for _ in 0..5 {
            breaker.record_failure(opened_at);
        }
        let probe_time = opened_at + Duration::from_secs(60);
        breaker.allow(probe_time);
        breaker.record_failure(probe_time);
        assert_eq!(breaker.state(), State::Open);

        // Still open just under a fresh 60s window from the reopen time.
        assert!(!breaker.allow(probe_time + Duration::from_secs(59)));
        assert!(breaker.allow(probe_time + Duration::from_secs(60)));
    }
}
