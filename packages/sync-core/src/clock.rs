//! Monotonic and wall-clock time, and idempotency key generation.
//!
//! Abstracted behind a trait so tests can inject a virtual clock instead of
//! reading the real system time. All other components depend on [`Clock`],
//! never on `std::time::SystemTime` or `Instant` directly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Abstraction over wall-clock and monotonic time for dependency injection.
///
/// The default implementation ([`SystemClock`]) delegates to `std::time`.
/// Tests use [`VirtualClock`] to control elapsed time deterministically.
pub trait Clock: Send + Sync {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;

    /// Current monotonic instant, used for backoff/circuit-breaker timers
    /// where wall-clock adjustments must not affect elapsed-time math.
    fn monotonic_now(&self) -> Instant;
}

/// Default clock backed by the real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn monotonic_now(&self) -> Instant {
        Instant::now()
    }
}

/// Deterministic clock for tests. Wall-clock time starts at the Unix epoch
/// plus an offset and only advances when [`VirtualClock::advance`] is called;
/// the monotonic instant is derived the same way so elapsed-time assertions
/// in backoff/circuit-breaker tests stay exact.
pub struct VirtualClock {
    epoch: Instant,
    offset_millis: AtomicU64,
}

impl VirtualClock {
    /// Creates a virtual clock starting at the Unix epoch.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            offset_millis: AtomicU64::new(0),
        }
    }

    /// Advances the virtual clock by `duration`.
    pub fn advance(&self, duration: Duration) {
        self.offset_millis
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.offset_millis.load(Ordering::SeqCst);
        DateTime::<Utc>::from(UNIX_EPOCH + Duration::from_millis(millis))
    }

    fn monotonic_now(&self) -> Instant {
        let millis = self.offset_millis.load(Ordering::SeqCst);
        self.epoch + Duration::from_millis(millis)
    }
}

/// Generates idempotency keys for mutating remote calls.
///
/// Each key is unique per process per call; the remote uses it to guarantee
/// at-most-once effect for retried `upsert`/`batch_change` requests.
pub trait IdGen: Send + Sync {
    /// Generate a fresh idempotency key.
    fn idempotency_key(&self) -> String;
}

/// Default [`IdGen`] backed by UUID v4.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdGen;

impl IdGen for UuidIdGen {
    fn idempotency_key(&self) -> String {
        Uuid::new_v4().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_now_is_recent() {
        let clock = SystemClock;
        let now = clock.now();
        let elapsed = Utc::now().signed_duration_since(now);
        assert!(elapsed.num_seconds().abs() < 5);
    }

    #[test]
    fn virtual_clock_starts_at_epoch() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now().timestamp(), 0);
    }

    #[test]
    fn virtual_clock_advances_deterministically() {
        let clock = VirtualClock::new();
        clock.advance(Duration::from_secs(60));
        assert_eq!(clock.now().timestamp(), 60);

        clock.advance(Duration::from_secs(30));
        assert_eq!(clock.now().timestamp(), 90);
    }

    #[test]
    fn virtual_clock_monotonic_tracks_wall_clock_offset() {
        let clock = VirtualClock::new();
        let start = clock.monotonic_now();
        clock.advance(Duration::from_millis(500));
        let after = clock.monotonic_now();
        assert_eq!(after.duration_since(start), Duration::from_millis(500));
    }

    #[test]
    fn uuid_idgen_produces_unique_keys() {
        let gen = UuidIdGen;
        let a = gen.idempotency_key();
        let b = gen.idempotency_key();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
