//! The Resilience executor: retry, backoff, circuit breaking (spec §4.1).

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::cancel::CancelToken;
use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::traits::AuthProvider;

use super::backoff::{delay_for, BackoffKind};
use super::circuit_breaker::CircuitBreaker;
use super::classify::{Classify, ErrorClass, RecoveryStrategy};

/// Cancellable sleep, injected so this crate never depends on a specific
/// async runtime's timer. `sync-runtime` provides a `tokio::time::sleep`
/// backed implementation.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// What to do once retries are exhausted or the breaker is open.
pub enum Degradation<T> {
    /// Use the caller-supplied cached value.
    ReturnCached(T),
    /// Use `T::default()`.
    ReturnDefault,
    /// Propagate the classified error.
    FailFast,
}

/// Outcome of [`Resilience::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The operation succeeded, possibly after retries.
    Ok(T),
    /// The operation failed but a fallback value was used instead.
    Degraded(T),
    /// The operation failed terminally with no fallback available.
    Failed,
}

/// Retry/backoff/circuit-breaker orchestration, one instance shared across
/// all operations. Each `operation_id` gets its own [`CircuitBreaker`],
/// stored in a [`DashMap`] so independent operations never contend on the
/// same lock.
pub struct Resilience<C: Clock> {
    clock: C,
    config: SyncConfig,
    breakers: DashMap<String, CircuitBreaker>,
}

impl<C: Clock> Resilience<C> {
    #[must_use]
    pub fn new(clock: C, config: SyncConfig) -> Self {
        Self {
            clock,
            config,
            breakers: DashMap::new(),
        }
    }

    fn breaker_for(&self, operation_id: &str) -> dashmap::mapref::one::Ref<'_, String, CircuitBreaker> {
        self.breakers
            .entry(operation_id.to_string())
            .or_insert_with(|| {
                CircuitBreaker::new(
                    self.config.circuit_breaker_threshold,
                    self.config.circuit_breaker_timeout,
                )
            })
            .downgrade()
    }

    /// Explicitly records a success against `operation_id`'s breaker,
    /// outside of [`Self::execute`] (e.g. for calls the caller retries
    /// itself but still wants circuit-breaker tracking for).
    pub fn record_success(&self, operation_id: &str) {
        self.breaker_for(operation_id).record_success();
    }

    /// Explicitly records a failure against `operation_id`'s breaker.
    pub fn record_failure(&self, operation_id: &str) {
        self.breaker_for(operation_id).record_failure(self.clock.monotonic_now());
    }

    /// Runs `op`, retrying per its classified [`RecoveryStrategy`] and
    /// respecting `operation_id`'s circuit breaker. `op` is called fresh on
    /// every attempt (it should be cheaply re-runnable, e.g. a closure
    /// capturing request parameters by reference).
    ///
    /// `cancel` is polled before every sleep; a cancelled token ends the
    /// retry loop immediately with [`Outcome::Failed`], matching the
    /// cooperative cancellation contract (sleeps are suspension points).
    ///
    /// `auth` is consulted only for the `AuthRequired`/`TokenExpired`
    /// classification: `ReauthenticateThenRetry` calls
    /// `auth.ensure_valid_token()` once before its single retry (spec §4.1's
    /// "reauthenticate once, then one retry"). A failed refresh signs out
    /// and degrades rather than retrying against a credential known to be
    /// invalid.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation_id: &str,
        sleeper: &dyn Sleeper,
        auth: &dyn AuthProvider,
        cancel: &CancelToken,
        degradation: Degradation<T>,
        mut op: F,
    ) -> Outcome<T>
    where
        T: Default,
        E: Classify,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.breaker_for(operation_id).allow(self.clock.monotonic_now()) {
            return self.degrade(degradation);
        }

        let mut attempt = 0u32;
        let mut reauthenticated = false;

        loop {
            if cancel.is_cancelled() {
                return Outcome::Failed;
            }

            match op().await {
                Ok(value) => {
                    self.breaker_for(operation_id).record_success();
                    return Outcome::Ok(value);
                }
                Err(err) => {
                    let class = err.classify();
                    self.breaker_for(operation_id)
                        .record_failure(self.clock.monotonic_now());

                    match class.strategy() {
                        RecoveryStrategy::Skip => return self.degrade(degradation),
                        RecoveryStrategy::Fallback => return self.degrade(degradation),
                        RecoveryStrategy::ReauthenticateThenRetry => {
                            if reauthenticated {
                                return self.degrade(degradation);
                            }
                            reauthenticated = true;
                            if auth.ensure_valid_token().await.is_none() {
                                auth.sign_out().await;
                                return self.degrade(degradation);
                            }
                            continue;
                        }
                        RecoveryStrategy::RetryLinear | RecoveryStrategy::RetryExponential => {
                            if attempt + 1 >= self.config.max_attempts {
                                return self.degrade(degradation);
                            }
                            let kind = match class.strategy() {
                                RecoveryStrategy::RetryLinear => BackoffKind::Linear,
                                _ => BackoffKind::Exponential,
                            };
                            let delay = delay_for(kind, self.config.backoff_base, attempt);
                            if cancel.is_cancelled() {
                                return Outcome::Failed;
                            }
                            sleeper.sleep(delay).await;
                            attempt += 1;
                        }
                    }
                }
            }
        }
    }

    fn degrade<T: Default>(&self, degradation: Degradation<T>) -> Outcome<T> {
        match degradation {
            Degradation::ReturnCached(value) => Outcome::Degraded(value),
            Degradation::ReturnDefault => Outcome::Degraded(T::default()),
            Degradation::FailFast => Outcome::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::traits::Token;
    use std::cell::RefCell;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeError(ErrorClass);
    impl Classify for FakeError {
        fn classify(&self) -> ErrorClass {
            self.0
        }
    }

    struct NoopSleeper {
        calls: std::sync::Mutex<Vec<Duration>>,
    }
    impl NoopSleeper {
        fn new() -> Self {
            Self {
                calls: std::sync::Mutex::new(Vec::new()),
            }
        }
    }
    #[async_trait]
    impl Sleeper for NoopSleeper {
        async fn sleep(&self, duration: Duration) {
            self.calls.lock().unwrap().push(duration);
        }
    }

    /// Refreshes succeed and are counted, for asserting reauthentication
    /// actually happened rather than being a silent no-op.
    struct RefreshingAuth {
        refreshes: AtomicU32,
    }
    impl RefreshingAuth {
        fn new() -> Self {
            Self {
                refreshes: AtomicU32::new(0),
            }
        }
    }
    #[async_trait]
    impl AuthProvider for RefreshingAuth {
        async fn is_authenticated(&self) -> bool {
            true
        }
        async fn token(&self) -> Option<Token> {
            Some(Token("t".into()))
        }
        async fn ensure_valid_token(&self) -> Option<Token> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            Some(Token("refreshed".into()))
        }
        async fn sign_out(&self) {}
    }

    /// Every refresh attempt fails, for asserting a failed reauthentication
    /// degrades instead of retrying against a known-bad credential.
    struct NeverRefreshes {
        signed_out: std::sync::atomic::AtomicBool,
    }
    impl NeverRefreshes {
        fn new() -> Self {
            Self {
                signed_out: std::sync::atomic::AtomicBool::new(false),
            }
        }
    }
    #[async_trait]
    impl AuthProvider for NeverRefreshes {
        async fn is_authenticated(&self) -> bool {
            true
        }
        async fn token(&self) -> Option<Token> {
            Some(Token("t".into()))
        }
        async fn ensure_valid_token(&self) -> Option<Token> {
            None
        }
        async fn sign_out(&self) {
            self.signed_out.store(true, Ordering::SeqCst);
        }
    }

    fn test_resilience() -> Resilience<VirtualClock> {
        Resilience::new(VirtualClock::new(), SyncConfig::default())
    }

    #[tokio::test]
    async fn succeeds_on_first_attempt_without_sleeping() {
        let resilience = test_resilience();
        let sleeper = NoopSleeper::new();
        let auth = RefreshingAuth::new();
        let cancel = CancelToken::new();

        let outcome = resilience
            .execute(
                "op",
                &sleeper,
                &auth,
                &cancel,
                Degradation::<u32>::FailFast,
                || async { Ok::<u32, FakeError>(42) },
            )
            .await;

        assert_eq!(outcome, Outcome::Ok(42));
        assert!(sleeper.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn retries_transient_errors_then_succeeds() {
        let resilience = test_resilience();
        let sleeper = NoopSleeper::new();
        let auth = RefreshingAuth::new();
        let cancel = CancelToken::new();
        let calls = AtomicU32::new(0);

        let outcome = resilience
            .execute(
                "op",
                &sleeper,
                &auth,
                &cancel,
                Degradation::<u32>::FailFast,
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n < 2 {
                            Err(FakeError(ErrorClass::RateLimited))
                        } else {
                            Ok(7)
                        }
                    }
                },
            )
            .await;

        assert_eq!(outcome, Outcome::Ok(7));
        let sleeps = sleeper.calls.lock().unwrap();
        assert_eq!(*sleeps, vec![Duration::from_secs(2), Duration::from_secs(4)]);
    }

    #[tokio::test]
    async fn skip_strategy_degrades_immediately_without_retry() {
        let resilience = test_resilience();
        let sleeper = NoopSleeper::new();
        let auth = RefreshingAuth::new();
        let cancel = CancelToken::new();
        let calls = RefCell::new(0);

        let outcome = resilience
            .execute(
                "op",
                &sleeper,
                &auth,
                &cancel,
                Degradation::ReturnCached(99u32),
                || {
                    *calls.borrow_mut() += 1;
                    async { Err::<u32, FakeError>(FakeError(ErrorClass::NotFound)) }
                },
            )
            .await;

        assert_eq!(outcome, Outcome::Degraded(99));
        assert_eq!(*calls.borrow(), 1);
    }

    #[tokio::test]
    async fn exhausted_retries_return_degraded_fallback() {
        let resilience = test_resilience();
        let sleeper = NoopSleeper::new();
        let auth = RefreshingAuth::new();
        let cancel = CancelToken::new();

        let outcome = resilience
            .execute(
                "op",
                &sleeper,
                &auth,
                &cancel,
                Degradation::ReturnDefault,
                || async { Err::<u32, FakeError>(FakeError(ErrorClass::NetworkUnavailable)) },
            )
            .await;

        assert_eq!(outcome, Outcome::Degraded(0));
    }

    #[tokio::test]
    async fn open_circuit_short_circuits_without_calling_op() {
        let resilience = test_resilience();
        let sleeper = NoopSleeper::new();
        let auth = RefreshingAuth::new();
        let cancel = CancelToken::new();
        let calls = AtomicU32::new(0);

        for _ in 0..5 {
            let _ = resilience
                .execute(
                    "flaky",
                    &sleeper,
                    &auth,
                    &cancel,
                    Degradation::<u32>::FailFast,
                    || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { Err::<u32, FakeError>(FakeError(ErrorClass::NotFound)) }
                    },
                )
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);

        let outcome = resilience
            .execute(
                "flaky",
                &sleeper,
                &auth,
                &cancel,
                Degradation::ReturnDefault,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<u32, FakeError>(1) }
                },
            )
            .await;

        assert_eq!(outcome, Outcome::Degraded(0));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn cancellation_stops_retry_loop() {
        let resilience = test_resilience();
        let sleeper = NoopSleeper::new();
        let auth = RefreshingAuth::new();
        let cancel = CancelToken::new();
        cancel.cancel();

        let outcome = resilience
            .execute(
                "op",
                &sleeper,
                &auth,
                &cancel,
                Degradation::<u32>::FailFast,
                || async { Ok::<u32, FakeError>(1) },
            )
            .await;

        assert_eq!(outcome, Outcome::Failed);
    }

    #[tokio::test]
    async fn reauthenticate_then_retry_refreshes_token_and_succeeds() {
        let resilience = test_resilience();
        let sleeper = NoopSleeper::new();
        let auth = RefreshingAuth::new();
        let cancel = CancelToken::new();
        let calls = AtomicU32::new(0);

        let outcome = resilience
            .execute(
                "op",
                &sleeper,
                &auth,
                &cancel,
                Degradation::<u32>::FailFast,
                || {
                    let n = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if n == 0 {
                            Err(FakeError(ErrorClass::AuthRequired))
                        } else {
                            Ok(5)
                        }
                    }
                },
            )
            .await;

        assert_eq!(outcome, Outcome::Ok(5));
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn reauthenticate_then_retry_degrades_and_signs_out_on_failed_refresh() {
        let resilience = test_resilience();
        let sleeper = NoopSleeper::new();
        let auth = NeverRefreshes::new();
        let cancel = CancelToken::new();
        let calls = AtomicU32::new(0);

        let outcome = resilience
            .execute(
                "op",
                &sleeper,
                &auth,
                &cancel,
                Degradation::ReturnDefault,
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err::<u32, FakeError>(FakeError(ErrorClass::AuthRequired)) }
                },
            )
            .await;

        assert_eq!(outcome, Outcome::Degraded(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(auth.signed_out.load(Ordering::SeqCst));
    }
}
