//! `tower::Layer`/`tower::Service` composition of the same retry and
//! circuit-breaker behavior [`super::executor::Resilience`] provides as a
//! bare async function (spec §4.1.1).
//!
//! Callers that already build a `tower::ServiceBuilder` pipeline (e.g. to
//! share it with other middleware) can layer `CircuitBreakerLayer` outermost
//! and `RetryLayer` innermost, the same ordering rationale as load-shedding
//! outermost and metrics innermost: reject before doing any retry work, only
//! retry the call that actually reached the transport.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::Service;

use crate::clock::Clock;
use crate::config::SyncConfig;

use super::backoff::{delay_for, BackoffKind};
use super::circuit_breaker::CircuitBreaker;
use super::classify::{Classify, ErrorClass, RecoveryStrategy};
use super::executor::Sleeper;

/// Error type produced by the middleware stack: either the inner service's
/// own error, or a rejection the middleware itself produced.
#[derive(Debug)]
pub enum MiddlewareError<E> {
    Inner(E),
    CircuitOpen,
    RetriesExhausted(E),
}

impl<E: Classify> Classify for MiddlewareError<E> {
    fn classify(&self) -> ErrorClass {
        match self {
            MiddlewareError::Inner(e) | MiddlewareError::RetriesExhausted(e) => e.classify(),
            MiddlewareError::CircuitOpen => ErrorClass::CircuitOpen,
        }
    }
}

/// Layer that wraps a service with a per-`operation_id` circuit breaker.
pub struct CircuitBreakerLayer<C> {
    breaker: Arc<CircuitBreaker>,
    clock: Arc<C>,
}

impl<C: Clock> CircuitBreakerLayer<C> {
    #[must_use]
    pub fn new(breaker: Arc<CircuitBreaker>, clock: Arc<C>) -> Self {
        Self { breaker, clock }
    }
}

impl<C: Clock, S> tower::Layer<S> for CircuitBreakerLayer<C> {
    type Service = CircuitBreakerService<C, S>;

    fn layer(&self, inner: S) -> Self::Service {
        CircuitBreakerService {
            inner,
            breaker: self.breaker.clone(),
            clock: self.clock.clone(),
        }
    }
}

pub struct CircuitBreakerService<C, S> {
    inner: S,
    breaker: Arc<CircuitBreaker>,
    clock: Arc<C>,
}

impl<C, S, Req> Service<Req> for CircuitBreakerService<C, S>
where
    C: Clock + 'static,
    S: Service<Req> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = MiddlewareError<S::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(MiddlewareError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let now = self.clock.monotonic_now();
        if !self.breaker.allow(now) {
            return Box::pin(async { Err(MiddlewareError::CircuitOpen) });
        }

        let breaker = self.breaker.clone();
        let clock = self.clock.clone();
        let fut = self.inner.call(req);
        Box::pin(async move {
            match fut.await {
                Ok(resp) => {
                    breaker.record_success();
                    Ok(resp)
                }
                Err(err) => {
                    breaker.record_failure(clock.monotonic_now());
                    Err(MiddlewareError::Inner(err))
                }
            }
        })
    }
}

/// Layer that retries a service's calls per the §4.1 classification table.
/// Does not implement the `ReauthenticateThenRetry` strategy's credential
/// refresh step (it has no access to an `AuthProvider`); callers that need
/// reauthentication should use [`super::executor::Resilience::execute`]
/// directly instead of this middleware form.
pub struct RetryLayer {
    config: SyncConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl RetryLayer {
    #[must_use]
    pub fn new(config: SyncConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { config, sleeper }
    }
}

impl<S> tower::Layer<S> for RetryLayer {
    type Service = RetryService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RetryService {
            inner,
            config: self.config.clone(),
            sleeper: self.sleeper.clone(),
        }
    }
}

pub struct RetryService<S> {
    inner: S,
    config: SyncConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl<S, Req> Service<Req> for RetryService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Classify + Send + 'static,
    S::Response: Send + 'static,
    Req: Clone + Send + 'static,
{
    type Response = S::Response;
    type Error = MiddlewareError<S::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(MiddlewareError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let mut inner = self.inner.clone();
        let config = self.config.clone();
        let sleeper = self.sleeper.clone();

        Box::pin(async move {
            let mut attempt = 0u32;
            loop {
                match inner.call(req.clone()).await {
                    Ok(resp) => return Ok(resp),
                    Err(err) => {
                        let class = err.classify();
                        let kind = match class.strategy() {
                            RecoveryStrategy::RetryLinear => BackoffKind::Linear,
                            RecoveryStrategy::RetryExponential => BackoffKind::Exponential,
                            _ => return Err(MiddlewareError::RetriesExhausted(err)),
                        };
                        if attempt + 1 >= config.max_attempts {
                            return Err(MiddlewareError::RetriesExhausted(err));
                        }
                        let delay = delay_for(kind, config.backoff_base, attempt);
                        sleeper.sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use async_trait::async_trait;
    use std::time::Duration;
    use tower::Layer;
    use tower::ServiceExt;

    struct FakeError(ErrorClass);
    impl Classify for FakeError {
        fn classify(&self) -> ErrorClass {
            self.0
        }
    }

    struct ImmediateSleeper;
    #[async_trait]
    impl Sleeper for ImmediateSleeper {
        async fn sleep(&self, _duration: Duration) {}
    }

    #[derive(Clone)]
    struct AlwaysFails;
    impl Service<()> for AlwaysFails {
        type Response = ();
        type Error = FakeError;
        type Future = Pin<Box<dyn Future<Output = Result<(), FakeError>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: ()) -> Self::Future {
            Box::pin(async { Err(FakeError(ErrorClass::NetworkUnavailable)) })
        }
    }

    #[tokio::test]
    async fn retry_layer_gives_up_after_max_attempts() {
        let layer = RetryLayer::new(SyncConfig::default(), Arc::new(ImmediateSleeper));
        let mut service = layer.layer(AlwaysFails);
        let result = service.ready().await.unwrap().call(()).await;
        assert!(matches!(result, Err(MiddlewareError::RetriesExhausted(_))));
    }

    #[tokio::test]
    async fn circuit_breaker_layer_rejects_when_open() {
        let breaker = Arc::new(CircuitBreaker::new(1, Duration::from_secs(60)));
        let clock = Arc::new(VirtualClock::new());
        let layer = CircuitBreakerLayer::new(breaker, clock);
        let mut service = layer.layer(AlwaysFails);

        let first = service.ready().await.unwrap().call(()).await;
        assert!(matches!(first, Err(MiddlewareError::Inner(_))));

        let second = service.ready().await.unwrap().call(()).await;
        assert!(matches!(second, Err(MiddlewareError::CircuitOpen)));
    }
}
