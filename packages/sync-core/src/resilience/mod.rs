//! Retry, backoff, and circuit breaking for remote calls (spec §4.1).
//!
//! Pure state machines with no I/O: `sync-runtime` supplies the concrete
//! [`executor::Sleeper`] and the transport errors that implement
//! [`classify::Classify`].

pub mod backoff;
pub mod circuit_breaker;
pub mod classify;
pub mod executor;
pub mod middleware;

pub use backoff::BackoffKind;
pub use circuit_breaker::{CircuitBreaker, State as CircuitState};
pub use classify::{Classify, ErrorClass, RecoveryStrategy};
pub use executor::{Degradation, Outcome, Resilience, Sleeper};
