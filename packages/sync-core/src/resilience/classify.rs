//! Error classification (spec §4.1's table).

/// A transport-layer failure mode, independent of the concrete error type
/// the remote client raises. Implementations of [`Classify`] map their own
/// error enum down to this set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    NetworkUnavailable,
    Timeout,
    RateLimited,
    QuotaExceeded,
    AuthRequired,
    TokenExpired,
    Server5xx,
    InvalidRequest,
    NotFound,
    PermissionDenied,
    Validation,
    ServiceUnavailable,
    CircuitOpen,
}

/// What the executor should do in response to a classified error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Retry with linear backoff (`base*(attempt+1)`), up to `max_attempts`.
    RetryLinear,
    /// Retry with exponential backoff (`base*2^attempt`), up to `max_attempts`.
    RetryExponential,
    /// Refresh credentials once, then retry exactly once more.
    ReauthenticateThenRetry,
    /// Do not retry; the error is terminal for this operation.
    Skip,
    /// Do not retry; use the caller-supplied fallback value instead.
    Fallback,
}

impl ErrorClass {
    /// Maps an error class to its recovery strategy, per the §4.1 table.
    #[must_use]
    pub fn strategy(self) -> RecoveryStrategy {
        match self {
            ErrorClass::NetworkUnavailable | ErrorClass::Timeout | ErrorClass::Server5xx => {
                RecoveryStrategy::RetryLinear
            }
            ErrorClass::RateLimited | ErrorClass::QuotaExceeded => {
                RecoveryStrategy::RetryExponential
            }
            ErrorClass::AuthRequired | ErrorClass::TokenExpired => {
                RecoveryStrategy::ReauthenticateThenRetry
            }
            ErrorClass::InvalidRequest
            | ErrorClass::NotFound
            | ErrorClass::PermissionDenied
            | ErrorClass::Validation => RecoveryStrategy::Skip,
            ErrorClass::ServiceUnavailable | ErrorClass::CircuitOpen => RecoveryStrategy::Fallback,
        }
    }
}

/// Implemented by a caller's transport error type so the executor can
/// classify failures without depending on that type directly.
pub trait Classify {
    fn classify(&self) -> ErrorClass;
}
