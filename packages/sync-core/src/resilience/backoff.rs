//! Backoff delay computation (spec §4.1).

use std::time::Duration;

/// Backoff shape selected by a [`super::classify::RecoveryStrategy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffKind {
    Linear,
    Exponential,
}

/// Computes the delay before retry number `attempt` (0-indexed: the delay
/// before the *first* retry is `attempt=0`).
#[must_use]
pub fn delay_for(kind: BackoffKind, base: Duration, attempt: u32) -> Duration {
    match kind {
        BackoffKind::Linear => base.saturating_mul(attempt + 1),
        BackoffKind::Exponential => base.saturating_mul(1u32 << attempt.min(31)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_backoff_grows_additively() {
        let base = Duration::from_secs(2);
        assert_eq!(delay_for(BackoffKind::Linear, base, 0), Duration::from_secs(2));
        assert_eq!(delay_for(BackoffKind::Linear, base, 1), Duration::from_secs(4));
        assert_eq!(delay_for(BackoffKind::Linear, base, 2), Duration::from_secs(6));
    }

    #[test]
    fn exponential_backoff_doubles() {
        let base = Duration::from_secs(2);
        assert_eq!(
            delay_for(BackoffKind::Exponential, base, 0),
            Duration::from_secs(2)
        );
        assert_eq!(
            delay_for(BackoffKind::Exponential, base, 1),
            Duration::from_secs(4)
        );
        assert_eq!(
            delay_for(BackoffKind::Exponential, base, 2),
            Duration::from_secs(8)
        );
    }

    #[test]
    fn rate_limited_burst_matches_documented_scenario() {
        // Two failures then a success: backoff sleeps 2s, 4s.
        let base = Duration::from_secs(2);
        assert_eq!(
            delay_for(BackoffKind::Exponential, base, 0),
            Duration::from_secs(2)
        );
        assert_eq!(
            delay_for(BackoffKind::Exponential, base, 1),
            Duration::from_secs(4)
        );
    }
}
