//! Sync engine configuration (spec §6.4).

use std::time::Duration;

/// Tunables for the sync engine, reconciler, scheduler, and resilience layer.
/// Constructed once at startup; cheap to clone since every field is `Copy`
/// or a small owned value.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Page size requested from the remote's `list()` calls.
    pub page_size: u32,
    /// Maximum objects batched into a single Store transaction.
    pub batch_size: u32,
    /// Interval between scheduler-triggered incremental syncs.
    pub incremental_interval: Duration,
    /// Interval between scheduler-triggered full syncs.
    pub full_sync_interval: Duration,
    /// Upper bound on total wall-clock time for one `perform_sync()` call.
    pub sync_deadline: Duration,
    /// Timeout for a single remote page fetch.
    pub per_fetch_timeout: Duration,
    /// Base delay for both linear and exponential backoff.
    pub backoff_base: Duration,
    /// Retries attempted per page/batch before giving up.
    pub max_attempts: u32,
    /// Consecutive failures before the circuit breaker opens.
    pub circuit_breaker_threshold: u32,
    /// Time the circuit breaker stays open before probing with a half-open
    /// trial request.
    pub circuit_breaker_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            batch_size: 100,
            incremental_interval: Duration::from_secs(5 * 60),
            full_sync_interval: Duration::from_secs(24 * 60 * 60),
            sync_deadline: Duration::from_secs(30 * 60),
            per_fetch_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_secs(2),
            max_attempts: 3,
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout: Duration::from_secs(60),
        }
    }
}
