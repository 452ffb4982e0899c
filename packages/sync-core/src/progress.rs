//! Sync progress reporting (spec §4.7).

use crate::error::SyncError;
use crate::model::Kind;

/// Whether a sync pass is doing a full re-list or an incremental catch-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Full,
    Incremental,
}

/// One error recorded against a batch, accumulated into [`SyncResult`]
/// rather than aborting the whole sync (spec §4.3). `kind` is `None` when
/// the object's own `type` field was unrecognized, so there is no [`Kind`]
/// to attribute the error to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchError {
    pub id: String,
    pub kind: Option<Kind>,
    pub message: String,
}

/// Aggregated counters across every batch of one `perform_sync()` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncResult {
    pub mode: SyncMode,
    pub processed: u64,
    pub inserted: u64,
    pub updated: u64,
    pub deleted: u64,
    pub errors: Vec<BatchError>,
}

impl SyncResult {
    #[must_use]
    pub fn empty(mode: SyncMode) -> Self {
        Self {
            mode,
            processed: 0,
            inserted: 0,
            updated: 0,
            deleted: 0,
            errors: Vec::new(),
        }
    }

    /// Folds another batch's counters into this running total.
    pub fn merge(&mut self, other: SyncResult) {
        self.processed += other.processed;
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.deleted += other.deleted;
        self.errors.extend(other.errors);
    }
}

/// The engine's lifecycle state machine: `Idle -> Preparing ->
/// Syncing(mode, fraction) -> Completed(result) | Failed(error) -> Idle`.
#[derive(Debug, Clone)]
pub enum SyncPhase {
    Idle,
    Preparing,
    Syncing { mode: SyncMode, fraction: f64 },
    Completed(SyncResult),
    Failed(SyncError),
}

/// A point-in-time progress report. Equality disregards the actual result
/// payload except for its [`SyncMode`], so UI layers can diff a stream of
/// these for stability without caring about counter churn within a phase.
#[derive(Debug, Clone)]
pub struct SyncProgress {
    pub phase: SyncPhase,
}

impl SyncProgress {
    #[must_use]
    pub fn new(phase: SyncPhase) -> Self {
        Self { phase }
    }
}

impl PartialEq for SyncProgress {
    fn eq(&self, other: &Self) -> bool {
        match (&self.phase, &other.phase) {
            (SyncPhase::Idle, SyncPhase::Idle) | (SyncPhase::Preparing, SyncPhase::Preparing) => {
                true
            }
            (
                SyncPhase::Syncing { mode: a, fraction: fa },
                SyncPhase::Syncing { mode: b, fraction: fb },
            ) => a == b && (fa - fb).abs() < f64::EPSILON,
            (SyncPhase::Completed(a), SyncPhase::Completed(b)) => a.mode == b.mode,
            (SyncPhase::Failed(_), SyncPhase::Failed(_)) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_progress_ignores_counters_in_equality() {
        let mut a = SyncResult::empty(SyncMode::Full);
        a.inserted = 4;
        let mut b = SyncResult::empty(SyncMode::Full);
        b.inserted = 99;
        b.errors.push(BatchError {
            id: "x".into(),
            kind: Some(Kind::Item),
            message: "boom".into(),
        });

        let progress_a = SyncProgress::new(SyncPhase::Completed(a));
        let progress_b = SyncProgress::new(SyncPhase::Completed(b));
        assert_eq!(progress_a, progress_b);
    }

    #[test]
    fn completed_progress_distinguishes_sync_mode() {
        let full = SyncProgress::new(SyncPhase::Completed(SyncResult::empty(SyncMode::Full)));
        let incremental =
            SyncProgress::new(SyncPhase::Completed(SyncResult::empty(SyncMode::Incremental)));
        assert_ne!(full, incremental);
    }

    #[test]
    fn syncing_progress_compares_mode_and_fraction() {
        let a = SyncProgress::new(SyncPhase::Syncing {
            mode: SyncMode::Full,
            fraction: 0.5,
        });
        let b = SyncProgress::new(SyncPhase::Syncing {
            mode: SyncMode::Full,
            fraction: 0.5,
        });
        let c = SyncProgress::new(SyncPhase::Syncing {
            mode: SyncMode::Full,
            fraction: 0.9,
        });
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn merge_accumulates_counters_and_errors() {
        let mut total = SyncResult::empty(SyncMode::Full);
        let mut batch = SyncResult::empty(SyncMode::Full);
        batch.inserted = 2;
        batch.errors.push(BatchError {
            id: "a".into(),
            kind: Some(Kind::Category),
            message: "bad".into(),
        });
        total.merge(batch);
        assert_eq!(total.inserted, 2);
        assert_eq!(total.errors.len(), 1);
    }
}
