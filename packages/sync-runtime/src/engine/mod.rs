//! Sync Engine and Scheduler (spec §4.4, §4.5).

pub(crate) mod remote_error;
mod scheduler;
mod sync_engine;

pub use scheduler::Scheduler;
pub use sync_engine::{SyncEngine, TokioSleeper};
