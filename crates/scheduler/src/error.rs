use mirage_core::DbId;
use mirage_store::StoreError;

/// Failures surfaced by the scheduler's public operations.
///
/// Execution failures never appear here: they are converted to task
/// status transitions and stats increments inside the scan loop, and
/// nothing below the loop boundary terminates the process.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// Fatal to `start()`: the manager will not run as configured.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The id names a synthetic quota marker, which never re-enters
    /// the queue.
    #[error("Task {0} is a synthetic quota marker")]
    SyntheticTask(DbId),

    /// A store read or write failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
