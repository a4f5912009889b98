//! Task manager configuration.

use std::time::Duration;

use mirage_core::{QuotaTable, TaskType};

/// How often the scan loop wakes to look for queued tasks.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// How long the manager stays in the Error state before resuming
/// scans after a loop-boundary failure.
pub const DEFAULT_ERROR_BACKOFF: Duration = Duration::from_secs(30);

/// Concurrent execution slots when none is configured.
pub const DEFAULT_MAX_CONCURRENCY: usize = 5;

/// Assumed task runtime used for progress estimation.
pub const DEFAULT_NOMINAL_TASK_DURATION: Duration = Duration::from_secs(10);

/// Tunables for one [`crate::TaskManager`] instance.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    pub scan_interval: Duration,
    pub error_backoff: Duration,
    /// Upper bound on this manager's in-flight tasks. The shared pool's
    /// capacity bounds all managers globally on top of this.
    pub max_concurrency: usize,
    /// Execution-environment hint passed through to the backend.
    pub headless: bool,
    /// Restrict the scan to one task type. Useful when several managers
    /// share a pool, one per type. `None` scans every type.
    pub task_type: Option<TaskType>,
    pub quotas: QuotaTable,
    /// Assumed task runtime for progress estimation in thread details.
    pub nominal_task_duration: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            scan_interval: DEFAULT_SCAN_INTERVAL,
            error_backoff: DEFAULT_ERROR_BACKOFF,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            headless: true,
            task_type: None,
            quotas: QuotaTable::default(),
            nominal_task_duration: DEFAULT_NOMINAL_TASK_DURATION,
        }
    }
}
