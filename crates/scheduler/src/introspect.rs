//! Introspection report types exposed to the HTTP/CLI layer.

use serde::Serialize;

use mirage_core::{DbId, Task, TaskStatus, TaskType, Timestamp};

// ---------------------------------------------------------------------------
// Manager lifecycle
// ---------------------------------------------------------------------------

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ManagerStatus {
    Stopped,
    Running,
    Paused,
    Error,
}

/// Cumulative counters kept by one manager since its creation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ManagerStats {
    pub total_processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub error_count: u64,
    pub last_scan_at: Option<Timestamp>,
}

/// Snapshot returned by `TaskManager::status`.
#[derive(Debug, Serialize)]
pub struct ManagerStatusReport {
    pub status: ManagerStatus,
    /// Number of registry entries (dispatched, not yet swept).
    pub processing_count: usize,
    pub processing_ids: Vec<DbId>,
    pub stats: ManagerStats,
    pub uptime_secs: u64,
    pub max_concurrency: usize,
    /// Occupied slots on the shared pool, across all managers.
    pub active_workers: usize,
    pub pool_alive: bool,
}

// ---------------------------------------------------------------------------
// Task summary
// ---------------------------------------------------------------------------

/// Per-status task counts. Synthetic quota markers are excluded so the
/// numbers reflect real demand.
#[derive(Debug, Serialize)]
pub struct TaskSummary {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
    pub created_today: usize,
}

// ---------------------------------------------------------------------------
// Detailed listing
// ---------------------------------------------------------------------------

/// One task row with derived display fields.
#[derive(Debug, Serialize)]
pub struct TaskView {
    pub id: DbId,
    pub task_type: TaskType,
    pub prompt: String,
    pub model: String,
    pub ratio: String,
    pub quality: String,
    pub status: TaskStatus,
    pub status_label: &'static str,
    pub account_id: Option<DbId>,
    pub artifacts: Vec<String>,
    pub artifact_count: usize,
    pub synthetic: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        let artifacts = task.artifacts.unwrap_or_default();
        Self {
            id: task.id,
            task_type: task.task_type,
            prompt: task.params.prompt,
            model: task.params.model,
            ratio: task.params.ratio,
            quality: task.params.quality,
            status: task.status,
            status_label: task.status.label(),
            account_id: task.account_id,
            artifact_count: artifacts.len(),
            artifacts,
            synthetic: task.synthetic,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

impl Pagination {
    pub fn new(total: usize, page: usize, page_size: usize) -> Self {
        Self {
            total,
            page,
            page_size,
            total_pages: total.div_ceil(page_size.max(1)),
        }
    }
}

/// One page of the most-recent-first task listing.
#[derive(Debug, Serialize)]
pub struct TaskPageReport {
    pub tasks: Vec<TaskView>,
    pub pagination: Pagination,
}

// ---------------------------------------------------------------------------
// Thread details
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    /// Bound to an executing task.
    Active,
    /// Free and ready for dispatch.
    Idle,
    /// Unavailable: no pool attached or the pool no longer admits work.
    Inactive,
}

/// View of one notional worker slot (1-based), for frontends that
/// render per-thread activity.
#[derive(Debug, Serialize)]
pub struct ThreadSlot {
    pub id: usize,
    pub state: SlotState,
    pub task_id: Option<DbId>,
    pub task_type: Option<TaskType>,
    pub prompt: Option<String>,
    pub progress_percent: Option<i16>,
    pub started_at: Option<Timestamp>,
}

impl ThreadSlot {
    pub(crate) fn vacant(id: usize, state: SlotState) -> Self {
        Self {
            id,
            state,
            task_id: None,
            task_type: None,
            prompt: None,
            progress_percent: None,
            started_at: None,
        }
    }
}

/// Maximum prompt length echoed into thread details.
const PROMPT_EXCERPT_CHARS: usize = 120;

/// Shorten a prompt for display, marking truncation with an ellipsis.
pub fn prompt_excerpt(prompt: &str) -> String {
    let mut excerpt: String = prompt.chars().take(PROMPT_EXCERPT_CHARS).collect();
    if excerpt.len() < prompt.len() {
        excerpt.push_str("...");
    }
    excerpt
}
