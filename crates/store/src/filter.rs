//! Query types for the task store: filters, ordering, field patches,
//! and new-record payloads.

use mirage_core::{DbId, GenerationParams, Task, TaskStatus, TaskType, Timestamp};

// ---------------------------------------------------------------------------
// TaskFilter
// ---------------------------------------------------------------------------

/// Conjunctive filter over task records. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Match any of these statuses.
    pub statuses: Option<Vec<TaskStatus>>,
    pub task_type: Option<TaskType>,
    pub account_id: Option<DbId>,
    pub synthetic: Option<bool>,
    /// Inclusive lower bound on `created_at`.
    pub created_since: Option<Timestamp>,
    /// Exclusive upper bound on `created_at`.
    pub created_before: Option<Timestamp>,
}

impl TaskFilter {
    /// A filter matching every record.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: TaskStatus) -> Self {
        self.statuses = Some(vec![status]);
        self
    }

    pub fn status_in(mut self, statuses: &[TaskStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn task_type(mut self, task_type: TaskType) -> Self {
        self.task_type = Some(task_type);
        self
    }

    pub fn account(mut self, account_id: DbId) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = Some(synthetic);
        self
    }

    pub fn created_since(mut self, since: Timestamp) -> Self {
        self.created_since = Some(since);
        self
    }

    pub fn created_before(mut self, before: Timestamp) -> Self {
        self.created_before = Some(before);
        self
    }

    /// Whether a record satisfies every set clause.
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(statuses) = &self.statuses {
            if !statuses.contains(&task.status) {
                return false;
            }
        }
        if let Some(task_type) = self.task_type {
            if task.task_type != task_type {
                return false;
            }
        }
        if let Some(account_id) = self.account_id {
            if task.account_id != Some(account_id) {
                return false;
            }
        }
        if let Some(synthetic) = self.synthetic {
            if task.synthetic != synthetic {
                return false;
            }
        }
        if let Some(since) = self.created_since {
            if task.created_at < since {
                return false;
            }
        }
        if let Some(before) = self.created_before {
            if task.created_at >= before {
                return false;
            }
        }
        true
    }
}

// ---------------------------------------------------------------------------
// TaskOrder
// ---------------------------------------------------------------------------

/// Result ordering. Ties on `created_at` break by id in the same
/// direction, so ordering is total and stable across reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOrder {
    /// Oldest first: the scan loop's FIFO order.
    CreatedAsc,
    /// Newest first: display listings.
    CreatedDesc,
}

impl TaskOrder {
    /// Sort a result set in place.
    pub fn sort(self, tasks: &mut [Task]) {
        match self {
            TaskOrder::CreatedAsc => {
                tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            }
            TaskOrder::CreatedDesc => {
                tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
            }
        }
    }
}

// ---------------------------------------------------------------------------
// TaskPatch
// ---------------------------------------------------------------------------

/// Field updates applied by [`crate::TaskStore::update`].
///
/// Outer `None` leaves a field untouched; `account_id` and `artifacts`
/// distinguish "set" from "clear" with a nested `Option`. Every applied
/// patch refreshes `updated_at`.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub status: Option<TaskStatus>,
    pub account_id: Option<Option<DbId>>,
    pub artifacts: Option<Option<Vec<String>>>,
}

impl TaskPatch {
    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn assign_account(mut self, account_id: DbId) -> Self {
        self.account_id = Some(Some(account_id));
        self
    }

    pub fn clear_account(mut self) -> Self {
        self.account_id = Some(None);
        self
    }

    pub fn artifacts(mut self, artifacts: Vec<String>) -> Self {
        self.artifacts = Some(Some(artifacts));
        self
    }

    pub fn clear_artifacts(mut self) -> Self {
        self.artifacts = Some(None);
        self
    }
}

// ---------------------------------------------------------------------------
// NewTask
// ---------------------------------------------------------------------------

/// Payload for creating a task record.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub task_type: TaskType,
    pub params: GenerationParams,
    pub status: TaskStatus,
    pub account_id: Option<DbId>,
    pub synthetic: bool,
}

impl NewTask {
    /// A genuine request entering the queue.
    pub fn queued(task_type: TaskType, params: GenerationParams) -> Self {
        Self {
            task_type,
            params,
            status: TaskStatus::Queued,
            account_id: None,
            synthetic: false,
        }
    }
}
