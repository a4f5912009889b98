//! In-memory reference implementation of the store traits.
//!
//! Backs the test suite and embedders that run without a database.
//! All mutation goes through one mutex held only for map operations.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use mirage_core::{Account, DbId, Task, Timestamp};

use crate::error::StoreError;
use crate::filter::{NewTask, TaskFilter, TaskOrder, TaskPatch};
use crate::{AccountStore, TaskStore};

// ---------------------------------------------------------------------------
// MemoryTaskStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    next_id: DbId,
    tasks: BTreeMap<DbId, Task>,
}

/// Mutex-guarded task table with store-issued sequential ids.
#[derive(Default)]
pub struct MemoryTaskStore {
    inner: Mutex<Inner>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully formed record as-is, e.g. when seeding restored
    /// state. Future issued ids stay above the inserted id.
    pub fn insert(&self, task: Task) {
        let mut inner = self.inner.lock().expect("task store lock");
        inner.next_id = inner.next_id.max(task.id);
        inner.tasks.insert(task.id, task);
    }

    fn filtered(&self, filter: &TaskFilter, order: TaskOrder) -> Vec<Task> {
        let inner = self.inner.lock().expect("task store lock");
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect();
        order.sort(&mut tasks);
        tasks
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn list(
        &self,
        filter: &TaskFilter,
        order: TaskOrder,
        limit: Option<usize>,
    ) -> Result<Vec<Task>, StoreError> {
        let mut tasks = self.filtered(filter, order);
        if let Some(limit) = limit {
            tasks.truncate(limit);
        }
        Ok(tasks)
    }

    async fn page(
        &self,
        filter: &TaskFilter,
        order: TaskOrder,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<Task>, usize), StoreError> {
        let tasks = self.filtered(filter, order);
        let total = tasks.len();
        let start = page.saturating_sub(1).saturating_mul(page_size);
        let page_rows = tasks.into_iter().skip(start).take(page_size).collect();
        Ok((page_rows, total))
    }

    async fn count(&self, filter: &TaskFilter) -> Result<usize, StoreError> {
        let inner = self.inner.lock().expect("task store lock");
        Ok(inner.tasks.values().filter(|t| filter.matches(t)).count())
    }

    async fn get(&self, id: DbId) -> Result<Option<Task>, StoreError> {
        let inner = self.inner.lock().expect("task store lock");
        Ok(inner.tasks.get(&id).cloned())
    }

    async fn create(&self, new: NewTask) -> Result<Task, StoreError> {
        let mut inner = self.inner.lock().expect("task store lock");
        inner.next_id += 1;
        let now = Utc::now();
        let task = Task {
            id: inner.next_id,
            task_type: new.task_type,
            params: new.params,
            status: new.status,
            account_id: new.account_id,
            artifacts: None,
            synthetic: new.synthetic,
            created_at: now,
            updated_at: now,
        };
        inner.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn update(&self, id: DbId, patch: TaskPatch) -> Result<Task, StoreError> {
        let mut inner = self.inner.lock().expect("task store lock");
        let task = inner
            .tasks
            .get_mut(&id)
            .ok_or(StoreError::TaskNotFound(id))?;
        if let Some(status) = patch.status {
            task.status = status;
        }
        if let Some(account_id) = patch.account_id {
            task.account_id = account_id;
        }
        if let Some(artifacts) = patch.artifacts {
            task.artifacts = artifacts;
        }
        task.updated_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete_many(&self, ids: &[DbId]) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().expect("task store lock");
        let mut deleted = 0;
        for id in ids {
            if inner.tasks.remove(id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().expect("task store lock");
        let before = inner.tasks.len();
        inner.tasks.retain(|_, t| t.created_at >= cutoff);
        Ok(before - inner.tasks.len())
    }
}

// ---------------------------------------------------------------------------
// MemoryAccountStore
// ---------------------------------------------------------------------------

/// Fixed account list, as loaded from configuration at startup.
pub struct MemoryAccountStore {
    accounts: Vec<Account>,
}

impl MemoryAccountStore {
    pub fn new(accounts: Vec<Account>) -> Self {
        Self { accounts }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn list(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self.accounts.clone())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
