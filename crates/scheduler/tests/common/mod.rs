//! Shared fixtures for the scheduler integration tests: a scriptable
//! execution backend, a store wrapper that injects failures, and
//! record builders.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mirage_core::{
    Account, Credential, DbId, GenerationParams, Task, TaskStatus, TaskType, Timestamp,
};
use mirage_scheduler::backend::{ExecutionBackend, ExecutionOutcome};
use mirage_scheduler::config::ManagerConfig;
use mirage_store::{
    MemoryTaskStore, NewTask, StoreError, TaskFilter, TaskOrder, TaskPatch, TaskStore,
};

pub fn params(prompt: &str) -> GenerationParams {
    GenerationParams {
        prompt: prompt.into(),
        model: "default".into(),
        ratio: "1:1".into(),
        quality: "high".into(),
    }
}

pub fn account(id: DbId, name: &str) -> Account {
    Account {
        id,
        name: name.into(),
        credential: Credential {
            username: format!("{name}@example.com"),
            password: "secret".into(),
            cookies: None,
        },
    }
}

/// A config tuned for tests: tight scan cadence, short error backoff.
pub fn fast_config() -> ManagerConfig {
    ManagerConfig {
        scan_interval: Duration::from_millis(10),
        error_backoff: Duration::from_millis(50),
        ..ManagerConfig::default()
    }
}

/// Create `n` queued tasks and return their ids.
pub async fn seed_queued(store: &MemoryTaskStore, n: usize, task_type: TaskType) -> Vec<DbId> {
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let task = store
            .create(NewTask::queued(task_type, params(&format!("prompt-{i}"))))
            .await
            .unwrap();
        ids.push(task.id);
    }
    ids
}

/// Fetch every non-synthetic task, oldest first.
pub async fn all_real_tasks(store: &MemoryTaskStore) -> Vec<Task> {
    store
        .list(
            &TaskFilter::all().synthetic(false),
            TaskOrder::CreatedAsc,
            None,
        )
        .await
        .unwrap()
}

// ---------------------------------------------------------------------------
// StubBackend
// ---------------------------------------------------------------------------

/// Backend double with an optional per-call delay and a scripted
/// outcome queue. Unscripted calls succeed with one artifact derived
/// from the prompt. Call order is recorded by prompt.
pub struct StubBackend {
    delay: Duration,
    outcomes: Mutex<VecDeque<ExecutionOutcome>>,
    calls: Mutex<Vec<String>>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            delay: Duration::ZERO,
            outcomes: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    /// Queue outcomes to return, in order, before falling back to
    /// success.
    pub fn script(self, outcomes: Vec<ExecutionOutcome>) -> Self {
        *self.outcomes.lock().unwrap() = outcomes.into();
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Prompts in the order the backend received them.
    pub fn call_order(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionBackend for StubBackend {
    async fn run(
        &self,
        params: &GenerationParams,
        _account: &Account,
        _headless: bool,
    ) -> ExecutionOutcome {
        self.calls.lock().unwrap().push(params.prompt.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self.outcomes.lock().unwrap().pop_front();
        scripted
            .unwrap_or_else(|| ExecutionOutcome::success(vec![format!("{}.png", params.prompt)]))
    }
}

// ---------------------------------------------------------------------------
// SlowStore
// ---------------------------------------------------------------------------

/// Wraps a [`MemoryTaskStore`] and delays every `list` call, keeping
/// the scan loop inside a store read for a controlled window.
pub struct SlowStore {
    inner: Arc<MemoryTaskStore>,
    list_delay: Duration,
}

impl SlowStore {
    pub fn new(inner: Arc<MemoryTaskStore>, list_delay: Duration) -> Self {
        Self { inner, list_delay }
    }
}

#[async_trait]
impl TaskStore for SlowStore {
    async fn list(
        &self,
        filter: &TaskFilter,
        order: TaskOrder,
        limit: Option<usize>,
    ) -> Result<Vec<Task>, StoreError> {
        tokio::time::sleep(self.list_delay).await;
        self.inner.list(filter, order, limit).await
    }

    async fn page(
        &self,
        filter: &TaskFilter,
        order: TaskOrder,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<Task>, usize), StoreError> {
        self.inner.page(filter, order, page, page_size).await
    }

    async fn count(&self, filter: &TaskFilter) -> Result<usize, StoreError> {
        self.inner.count(filter).await
    }

    async fn get(&self, id: DbId) -> Result<Option<Task>, StoreError> {
        self.inner.get(id).await
    }

    async fn create(&self, new: NewTask) -> Result<Task, StoreError> {
        self.inner.create(new).await
    }

    async fn update(&self, id: DbId, patch: TaskPatch) -> Result<Task, StoreError> {
        self.inner.update(id, patch).await
    }

    async fn delete_many(&self, ids: &[DbId]) -> Result<usize, StoreError> {
        self.inner.delete_many(ids).await
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<usize, StoreError> {
        self.inner.delete_before(cutoff).await
    }
}

// ---------------------------------------------------------------------------
// FlakyStore
// ---------------------------------------------------------------------------

/// Wraps a [`MemoryTaskStore`] and injects failures: the first `n`
/// calls to `list` (driving the manager into its error state) or the
/// first `n` Completed-status writes (driving the mid-execution
/// salvage path).
pub struct FlakyStore {
    inner: Arc<MemoryTaskStore>,
    list_failures_left: AtomicUsize,
    completion_failures_left: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryTaskStore>, list_failures: usize) -> Self {
        Self {
            inner,
            list_failures_left: AtomicUsize::new(list_failures),
            completion_failures_left: AtomicUsize::new(0),
        }
    }

    /// Fail the first `n` updates that try to mark a task Completed.
    pub fn failing_completions(inner: Arc<MemoryTaskStore>, n: usize) -> Self {
        Self {
            inner,
            list_failures_left: AtomicUsize::new(0),
            completion_failures_left: AtomicUsize::new(n),
        }
    }
}

fn take_failure(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl TaskStore for FlakyStore {
    async fn list(
        &self,
        filter: &TaskFilter,
        order: TaskOrder,
        limit: Option<usize>,
    ) -> Result<Vec<Task>, StoreError> {
        if take_failure(&self.list_failures_left) {
            return Err(StoreError::Backend("injected list failure".into()));
        }
        self.inner.list(filter, order, limit).await
    }

    async fn page(
        &self,
        filter: &TaskFilter,
        order: TaskOrder,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<Task>, usize), StoreError> {
        self.inner.page(filter, order, page, page_size).await
    }

    async fn count(&self, filter: &TaskFilter) -> Result<usize, StoreError> {
        self.inner.count(filter).await
    }

    async fn get(&self, id: DbId) -> Result<Option<Task>, StoreError> {
        self.inner.get(id).await
    }

    async fn create(&self, new: NewTask) -> Result<Task, StoreError> {
        self.inner.create(new).await
    }

    async fn update(&self, id: DbId, patch: TaskPatch) -> Result<Task, StoreError> {
        if patch.status == Some(TaskStatus::Completed)
            && take_failure(&self.completion_failures_left)
        {
            return Err(StoreError::Backend("injected completion-write failure".into()));
        }
        self.inner.update(id, patch).await
    }

    async fn delete_many(&self, ids: &[DbId]) -> Result<usize, StoreError> {
        self.inner.delete_many(ids).await
    }

    async fn delete_before(&self, cutoff: Timestamp) -> Result<usize, StoreError> {
        self.inner.delete_before(cutoff).await
    }
}
