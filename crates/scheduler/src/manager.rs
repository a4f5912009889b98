//! The task manager: scan/dispatch loop, in-flight registry, and
//! lifecycle state machine.
//!
//! One manager owns one scan loop (a long-lived tokio task woken every
//! `scan_interval`) and drives work onto a shared [`WorkerPool`]. The
//! registry and stats are guarded by a single mutex held only for
//! bookkeeping, never across a store write or the generation call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use mirage_core::quota::progress_percent;
use mirage_core::{DbId, Task, TaskStatus, TaskType, Timestamp};
use mirage_store::{
    AccountStore, NewTask, StoreError, TaskFilter, TaskOrder, TaskPatch, TaskStore,
};

use crate::allocator::{local_day_start, AccountAllocator};
use crate::backend::{is_quota_ambiguous, ExecutionBackend, ExecutionOutcome};
use crate::config::ManagerConfig;
use crate::error::SchedulerError;
use crate::introspect::{
    prompt_excerpt, ManagerStats, ManagerStatus, ManagerStatusReport, Pagination, SlotState,
    TaskPageReport, TaskSummary, TaskView, ThreadSlot,
};
use crate::pool::{WorkHandle, WorkerPool};

/// Bounded wait for the scan loop to exit during `stop()`.
const STOP_JOIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest page size served by `detailed_tasks`.
const MAX_PAGE_SIZE: usize = 100;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkPhase {
    /// Dispatched, execution not yet begun.
    Starting,
    /// The generation call is underway.
    Processing,
    /// Completion observed; the entry awaits the next sweep.
    Finished,
}

/// Local bookkeeping for one dispatched task.
struct InFlight {
    phase: WorkPhase,
    task_type: TaskType,
    prompt: String,
    started_at: Timestamp,
    /// Backing unit-of-work handle. Set right after spawn; also covers
    /// work that ended without reporting (e.g. a panic).
    handle: Option<WorkHandle>,
}

impl InFlight {
    fn is_done(&self) -> bool {
        self.phase == WorkPhase::Finished
            || self.handle.as_ref().is_some_and(WorkHandle::is_finished)
    }
}

struct ManagerState {
    status: ManagerStatus,
    started_at: Option<Timestamp>,
    stats: ManagerStats,
    registry: HashMap<DbId, InFlight>,
}

impl ManagerState {
    fn new() -> Self {
        Self {
            status: ManagerStatus::Stopped,
            started_at: None,
            stats: ManagerStats::default(),
            registry: HashMap::new(),
        }
    }
}

/// Handles for one run of the scan loop.
struct RunHandles {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

/// How one execution ended, for stats accounting.
enum ExecResult {
    Completed,
    Failed,
    NoAccount,
}

// ---------------------------------------------------------------------------
// TaskManager
// ---------------------------------------------------------------------------

struct ManagerInner {
    config: ManagerConfig,
    tasks: Arc<dyn TaskStore>,
    allocator: AccountAllocator,
    backend: Arc<dyn ExecutionBackend>,
    pool: Mutex<Option<Arc<WorkerPool>>>,
    state: Mutex<ManagerState>,
    run: Mutex<Option<RunHandles>>,
}

/// Orchestrates scanning, account allocation, dispatch, and lifecycle
/// tracking for generation tasks.
///
/// Cheap to clone; all clones share the same scheduler state.
#[derive(Clone)]
pub struct TaskManager {
    inner: Arc<ManagerInner>,
}

impl TaskManager {
    pub fn new(
        config: ManagerConfig,
        tasks: Arc<dyn TaskStore>,
        accounts: Arc<dyn AccountStore>,
        backend: Arc<dyn ExecutionBackend>,
    ) -> Self {
        let allocator = AccountAllocator::new(accounts, Arc::clone(&tasks), config.quotas.clone());
        Self {
            inner: Arc::new(ManagerInner {
                config,
                tasks,
                allocator,
                backend,
                pool: Mutex::new(None),
                state: Mutex::new(ManagerState::new()),
                run: Mutex::new(None),
            }),
        }
    }

    /// Attach the shared worker pool. Must happen before `start()`.
    ///
    /// The pool's lifetime is independent of this manager; several
    /// managers may share one pool.
    pub fn attach_pool(&self, pool: Arc<WorkerPool>) {
        *self.inner.pool.lock().expect("pool lock") = Some(pool);
    }

    /// Launch the scan loop.
    ///
    /// Returns `Ok(false)` when the manager is already running (or
    /// paused/errored with a live loop), `Err` when no pool is
    /// attached. Must be called within a tokio runtime.
    pub fn start(&self) -> Result<bool, SchedulerError> {
        let pool = self
            .inner
            .pool
            .lock()
            .expect("pool lock")
            .clone()
            .ok_or_else(|| {
                SchedulerError::Configuration("no worker pool attached".to_string())
            })?;

        {
            let mut state = self.inner.state();
            if state.status != ManagerStatus::Stopped {
                tracing::info!("Task manager already running");
                return Ok(false);
            }
            state.status = ManagerStatus::Running;
            state.started_at = Some(Utc::now());
        }

        let cancel = CancellationToken::new();
        let join = tokio::spawn(run_scan_loop(
            Arc::clone(&self.inner),
            pool,
            cancel.clone(),
        ));
        *self.inner.run.lock().expect("run lock") = Some(RunHandles { cancel, join });
        tracing::info!("Task manager started");
        Ok(true)
    }

    /// Stop the scan loop and clear local bookkeeping.
    ///
    /// Work already dispatched to the pool keeps running to completion
    /// in the background and still persists its outcome; the manager
    /// simply stops observing it. Returns `false` if already stopped.
    pub async fn stop(&self) -> bool {
        {
            let mut state = self.inner.state();
            if state.status == ManagerStatus::Stopped {
                tracing::info!("Task manager already stopped");
                return false;
            }
            state.status = ManagerStatus::Stopped;
            state.started_at = None;
            state.registry.clear();
        }

        // Take the handles in their own statement: an `if let` on the
        // locked expression would keep the guard alive across the await
        // below.
        let run = self.inner.run.lock().expect("run lock").take();
        if let Some(run) = run {
            run.cancel.cancel();
            if tokio::time::timeout(STOP_JOIN_TIMEOUT, run.join)
                .await
                .is_err()
            {
                tracing::warn!("Scan loop did not exit within the stop timeout");
            }
        }
        tracing::info!("Task manager stopped");
        true
    }

    /// Suspend dispatch. The loop keeps waking but performs no work.
    pub fn pause(&self) -> bool {
        let mut state = self.inner.state();
        if state.status == ManagerStatus::Running {
            state.status = ManagerStatus::Paused;
            tracing::info!("Task manager paused");
            true
        } else {
            false
        }
    }

    /// Resume dispatch after a pause.
    pub fn resume(&self) -> bool {
        let mut state = self.inner.state();
        if state.status == ManagerStatus::Paused {
            state.status = ManagerStatus::Running;
            tracing::info!("Task manager resumed");
            true
        } else {
            false
        }
    }

    // -- retry / batch operations -------------------------------------------

    /// Reset a task to Queued, clearing its account and artifacts.
    /// Identifier and parameters are preserved. Synthetic quota markers
    /// are rejected: requeueing one would erase consumed quota.
    pub async fn retry(&self, id: DbId) -> Result<Task, SchedulerError> {
        let existing = self
            .inner
            .tasks
            .get(id)
            .await?
            .ok_or(StoreError::TaskNotFound(id))?;
        if existing.synthetic {
            return Err(SchedulerError::SyntheticTask(id));
        }
        let task = self.inner.tasks.update(id, retry_patch()).await?;
        tracing::info!(task_id = id, "Task requeued");
        Ok(task)
    }

    /// Retry an explicit set of tasks, or every currently-Failed real
    /// task when `ids` is `None`. Unknown and synthetic ids are
    /// skipped. Returns the number of tasks requeued.
    pub async fn batch_retry(&self, ids: Option<&[DbId]>) -> Result<usize, SchedulerError> {
        let targets: Vec<DbId> = match ids {
            Some(ids) => ids.to_vec(),
            None => self
                .inner
                .tasks
                .list(
                    &TaskFilter::all()
                        .status(TaskStatus::Failed)
                        .synthetic(false),
                    TaskOrder::CreatedAsc,
                    None,
                )
                .await?
                .into_iter()
                .map(|t| t.id)
                .collect(),
        };

        let mut retried = 0;
        for id in targets {
            match self.inner.tasks.get(id).await? {
                Some(task) if !task.synthetic => {}
                _ => continue,
            }
            match self.inner.tasks.update(id, retry_patch()).await {
                Ok(_) => retried += 1,
                Err(StoreError::TaskNotFound(_)) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        tracing::info!(retried, "Batch retry complete");
        Ok(retried)
    }

    /// Delete the given task records. Returns how many existed.
    pub async fn batch_delete(&self, ids: &[DbId]) -> Result<usize, SchedulerError> {
        let deleted = self.inner.tasks.delete_many(ids).await?;
        tracing::info!(deleted, "Batch delete complete");
        Ok(deleted)
    }

    /// Delete every task created before local midnight today.
    pub async fn purge_before_today(&self) -> Result<usize, SchedulerError> {
        let deleted = self.inner.tasks.delete_before(local_day_start()).await?;
        tracing::info!(deleted, "Purged tasks from before today");
        Ok(deleted)
    }

    // -- introspection -------------------------------------------------------

    /// Snapshot of lifecycle state, registry, stats, and pool health.
    pub fn status(&self) -> ManagerStatusReport {
        let pool = self.inner.pool.lock().expect("pool lock").clone();
        let state = self.inner.state();
        let mut processing_ids: Vec<DbId> = state.registry.keys().copied().collect();
        processing_ids.sort_unstable();
        ManagerStatusReport {
            status: state.status,
            processing_count: state.registry.len(),
            processing_ids,
            stats: state.stats.clone(),
            uptime_secs: state
                .started_at
                .map(|t| (Utc::now() - t).num_seconds().max(0) as u64)
                .unwrap_or(0),
            max_concurrency: self.inner.config.max_concurrency,
            active_workers: pool.as_ref().map_or(0, |p| p.active_count()),
            pool_alive: pool.as_ref().is_some_and(|p| p.is_alive()),
        }
    }

    /// Per-status counts over real (non-synthetic) tasks.
    pub async fn summary(&self) -> Result<TaskSummary, SchedulerError> {
        let tasks = &self.inner.tasks;
        let real = TaskFilter::all().synthetic(false);
        let queued = tasks.count(&real.clone().status(TaskStatus::Queued)).await?;
        let processing = tasks
            .count(&real.clone().status(TaskStatus::Processing))
            .await?;
        let completed = tasks
            .count(&real.clone().status(TaskStatus::Completed))
            .await?;
        let failed = tasks.count(&real.clone().status(TaskStatus::Failed)).await?;
        let created_today = tasks
            .count(&real.clone().created_since(local_day_start()))
            .await?;
        Ok(TaskSummary {
            queued,
            processing,
            completed,
            failed,
            total: queued + processing + completed + failed,
            created_today,
        })
    }

    /// Paginated most-recent-first task listing with display fields.
    pub async fn detailed_tasks(
        &self,
        status: Option<TaskStatus>,
        page: usize,
        page_size: usize,
    ) -> Result<TaskPageReport, SchedulerError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let mut filter = TaskFilter::all();
        if let Some(status) = status {
            filter = filter.status(status);
        }
        let (rows, total) = self
            .inner
            .tasks
            .page(&filter, TaskOrder::CreatedDesc, page, page_size)
            .await?;
        Ok(TaskPageReport {
            tasks: rows.into_iter().map(TaskView::from).collect(),
            pagination: Pagination::new(total, page, page_size),
        })
    }

    /// Per-slot activity view over the `max_concurrency` notional
    /// worker slots.
    pub fn thread_details(&self) -> Vec<ThreadSlot> {
        let pool = self.inner.pool.lock().expect("pool lock").clone();
        let pool_usable = pool.as_ref().is_some_and(|p| p.is_alive());
        let state = self.inner.state();
        let now = Utc::now();

        let mut executing: Vec<(DbId, &InFlight)> = state
            .registry
            .iter()
            .filter(|(_, e)| e.phase == WorkPhase::Processing && !e.is_done())
            .map(|(id, e)| (*id, e))
            .collect();
        executing.sort_unstable_by_key(|(id, _)| *id);
        let mut executing = executing.into_iter();

        (1..=self.inner.config.max_concurrency)
            .map(|slot_id| match executing.next() {
                Some((task_id, entry)) => {
                    let elapsed = (now - entry.started_at)
                        .to_std()
                        .unwrap_or(Duration::ZERO);
                    ThreadSlot {
                        id: slot_id,
                        state: SlotState::Active,
                        task_id: Some(task_id),
                        task_type: Some(entry.task_type),
                        prompt: Some(prompt_excerpt(&entry.prompt)),
                        progress_percent: Some(progress_percent(
                            elapsed,
                            self.inner.config.nominal_task_duration,
                        )),
                        started_at: Some(entry.started_at),
                    }
                }
                None => {
                    let state = if pool_usable {
                        SlotState::Idle
                    } else {
                        SlotState::Inactive
                    };
                    ThreadSlot::vacant(slot_id, state)
                }
            })
            .collect()
    }
}

fn retry_patch() -> TaskPatch {
    TaskPatch::default()
        .status(TaskStatus::Queued)
        .clear_account()
        .clear_artifacts()
}

// ---------------------------------------------------------------------------
// Scan loop
// ---------------------------------------------------------------------------

async fn run_scan_loop(
    inner: Arc<ManagerInner>,
    pool: Arc<WorkerPool>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(inner.config.scan_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(
        scan_interval_ms = inner.config.scan_interval.as_millis() as u64,
        max_concurrency = inner.config.max_concurrency,
        "Scan loop started",
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Scan loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                if let Err(err) = inner.scan_once(&pool).await {
                    tracing::error!(error = %err, "Scan cycle failed");
                    inner.enter_error_state();
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(inner.config.error_backoff) => {}
                    }
                    inner.recover_from_error();
                    ticker.reset();
                }
            }
        }
    }
}

impl ManagerInner {
    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().expect("manager state lock")
    }

    /// One scan iteration: account capacity, fetch queued work oldest
    /// first, dispatch, then sweep finished registry entries.
    async fn scan_once(self: &Arc<Self>, pool: &Arc<WorkerPool>) -> Result<(), SchedulerError> {
        let free = {
            let mut state = self.state();
            state.stats.last_scan_at = Some(Utc::now());
            if state.status == ManagerStatus::Paused {
                return Ok(());
            }
            let live = state.registry.values().filter(|e| !e.is_done()).count();
            self.config.max_concurrency.saturating_sub(live)
        };
        // The pool is shared: its free count is authoritative at
        // dispatch time, never cached across cycles.
        let free = free.min(pool.free_slots());

        if free > 0 {
            let mut filter = TaskFilter::all()
                .status(TaskStatus::Queued)
                .synthetic(false);
            if let Some(task_type) = self.config.task_type {
                filter = filter.task_type(task_type);
            }
            let queued = self
                .tasks
                .list(&filter, TaskOrder::CreatedAsc, Some(free))
                .await?;
            for task in queued {
                if self.state().registry.contains_key(&task.id) {
                    continue;
                }
                self.dispatch(pool, task);
            }
        }

        self.state().registry.retain(|_, entry| !entry.is_done());
        Ok(())
    }

    /// Reserve a pool slot, register the task, and spawn its unit of
    /// work. Registration happens before the spawn so the completion
    /// callback always finds its entry.
    fn dispatch(self: &Arc<Self>, pool: &Arc<WorkerPool>, task: Task) {
        let Some(slot) = pool.try_reserve() else {
            tracing::debug!(task_id = task.id, "Worker pool at capacity, task stays queued");
            return;
        };

        let task_id = task.id;
        self.state().registry.insert(
            task_id,
            InFlight {
                phase: WorkPhase::Starting,
                task_type: task.task_type,
                prompt: task.params.prompt.clone(),
                started_at: Utc::now(),
                handle: None,
            },
        );

        let inner = Arc::clone(self);
        let handle = slot.run(async move {
            inner.execute_one(task).await;
            inner.mark_finished(task_id);
        });
        if let Some(entry) = self.state().registry.get_mut(&task_id) {
            entry.handle = Some(handle);
        }
        tracing::info!(task_id, "Task dispatched to worker pool");
    }

    fn set_phase(&self, id: DbId, phase: WorkPhase) {
        if let Some(entry) = self.state().registry.get_mut(&id) {
            entry.phase = phase;
        }
    }

    /// Completion callback: record the end of the unit of work. The
    /// entry itself is removed by the periodic sweep, keeping this
    /// fast and lock-scoped.
    fn mark_finished(&self, id: DbId) {
        if let Some(entry) = self.state().registry.get_mut(&id) {
            entry.phase = WorkPhase::Finished;
        }
        tracing::debug!(task_id = id, "Task execution finished");
    }

    /// The unit-of-work body. Never propagates an error: every failure
    /// becomes a status transition plus stats increments.
    async fn execute_one(&self, task: Task) {
        let task_id = task.id;
        self.set_phase(task_id, WorkPhase::Processing);
        tracing::info!(task_id, task_type = %task.task_type, "Executing task");

        let outcome = match self.run_generation(&task).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::error!(task_id, error = %err, "Task execution error");
                self.salvage(&task).await;
                ExecResult::Failed
            }
        };

        let mut state = self.state();
        state.stats.total_processed += 1;
        match outcome {
            ExecResult::Completed => state.stats.successful += 1,
            ExecResult::Failed | ExecResult::NoAccount => state.stats.failed += 1,
        }
    }

    async fn run_generation(&self, task: &Task) -> Result<ExecResult, SchedulerError> {
        self.tasks
            .update(task.id, TaskPatch::default().status(TaskStatus::Processing))
            .await?;

        // Allocation is deferred to execution start so usage reflects
        // the freshest state, not the fetch-time state.
        let Some(account) = self.allocator.select(task.task_type).await? else {
            tracing::warn!(task_id = task.id, "No account with remaining quota");
            self.tasks
                .update(task.id, TaskPatch::default().status(TaskStatus::Failed))
                .await?;
            return Ok(ExecResult::NoAccount);
        };

        let outcome = self
            .backend
            .run(&task.params, &account, self.config.headless)
            .await;

        match outcome {
            ExecutionOutcome::Success { artifacts } => {
                self.tasks
                    .update(
                        task.id,
                        TaskPatch::default()
                            .status(TaskStatus::Completed)
                            .assign_account(account.id)
                            .artifacts(artifacts),
                    )
                    .await?;
                tracing::info!(task_id = task.id, account_id = account.id, "Task completed");
                Ok(ExecResult::Completed)
            }
            ExecutionOutcome::Failure { code, message } => {
                if is_quota_ambiguous(code) {
                    // The provider may have consumed the quota slot even
                    // though no artifact came back.
                    self.record_synthetic_usage(task, account.id).await?;
                }
                self.tasks
                    .update(
                        task.id,
                        TaskPatch::default()
                            .status(TaskStatus::Failed)
                            .assign_account(account.id),
                    )
                    .await?;
                tracing::warn!(
                    task_id = task.id,
                    account_id = account.id,
                    code,
                    message = %message,
                    "Task failed",
                );
                Ok(ExecResult::Failed)
            }
        }
    }

    /// Create a synthetic Failed record attributing one quota slot to
    /// `account_id`, so derived usage reflects the consumption.
    async fn record_synthetic_usage(
        &self,
        task: &Task,
        account_id: DbId,
    ) -> Result<(), StoreError> {
        let record = NewTask {
            task_type: task.task_type,
            params: task.params.clone(),
            status: TaskStatus::Failed,
            account_id: Some(account_id),
            synthetic: true,
        };
        let created = self.tasks.create(record).await?;
        tracing::info!(
            task_id = task.id,
            synthetic_id = created.id,
            account_id,
            "Recorded synthetic quota usage",
        );
        Ok(())
    }

    /// Outermost failure path: make sure a possibly-consumed external
    /// quota slot is not silently lost, then force the task to Failed.
    /// Everything here is best-effort; persistence failures are logged
    /// and the task may be re-picked by a later scan.
    async fn salvage(&self, task: &Task) {
        match self.allocator.select(task.task_type).await {
            Ok(Some(account)) => {
                if let Err(err) = self.record_synthetic_usage(task, account.id).await {
                    tracing::warn!(
                        task_id = task.id,
                        error = %err,
                        "Failed to record synthetic usage",
                    );
                }
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(task_id = task.id, error = %err, "Account lookup failed during salvage");
            }
        }

        if let Err(err) = self
            .tasks
            .update(task.id, TaskPatch::default().status(TaskStatus::Failed))
            .await
        {
            tracing::warn!(
                task_id = task.id,
                error = %err,
                "Failed to persist Failed status, task may be re-picked",
            );
        }
    }

    fn enter_error_state(&self) {
        let mut state = self.state();
        state.stats.error_count += 1;
        state.status = ManagerStatus::Error;
    }

    /// Automatic recovery after the error backoff. A stop or pause
    /// issued during the backoff wins over the recovery.
    fn recover_from_error(&self) {
        let mut state = self.state();
        if state.status == ManagerStatus::Error {
            state.status = ManagerStatus::Running;
            tracing::info!("Task manager recovered from error state");
        }
    }
}
