//! Query interfaces over the task and account record stores.
//!
//! The scheduler consumes persistence exclusively through the
//! [`TaskStore`] and [`AccountStore`] traits, so the backing store is
//! swappable: the in-memory implementation in [`memory`] serves tests
//! and embedders that run without a database.

pub mod error;
pub mod filter;
pub mod memory;

use async_trait::async_trait;
use mirage_core::{Account, DbId, Task, Timestamp};

pub use error::StoreError;
pub use filter::{NewTask, TaskFilter, TaskOrder, TaskPatch};
pub use memory::{MemoryAccountStore, MemoryTaskStore};

/// Filtered, ordered, paginated access to task records.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Fetch matching tasks in the given order, up to `limit`.
    async fn list(
        &self,
        filter: &TaskFilter,
        order: TaskOrder,
        limit: Option<usize>,
    ) -> Result<Vec<Task>, StoreError>;

    /// Fetch one page (1-based) of matching tasks, plus the unpaginated
    /// match count.
    async fn page(
        &self,
        filter: &TaskFilter,
        order: TaskOrder,
        page: usize,
        page_size: usize,
    ) -> Result<(Vec<Task>, usize), StoreError>;

    /// Count matching tasks.
    async fn count(&self, filter: &TaskFilter) -> Result<usize, StoreError>;

    /// Fetch a single task by id.
    async fn get(&self, id: DbId) -> Result<Option<Task>, StoreError>;

    /// Create a task record, assigning its id and timestamps.
    async fn create(&self, new: NewTask) -> Result<Task, StoreError>;

    /// Apply a field patch; refreshes `updated_at`.
    async fn update(&self, id: DbId, patch: TaskPatch) -> Result<Task, StoreError>;

    /// Delete the given records; returns how many existed.
    async fn delete_many(&self, ids: &[DbId]) -> Result<usize, StoreError>;

    /// Delete every record created before `cutoff`; returns the count.
    async fn delete_before(&self, cutoff: Timestamp) -> Result<usize, StoreError>;
}

/// Read access to the configured provider accounts.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Account>, StoreError>;
}
