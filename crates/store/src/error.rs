use mirage_core::DbId;

/// Failures surfaced by a task or account store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Task not found: {0}")]
    TaskNotFound(DbId),

    #[error("Store backend error: {0}")]
    Backend(String),
}
