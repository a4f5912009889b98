//! Quota-aware scheduler for long-running generation tasks.
//!
//! Provides the scan/dispatch task manager, the shared fixed-capacity
//! worker pool, quota-aware account allocation, the execution backend
//! seam, and introspection report types for status surfaces.

pub mod allocator;
pub mod backend;
pub mod config;
pub mod error;
pub mod introspect;
pub mod manager;
pub mod pool;

pub use allocator::AccountAllocator;
pub use backend::{ExecutionBackend, ExecutionOutcome};
pub use config::ManagerConfig;
pub use error::SchedulerError;
pub use introspect::{
    ManagerStats, ManagerStatus, ManagerStatusReport, SlotState, TaskPageReport, TaskSummary,
    TaskView, ThreadSlot,
};
pub use manager::TaskManager;
pub use pool::WorkerPool;
