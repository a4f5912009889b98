//! Shared domain types for the mirage generation scheduler.
//!
//! This crate has zero internal dependencies so it can be used by the
//! store layer, the scheduler, and any future CLI or HTTP surface.

pub mod account;
pub mod quota;
pub mod status;
pub mod task;
pub mod types;

pub use account::{Account, Credential};
pub use quota::QuotaTable;
pub use status::{TaskStatus, TaskType};
pub use task::{GenerationParams, Task};
pub use types::{DbId, Timestamp};
