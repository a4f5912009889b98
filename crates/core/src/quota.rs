//! Daily quota configuration and progress estimation.

use std::collections::HashMap;
use std::time::Duration;

use crate::status::TaskType;

// ---------------------------------------------------------------------------
// Default daily limits
// ---------------------------------------------------------------------------

/// Image generations allowed per account per day.
pub const DAILY_LIMIT_TEXT_TO_IMAGE: u32 = 10;

/// Video generations allowed per account per day.
pub const DAILY_LIMIT_IMAGE_TO_VIDEO: u32 = 1;

/// Avatar-video generations allowed per account per day.
pub const DAILY_LIMIT_AVATAR_VIDEO: u32 = 1;

// ---------------------------------------------------------------------------
// Quota table
// ---------------------------------------------------------------------------

/// Per-task-type daily cap on how many tasks may reach
/// Processing/Completed on one account.
#[derive(Debug, Clone, Default)]
pub struct QuotaTable {
    limits: HashMap<TaskType, u32>,
}

impl QuotaTable {
    /// Build a table from explicit `(type, limit)` pairs. Types not
    /// listed fall back to the default limit for that type.
    pub fn new(limits: impl IntoIterator<Item = (TaskType, u32)>) -> Self {
        Self {
            limits: limits.into_iter().collect(),
        }
    }

    /// Daily limit for a task type.
    pub fn daily_limit(&self, task_type: TaskType) -> u32 {
        match self.limits.get(&task_type) {
            Some(limit) => *limit,
            None => default_limit(task_type),
        }
    }

    /// Override the limit for one task type.
    pub fn set(&mut self, task_type: TaskType, limit: u32) {
        self.limits.insert(task_type, limit);
    }
}

fn default_limit(task_type: TaskType) -> u32 {
    match task_type {
        TaskType::TextToImage => DAILY_LIMIT_TEXT_TO_IMAGE,
        TaskType::ImageToVideo => DAILY_LIMIT_IMAGE_TO_VIDEO,
        TaskType::AvatarVideo => DAILY_LIMIT_AVATAR_VIDEO,
    }
}

// ---------------------------------------------------------------------------
// Progress estimation
// ---------------------------------------------------------------------------

/// Progress reported for a task whose completion has not yet been
/// observed is capped here, never 100.
pub const PROGRESS_CAP_PERCENT: i16 = 95;

/// Estimate progress of an in-flight task from its elapsed runtime.
///
/// Returns `min(elapsed / nominal * 100, 95)`. A zero `nominal`
/// duration reports the cap immediately.
pub fn progress_percent(elapsed: Duration, nominal: Duration) -> i16 {
    if nominal.is_zero() {
        return PROGRESS_CAP_PERCENT;
    }
    let pct = (elapsed.as_secs_f64() / nominal.as_secs_f64() * 100.0) as i16;
    pct.min(PROGRESS_CAP_PERCENT)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
