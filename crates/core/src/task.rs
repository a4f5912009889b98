//! Task entity model.

use serde::{Deserialize, Serialize};

use crate::status::{TaskStatus, TaskType};
use crate::types::{DbId, Timestamp};

/// Parameters describing what to generate.
///
/// Opaque to the scheduler: it only forwards them to the execution
/// backend and copies them onto synthetic usage records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub prompt: String,
    pub model: String,
    /// Aspect ratio, e.g. `"16:9"`.
    pub ratio: String,
    pub quality: String,
}

/// A unit of requested generation work.
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: DbId,
    pub task_type: TaskType,
    pub params: GenerationParams,
    pub status: TaskStatus,
    /// Account the task was executed with. `None` while Queued and on
    /// freshly retried tasks.
    pub account_id: Option<DbId>,
    /// Result artifact URLs produced by a successful execution.
    pub artifacts: Option<Vec<String>>,
    /// Marks a record created purely to account for consumed quota.
    /// Synthetic tasks are never picked up by the scan loop.
    pub synthetic: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Task {
    /// Number of result artifacts, for display surfaces.
    pub fn artifact_count(&self) -> usize {
        self.artifacts.as_ref().map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task_with_artifacts(artifacts: Option<Vec<String>>) -> Task {
        Task {
            id: 1,
            task_type: TaskType::TextToImage,
            params: GenerationParams {
                prompt: "a lighthouse at dusk".into(),
                model: "default".into(),
                ratio: "1:1".into(),
                quality: "high".into(),
            },
            status: TaskStatus::Completed,
            account_id: Some(7),
            artifacts,
            synthetic: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn artifact_count_none() {
        assert_eq!(task_with_artifacts(None).artifact_count(), 0);
    }

    #[test]
    fn artifact_count_some() {
        let task = task_with_artifacts(Some(vec!["a.png".into(), "b.png".into()]));
        assert_eq!(task.artifact_count(), 2);
    }
}
