//! Closed status and task-type enumerations.
//!
//! Variant discriminants match the integer values stored by the task
//! store (0-based, the order tasks move through their lifecycle), so
//! records written by earlier versions of the system remain readable.

use serde::{Deserialize, Serialize};

/// Status ID type as persisted by the task store.
pub type StatusId = i16;

/// Task lifecycle status.
///
/// Every transition site matches exhaustively on this enum; adding a
/// variant is a compile error at each of them until handled.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued = 0,
    Processing = 1,
    Completed = 2,
    Failed = 3,
}

impl TaskStatus {
    /// Return the persisted status ID.
    pub fn id(self) -> StatusId {
        self as StatusId
    }

    /// Resolve a persisted status ID back to a variant.
    pub fn from_id(id: StatusId) -> Option<Self> {
        match id {
            0 => Some(Self::Queued),
            1 => Some(Self::Processing),
            2 => Some(Self::Completed),
            3 => Some(Self::Failed),
            _ => None,
        }
    }

    /// Human-readable label for display surfaces.
    pub fn label(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the task has reached an end state.
    pub fn is_terminal(self) -> bool {
        match self {
            Self::Queued | Self::Processing => false,
            Self::Completed | Self::Failed => true,
        }
    }
}

impl From<TaskStatus> for StatusId {
    fn from(value: TaskStatus) -> Self {
        value as StatusId
    }
}

/// The kind of generation a task requests.
///
/// Each type carries its own daily per-account quota (see
/// [`crate::quota::QuotaTable`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    TextToImage,
    ImageToVideo,
    AvatarVideo,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextToImage => "text_to_image",
            Self::ImageToVideo => "image_to_video",
            Self::AvatarVideo => "avatar_video",
        }
    }

    /// All known task types, in quota-table order.
    pub const ALL: &'static [TaskType] = &[
        TaskType::TextToImage,
        TaskType::ImageToVideo,
        TaskType::AvatarVideo,
    ];
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_ids_match_persisted_values() {
        assert_eq!(TaskStatus::Queued.id(), 0);
        assert_eq!(TaskStatus::Processing.id(), 1);
        assert_eq!(TaskStatus::Completed.id(), 2);
        assert_eq!(TaskStatus::Failed.id(), 3);
    }

    #[test]
    fn from_id_round_trips() {
        for id in 0..4 {
            let status = TaskStatus::from_id(id).expect("known id");
            assert_eq!(status.id(), id);
        }
    }

    #[test]
    fn from_id_rejects_unknown() {
        assert!(TaskStatus::from_id(4).is_none());
        assert!(TaskStatus::from_id(-1).is_none());
    }

    #[test]
    fn terminal_states() {
        assert!(!TaskStatus::Queued.is_terminal());
        assert!(!TaskStatus::Processing.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(TaskStatus::Queued.label(), "queued");
        assert_eq!(TaskStatus::Failed.label(), "failed");
        assert_eq!(TaskType::TextToImage.as_str(), "text_to_image");
    }
}
