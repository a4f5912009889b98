//! The execution backend seam.
//!
//! One generation call against the external provider, opaque to the
//! scheduler: it either yields artifacts or a provider error code. The
//! call may take seconds to minutes; any timeout is enforced inside the
//! backend and surfaces as a [`ExecutionOutcome::Failure`].

use async_trait::async_trait;
use mirage_core::{Account, GenerationParams};

// ---------------------------------------------------------------------------
// Quota-ambiguous error codes
// ---------------------------------------------------------------------------

/// Provider code: timed out waiting for a task identifier.
pub const ERROR_CODE_TASK_ID_TIMEOUT: i32 = 603;

/// Provider code: timed out waiting for a result URL.
pub const ERROR_CODE_RESULT_URL_TIMEOUT: i32 = 604;

/// Whether a provider error code means the external side effect may
/// have happened anyway, consuming real quota despite producing no
/// usable artifact. Such failures get a synthetic usage record.
pub fn is_quota_ambiguous(code: i32) -> bool {
    code == ERROR_CODE_TASK_ID_TIMEOUT || code == ERROR_CODE_RESULT_URL_TIMEOUT
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Structured result of one generation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Success {
        /// Result artifact URLs, at least one.
        artifacts: Vec<String>,
    },
    Failure {
        /// Provider-specific error code.
        code: i32,
        message: String,
    },
}

impl ExecutionOutcome {
    pub fn success(artifacts: Vec<String>) -> Self {
        Self::Success { artifacts }
    }

    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        Self::Failure {
            code,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// Performs one generation job with the given account's credential.
///
/// `headless` is an execution-environment hint forwarded unchanged from
/// manager configuration.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn run(
        &self,
        params: &GenerationParams,
        account: &Account,
        headless: bool,
    ) -> ExecutionOutcome;
}
