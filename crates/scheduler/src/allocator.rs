//! Quota-aware account selection.
//!
//! Usage is derived from the task store at every decision, never
//! cached: an account's usage for a task type today is the number of
//! its tasks that reached Processing/Completed, plus its synthetic
//! Failed records (which exist precisely to mark consumed quota).

use std::sync::Arc;

use chrono::{Local, NaiveTime, Utc};
use mirage_core::{Account, DbId, QuotaTable, TaskStatus, TaskType, Timestamp};
use mirage_store::{AccountStore, StoreError, TaskFilter, TaskStore};
use rand::Rng;

/// Start of the current local day, in UTC.
///
/// Quota windows roll over at local midnight, matching the provider's
/// own daily reset.
pub fn local_day_start() -> Timestamp {
    let now = Local::now();
    now.with_time(NaiveTime::MIN)
        .single()
        .unwrap_or(now)
        .with_timezone(&Utc)
}

/// Selects an eligible account for a task type, spreading load onto
/// the least-used accounts with a uniform random tie-break.
pub struct AccountAllocator {
    accounts: Arc<dyn AccountStore>,
    tasks: Arc<dyn TaskStore>,
    quotas: QuotaTable,
}

impl AccountAllocator {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        tasks: Arc<dyn TaskStore>,
        quotas: QuotaTable,
    ) -> Self {
        Self {
            accounts,
            tasks,
            quotas,
        }
    }

    /// Pick an account with remaining quota for `task_type`.
    ///
    /// Returns `None` when every account has exhausted today's quota
    /// (or none are configured). Among accounts under quota, those
    /// tying the minimum usage form the candidate set and one is chosen
    /// uniformly at random, so equally idle accounts are not starved by
    /// a deterministic ordering.
    pub async fn select(&self, task_type: TaskType) -> Result<Option<Account>, StoreError> {
        let accounts = self.accounts.list().await?;
        if accounts.is_empty() {
            tracing::warn!(task_type = %task_type, "No accounts configured");
            return Ok(None);
        }

        let day_start = local_day_start();
        let limit = self.quotas.daily_limit(task_type);

        let mut min_usage = u32::MAX;
        let mut candidates: Vec<Account> = Vec::new();
        for account in accounts {
            let usage = self.usage_today(account.id, task_type, day_start).await?;
            tracing::debug!(
                account = %account.name,
                task_type = %task_type,
                usage,
                limit,
                "Account usage",
            );
            if usage >= limit {
                continue;
            }
            if usage < min_usage {
                min_usage = usage;
                candidates.clear();
                candidates.push(account);
            } else if usage == min_usage {
                candidates.push(account);
            }
        }

        if candidates.is_empty() {
            tracing::warn!(task_type = %task_type, "All accounts at daily quota");
            return Ok(None);
        }

        let index = rand::rng().random_range(0..candidates.len());
        let selected = candidates.swap_remove(index);
        tracing::debug!(
            account = %selected.name,
            task_type = %task_type,
            usage = min_usage,
            "Selected account",
        );
        Ok(Some(selected))
    }

    /// Derived usage for one account and task type since `day_start`.
    pub async fn usage_today(
        &self,
        account_id: DbId,
        task_type: TaskType,
        day_start: Timestamp,
    ) -> Result<u32, StoreError> {
        // Tasks that reached Processing or Completed with this account.
        let live = self
            .tasks
            .count(
                &TaskFilter::all()
                    .account(account_id)
                    .task_type(task_type)
                    .status_in(&[TaskStatus::Processing, TaskStatus::Completed])
                    .created_since(day_start),
            )
            .await?;

        // Synthetic Failed records marking consumed quota. Disjoint from
        // the set above, so the two counts sum without double counting.
        let synthetic = self
            .tasks
            .count(
                &TaskFilter::all()
                    .account(account_id)
                    .task_type(task_type)
                    .status(TaskStatus::Failed)
                    .synthetic(true)
                    .created_since(day_start),
            )
            .await?;

        Ok((live + synthetic) as u32)
    }
}
