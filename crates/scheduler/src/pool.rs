//! Fixed-capacity worker pool shared across task managers.
//!
//! Admission is permit-based: a slot must be reserved with
//! [`WorkerPool::try_reserve`] before work is spawned, and the permit is
//! held for the full duration of the unit of work. Because reservation
//! is a try-acquire, capacity is re-checked at dispatch time rather
//! than cached by any one manager — the bound is global across every
//! manager sharing the pool.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;

/// Shared, fixed-capacity set of concurrent execution slots.
///
/// The pool outlives any one manager; managers hold a non-owning
/// `Arc` reference to it.
pub struct WorkerPool {
    capacity: usize,
    permits: Arc<Semaphore>,
}

impl WorkerPool {
    /// Create a pool with `capacity` concurrent slots.
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity,
            permits: Arc::new(Semaphore::new(capacity)),
        })
    }

    /// Configured slot count.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots available right now.
    pub fn free_slots(&self) -> usize {
        self.permits.available_permits()
    }

    /// Slots currently occupied by running work.
    pub fn active_count(&self) -> usize {
        self.capacity - self.free_slots()
    }

    /// Whether the pool still admits work.
    pub fn is_alive(&self) -> bool {
        !self.permits.is_closed()
    }

    /// Stop admitting new work. Running work keeps its permit and runs
    /// to completion.
    pub fn close(&self) {
        self.permits.close();
    }

    /// Reserve one slot without waiting. Returns `None` when the pool
    /// is at capacity or closed.
    pub fn try_reserve(self: &Arc<Self>) -> Option<WorkSlot> {
        let permit = Arc::clone(&self.permits).try_acquire_owned().ok()?;
        Some(WorkSlot { permit })
    }
}

/// One reserved execution slot. Dropping it without running releases
/// the slot immediately.
pub struct WorkSlot {
    permit: OwnedSemaphorePermit,
}

impl WorkSlot {
    /// Spawn the unit of work onto the runtime, consuming the slot for
    /// the duration of the future.
    pub fn run<F>(self, work: F) -> WorkHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = self.permit;
        let join = tokio::spawn(async move {
            let _permit = permit;
            work.await;
        });
        WorkHandle { join }
    }
}

/// Handle to a spawned unit of work. Dropping it detaches the work,
/// which keeps running to completion in the background.
#[derive(Debug)]
pub struct WorkHandle {
    join: JoinHandle<()>,
}

impl WorkHandle {
    /// Whether the unit of work has finished (including by panic).
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn new_pool_is_fully_free() {
        let pool = WorkerPool::new(3);
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.free_slots(), 3);
        assert_eq!(pool.active_count(), 0);
        assert!(pool.is_alive());
    }

    #[tokio::test]
    async fn reserve_consumes_slots_until_capacity() {
        let pool = WorkerPool::new(2);
        let a = pool.try_reserve();
        let b = pool.try_reserve();
        assert!(a.is_some());
        assert!(b.is_some());
        assert!(pool.try_reserve().is_none());
        assert_eq!(pool.free_slots(), 0);
    }

    #[tokio::test]
    async fn dropping_unused_slot_releases_it() {
        let pool = WorkerPool::new(1);
        let slot = pool.try_reserve().expect("slot");
        assert_eq!(pool.free_slots(), 0);
        drop(slot);
        assert_eq!(pool.free_slots(), 1);
    }

    #[tokio::test]
    async fn slot_is_held_for_work_duration() {
        let pool = WorkerPool::new(1);
        let slot = pool.try_reserve().expect("slot");
        let handle = slot.run(async {
            tokio::time::sleep(Duration::from_millis(50)).await;
        });
        assert_eq!(pool.free_slots(), 0);
        assert!(!handle.is_finished());

        // Wait for completion; the permit must come back.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(handle.is_finished());
        assert_eq!(pool.free_slots(), 1);
    }

    #[tokio::test]
    async fn closed_pool_rejects_reservations() {
        let pool = WorkerPool::new(2);
        pool.close();
        assert!(!pool.is_alive());
        assert!(pool.try_reserve().is_none());
    }
}
