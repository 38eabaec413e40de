use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::extract::ExtractionError;

/// Bounds the number of live browser processes.
///
/// Up to `max_concurrent` renders run at once and up to `max_queued` more
/// wait for a slot. Anything beyond that is rejected with
/// [`ExtractionError::Busy`] instead of queueing without bound.
pub struct RenderLimiter {
    semaphore: Arc<Semaphore>,
    queued: AtomicUsize,
    max_queued: usize,
}

impl RenderLimiter {
    pub fn new(max_concurrent: usize, max_queued: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            queued: AtomicUsize::new(0),
            max_queued,
        }
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, ExtractionError> {
        if let Ok(permit) = Arc::clone(&self.semaphore).try_acquire_owned() {
            return Ok(permit);
        }

        let reserved = self
            .queued
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_queued).then_some(n + 1)
            });
        if reserved.is_err() {
            tracing::warn!(max_queued = self.max_queued, "render queue full, rejecting");
            return Err(ExtractionError::Busy);
        }

        let _slot = QueueSlot(&self.queued);
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ExtractionError::Busy)
    }

    /// Render slots currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Requests currently waiting for a slot.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }
}

/// Leaves the queue when the waiter gets a permit or is cancelled.
struct QueueSlot<'a>(&'a AtomicUsize);

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
