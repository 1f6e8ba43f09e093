//! Bounded admission for proof verifications

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::Semaphore;

/// Errors returned when a verification can't be admitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Running and waiting slots are all taken
    #[error("Verification pool is at capacity")]
    ServiceBusy,
    /// The pool no longer hands out permits
    #[error("Verification pool is closed")]
    Closed,
}

/// Limits how many verifications run at once and how many may wait for a slot.
///
/// Requests beyond `max_concurrency + max_queue` are rejected immediately instead of
/// piling up behind the proof system.
///
/// The permit is held until the verification future resolves. Pairing checks run on the
/// blocking thread pool, so `max_concurrency` also bounds the blocking threads in use.
#[derive(Debug)]
pub struct VerificationPool {
    permits: Semaphore,
    admitted: AtomicUsize,
    capacity: usize,
}

/// Releases an admission slot when the verification finishes or is dropped.
struct Admission<'a>(&'a AtomicUsize);

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl VerificationPool {
    /// Creates a pool with `max_concurrency` running slots and `max_queue` waiting slots
    #[must_use]
    pub fn new(max_concurrency: usize, max_queue: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            permits: Semaphore::new(max_concurrency),
            admitted: AtomicUsize::new(0),
            capacity: max_concurrency + max_queue,
        }
    }

    /// Runs `task` once a slot is free.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ServiceBusy`] without running `task` if the pool is full
    pub async fn run<F, T>(&self, task: F) -> Result<T, PoolError>
    where
        F: Future<Output = T>,
    {
        let admitted = self.admitted.fetch_add(1, Ordering::AcqRel);
        let _admission = Admission(&self.admitted);
        if admitted >= self.capacity {
            tracing::warn!(capacity = self.capacity, "Rejecting verification, pool is full");
            return Err(PoolError::ServiceBusy);
        }

        let _permit = self.permits.acquire().await.map_err(|_| PoolError::Closed)?;
        Ok(task.await)
    }

    /// Verifications currently running or waiting
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.admitted.load(Ordering::Acquire)
    }

    /// Stops admitting new verifications
    pub fn close(&self) {
        self.permits.close();
    }
}
