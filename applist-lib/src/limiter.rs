//! Shared cap on simultaneous network operations.
//!
//! One limiter is created per process and cloned into every component that
//! talks to the network (icon downloads, product-info queries), so the total
//! number of in-flight requests stays bounded no matter which component
//! fans out.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default number of simultaneous network operations.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct NetLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl Default for NetLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENCY)
    }
}

impl NetLimiter {
    /// Create a limiter allowing `capacity` concurrent operations (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits not currently held.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a permit. The semaphore is never closed, so this only
    /// returns `None` if that invariant is broken.
    pub async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        self.semaphore.clone().acquire_owned().await.ok()
    }

    /// Run `fut` while holding a permit.
    pub async fn run<F: Future>(&self, fut: F) -> F::Output {
        let _permit = self.acquire().await;
        fut.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn never_exceeds_capacity() {
        let limiter = NetLimiter::new(3);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..12)
            .map(|_| {
                let limiter = limiter.clone();
                let active = active.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    limiter
                        .run(async {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            active.fetch_sub(1, Ordering::SeqCst);
                        })
                        .await
                })
            })
            .collect();
        futures::future::join_all(tasks).await;

        assert_eq!(peak.load(Ordering::SeqCst), 3);
        assert_eq!(limiter.available(), 3);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        assert_eq!(NetLimiter::new(0).capacity(), 1);
    }
}
