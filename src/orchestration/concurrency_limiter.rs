//! # Concurrency Limiter
//!
//! Bounds the number of in-flight sub-operations within a phase.
//!
//! Admission goes through a fair `tokio::sync::Semaphore`, so waiters are served
//! strictly in arrival order. A slot is held by a [`LimiterPermit`] and released
//! when the permit drops, which covers success, failure, panic unwinding, and a
//! caller abandoning the future mid-flight.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, trace};

use crate::error::{OrchestratorError, Result};

/// Read-only snapshot of limiter occupancy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub running: usize,
    pub queued: usize,
    pub max_concurrency: usize,
    /// `running / max_concurrency`
    pub utilization: f64,
}

#[derive(Debug)]
pub struct ConcurrencyLimiter {
    max_concurrency: usize,
    semaphore: Semaphore,
    running: AtomicUsize,
    queued: AtomicUsize,
    peak_running: AtomicUsize,
}

impl ConcurrencyLimiter {
    /// Create a limiter admitting at most `max_concurrency` operations at once
    pub fn new(max_concurrency: usize) -> Result<Self> {
        if max_concurrency == 0 {
            return Err(OrchestratorError::LimiterConfigError(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if max_concurrency > Semaphore::MAX_PERMITS {
            return Err(OrchestratorError::LimiterConfigError(format!(
                "max_concurrency {max_concurrency} exceeds {}",
                Semaphore::MAX_PERMITS
            )));
        }

        debug!(max_concurrency, "Concurrency limiter initialized");

        Ok(Self {
            max_concurrency,
            semaphore: Semaphore::new(max_concurrency),
            running: AtomicUsize::new(0),
            queued: AtomicUsize::new(0),
            peak_running: AtomicUsize::new(0),
        })
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run `op` once a slot is free, waiting in FIFO order otherwise
    pub async fn execute<F, Fut, T>(&self, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _permit = self.acquire().await?;
        Ok(op().await)
    }

    /// Wait for a slot. The slot is released when the returned permit drops.
    pub async fn acquire(&self) -> Result<LimiterPermit<'_>> {
        let waiting = QueuedGuard::enter(&self.queued);
        let permit = self.semaphore.acquire().await.map_err(|e| {
            OrchestratorError::LimiterConfigError(format!("limiter closed: {e}"))
        })?;
        drop(waiting);

        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_running.fetch_max(running, Ordering::SeqCst);
        trace!(running, max = self.max_concurrency, "Limiter slot acquired");

        Ok(LimiterPermit {
            running: &self.running,
            _permit: permit,
        })
    }

    pub fn queue_stats(&self) -> QueueStats {
        let running = self.running.load(Ordering::SeqCst);
        QueueStats {
            running,
            queued: self.queued.load(Ordering::SeqCst),
            max_concurrency: self.max_concurrency,
            utilization: running as f64 / self.max_concurrency as f64,
        }
    }

    /// Highest number of simultaneously running operations observed
    pub fn peak_running(&self) -> usize {
        self.peak_running.load(Ordering::SeqCst)
    }
}

/// An occupied limiter slot
#[derive(Debug)]
pub struct LimiterPermit<'a> {
    running: &'a AtomicUsize,
    // Dropped after `Drop::drop` runs, so `running` never over-reports
    _permit: SemaphorePermit<'a>,
}

impl Drop for LimiterPermit<'_> {
    fn drop(&mut self) {
        self.running.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Counts a waiter for as long as it is parked, including if it is cancelled
struct QueuedGuard<'a>(&'a AtomicUsize);

impl<'a> QueuedGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    async fn wait_for_queued(limiter: &ConcurrencyLimiter, queued: usize) {
        while limiter.queue_stats().queued < queued {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = ConcurrencyLimiter::new(0).unwrap_err();
        assert_eq!(err.code(), "LIMITER_CONFIG_ERROR");
    }

    #[tokio::test]
    async fn test_runs_immediately_when_slot_free() {
        let limiter = ConcurrencyLimiter::new(2).unwrap();
        let value = limiter.execute(|| async { 21 * 2 }).await.unwrap();
        assert_eq!(value, 42);

        let stats = limiter.queue_stats();
        assert_eq!(stats.running, 0);
        assert_eq!(stats.queued, 0);
        assert_eq!(stats.utilization, 0.0);
    }

    #[tokio::test]
    async fn test_waiters_are_served_in_arrival_order() {
        let limiter = Arc::new(ConcurrencyLimiter::new(1).unwrap());
        let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let blocker = limiter.acquire().await.unwrap();

        let mut handles = Vec::new();
        for id in 0..5 {
            let task_limiter = limiter.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                task_limiter
                    .execute(|| async move {
                        order.lock().push(id);
                    })
                    .await
                    .unwrap();
            }));
            wait_for_queued(&limiter, id + 1).await;
        }

        let stats = limiter.queue_stats();
        assert_eq!(stats.running, 1);
        assert_eq!(stats.queued, 5);
        assert_eq!(stats.utilization, 1.0);

        drop(blocker);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_slot_released_when_future_is_dropped() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();

        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            limiter.execute(|| tokio::time::sleep(Duration::from_secs(60))),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(limiter.queue_stats().running, 0);

        let value = limiter.execute(|| async { "free" }).await.unwrap();
        assert_eq!(value, "free");
    }

    #[tokio::test]
    async fn test_slot_released_when_operation_fails() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let result: Result<std::result::Result<(), String>> = limiter
            .execute(|| async { Err("boom".to_string()) })
            .await;
        assert_eq!(result.unwrap(), Err("boom".to_string()));
        assert_eq!(limiter.queue_stats().running, 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_leaves_queue() {
        let limiter = ConcurrencyLimiter::new(1).unwrap();
        let _held = limiter.acquire().await.unwrap();

        let waited = tokio::time::timeout(Duration::from_millis(20), limiter.acquire()).await;
        assert!(waited.is_err());
        assert_eq!(limiter.queue_stats().queued, 0);
    }

    #[tokio::test]
    async fn test_peak_never_exceeds_max() {
        let limiter = Arc::new(ConcurrencyLimiter::new(3).unwrap());
        let ops = (0..20).map(|i| {
            let limiter = limiter.clone();
            async move {
                limiter
                    .execute(|| tokio::time::sleep(Duration::from_millis(1 + (i % 4))))
                    .await
                    .unwrap();
            }
        });
        futures::future::join_all(ops).await;

        assert!(limiter.peak_running() <= 3);
        assert!(limiter.peak_running() >= 1);
    }
}
