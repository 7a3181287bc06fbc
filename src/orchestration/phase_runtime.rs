//! # Phase Runtime
//!
//! Per-run services handed to phase executors: the shared concurrency limiter,
//! the result cache, and the metrics collector, wired together so executors
//! only describe their sub-operations.
//!
//! [`PhaseRuntime::run_batch`] runs a set of sub-operations concurrently. Each
//! one is looked up in the cache by fingerprint first; misses wait for a limiter
//! slot, run, and are cached on success. Results come back in input order no
//! matter which operation finishes first.
//!
//! A phase deadline never cancels work in flight. Once it passes, operations
//! that have not yet been admitted come back as [`SubOperationError::Skipped`]
//! and admitted ones run to completion.

use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::constants::RiskLevel;
use crate::orchestration::concurrency_limiter::{ConcurrencyLimiter, QueueStats};
use crate::orchestration::metrics::MetricsCollector;
use crate::orchestration::result_cache::{CacheStore, Fingerprint};

/// One cacheable unit of work inside a phase, usually a single file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubOperation {
    pub path: PathBuf,
    pub content_hash: String,
    pub transformations: Vec<String>,
    /// Recorded against the metrics when the operation fails
    pub risk_level: RiskLevel,
}

impl SubOperation {
    pub fn new(path: impl Into<PathBuf>, content_hash: &str, transformations: &[&str]) -> Self {
        Self {
            path: path.into(),
            content_hash: content_hash.to_string(),
            transformations: transformations.iter().map(|t| t.to_string()).collect(),
            risk_level: RiskLevel::Low,
        }
    }

    pub fn with_risk_level(mut self, risk_level: RiskLevel) -> Self {
        self.risk_level = risk_level;
        self
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(&self.path, &self.content_hash, self.transformations.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubOperationOutcome {
    pub output: serde_json::Value,
    pub risk_level: RiskLevel,
    pub warnings: Vec<String>,
}

impl SubOperationOutcome {
    pub fn new(output: serde_json::Value, risk_level: RiskLevel) -> Self {
        Self {
            output,
            risk_level,
            warnings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubOperationError {
    #[error("sub-operation failed: {0}")]
    Failed(String),
    /// Not started: an earlier operation in the batch failed or the phase
    /// deadline passed
    #[error("skipped after an earlier failure or the phase deadline")]
    Skipped,
    #[error("no limiter slot available: {0}")]
    LimiterUnavailable(String),
}

pub type SubOperationResult = Result<SubOperationOutcome, SubOperationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOptions {
    /// Stop admitting operations once one has failed
    pub fail_fast: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self { fail_fast: true }
    }
}

pub struct PhaseRuntime {
    limiter: Arc<ConcurrencyLimiter>,
    cache: Arc<dyn CacheStore<SubOperationOutcome>>,
    metrics: Arc<MetricsCollector>,
    cache_ttl: Duration,
    options: BatchOptions,
    deadline: Mutex<Option<tokio::time::Instant>>,
    deadline_hit: AtomicBool,
}

impl std::fmt::Debug for PhaseRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseRuntime")
            .field("limiter", &self.limiter)
            .field("cache", &self.cache.provider_name())
            .field("cache_ttl", &self.cache_ttl)
            .field("options", &self.options)
            .field("deadline", &*self.deadline.lock())
            .finish()
    }
}

impl PhaseRuntime {
    pub fn new(
        limiter: Arc<ConcurrencyLimiter>,
        cache: Arc<dyn CacheStore<SubOperationOutcome>>,
        metrics: Arc<MetricsCollector>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            limiter,
            cache,
            metrics,
            cache_ttl,
            options: BatchOptions::default(),
            deadline: Mutex::new(None),
            deadline_hit: AtomicBool::new(false),
        }
    }

    pub fn with_batch_options(mut self, options: BatchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn limiter(&self) -> &Arc<ConcurrencyLimiter> {
        &self.limiter
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.limiter.queue_stats()
    }

    /// Stop admitting sub-operations once `limit` has elapsed from now.
    /// `None` clears the deadline. Either way the exceeded flag is reset.
    pub fn set_deadline(&self, limit: Option<Duration>) {
        *self.deadline.lock() = limit.and_then(|l| tokio::time::Instant::now().checked_add(l));
        self.deadline_hit.store(false, Ordering::SeqCst);
    }

    /// Whether an operation was turned away because the deadline had passed
    pub fn deadline_exceeded(&self) -> bool {
        self.deadline_hit.load(Ordering::SeqCst)
    }

    fn past_deadline(&self) -> bool {
        let passed = self
            .deadline
            .lock()
            .is_some_and(|deadline| tokio::time::Instant::now() >= deadline);
        if passed {
            self.deadline_hit.store(true, Ordering::SeqCst);
        }
        passed
    }

    /// Run `operations` with this runtime's batch options
    pub async fn run_batch<F, Fut>(&self, operations: Vec<SubOperation>, work: F) -> Vec<SubOperationResult>
    where
        F: Fn(SubOperation) -> Fut,
        Fut: Future<Output = SubOperationResult>,
    {
        self.run_batch_with_options(operations, self.options, work)
            .await
    }

    /// Run `operations` concurrently under the limiter. The returned vector is
    /// index-aligned with `operations`.
    pub async fn run_batch_with_options<F, Fut>(
        &self,
        operations: Vec<SubOperation>,
        options: BatchOptions,
        work: F,
    ) -> Vec<SubOperationResult>
    where
        F: Fn(SubOperation) -> Fut,
        Fut: Future<Output = SubOperationResult>,
    {
        let total = operations.len();
        let aborted = AtomicBool::new(false);
        let work = &work;
        let aborted_ref = &aborted;

        let results = join_all(
            operations
                .into_iter()
                .map(|operation| self.run_one(operation, work, aborted_ref, options)),
        )
        .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        debug!(
            total,
            failed,
            aborted = aborted.load(Ordering::SeqCst),
            "Sub-operation batch finished"
        );
        results
    }

    /// Run a single operation through the cache and limiter
    pub async fn run_single<F, Fut>(&self, operation: SubOperation, work: F) -> SubOperationResult
    where
        F: Fn(SubOperation) -> Fut,
        Fut: Future<Output = SubOperationResult>,
    {
        let aborted = AtomicBool::new(false);
        self.run_one(operation, &work, &aborted, BatchOptions { fail_fast: false })
            .await
    }

    async fn run_one<F, Fut>(
        &self,
        operation: SubOperation,
        work: &F,
        aborted: &AtomicBool,
        options: BatchOptions,
    ) -> SubOperationResult
    where
        F: Fn(SubOperation) -> Fut,
        Fut: Future<Output = SubOperationResult>,
    {
        let fingerprint = operation.fingerprint();
        match self.cache.get(fingerprint.as_str()) {
            Ok(Some(cached)) => {
                self.metrics.record_cache_hit();
                return Ok(cached);
            }
            Ok(None) => self.metrics.record_cache_miss(),
            Err(e) => {
                warn!(key = %fingerprint, error = %e, "Cache lookup failed, treating as miss");
                self.metrics.record_cache_miss();
            }
        }

        if self.past_deadline() {
            return Err(SubOperationError::Skipped);
        }
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| SubOperationError::LimiterUnavailable(e.to_string()))?;
        if aborted.load(Ordering::SeqCst) || self.past_deadline() {
            return Err(SubOperationError::Skipped);
        }

        let failure_risk = operation.risk_level;
        let started = Instant::now();
        let result = work(operation).await;
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(outcome) => {
                self.metrics.record_operation(duration_ms, outcome.risk_level);
                if let Err(e) = self.cache.set(fingerprint.as_str(), outcome.clone(), self.cache_ttl) {
                    warn!(key = %fingerprint, error = %e, "Failed to cache sub-operation result");
                }
            }
            Err(e) => {
                self.metrics.record_operation(duration_ms, failure_risk);
                self.metrics.record_error();
                // Set while the slot is still held so queued operations see it
                if options.fail_fast {
                    aborted.store(true, Ordering::SeqCst);
                }
                debug!(key = %fingerprint, error = %e, "Sub-operation failed");
            }
        }

        result
    }
}
