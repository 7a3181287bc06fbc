//! # Operation Metrics
//!
//! Aggregates sub-operation durations, risk, cache effectiveness, and error
//! counts for one orchestrator instance. All counters live behind a single lock
//! so a snapshot is always internally consistent.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::constants::RiskLevel;

/// Derived, read-only view of the collector
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationMetricsSnapshot {
    pub count: u64,
    pub average_duration_ms: f64,
    pub average_risk_score: f64,
    /// `hits / (hits + misses)`
    pub cache_hit_rate: f64,
    /// `errors / count`
    pub error_rate: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    count: u64,
    duration_sum_ms: f64,
    risk_score_sum: f64,
    cache_hits: u64,
    cache_misses: u64,
    errors: u64,
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    counters: Mutex<Counters>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed sub-operation. Negative durations count as zero.
    pub fn record_operation(&self, duration_ms: f64, risk_level: RiskLevel) {
        let mut counters = self.counters.lock();
        counters.count += 1;
        counters.duration_sum_ms += duration_ms.max(0.0);
        counters.risk_score_sum += risk_level.score();
    }

    pub fn record_cache_hit(&self) {
        self.counters.lock().cache_hits += 1;
    }

    pub fn record_cache_miss(&self) {
        self.counters.lock().cache_misses += 1;
    }

    pub fn record_error(&self) {
        self.counters.lock().errors += 1;
    }

    pub fn snapshot(&self) -> OperationMetricsSnapshot {
        let c = self.counters.lock();
        let lookups = c.cache_hits + c.cache_misses;

        OperationMetricsSnapshot {
            count: c.count,
            average_duration_ms: ratio(c.duration_sum_ms, c.count),
            average_risk_score: ratio(c.risk_score_sum, c.count),
            cache_hit_rate: ratio(c.cache_hits as f64, lookups),
            error_rate: ratio(c.errors as f64, c.count),
            cache_hits: c.cache_hits,
            cache_misses: c.cache_misses,
            errors: c.errors,
        }
    }

    /// Zero every counter. The result cache is untouched.
    pub fn reset(&self) {
        *self.counters.lock() = Counters::default();
    }
}

fn ratio(numerator: f64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}
