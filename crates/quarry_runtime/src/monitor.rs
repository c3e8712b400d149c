//! Recovery metrics.
//!
//! Counters are atomics so one orchestrator can be shared across
//! concurrent requests without a lock.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one orchestrator
#[derive(Debug, Default)]
pub struct RecoveryMetrics {
    requests: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    rejections: AtomicU64,
    executions: AtomicU64,
    retries: AtomicU64,
    regenerations: AtomicU64,
}

/// Point-in-time copy of [`RecoveryMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Requests started
    pub requests: u64,
    /// Requests ending in success
    pub successes: u64,
    /// Requests ending in failure
    pub failures: u64,
    /// Failures caused by the policy gate
    pub rejections: u64,
    /// Statements sent to the engine
    pub executions: u64,
    /// Local retries
    pub retries: u64,
    /// Regeneration calls
    pub regenerations: u64,
}

impl MetricsSnapshot {
    /// Fraction of finished requests that succeeded (1.0 when none finished)
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        let finished = self.successes + self.failures;
        if finished == 0 {
            return 1.0;
        }
        self.successes as f64 / finished as f64
    }
}

impl RecoveryMetrics {
    /// Zeroed counters
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self, rejected: bool) {
        self.failures.fetch_add(1, Ordering::Relaxed);
        if rejected {
            self.rejections.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_execution(&self) {
        self.executions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_regeneration(&self) {
        self.regenerations.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counters
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            rejections: self.rejections.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            regenerations: self.regenerations.load(Ordering::Relaxed),
        }
    }

    /// Shorthand for `snapshot().success_rate()`
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        self.snapshot().success_rate()
    }
}
