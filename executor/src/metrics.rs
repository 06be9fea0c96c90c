//! Operation counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

/// Router counters.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Operations submitted.
    pub operations_total: AtomicU64,
    /// Operations that ended in success.
    pub operations_succeeded: AtomicU64,
    /// Operations that ended in error.
    pub operations_failed: AtomicU64,
    /// Operations currently running.
    pub operations_active: AtomicU64,
    /// Individual provider failures discarded during fanout.
    pub provider_quote_failures: AtomicU64,
    /// Approval transactions confirmed.
    pub approvals_issued: AtomicU64,
    /// Native wrap transactions confirmed.
    pub wraps_issued: AtomicU64,
    /// Balance cache invalidations that failed.
    pub invalidation_failures: AtomicU64,
    /// Retries issued after resolving a token symbol.
    pub recovery_retries: AtomicU64,
}

impl Metrics {
    /// Create new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an operation starting.
    pub fn operation_started(&self) {
        self.operations_total.fetch_add(1, Ordering::Relaxed);
        self.operations_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an operation success.
    pub fn operation_succeeded(&self) {
        self.operations_succeeded.fetch_add(1, Ordering::Relaxed);
        self.operations_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record an operation failure.
    pub fn operation_failed(&self) {
        self.operations_failed.fetch_add(1, Ordering::Relaxed);
        self.operations_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn provider_failures(&self, count: usize) {
        self.provider_quote_failures
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn approval_issued(&self) {
        self.approvals_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn wrap_issued(&self) {
        self.wraps_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn invalidation_failed(&self) {
        self.invalidation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn recovery_retry(&self) {
        self.recovery_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            operations_total: self.operations_total.load(Ordering::Relaxed),
            operations_succeeded: self.operations_succeeded.load(Ordering::Relaxed),
            operations_failed: self.operations_failed.load(Ordering::Relaxed),
            operations_active: self.operations_active.load(Ordering::Relaxed),
            provider_quote_failures: self.provider_quote_failures.load(Ordering::Relaxed),
            approvals_issued: self.approvals_issued.load(Ordering::Relaxed),
            wraps_issued: self.wraps_issued.load(Ordering::Relaxed),
            invalidation_failures: self.invalidation_failures.load(Ordering::Relaxed),
            recovery_retries: self.recovery_retries.load(Ordering::Relaxed),
        }
    }

    /// Export counters in Prometheus text format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let rows = [
            ("operations_total", "counter", "Total operations submitted", snapshot.operations_total),
            ("operations_succeeded", "counter", "Operations that succeeded", snapshot.operations_succeeded),
            ("operations_failed", "counter", "Operations that failed", snapshot.operations_failed),
            ("operations_active", "gauge", "Operations in progress", snapshot.operations_active),
            ("provider_quote_failures", "counter", "Discarded provider quote failures", snapshot.provider_quote_failures),
            ("approvals_issued", "counter", "Approval transactions confirmed", snapshot.approvals_issued),
            ("wraps_issued", "counter", "Native wrap transactions confirmed", snapshot.wraps_issued),
            ("invalidation_failures", "counter", "Failed balance cache invalidations", snapshot.invalidation_failures),
            ("recovery_retries", "counter", "Token symbol recovery retries", snapshot.recovery_retries),
        ];

        rows.iter()
            .map(|(name, kind, help, value)| {
                format!(
                    "# HELP intentroute_{name} {help}\n# TYPE intentroute_{name} {kind}\nintentroute_{name} {value}\n"
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub operations_total: u64,
    pub operations_succeeded: u64,
    pub operations_failed: u64,
    pub operations_active: u64,
    pub provider_quote_failures: u64,
    pub approvals_issued: u64,
    pub wraps_issued: u64,
    pub invalidation_failures: u64,
    pub recovery_retries: u64,
}

/// Shared metrics instance.
pub type SharedMetrics = Arc<Metrics>;
