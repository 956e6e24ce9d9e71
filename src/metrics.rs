//! Counters for validation, deduplication and guard violations.
//!
//! Guards and the idempotency subsystem only ever increment these counters;
//! telemetry scrapers only ever read them through [`GuardMetrics::snapshot`].
//! Every counter is an independent atomic, so unrelated invocations never
//! contend on a shared lock.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::observer::GuardObserver;
use crate::violation::{GuardViolation, ViolationCategory};

/// A countable event reported by the guard layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GuardMetric {
    /// An idempotency key was checked.
    ValidationAttempt,
    /// A checked key was accepted.
    ValidationPassed,
    /// A checked key was missing or malformed.
    ValidationFailed,
    /// A request arrived with a key that already has a dedup record.
    DuplicateDetected,
    /// A stored result was returned instead of running the operation.
    DeduplicationPerformed,
    /// A key could not be built from its parts.
    KeyGenerationError,
}

impl GuardMetric {
    /// Stable metric name for exporters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ValidationAttempt => "idempotency_validation_attempts_total",
            Self::ValidationPassed => "idempotency_validation_passed_total",
            Self::ValidationFailed => "idempotency_validation_failed_total",
            Self::DuplicateDetected => "idempotency_duplicates_detected_total",
            Self::DeduplicationPerformed => "idempotency_deduplications_total",
            Self::KeyGenerationError => "idempotency_key_generation_errors_total",
        }
    }
}

/// Monotonic counters for the guard layer.
#[derive(Debug, Default)]
pub struct GuardMetrics {
    validation_attempts: AtomicU64,
    validation_passed: AtomicU64,
    validation_failed: AtomicU64,
    duplicates_detected: AtomicU64,
    deduplications: AtomicU64,
    key_generation_errors: AtomicU64,
    /// Violations indexed by [`ViolationCategory::index`]
    violations: [AtomicU64; ViolationCategory::ALL.len()],
}

impl GuardMetrics {
    /// Creates a collector with every counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, metric: GuardMetric) -> &AtomicU64 {
        match metric {
            GuardMetric::ValidationAttempt => &self.validation_attempts,
            GuardMetric::ValidationPassed => &self.validation_passed,
            GuardMetric::ValidationFailed => &self.validation_failed,
            GuardMetric::DuplicateDetected => &self.duplicates_detected,
            GuardMetric::DeduplicationPerformed => &self.deduplications,
            GuardMetric::KeyGenerationError => &self.key_generation_errors,
        }
    }

    /// Increments the counter for `metric`. Returns the new value.
    pub fn increment(&self, metric: GuardMetric) -> u64 {
        self.counter(metric).fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Increments the violation counter for `category`. Returns the new value.
    pub fn increment_violation(&self, category: ViolationCategory) -> u64 {
        self.violations[category.index()].fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the current value of `metric`.
    pub fn get(&self, metric: GuardMetric) -> u64 {
        self.counter(metric).load(Ordering::Relaxed)
    }

    /// Returns the number of violations recorded for `category`.
    pub fn violations(&self, category: ViolationCategory) -> u64 {
        self.violations[category.index()].load(Ordering::Relaxed)
    }

    /// Takes a point-in-time copy of every counter.
    ///
    /// Counters are read one by one, so a snapshot taken under load may mix
    /// values from slightly different instants. Each value is still monotonic.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            validation_attempts: self.get(GuardMetric::ValidationAttempt),
            validation_passed: self.get(GuardMetric::ValidationPassed),
            validation_failed: self.get(GuardMetric::ValidationFailed),
            duplicates_detected: self.get(GuardMetric::DuplicateDetected),
            deduplications: self.get(GuardMetric::DeduplicationPerformed),
            key_generation_errors: self.get(GuardMetric::KeyGenerationError),
            violations: ViolationCategory::ALL
                .iter()
                .map(|c| CategoryCount {
                    category: *c,
                    count: self.violations(*c),
                })
                .collect(),
        }
    }
}

impl GuardObserver for GuardMetrics {
    fn record_event(&self, violation: &GuardViolation) {
        self.increment_violation(violation.category());
    }

    fn record_metric(&self, metric: GuardMetric) {
        self.increment(metric);
    }
}

/// Violation count for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: ViolationCategory,
    pub count: u64,
}

/// Serializable copy of [`GuardMetrics`] for telemetry exporters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub validation_attempts: u64,
    pub validation_passed: u64,
    pub validation_failed: u64,
    pub duplicates_detected: u64,
    pub deduplications: u64,
    pub key_generation_errors: u64,
    pub violations: Vec<CategoryCount>,
}

impl MetricsSnapshot {
    /// Returns the violation count for `category`.
    pub fn violations_for(&self, category: ViolationCategory) -> u64 {
        self.violations
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.count)
            .unwrap_or(0)
    }
}
