//! The observability capability injected into guards.
//!
//! Every component that reports anything takes one `Arc<dyn GuardObserver>`
//! at construction. There are no optional hooks to check per call site: a
//! component that has nothing to report to gets a [`NoopObserver`].

use std::sync::{Arc, Mutex, PoisonError};

use crate::catalog::anti_pattern_by_category;
use crate::metrics::GuardMetric;
use crate::violation::{GuardViolation, Severity};

/// Receives violations and metric increments from the guard layer.
pub trait GuardObserver: Send + Sync {
    /// Records one violation.
    fn record_event(&self, violation: &GuardViolation);

    /// Records one metric increment.
    fn record_metric(&self, metric: GuardMetric);
}

/// Observer that emits `tracing` events, each carrying the catalog's fix
/// for its category.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl GuardObserver for TracingObserver {
    fn record_event(&self, violation: &GuardViolation) {
        let invocation_id = violation.invocation_id().map(|id| id.as_str()).unwrap_or("-");
        let fix = anti_pattern_by_category(violation.category()).fix;
        match violation.severity() {
            Severity::Warning => tracing::warn!(
                category = %violation.category(),
                invocation_id = invocation_id,
                fix = fix,
                "{}",
                violation.message()
            ),
            Severity::Error => tracing::error!(
                category = %violation.category(),
                invocation_id = invocation_id,
                fix = fix,
                "{}",
                violation.message()
            ),
        }
    }

    fn record_metric(&self, metric: GuardMetric) {
        tracing::trace!(metric = metric.as_str(), "guard metric");
    }
}

/// Observer that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl GuardObserver for NoopObserver {
    fn record_event(&self, _violation: &GuardViolation) {}

    fn record_metric(&self, _metric: GuardMetric) {}
}

/// Forwards every report to each of its observers in order.
#[derive(Clone, Default)]
pub struct FanoutObserver {
    observers: Vec<Arc<dyn GuardObserver>>,
}

impl FanoutObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer to the end of the list.
    pub fn with(mut self, observer: Arc<dyn GuardObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl GuardObserver for FanoutObserver {
    fn record_event(&self, violation: &GuardViolation) {
        for observer in &self.observers {
            observer.record_event(violation);
        }
    }

    fn record_metric(&self, metric: GuardMetric) {
        for observer in &self.observers {
            observer.record_metric(metric);
        }
    }
}

/// Observer that keeps everything it receives, for assertions in tests.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<GuardViolation>>,
    metrics: Mutex<Vec<GuardMetric>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every violation recorded so far.
    pub fn events(&self) -> Vec<GuardViolation> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns every metric increment recorded so far.
    pub fn metrics(&self) -> Vec<GuardMetric> {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns how many times `metric` was recorded.
    pub fn metric_count(&self, metric: GuardMetric) -> usize {
        self.metrics().into_iter().filter(|m| *m == metric).count()
    }
}

impl GuardObserver for RecordingObserver {
    fn record_event(&self, violation: &GuardViolation) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(violation.clone());
    }

    fn record_metric(&self, metric: GuardMetric) {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(metric);
    }
}
