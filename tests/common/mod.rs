//! Shared test utilities for integration tests.
//!
//! This module provides fixtures, a dedup store that can simulate a
//! concurrent writer in another process, a `tracing` capture layer, and
//! proptest strategies for key parts.

#![allow(dead_code)] // These utilities are used by other integration test files

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use durable_guards::{
    DedupStore, DeduplicationRecord, GuardConfig, GuardError, GuardPolicy, InMemoryDedupStore,
    PutOutcome, RecordKey, RecordingObserver,
};
use proptest::prelude::*;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

pub const TEST_SERVICE: &str = "checkout-service";

// =============================================================================
// Fixtures
// =============================================================================

/// Builds a config for `policy` with the test service name.
pub fn test_config(policy: GuardPolicy) -> Arc<GuardConfig> {
    Arc::new(
        GuardConfig::default()
            .with_policy(policy)
            .with_service_name(TEST_SERVICE),
    )
}

pub fn recorder() -> Arc<RecordingObserver> {
    Arc::new(RecordingObserver::new())
}

// =============================================================================
// Dedup Stores
// =============================================================================

/// Wraps an [`InMemoryDedupStore`] and counts calls.
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryDedupStore,
    pub gets: AtomicUsize,
    pub puts: AtomicUsize,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DedupStore for CountingStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<DeduplicationRecord>, GuardError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key).await
    }

    async fn put_if_absent(
        &self,
        key: &RecordKey,
        record: DeduplicationRecord,
    ) -> Result<PutOutcome, GuardError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.inner.put_if_absent(key, record).await
    }
}

/// A store where another process writes `competing_result` just before the
/// first local write, so that write loses.
pub struct RacingStore {
    inner: InMemoryDedupStore,
    competing_result: serde_json::Value,
    raced: Mutex<bool>,
}

impl RacingStore {
    pub fn new(competing_result: serde_json::Value) -> Self {
        Self {
            inner: InMemoryDedupStore::new(),
            competing_result,
            raced: Mutex::new(false),
        }
    }
}

#[async_trait]
impl DedupStore for RacingStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<DeduplicationRecord>, GuardError> {
        self.inner.get(key).await
    }

    async fn put_if_absent(
        &self,
        key: &RecordKey,
        record: DeduplicationRecord,
    ) -> Result<PutOutcome, GuardError> {
        let first = {
            let mut raced = self.raced.lock().unwrap();
            !std::mem::replace(&mut *raced, true)
        };
        if first {
            let winner = DeduplicationRecord {
                result: self.competing_result.clone(),
                created_at: Utc::now(),
                ..record.clone()
            };
            self.inner.put_if_absent(key, winner).await?;
        }
        self.inner.put_if_absent(key, record).await
    }
}

/// A store that always fails.
pub struct UnavailableStore;

#[async_trait]
impl DedupStore for UnavailableStore {
    async fn get(&self, _key: &RecordKey) -> Result<Option<DeduplicationRecord>, GuardError> {
        Err(GuardError::store("connection refused"))
    }

    async fn put_if_absent(
        &self,
        _key: &RecordKey,
        _record: DeduplicationRecord,
    ) -> Result<PutOutcome, GuardError> {
        Err(GuardError::store("connection refused"))
    }
}

// =============================================================================
// Tracing Capture
// =============================================================================

/// One captured `tracing` event.
#[derive(Debug, Clone)]
pub struct CapturedEvent {
    pub level: Level,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Layer that stores every event it sees.
#[derive(Clone, Default)]
pub struct CaptureLayer {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CaptureLayer {
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn at_level(&self, level: Level) -> Vec<CapturedEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else {
            self.fields
                .push((field.name().to_string(), format!("{:?}", value)));
        }
    }
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        self.events.lock().unwrap().push(CapturedEvent {
            level: *event.metadata().level(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Installs a capture layer as the thread's default subscriber until the
/// returned guard is dropped.
pub fn capture_tracing() -> (CaptureLayer, tracing::subscriber::DefaultGuard) {
    let layer = CaptureLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (layer, guard)
}

// =============================================================================
// Proptest Strategies
// =============================================================================

/// A valid key namespace.
pub fn namespace_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,11}"
}

/// A valid key part.
pub fn part_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_-]{1,20}"
}

/// A list of valid key parts.
pub fn parts_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(part_strategy(), 0..6)
}
