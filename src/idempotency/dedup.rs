//! Exactly-once execution keyed by idempotency key.
//!
//! [`Deduplicator::execute`] runs an operation at most once per
//! `(service, operation, key)` address and hands every later caller the
//! stored result. Two mechanisms cooperate:
//!
//! 1. Within one process, callers for the same address queue on a per-address
//!    async lock, so the operation is not even started twice.
//! 2. Across processes, the store's [`DedupStore::put_if_absent`] is a
//!    compare-and-set. The writer that loses returns the winner's record
//!    instead of its own result.
//!
//! Results are stored as JSON. Errors returned by the operation are not
//! stored: a failed attempt can be retried under the same key.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::GuardConfig;
use crate::error::GuardError;
use crate::idempotency::key::IdempotencyKey;
use crate::metrics::GuardMetric;
use crate::observer::GuardObserver;
use crate::types::ServiceName;

/// Address of a deduplication record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    pub service: ServiceName,
    pub operation: String,
    pub key: IdempotencyKey,
}

impl RecordKey {
    pub fn new(service: ServiceName, operation: impl Into<String>, key: IdempotencyKey) -> Self {
        Self {
            service,
            operation: operation.into(),
            key,
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.service, self.operation, self.key)
    }
}

/// The stored outcome of one successful execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeduplicationRecord {
    pub operation: String,
    pub key: IdempotencyKey,
    pub result: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Result of [`DedupStore::put_if_absent`].
#[derive(Debug, Clone, PartialEq)]
pub enum PutOutcome {
    /// The record was written.
    Stored,
    /// A record already existed at the address and was left untouched.
    Existing(DeduplicationRecord),
}

/// Persistence for deduplication records.
///
/// Implementations must make `put_if_absent` atomic: of two concurrent calls
/// for the same address, exactly one returns [`PutOutcome::Stored`].
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Reads the record at `key`.
    async fn get(&self, key: &RecordKey) -> Result<Option<DeduplicationRecord>, GuardError>;

    /// Writes `record` at `key` unless a record is already there.
    async fn put_if_absent(
        &self,
        key: &RecordKey,
        record: DeduplicationRecord,
    ) -> Result<PutOutcome, GuardError>;
}

/// A [`DedupStore`] held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryDedupStore {
    records: RwLock<HashMap<RecordKey, DeduplicationRecord>>,
}

impl InMemoryDedupStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl DedupStore for InMemoryDedupStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<DeduplicationRecord>, GuardError> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn put_if_absent(
        &self,
        key: &RecordKey,
        record: DeduplicationRecord,
    ) -> Result<PutOutcome, GuardError> {
        let mut records = self.records.write().await;
        if let Some(existing) = records.get(key) {
            return Ok(PutOutcome::Existing(existing.clone()));
        }
        records.insert(key.clone(), record);
        Ok(PutOutcome::Stored)
    }
}

/// What [`Deduplicator::execute`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupOutcome<T> {
    /// The operation ran and its result was stored.
    Executed(T),
    /// A stored result was returned.
    Duplicate(T),
}

impl<T> DedupOutcome<T> {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, DedupOutcome::Duplicate(_))
    }

    pub fn value(&self) -> &T {
        match self {
            DedupOutcome::Executed(v) | DedupOutcome::Duplicate(v) => v,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            DedupOutcome::Executed(v) | DedupOutcome::Duplicate(v) => v,
        }
    }
}

type InflightMap = Mutex<HashMap<RecordKey, Arc<tokio::sync::Mutex<()>>>>;

/// Runs operations at most once per idempotency key.
pub struct Deduplicator {
    store: Arc<dyn DedupStore>,
    service: ServiceName,
    observer: Arc<dyn GuardObserver>,
    inflight: Arc<InflightMap>,
}

impl Deduplicator {
    /// Creates a deduplicator for the service named in `config`.
    pub fn new(
        store: Arc<dyn DedupStore>,
        config: &GuardConfig,
        observer: Arc<dyn GuardObserver>,
    ) -> Self {
        Self {
            store,
            service: config.service_name.clone(),
            observer,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Address of the record for `operation` and `key` in this service.
    pub fn record_key(&self, operation: &str, key: &IdempotencyKey) -> RecordKey {
        RecordKey::new(self.service.clone(), operation, key.clone())
    }

    /// Reads the stored record for `operation` and `key`, if any.
    pub async fn record(
        &self,
        operation: &str,
        key: &IdempotencyKey,
    ) -> Result<Option<DeduplicationRecord>, GuardError> {
        self.store.get(&self.record_key(operation, key)).await
    }

    /// Runs `func` unless a result is already stored for `operation` and `key`.
    ///
    /// Store and serialization failures are converted into `E`. An error
    /// returned by `func` is passed through and nothing is stored.
    pub async fn execute<T, E, F, Fut>(
        &self,
        operation: &str,
        key: &IdempotencyKey,
        func: F,
    ) -> Result<DedupOutcome<T>, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<GuardError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let record_key = self.record_key(operation, key);

        if let Some(record) = self.store.get(&record_key).await? {
            return Ok(DedupOutcome::Duplicate(self.replay(&record_key, record)?));
        }

        let slot = InflightSlot::acquire(&self.inflight, &record_key);
        let _guard = slot.lock.lock().await;

        // Another caller may have finished while this one waited.
        if let Some(record) = self.store.get(&record_key).await? {
            return Ok(DedupOutcome::Duplicate(self.replay(&record_key, record)?));
        }

        let output = func().await?;

        let record = DeduplicationRecord {
            operation: operation.to_string(),
            key: key.clone(),
            result: serde_json::to_value(&output).map_err(GuardError::from)?,
            created_at: Utc::now(),
        };

        match self.store.put_if_absent(&record_key, record).await? {
            PutOutcome::Stored => {
                tracing::debug!(record = %record_key, "Stored deduplication record");
                Ok(DedupOutcome::Executed(output))
            }
            PutOutcome::Existing(winner) => {
                tracing::warn!(
                    record = %record_key,
                    "Lost deduplication race, returning the stored result"
                );
                self.observer.record_metric(GuardMetric::DuplicateDetected);
                let value = serde_json::from_value(winner.result).map_err(GuardError::from)?;
                Ok(DedupOutcome::Duplicate(value))
            }
        }
    }

    fn replay<T: DeserializeOwned>(
        &self,
        record_key: &RecordKey,
        record: DeduplicationRecord,
    ) -> Result<T, GuardError> {
        self.observer.record_metric(GuardMetric::DuplicateDetected);
        let value = serde_json::from_value(record.result)?;
        self.observer.record_metric(GuardMetric::DeduplicationPerformed);
        tracing::debug!(
            record = %record_key,
            stored_at = %record.created_at,
            "Returning stored result for duplicate request"
        );
        Ok(value)
    }
}

/// A per-address lock, removed from the in-flight map by its last holder.
struct InflightSlot {
    map: Arc<InflightMap>,
    key: RecordKey,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl InflightSlot {
    fn acquire(map: &Arc<InflightMap>, key: &RecordKey) -> Self {
        let lock = map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_default()
            .clone();
        Self {
            map: map.clone(),
            key: key.clone(),
            lock,
        }
    }
}

impl Drop for InflightSlot {
    fn drop(&mut self) {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map and one here: nobody else is waiting.
        if Arc::strong_count(&self.lock) == 2 {
            map.remove(&self.key);
        }
    }
}
