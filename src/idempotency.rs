//! Idempotency keys: construction, ingress validation and deduplication.
//!
//! A key names one logical operation so that retries of it can be
//! recognized. The pieces:
//!
//! - [`key`]: deterministic key builders and the [`IdempotencyKey`] type
//! - [`validate`]: key validation and [`KeyFormat`] classification
//! - [`middleware`]: validates the `Idempotency-Key` header before a handler runs
//! - [`dedup`]: runs an operation at most once per key and stores its result
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use durable_guards::config::GuardConfig;
//! use durable_guards::error::GuardError;
//! use durable_guards::idempotency::{build_key, Deduplicator, InMemoryDedupStore};
//! use durable_guards::observer::NoopObserver;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let dedup = Deduplicator::new(
//!     Arc::new(InMemoryDedupStore::new()),
//!     &GuardConfig::default(),
//!     Arc::new(NoopObserver),
//! );
//! let key = build_key("order", &["42"]).unwrap();
//!
//! let first = dedup.execute("charge", &key, || async { Ok::<_, GuardError>(4200u64) }).await.unwrap();
//! let again = dedup.execute("charge", &key, || async { Ok::<_, GuardError>(0u64) }).await.unwrap();
//!
//! assert!(!first.is_duplicate());
//! assert!(again.is_duplicate());
//! assert_eq!(again.into_inner(), 4200);
//! # });
//! ```

pub mod dedup;
pub mod key;
pub mod middleware;
pub mod validate;

pub use dedup::{
    DedupOutcome, DedupStore, DeduplicationRecord, Deduplicator, InMemoryDedupStore, PutOutcome,
    RecordKey,
};
pub use key::{build_key, content_hash_key, uuid_key, IdempotencyKey, KEY_SEPARATOR};
pub use middleware::{trusted_key, Admission, IdempotencyMiddleware};
pub use validate::{validate, validate_key, KeyFormat, CONTENT_HASH_LENGTH, MAX_KEY_LENGTH};
