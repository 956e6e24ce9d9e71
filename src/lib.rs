//! # Durable Guards
//!
//! A guard layer for handlers that run on a replay-based durable execution
//! runtime. The runtime recovers a handler by re-running it and substituting
//! journaled results for completed side effects, so handler code has to make
//! the same decisions in the same order on every run. This crate catches the
//! mistakes that break that assumption and keeps retried requests from
//! repeating their side effects.
//!
//! ## Overview
//!
//! ### Key Features
//!
//! - **Ordered Container**: [`OrderedMap`] iterates in insertion order on every run,
//!   unlike `HashMap`.
//! - **Scoped Side Effects**: [`scoped::run_side_effect`] hands its closure an isolated
//!   handle instead of the invocation context.
//! - **Runtime Guards**: context misuse, self-referencing actor calls, blocking regions,
//!   handler deadlines and unordered containers, bound to one invocation by [`Guards`].
//! - **Idempotency Keys**: deterministic key builders, ingress validation of the
//!   `Idempotency-Key` header and exactly-once execution per key.
//! - **Observability**: every violation and counter goes through one injected
//!   [`GuardObserver`]. [`GuardMetrics`] keeps atomic counters for scraping.
//!
//! ## Important Documentation
//!
//! - [`docs::determinism`]: which guard catches which source of divergence
//! - [`docs::policy`]: how strict and permissive policy treat each violation
//!
//! ## Getting Started
//!
//! ```toml
//! [dependencies]
//! durable-guards = "0.1"
//! tokio = { version = "1.0", features = ["full"] }
//! ```
//!
//! ### Guarding a Handler
//!
//! ```rust
//! use std::sync::Arc;
//! use durable_guards::{
//!     ActorRef, GuardConfig, GuardError, Guards, InvocationContext, OrderedMap, TracingObserver,
//! };
//!
//! # tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap().block_on(async {
//! let config = Arc::new(GuardConfig::from_env());
//! let ctx = InvocationContext::new("inv-1", "checkout")
//!     .with_actor(ActorRef::new("Cart", "user-42"));
//! let guards = Guards::for_invocation(&ctx, config, Arc::new(TracingObserver));
//!
//! let total = guards
//!     .enforce_deadline(|_cancel| async {
//!         let lines: OrderedMap<String, u64> = OrderedMap::new();
//!         lines.set("sku-1".to_string(), 1200);
//!         lines.set("sku-2".to_string(), 300);
//!         guards.check_container(&lines)?;
//!
//!         guards.check_outbound_call(&ActorRef::new("Inventory", "sku-1"))?;
//!         let key = guards.build_key("order", &["user-42", "checkout"])?;
//!         assert_eq!(key, "order:user-42:checkout");
//!
//!         Ok::<_, GuardError>(lines.values().iter().sum::<u64>())
//!     })
//!     .await
//!     .unwrap()
//!     .unwrap();
//!
//! assert_eq!(total, 1500);
//! # });
//! ```
//!
//! ### Deduplicating a Side Effect
//!
//! ```rust
//! use std::sync::Arc;
//! use durable_guards::{
//!     build_key, Deduplicator, GuardConfig, GuardError, InMemoryDedupStore, NoopObserver,
//! };
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let dedup = Deduplicator::new(
//!     Arc::new(InMemoryDedupStore::new()),
//!     &GuardConfig::default(),
//!     Arc::new(NoopObserver),
//! );
//! let key = build_key("payment", &["order-42"]).unwrap();
//!
//! let receipt = dedup
//!     .execute("charge", &key, || async { Ok::<_, GuardError>("ch_1".to_string()) })
//!     .await
//!     .unwrap();
//! assert_eq!(receipt.into_inner(), "ch_1");
//! # });
//! ```
//!
//! ## Policy
//!
//! Missing keys, context misuse and unordered containers are policy-routed:
//! the strict policy fails the request or invocation, the permissive policy
//! logs and continues. Self-referencing calls, deadlines and key generation
//! failures always fail. Blocking regions only ever warn.
//!
//! ## Module Organization
//!
//! - [`catalog`]: Known anti-patterns, one per violation category
//! - [`config`]: Policy and process-wide configuration
//! - [`docs`]: **Documentation modules** - determinism and policy
//!   - [`docs::determinism`]: Sources of divergence and their guards
//!   - [`docs::policy`]: Strict and permissive behavior per violation
//! - [`error`]: Error types and caller-facing rejections
//! - [`guards`]: Runtime guard functions and the per-invocation [`Guards`] facade
//! - [`idempotency`]: Key construction, validation, middleware and deduplication
//! - [`metrics`]: Atomic counters
//! - [`observer`]: The observability capability and its implementations
//! - [`ordered_map`]: Insertion-ordered map
//! - [`scoped`]: Isolated side effect execution
//! - [`types`]: Invocation context and identifiers
//! - [`violation`]: Violation categories and records

pub mod catalog;
pub mod config;
pub mod docs;
pub mod error;
pub mod guards;
pub mod idempotency;
pub mod metrics;
pub mod observer;
pub mod ordered_map;
pub mod scoped;
pub mod types;
pub mod violation;

// Re-export main types at crate root
pub use catalog::{
    anti_pattern_by_category, log_anti_pattern_warning, AntiPatternDescriptor,
    COMMON_ANTI_PATTERNS,
};
pub use config::*;
pub use error::{ErrorCategory, GuardError, Rejection};
pub use guards::{CancellationSignal, Guards};
pub use metrics::{GuardMetric, GuardMetrics, MetricsSnapshot};
pub use observer::{FanoutObserver, GuardObserver, NoopObserver, RecordingObserver, TracingObserver};
pub use ordered_map::OrderedMap;
pub use scoped::{run_side_effect, run_side_effect_async, SideEffectContext};
pub use types::{ActorRef, ExecutionMode, InvocationContext, InvocationId, ServiceName};
pub use violation::{GuardViolation, Severity, ViolationCategory};

// Re-export idempotency types
pub use idempotency::{
    build_key, content_hash_key, trusted_key, uuid_key, validate_key, Admission, DedupOutcome,
    DedupStore, DeduplicationRecord, Deduplicator, IdempotencyKey, IdempotencyMiddleware,
    InMemoryDedupStore, KeyFormat, PutOutcome, RecordKey,
};
