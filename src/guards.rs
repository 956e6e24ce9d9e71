//! Runtime guards for replay-based handler code.
//!
//! Each submodule holds one state-free check that returns an
//! `Option<GuardViolation>`:
//!
//! - [`context`]: a side effect closure handed the parent context
//! - [`deadlock`]: an actor calling itself, directly or through its callers
//! - [`blocking`]: a region that blocked past the warning threshold
//! - [`deadline`]: a handler that ran past its hard deadline
//! - [`containers`]: a value without a stable iteration order
//!
//! [`Guards`] binds those checks to one invocation. It resolves the policy
//! once, reports every violation to the observer, and decides whether the
//! violation fails the invocation:
//!
//! | Category | Strict | Permissive |
//! |---|---|---|
//! | Context misuse, non-deterministic container, validation | error | warning |
//! | Blocking operation | warning | warning |
//! | Deadlock, timeout, key generation | error | error |

pub mod blocking;
pub mod containers;
pub mod context;
pub mod deadline;
pub mod deadlock;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

pub use blocking::{check_blocking_duration, BlockingTimer};
pub use containers::{detect_nondeterministic_container, is_unordered_type_name};
pub use context::{detect_context_misuse, detect_context_misuse_any};
pub use deadline::{enforce_deadline, timeout_violation, CancellationSignal};
pub use deadlock::detect_self_referencing_call;

use crate::config::{GuardConfig, GuardPolicy};
use crate::error::GuardError;
use crate::idempotency::{self, IdempotencyKey};
use crate::metrics::GuardMetric;
use crate::observer::GuardObserver;
use crate::types::{ActorRef, InvocationContext};
use crate::violation::{GuardViolation, ViolationCategory};

/// The guards bound to one invocation, with its policy already resolved.
pub struct Guards<'a> {
    ctx: &'a InvocationContext,
    config: Arc<GuardConfig>,
    observer: Arc<dyn GuardObserver>,
    policy: GuardPolicy,
}

impl<'a> Guards<'a> {
    /// Binds guards to `ctx` using the process-wide policy.
    pub fn for_invocation(
        ctx: &'a InvocationContext,
        config: Arc<GuardConfig>,
        observer: Arc<dyn GuardObserver>,
    ) -> Self {
        Self::with_policy_override(ctx, config, observer, None)
    }

    /// Binds guards to `ctx`; `policy_override`, when given, replaces the
    /// process-wide policy for this invocation.
    pub fn with_policy_override(
        ctx: &'a InvocationContext,
        config: Arc<GuardConfig>,
        observer: Arc<dyn GuardObserver>,
        policy_override: Option<GuardPolicy>,
    ) -> Self {
        let policy = config.resolve_policy(policy_override);
        Self {
            ctx,
            config,
            observer,
            policy,
        }
    }

    /// The policy in force for this invocation.
    pub fn policy(&self) -> GuardPolicy {
        self.policy
    }

    /// The invocation these guards are bound to.
    pub fn context(&self) -> &InvocationContext {
        self.ctx
    }

    /// Reports `violation` and decides whether it fails the invocation.
    ///
    /// A violation the permissive policy lets through is recorded as a warning.
    pub fn report(&self, violation: GuardViolation) -> Result<(), GuardError> {
        let category = violation.category();
        if category == ViolationCategory::BlockingOperation {
            self.observer.record_event(&violation);
            return Ok(());
        }
        if category.is_policy_routed() && !self.policy.is_strict() {
            self.observer.record_event(&violation.downgraded());
            return Ok(());
        }
        self.observer.record_event(&violation);
        Err(violation.into_error())
    }

    fn report_opt(&self, violation: Option<GuardViolation>) -> Result<(), GuardError> {
        match violation {
            Some(v) => self.report(v),
            None => Ok(()),
        }
    }

    /// Checks that `handle` is not this invocation's own context.
    pub fn check_context(&self, handle: &InvocationContext) -> Result<(), GuardError> {
        self.report_opt(detect_context_misuse(self.ctx, handle))
    }

    /// Checks an outbound call before it is dispatched. Always fatal on a cycle.
    pub fn check_outbound_call(&self, target: &ActorRef) -> Result<(), GuardError> {
        self.report_opt(detect_self_referencing_call(self.ctx, target))
    }

    /// Checks that `value` has a stable iteration order.
    pub fn check_container<T: ?Sized>(&self, value: &T) -> Result<(), GuardError> {
        self.report_opt(detect_nondeterministic_container(self.ctx, value))
    }

    /// Runs `func`, warning once if it exceeds the configured blocking threshold.
    pub fn guard_blocking<T, F>(&self, region: &str, func: F) -> T
    where
        F: FnOnce() -> T,
    {
        let timer = BlockingTimer::start(region);
        let output = func();
        self.record_blocking(timer);
        output
    }

    /// Awaits `region`, warning once if it exceeds the configured blocking threshold.
    pub async fn guard_blocking_async<T, Fut>(&self, name: &str, region: Fut) -> T
    where
        Fut: Future<Output = T>,
    {
        let timer = BlockingTimer::start(name);
        let output = region.await;
        self.record_blocking(timer);
        output
    }

    fn record_blocking(&self, timer: BlockingTimer) {
        if let Some(violation) = timer.finish(self.ctx, self.config.blocking_threshold) {
            self.observer.record_event(&violation);
        }
    }

    /// Builds an idempotency key for this invocation. Always fatal on failure.
    ///
    /// The key builders on `Guards` are the metered path: each failure counts
    /// a key generation error and is reported to the observer.
    pub fn build_key<S: AsRef<str>>(
        &self,
        namespace: &str,
        parts: &[S],
    ) -> Result<IdempotencyKey, GuardError> {
        self.metered_key(idempotency::build_key(namespace, parts))
    }

    /// Derives a content-hash key for this invocation. Always fatal on failure.
    pub fn content_hash_key<T: Serialize + ?Sized>(
        &self,
        namespace: &str,
        payload: &T,
    ) -> Result<IdempotencyKey, GuardError> {
        self.metered_key(idempotency::content_hash_key(namespace, payload))
    }

    /// Derives a UUID-shaped key for this invocation. Always fatal on failure.
    pub fn uuid_key<S: AsRef<str>>(
        &self,
        namespace: &str,
        parts: &[S],
    ) -> Result<IdempotencyKey, GuardError> {
        self.metered_key(idempotency::uuid_key(namespace, parts))
    }

    fn metered_key(
        &self,
        result: Result<IdempotencyKey, GuardError>,
    ) -> Result<IdempotencyKey, GuardError> {
        result.map_err(|err| {
            self.observer.record_metric(GuardMetric::KeyGenerationError);
            self.observer.record_event(
                &GuardViolation::error(ViolationCategory::KeyGeneration, err.to_string())
                    .with_invocation(self.ctx.invocation_id().clone()),
            );
            err
        })
    }

    /// Runs the handler body with the configured hard deadline.
    pub async fn enforce_deadline<T, F, Fut>(&self, func: F) -> Result<T, GuardError>
    where
        F: FnOnce(CancellationSignal) -> Fut,
        Fut: Future<Output = T>,
    {
        self.enforce_deadline_of(self.config.handler_deadline, func)
            .await
    }

    /// Runs the handler body with an explicit hard deadline.
    pub async fn enforce_deadline_of<T, F, Fut>(
        &self,
        deadline: Duration,
        func: F,
    ) -> Result<T, GuardError>
    where
        F: FnOnce(CancellationSignal) -> Fut,
        Fut: Future<Output = T>,
    {
        match enforce_deadline(self.ctx, deadline, func).await {
            Ok(output) => Ok(output),
            Err(err) => {
                self.observer
                    .record_event(&timeout_violation(self.ctx, deadline));
                Err(err)
            }
        }
    }
}
