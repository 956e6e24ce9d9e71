//! Scoped execution of non-deterministic work.
//!
//! Side effects (network calls, clock reads, random values) must run inside
//! [`run_side_effect`] or [`run_side_effect_async`]. The runtime journals the
//! result and, on replay, substitutes it instead of calling the closure again.
//!
//! The wrapper's own job is isolation. The closure receives a
//! [`SideEffectContext`] and nothing else:
//!
//! - closures must be `Send + 'static`, so they cannot borrow the parent
//!   [`InvocationContext`];
//! - `InvocationContext` is not `Clone`, so a closure cannot carry its own copy;
//! - the [`SideEffectContext`] holds plain data copied out of the parent, never
//!   a reference to it.
//!
//! Code that passes context handles around dynamically can still leak the
//! parent. [`detect_context_misuse`](crate::guards::detect_context_misuse)
//! catches that case at runtime.
//!
//! # Example
//!
//! ```rust
//! use durable_guards::scoped::run_side_effect;
//! use durable_guards::types::InvocationContext;
//!
//! let ctx = InvocationContext::new("inv-1", "payments");
//! let charged: Result<u64, std::io::Error> =
//!     run_side_effect(&ctx, "charge_card", |effect| {
//!         assert_eq!(effect.name(), "charge_card");
//!         Ok(4200)
//!     });
//! assert_eq!(charged.unwrap(), 4200);
//! ```

use std::future::Future;

use crate::types::{InvocationContext, InvocationId};

/// The only handle a side effect closure receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideEffectContext {
    invocation_id: InvocationId,
    name: String,
}

impl SideEffectContext {
    fn from_parent(parent: &InvocationContext, name: &str) -> Self {
        Self {
            invocation_id: parent.invocation_id().clone(),
            name: name.to_string(),
        }
    }

    /// The id of the invocation that scheduled this side effect.
    pub fn invocation_id(&self) -> &InvocationId {
        &self.invocation_id
    }

    /// The side effect name, as journaled by the runtime.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Runs a synchronous side effect with an isolated handle.
///
/// The closure's error is returned unchanged.
pub fn run_side_effect<T, E, F>(parent: &InvocationContext, name: &str, func: F) -> Result<T, E>
where
    F: FnOnce(SideEffectContext) -> Result<T, E> + Send + 'static,
{
    let effect_ctx = SideEffectContext::from_parent(parent, name);
    tracing::debug!(
        invocation_id = %parent.invocation_id(),
        side_effect = name,
        replaying = parent.is_replaying(),
        "Running side effect"
    );
    func(effect_ctx)
}

/// Runs an asynchronous side effect with an isolated handle.
///
/// The closure's error is returned unchanged.
pub async fn run_side_effect_async<T, E, F, Fut>(
    parent: &InvocationContext,
    name: &str,
    func: F,
) -> Result<T, E>
where
    F: FnOnce(SideEffectContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let effect_ctx = SideEffectContext::from_parent(parent, name);
    tracing::debug!(
        invocation_id = %parent.invocation_id(),
        side_effect = name,
        replaying = parent.is_replaying(),
        "Running async side effect"
    );
    func(effect_ctx).await
}
