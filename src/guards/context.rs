//! Detection of side effect closures that hold the parent invocation context.
//!
//! A closure that keeps the parent handle can issue runtime calls from inside
//! a side effect. On replay the side effect is skipped, so those calls happen
//! in a different order than they did the first time.

use std::any::Any;

use crate::types::InvocationContext;
use crate::violation::{GuardViolation, ViolationCategory};

/// Reports a violation if `handle` is the parent context itself.
///
/// The comparison is by address: a context derived with
/// [`InvocationContext::child_for`] is a different object and passes.
pub fn detect_context_misuse(
    parent: &InvocationContext,
    handle: &InvocationContext,
) -> Option<GuardViolation> {
    if !std::ptr::eq(parent, handle) {
        return None;
    }
    Some(
        GuardViolation::error(
            ViolationCategory::ContextMisuse,
            format!(
                "side effect received the parent context of invocation {}; use the side effect handle instead",
                parent.invocation_id()
            ),
        )
        .with_invocation(parent.invocation_id().clone()),
    )
}

/// Same as [`detect_context_misuse`] for handles passed around as `dyn Any`.
///
/// Handles of any other type never match.
pub fn detect_context_misuse_any(
    parent: &InvocationContext,
    handle: &dyn Any,
) -> Option<GuardViolation> {
    handle
        .downcast_ref::<InvocationContext>()
        .and_then(|ctx| detect_context_misuse(parent, ctx))
}
