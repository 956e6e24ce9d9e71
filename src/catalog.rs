//! Catalog of known handler anti-patterns, one per violation category.

use serde::Serialize;

use crate::observer::GuardObserver;
use crate::types::InvocationContext;
use crate::violation::{GuardViolation, ViolationCategory};

/// Static description of one anti-pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AntiPatternDescriptor {
    pub category: ViolationCategory,
    pub description: &'static str,
    pub example: &'static str,
    pub fix: &'static str,
}

/// Every known anti-pattern, in [`ViolationCategory::ALL`] order.
pub const COMMON_ANTI_PATTERNS: [AntiPatternDescriptor; ViolationCategory::ALL.len()] = [
    AntiPatternDescriptor {
        category: ViolationCategory::ContextMisuse,
        description: "A side effect closure uses the parent invocation context",
        example: "run_side_effect(&ctx, \"charge\", move |_| client.charge(parent_handle))",
        fix: "Use only the SideEffectContext the closure receives and return plain data",
    },
    AntiPatternDescriptor {
        category: ViolationCategory::Deadlock,
        description: "A stateful actor calls itself, directly or through one of its callers",
        example: "Cart/u-1 calls Inventory/sku-1, which calls back into Cart/u-1",
        fix: "Do the work inline, or send a one-way message instead of awaiting a reply",
    },
    AntiPatternDescriptor {
        category: ViolationCategory::BlockingOperation,
        description: "Handler code blocks for a long time outside a side effect",
        example: "std::thread::sleep(Duration::from_secs(5)) inside a handler",
        fix: "Use a durable timer, or move the slow call into a side effect",
    },
    AntiPatternDescriptor {
        category: ViolationCategory::Timeout,
        description: "A handler runs past its deadline",
        example: "Polling an external job in a loop until it finishes",
        fix: "Split the work into shorter invocations or wait on a durable callback",
    },
    AntiPatternDescriptor {
        category: ViolationCategory::NonDeterministic,
        description: "Iteration order of a container differs between executions",
        example: "for (sku, qty) in hash_map { ctx.call(...) }",
        fix: "Use OrderedMap, BTreeMap or a Vec so replay visits entries in the same order",
    },
    AntiPatternDescriptor {
        category: ViolationCategory::ValidationError,
        description: "A request arrives without a usable idempotency key",
        example: "POST /checkout with no Idempotency-Key header",
        fix: "Send a key built from the operation's business identifiers",
    },
    AntiPatternDescriptor {
        category: ViolationCategory::KeyGeneration,
        description: "An idempotency key is derived from values that change between attempts",
        example: "build_key(\"order\", &[Utc::now().to_string()])",
        fix: "Build keys only from stable identifiers such as user, order or cart ids",
    },
];

/// Looks up the descriptor for `category`.
pub fn anti_pattern_by_category(category: ViolationCategory) -> &'static AntiPatternDescriptor {
    &COMMON_ANTI_PATTERNS[category.index()]
}

/// Reports one warning describing `category` for the given invocation.
///
/// The warning goes to `observer` like any other violation, so it is counted
/// by [`GuardMetrics`](crate::metrics::GuardMetrics) and logged by
/// [`TracingObserver`](crate::observer::TracingObserver) with the
/// descriptor's fix attached.
pub fn log_anti_pattern_warning(
    observer: &dyn GuardObserver,
    ctx: &InvocationContext,
    category: ViolationCategory,
    detail: &str,
) {
    let descriptor = anti_pattern_by_category(category);
    let violation = GuardViolation::warning(
        category,
        format!("{}: {}", descriptor.description, detail),
    )
    .with_invocation(ctx.invocation_id().clone());
    observer.record_event(&violation);
}
