//! Self-call detection for stateful actors.
//!
//! The runtime runs at most one invocation per actor at a time. An actor that
//! calls itself, or calls back into an actor that is waiting on it, waits
//! for a slot it already holds. The check compares the outbound target with
//! the current actor and with the call chain carried in the
//! [`InvocationContext`], before the call is dispatched.

use crate::types::{ActorRef, InvocationContext};
use crate::violation::{GuardViolation, ViolationCategory};

/// Reports a violation if calling `target` from `current` would deadlock.
pub fn detect_self_referencing_call(
    current: &InvocationContext,
    target: &ActorRef,
) -> Option<GuardViolation> {
    let message = if current.actor() == Some(target) {
        format!("actor {} calls itself while holding its own execution slot", target)
    } else if let Some(pos) = current.call_chain().iter().position(|a| a == target) {
        let mut path: Vec<String> = current.call_chain()[pos..]
            .iter()
            .map(ToString::to_string)
            .collect();
        path.push(
            current
                .actor()
                .map(ToString::to_string)
                .unwrap_or_else(|| format!("invocation {}", current.invocation_id())),
        );
        path.push(target.to_string());
        format!(
            "actor {} is waiting on this invocation; calling it would deadlock ({})",
            target,
            path.join(" -> ")
        )
    } else {
        return None;
    };

    Some(
        GuardViolation::error(ViolationCategory::Deadlock, message)
            .with_invocation(current.invocation_id().clone()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart(key: &str) -> ActorRef {
        ActorRef::new("Cart", key)
    }

    #[test]
    fn test_direct_self_call() {
        let ctx = InvocationContext::new("inv-1", "svc").with_actor(cart("u-1"));
        let violation = detect_self_referencing_call(&ctx, &cart("u-1")).unwrap();
        assert_eq!(violation.category(), ViolationCategory::Deadlock);
        assert!(violation.message().contains("Cart/u-1 calls itself"));
    }

    #[test]
    fn test_different_key_is_fine() {
        let ctx = InvocationContext::new("inv-1", "svc").with_actor(cart("u-1"));
        assert!(detect_self_referencing_call(&ctx, &cart("u-2")).is_none());
    }

    #[test]
    fn test_different_type_same_key_is_fine() {
        let ctx = InvocationContext::new("inv-1", "svc").with_actor(cart("u-1"));
        assert!(detect_self_referencing_call(&ctx, &ActorRef::new("Wishlist", "u-1")).is_none());
    }

    #[test]
    fn test_unbound_invocation_is_fine() {
        let ctx = InvocationContext::new("inv-1", "svc");
        assert!(detect_self_referencing_call(&ctx, &cart("u-1")).is_none());
    }

    #[test]
    fn test_transitive_cycle() {
        let root = InvocationContext::new("inv-1", "svc").with_actor(cart("u-1"));
        let inventory = root.child_for("inv-2", Some(ActorRef::new("Inventory", "sku-1")));

        let violation = detect_self_referencing_call(&inventory, &cart("u-1")).unwrap();
        assert_eq!(violation.invocation_id().unwrap().as_str(), "inv-2");
        assert!(violation
            .message()
            .contains("Cart/u-1 -> Inventory/sku-1 -> Cart/u-1"));
    }

    #[test]
    fn test_cycle_through_unbound_hop() {
        let root = InvocationContext::new("inv-1", "svc").with_actor(cart("u-1"));
        let workflow = root.child_for("inv-2", None);
        let violation = detect_self_referencing_call(&workflow, &cart("u-1")).unwrap();
        assert!(violation.message().contains("invocation inv-2"));
    }
}
