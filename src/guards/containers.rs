//! Heuristic detection of containers without a stable iteration order.
//!
//! The check looks at the static type name only, so it catches a `HashMap`
//! passed directly or nested in another type, but not one hidden behind a
//! trait object. It is advisory.

use crate::types::InvocationContext;
use crate::violation::{GuardViolation, ViolationCategory};

/// Type name fragments of containers whose iteration order is unspecified.
const UNORDERED_CONTAINERS: &[&str] = &[
    "std::collections::hash::map::HashMap<",
    "std::collections::hash::set::HashSet<",
    "hashbrown::map::HashMap<",
    "hashbrown::set::HashSet<",
    "dashmap::DashMap<",
    "dashmap::set::DashSet<",
];

/// Returns true if `type_name` mentions a container without a stable order.
pub fn is_unordered_type_name(type_name: &str) -> bool {
    UNORDERED_CONTAINERS.iter().any(|t| type_name.contains(t))
}

/// Reports a warning if `T` is, or contains, a container without a
/// documented iteration order.
pub fn detect_nondeterministic_container<T: ?Sized>(
    ctx: &InvocationContext,
    _value: &T,
) -> Option<GuardViolation> {
    let type_name = std::any::type_name::<T>();
    if !is_unordered_type_name(type_name) {
        return None;
    }
    Some(
        GuardViolation::warning(
            ViolationCategory::NonDeterministic,
            format!(
                "{} has no stable iteration order; use BTreeMap or OrderedMap in handler code",
                type_name
            ),
        )
        .with_invocation(ctx.invocation_id().clone()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ordered_map::OrderedMap;
    use crate::violation::Severity;
    use std::collections::{BTreeMap, HashMap, HashSet};

    fn ctx() -> InvocationContext {
        InvocationContext::new("inv-1", "svc")
    }

    #[test]
    fn test_hash_map_is_flagged() {
        let map: HashMap<String, u32> = HashMap::new();
        let violation = detect_nondeterministic_container(&ctx(), &map).unwrap();
        assert_eq!(violation.category(), ViolationCategory::NonDeterministic);
        assert_eq!(violation.severity(), Severity::Warning);
    }

    #[test]
    fn test_nested_hash_set_is_flagged() {
        let nested: Vec<HashSet<u8>> = vec![];
        assert!(detect_nondeterministic_container(&ctx(), &nested).is_some());
    }

    #[test]
    fn test_ordered_containers_pass() {
        let btree: BTreeMap<String, u32> = BTreeMap::new();
        let ordered: OrderedMap<String, u32> = OrderedMap::new();
        let list = vec![1, 2, 3];
        assert!(detect_nondeterministic_container(&ctx(), &btree).is_none());
        assert!(detect_nondeterministic_container(&ctx(), &ordered).is_none());
        assert!(detect_nondeterministic_container(&ctx(), &list).is_none());
        assert!(detect_nondeterministic_container(&ctx(), "plain str").is_none());
    }

    #[test]
    fn test_type_name_matching() {
        assert!(is_unordered_type_name("dashmap::DashMap<u32, u32>"));
        assert!(!is_unordered_type_name("alloc::collections::btree::map::BTreeMap<u32, u32>"));
    }
}
