//! # Determinism in Replayed Handlers
//!
//! The durable execution runtime recovers a handler by running it again from
//! the top and substituting journaled results for completed side effects.
//! That only works if the second run makes the same decisions in the same
//! order as the first.
//!
//! ## Quick Summary
//!
//! Common sources of divergence, and the guard that reports each:
//!
//! - `HashMap`/`HashSet` iteration order: use [`OrderedMap`](crate::OrderedMap)
//!   or `BTreeMap`. Reported by
//!   [`detect_nondeterministic_container`](crate::guards::detect_nondeterministic_container).
//! - Clock reads, random values and network calls outside a side effect:
//!   wrap them in [`run_side_effect`](crate::scoped::run_side_effect).
//! - A side effect closure reaching back into the parent context: reported by
//!   [`detect_context_misuse`](crate::guards::detect_context_misuse).
//! - Idempotency keys built from attempt-specific values: build keys with
//!   [`build_key`](crate::idempotency::build_key) from stable identifiers only.
//!
//! The container check reads type names and cannot see through wrapper
//! types. A clean report is not proof of determinism.

// This module is documentation-only.
