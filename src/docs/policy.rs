//! # Strict and Permissive Policy
//!
//! Every guard reports what it finds to the
//! [`GuardObserver`](crate::observer::GuardObserver). The policy only decides
//! whether the violation also fails the invocation.
//!
//! | Violation | Strict | Permissive |
//! |---|---|---|
//! | Missing or malformed idempotency key | 400 rejection, handler not called | warning, handler called |
//! | Context misuse | `DeterminismViolation` | warning |
//! | Non-deterministic container | `DeterminismViolation` | warning |
//! | Blocking region over threshold | warning | warning |
//! | Self-referencing actor call | `ConcurrencyViolation` | `ConcurrencyViolation` |
//! | Handler deadline | `Timeout` | `Timeout` |
//! | Key generation failure | `KeyGeneration` | `KeyGeneration` |
//!
//! The process-wide policy comes from `DURABLE_GUARDS_POLICY` and defaults to
//! permissive. A route or invocation can override it; see
//! [`GuardConfig::resolve_policy`](crate::config::GuardConfig::resolve_policy).
//! The policy is resolved once when [`Guards`](crate::guards::Guards) or
//! [`IdempotencyMiddleware`](crate::idempotency::IdempotencyMiddleware) is
//! constructed.
//!
//! ## Limits
//!
//! | Setting | Default |
//! |---|---|
//! | Blocking threshold | 100 ms |
//! | Handler deadline | 30 s |
//! | Idempotency key length | 255 characters |

// This module is documentation-only.
