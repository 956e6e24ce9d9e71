//! Configuration for the guard layer.
//!
//! A [`GuardConfig`] is constructed once at process start and shared by
//! reference (usually through `Arc`) with every component that needs it.
//! There is no global instance.
//!
//! ## Policy
//!
//! The [`GuardPolicy`] decides what happens to policy-routed violations
//! (missing or malformed idempotency keys, determinism violations):
//!
//! - **Strict**: the violation fails the invocation.
//! - **Permissive** (default): the violation is logged and counted, and the
//!   invocation continues.
//!
//! The policy is process-wide. A call site may pass an explicit override,
//! which wins over the process-wide value. [`GuardConfig::resolve_policy`]
//! is the single place that makes this decision.
//!
//! ## Environment
//!
//! [`GuardConfig::from_env`] reads:
//!
//! | Variable | Default |
//! |---|---|
//! | `DURABLE_GUARDS_POLICY` | `permissive` |
//! | `DURABLE_GUARDS_BLOCKING_THRESHOLD_MS` | `100` |
//! | `DURABLE_GUARDS_HANDLER_DEADLINE_MS` | `30000` |
//! | `DURABLE_GUARDS_SERVICE_NAME` | `default` |
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use durable_guards::config::{GuardConfig, GuardPolicy};
//!
//! let config = GuardConfig::default()
//!     .with_policy(GuardPolicy::Strict)
//!     .with_blocking_threshold(Duration::from_millis(50));
//!
//! assert_eq!(config.resolve_policy(None), GuardPolicy::Strict);
//! assert_eq!(config.resolve_policy(Some(GuardPolicy::Permissive)), GuardPolicy::Permissive);
//! ```

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use http::HeaderName;
use serde::{Deserialize, Serialize};

use crate::types::ServiceName;

/// Environment variable selecting the process-wide policy.
pub const POLICY_ENV: &str = "DURABLE_GUARDS_POLICY";
/// Environment variable for the blocking-call warning threshold in milliseconds.
pub const BLOCKING_THRESHOLD_ENV: &str = "DURABLE_GUARDS_BLOCKING_THRESHOLD_MS";
/// Environment variable for the handler deadline in milliseconds.
pub const HANDLER_DEADLINE_ENV: &str = "DURABLE_GUARDS_HANDLER_DEADLINE_MS";
/// Environment variable for the service name used in dedup record addresses.
pub const SERVICE_NAME_ENV: &str = "DURABLE_GUARDS_SERVICE_NAME";

/// Inbound header carrying the caller-supplied idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: HeaderName = HeaderName::from_static("idempotency-key");
/// Trusted header set after the inbound key has been validated.
pub const TRUSTED_IDEMPOTENCY_KEY_HEADER: HeaderName =
    HeaderName::from_static("x-idempotency-key");

const DEFAULT_BLOCKING_THRESHOLD: Duration = Duration::from_millis(100);
const DEFAULT_HANDLER_DEADLINE: Duration = Duration::from_secs(30);
const DEFAULT_SERVICE_NAME: &str = "default";

/// Namespace prefixes accepted by key validation out of the box.
pub const DEFAULT_KEY_NAMESPACES: &[&str] = &[
    "order",
    "payment",
    "charge",
    "user",
    "cart",
    "shipment",
    "checkout",
    "refund",
    "invoice",
    "notification",
];

/// Whether policy-routed violations fail the invocation or are only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GuardPolicy {
    /// Policy-routed violations reject the invocation.
    Strict,
    /// Policy-routed violations are logged and counted; execution continues.
    #[default]
    Permissive,
}

impl GuardPolicy {
    /// Returns true for [`GuardPolicy::Strict`].
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Strict)
    }

    /// Returns a human-readable description of this policy.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Strict => "Reject invocations on validation and determinism violations",
            Self::Permissive => "Log validation and determinism violations and continue",
        }
    }
}

impl fmt::Display for GuardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => f.write_str("strict"),
            Self::Permissive => f.write_str("permissive"),
        }
    }
}

/// Error returned when a policy string is not recognized.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown guard policy '{0}', expected 'strict' or 'permissive'")]
pub struct ParsePolicyError(String);

impl FromStr for GuardPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" | "true" | "1" => Ok(Self::Strict),
            "permissive" | "false" | "0" => Ok(Self::Permissive),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

/// Process-wide configuration for all guards.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Process-wide policy for policy-routed violations.
    pub policy: GuardPolicy,
    /// Elapsed time after which a guarded region emits a blocking warning.
    pub blocking_threshold: Duration,
    /// Hard deadline for a whole handler body.
    pub handler_deadline: Duration,
    /// Service name used as the first component of dedup record addresses.
    pub service_name: ServiceName,
    /// Header the caller supplies the idempotency key in.
    pub key_header: HeaderName,
    /// Header the middleware sets for downstream handlers after validation.
    pub trusted_key_header: HeaderName,
    /// Namespace prefixes recognized by key validation.
    pub known_namespaces: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            policy: GuardPolicy::default(),
            blocking_threshold: DEFAULT_BLOCKING_THRESHOLD,
            handler_deadline: DEFAULT_HANDLER_DEADLINE,
            service_name: ServiceName::from(DEFAULT_SERVICE_NAME),
            key_header: IDEMPOTENCY_KEY_HEADER,
            trusted_key_header: TRUSTED_IDEMPOTENCY_KEY_HEADER,
            known_namespaces: DEFAULT_KEY_NAMESPACES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl GuardConfig {
    /// Loads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads the configuration from an arbitrary variable lookup.
    ///
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(POLICY_ENV) {
            match raw.parse::<GuardPolicy>() {
                Ok(policy) => config.policy = policy,
                Err(e) => tracing::warn!(variable = POLICY_ENV, error = %e, "Ignoring invalid guard policy"),
            }
        }
        if let Some(threshold) = parse_millis(&lookup, BLOCKING_THRESHOLD_ENV) {
            config.blocking_threshold = threshold;
        }
        if let Some(deadline) = parse_millis(&lookup, HANDLER_DEADLINE_ENV) {
            config.handler_deadline = deadline;
        }
        if let Some(name) = lookup(SERVICE_NAME_ENV) {
            match ServiceName::new(name) {
                Ok(name) => config.service_name = name,
                Err(e) => tracing::warn!(variable = SERVICE_NAME_ENV, error = %e, "Ignoring invalid service name"),
            }
        }

        tracing::debug!(
            policy = %config.policy,
            blocking_threshold_ms = config.blocking_threshold.as_millis() as u64,
            handler_deadline_ms = config.handler_deadline.as_millis() as u64,
            service = %config.service_name,
            "Loaded guard configuration"
        );
        config
    }

    /// Sets the process-wide policy.
    pub fn with_policy(mut self, policy: GuardPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the blocking-call warning threshold.
    pub fn with_blocking_threshold(mut self, threshold: Duration) -> Self {
        self.blocking_threshold = threshold;
        self
    }

    /// Sets the hard handler deadline.
    pub fn with_handler_deadline(mut self, deadline: Duration) -> Self {
        self.handler_deadline = deadline;
        self
    }

    /// Sets the service name.
    pub fn with_service_name(mut self, service_name: impl Into<ServiceName>) -> Self {
        self.service_name = service_name.into();
        self
    }

    /// Adds a namespace prefix recognized by key validation.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        if !self.known_namespaces.contains(&namespace) {
            self.known_namespaces.push(namespace);
        }
        self
    }

    /// Resolves the policy for one invocation.
    ///
    /// An explicit per-call override wins over the process-wide policy.
    pub fn resolve_policy(&self, override_policy: Option<GuardPolicy>) -> GuardPolicy {
        override_policy.unwrap_or(self.policy)
    }
}

fn parse_millis<F>(lookup: &F, name: &str) -> Option<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(e) => {
            tracing::warn!(variable = name, value = %raw, error = %e, "Ignoring invalid duration");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = GuardConfig::default();
        assert_eq!(config.policy, GuardPolicy::Permissive);
        assert_eq!(config.blocking_threshold, Duration::from_millis(100));
        assert_eq!(config.handler_deadline, Duration::from_secs(30));
        assert_eq!(config.key_header.as_str(), "idempotency-key");
        assert_eq!(config.trusted_key_header.as_str(), "x-idempotency-key");
        assert!(config.known_namespaces.iter().any(|n| n == "order"));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("strict".parse::<GuardPolicy>(), Ok(GuardPolicy::Strict));
        assert_eq!(" STRICT ".parse::<GuardPolicy>(), Ok(GuardPolicy::Strict));
        assert_eq!("permissive".parse::<GuardPolicy>(), Ok(GuardPolicy::Permissive));
        assert_eq!("1".parse::<GuardPolicy>(), Ok(GuardPolicy::Strict));
        assert!("sometimes".parse::<GuardPolicy>().is_err());
    }

    #[test]
    fn test_from_lookup_reads_all_variables() {
        let config = GuardConfig::from_lookup(lookup_from(&[
            (POLICY_ENV, "strict"),
            (BLOCKING_THRESHOLD_ENV, "250"),
            (HANDLER_DEADLINE_ENV, "5000"),
            (SERVICE_NAME_ENV, "checkout"),
        ]));
        assert_eq!(config.policy, GuardPolicy::Strict);
        assert_eq!(config.blocking_threshold, Duration::from_millis(250));
        assert_eq!(config.handler_deadline, Duration::from_secs(5));
        assert_eq!(config.service_name.as_str(), "checkout");
    }

    #[test]
    fn test_from_lookup_ignores_invalid_values() {
        let config = GuardConfig::from_lookup(lookup_from(&[
            (POLICY_ENV, "loose"),
            (BLOCKING_THRESHOLD_ENV, "fast"),
            (SERVICE_NAME_ENV, ""),
        ]));
        assert_eq!(config.policy, GuardPolicy::Permissive);
        assert_eq!(config.blocking_threshold, Duration::from_millis(100));
        assert_eq!(config.service_name.as_str(), "default");
    }

    #[test]
    fn test_override_wins() {
        let config = GuardConfig::default().with_policy(GuardPolicy::Permissive);
        assert_eq!(config.resolve_policy(None), GuardPolicy::Permissive);
        assert_eq!(config.resolve_policy(Some(GuardPolicy::Strict)), GuardPolicy::Strict);
    }

    #[test]
    fn test_with_namespace_deduplicates() {
        let before = GuardConfig::default().known_namespaces.len();
        let config = GuardConfig::default()
            .with_namespace("subscription")
            .with_namespace("subscription")
            .with_namespace("order");
        assert_eq!(config.known_namespaces.len(), before + 1);
    }
}
